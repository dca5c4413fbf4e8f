use crate::tree::reconcile::ApplyOutcome;

/// Counters for one stage run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub created: usize,
    pub removed: usize,
    pub pruned_dirs: usize,
    /// Leaves waiting on the update agent (unresolved tag, missing digest)
    pub pending: usize,
    /// Leaves treated as absent because they were malformed or misplaced
    pub skipped: usize,
    /// Entries written to the digest map
    pub collected: usize,
    /// Previously persisted entries dropped from the digest map
    pub orphaned: usize,
    pub dry_run: bool,
}

impl StageReport {
    pub fn new(stage: &'static str, dry_run: bool) -> Self {
        Self {
            stage,
            dry_run,
            ..Self::default()
        }
    }

    pub fn absorb(&mut self, outcome: ApplyOutcome) {
        self.created += outcome.created;
        self.removed += outcome.removed;
        self.pruned_dirs += outcome.pruned_dirs;
    }

    pub fn changed(&self) -> bool {
        self.created > 0 || self.removed > 0 || self.pruned_dirs > 0 || self.orphaned > 0
    }
}

impl std::fmt::Display for StageReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = if self.dry_run { "would change" } else { "changed" };
        write!(
            f,
            "{}: {} (+{} -{}, {} dirs pruned), {} pending, {} skipped",
            self.stage, verb, self.created, self.removed, self.pruned_dirs, self.pending, self.skipped
        )?;
        if self.stage == "collect" {
            write!(f, ", {} collected, {} orphaned", self.collected, self.orphaned)?;
        }
        Ok(())
    }
}
