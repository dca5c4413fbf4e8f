use crate::error::{storage_err, Result};
use crate::tree::walker::walk_dirs_bottom_up;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A leaf record to create with its seed content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafWrite {
    pub path: PathBuf,
    pub content: String,
}

/// Create/remove set that brings one tree to its desired state.
///
/// The desired state is a pure function of the declarations and the current
/// tree contents, so a plan interrupted half way converges on the next run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub root: PathBuf,
    pub creates: Vec<LeafWrite>,
    pub removes: Vec<PathBuf>,
}

/// What `apply` actually changed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub created: usize,
    pub removed: usize,
    pub pruned_dirs: usize,
}

impl ReconcilePlan {
    /// Diff the desired leaves against the leaves currently on disk. Existing
    /// leaves are never rewritten: their content belongs to the update agent.
    pub fn diff(root: &Path, desired: BTreeMap<PathBuf, String>, existing: &[PathBuf]) -> Self {
        let existing: BTreeSet<&PathBuf> = existing.iter().collect();

        let creates = desired
            .iter()
            .filter(|(path, _)| !existing.contains(path))
            .map(|(path, content)| LeafWrite {
                path: path.clone(),
                content: content.clone(),
            })
            .collect();

        let removes = existing
            .into_iter()
            .filter(|path| !desired.contains_key(*path))
            .cloned()
            .collect();

        Self {
            root: root.to_path_buf(),
            creates,
            removes,
        }
    }

    /// Plan that only removes the given leaves.
    pub fn removals(root: &Path, removes: Vec<PathBuf>) -> Self {
        Self {
            root: root.to_path_buf(),
            creates: Vec::new(),
            removes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.removes.is_empty()
    }

    /// Log the plan without touching the filesystem.
    pub fn log_dry_run(&self, tree: &str) {
        for write in &self.creates {
            tracing::info!(tree, path = %write.path.display(), "Would create leaf");
        }
        for path in &self.removes {
            tracing::info!(tree, path = %path.display(), "Would remove leaf");
        }
    }

    /// Remove stale leaves, create missing ones, then prune every empty
    /// directory below the root. The root itself is never removed.
    pub fn apply(&self, tree: &str) -> Result<ApplyOutcome> {
        let mut outcome = ApplyOutcome::default();

        for path in &self.removes {
            match fs::remove_file(path) {
                Ok(()) => {
                    outcome.removed += 1;
                    crate::log_leaf_removed!(tree, path);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(storage_err("remove leaf", path)(e)),
            }
            outcome.pruned_dirs += prune_empty_parents(&self.root, path)?;
        }

        for write in &self.creates {
            if write.path.exists() {
                continue;
            }
            if let Some(parent) = write.path.parent() {
                fs::create_dir_all(parent).map_err(storage_err("create directory", parent))?;
            }
            fs::write(&write.path, &write.content).map_err(storage_err("write leaf", &write.path))?;
            outcome.created += 1;
            crate::log_leaf_created!(tree, write.path);
        }

        // sweeps directories left empty by an interrupted earlier run
        outcome.pruned_dirs += prune_empty_dirs(&self.root)?;
        Ok(outcome)
    }
}

/// Remove the now-empty ancestors of `leaf`, stopping below `root`.
pub fn prune_empty_parents(root: &Path, leaf: &Path) -> Result<usize> {
    let mut pruned = 0;
    let mut dir = leaf.parent();

    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        if !remove_if_empty(current)? {
            break;
        }
        pruned += 1;
        dir = current.parent();
    }

    Ok(pruned)
}

/// Remove every empty directory below `root`, deepest first.
pub fn prune_empty_dirs(root: &Path) -> Result<usize> {
    let mut pruned = 0;
    for dir in walk_dirs_bottom_up(root) {
        if remove_if_empty(&dir)? {
            pruned += 1;
        }
    }
    Ok(pruned)
}

fn remove_if_empty(dir: &Path) -> Result<bool> {
    let is_empty = match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(storage_err("read directory", dir)(e)),
    };
    if !is_empty {
        return Ok(false);
    }
    match fs::remove_dir(dir) {
        Ok(()) => {
            tracing::debug!(path = %dir.display(), "Removed empty directory");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(storage_err("remove directory", dir)(e)),
    }
}
