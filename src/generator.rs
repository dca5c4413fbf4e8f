//! Version-record generator.
//!
//! Seeds one placeholder leaf per declared (strategy, image, seed version) and
//! removes every version record that no longer maps to a declaration.
use crate::config::Layout;
use crate::constants::LEAF_FILE_NAME;
use crate::declarations::{is_placeholder_seed, Declarations, Strategy};
use crate::docker::render_leaf;
use crate::error::Result;
use crate::report::StageReport;
use crate::tree::reconcile::ReconcilePlan;
use crate::tree::walker::walk_leaves;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const STAGE: &str = "generate";

/// Desired version leaves with their seed content.
pub fn desired_records(layout: &Layout, decls: &Declarations) -> BTreeMap<PathBuf, String> {
    let mut desired = BTreeMap::new();

    for spec in decls.images() {
        for strategy in Strategy::ALL {
            for seed in spec.seeds(strategy) {
                let path = layout
                    .versions_dir
                    .join(strategy.dir_name())
                    .join(spec.key())
                    .join(seed)
                    .join(LEAF_FILE_NAME);
                if is_placeholder_seed(seed) {
                    tracing::debug!(image = %spec.image, %strategy, "Seeding placeholder record");
                }
                desired.insert(path, render_leaf(&spec.image, seed));
            }
        }
    }

    desired
}

/// Plan the version tree reconciliation without touching it.
pub fn plan(layout: &Layout, decls: &Declarations) -> ReconcilePlan {
    let existing = walk_leaves(&layout.versions_dir);
    ReconcilePlan::diff(&layout.versions_dir, desired_records(layout, decls), &existing)
}

/// Reconcile the version tree against the declarations.
pub fn generate(layout: &Layout, decls: &Declarations, dry_run: bool) -> Result<StageReport> {
    let mut report = StageReport::new(STAGE, dry_run);
    let plan = plan(layout, decls);

    if dry_run {
        plan.log_dry_run("versions");
        report.created = plan.creates.len();
        report.removed = plan.removes.len();
    } else {
        report.absorb(plan.apply("versions")?);
    }

    crate::log_stage_complete!(report);
    Ok(report)
}
