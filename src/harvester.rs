//! Tag harvester.
//!
//! Turns every resolved version record into one pin leaf per declared
//! platform, and removes pins no version record reaches anymore.
use crate::config::Layout;
use crate::constants::LEAF_FILE_NAME;
use crate::declarations::{check_segment, Declarations, Strategy};
use crate::docker::render_leaf;
use crate::error::Result;
use crate::report::StageReport;
use crate::tree::reconcile::ReconcilePlan;
use crate::tree::scanner::{scan_tree, Scan, VERSION_SCHEMA};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

pub const STAGE: &str = "harvest";

/// One pin that should exist: (image, resolved tag, platform).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PinTarget {
    pub key: String,
    pub image: String,
    pub tag: String,
    pub platform: Option<String>,
}

impl PinTarget {
    pub fn leaf_path(&self, layout: &Layout) -> PathBuf {
        let mut path = layout.pins_dir.join(&self.key).join(&self.tag);
        if let Some(platform) = &self.platform {
            for segment in platform.split('/') {
                path.push(segment);
            }
        }
        path.join(LEAF_FILE_NAME)
    }
}

/// Pin targets plus bookkeeping on records that did not contribute.
#[derive(Debug, Default)]
pub struct HarvestTargets {
    pub targets: BTreeSet<PinTarget>,
    /// Records still holding a placeholder tag
    pub unresolved: usize,
    /// Records that cannot contribute (undeclared image or version, mismatched
    /// image, unsafe tag) plus malformed leaves
    pub skipped: usize,
}

/// Derive the deduplicated pin target set from a scanned version tree.
pub fn targets_from_scan(scan: &Scan, decls: &Declarations) -> HarvestTargets {
    let mut out = HarvestTargets {
        skipped: scan.diagnostics.len(),
        ..HarvestTargets::default()
    };

    for record in &scan.records {
        let (strategy, key, version) = (&record.keys[0], &record.keys[1], &record.keys[2]);
        let Some(strategy) = Strategy::from_dir_name(strategy) else {
            tracing::debug!(path = %record.path.display(), "Ignoring record outside known strategies");
            out.skipped += 1;
            continue;
        };
        let Some(spec) = decls.get(key) else {
            tracing::debug!(path = %record.path.display(), "Ignoring record of undeclared image");
            out.skipped += 1;
            continue;
        };
        if !spec.seeds(strategy).iter().any(|seed| seed == version) {
            tracing::debug!(path = %record.path.display(), "Ignoring record of withdrawn version");
            out.skipped += 1;
            continue;
        }

        let directive = &record.directive;
        if directive.image != spec.image {
            tracing::warn!(
                path = %record.path.display(),
                found = %directive.image,
                declared = %spec.image,
                "Version record names a different image"
            );
            out.skipped += 1;
            continue;
        }
        if directive.is_placeholder() {
            tracing::debug!(path = %record.path.display(), "Version record not resolved yet");
            out.unresolved += 1;
            continue;
        }
        let Some(tag) = directive.tag.as_deref() else {
            continue;
        };
        if check_segment("tag", tag).is_err() {
            tracing::warn!(path = %record.path.display(), tag, "Resolved tag is not a usable directory name");
            out.skipped += 1;
            continue;
        }

        for platform in spec.platform_slots() {
            out.targets.insert(PinTarget {
                key: key.clone(),
                image: spec.image.clone(),
                tag: tag.to_string(),
                platform: platform.map(str::to_string),
            });
        }
    }

    out
}

/// Desired pin leaves with their unpinned seed content.
pub fn desired_pins(layout: &Layout, targets: &BTreeSet<PinTarget>) -> BTreeMap<PathBuf, String> {
    targets
        .iter()
        .map(|t| (t.leaf_path(layout), render_leaf(&t.image, &t.tag)))
        .collect()
}

/// Plan the pin tree reconciliation without touching it.
pub fn plan(layout: &Layout, decls: &Declarations) -> (ReconcilePlan, HarvestTargets) {
    let versions = scan_tree(&layout.versions_dir, &VERSION_SCHEMA);
    let targets = targets_from_scan(&versions, decls);
    let existing = crate::tree::walker::walk_leaves(&layout.pins_dir);
    let plan = ReconcilePlan::diff(
        &layout.pins_dir,
        desired_pins(layout, &targets.targets),
        &existing,
    );
    (plan, targets)
}

/// Reconcile the pin tree against the current version records.
pub fn harvest(layout: &Layout, decls: &Declarations, dry_run: bool) -> Result<StageReport> {
    let mut report = StageReport::new(STAGE, dry_run);
    let (plan, targets) = plan(layout, decls);
    report.pending = targets.unresolved;
    report.skipped = targets.skipped;

    if dry_run {
        plan.log_dry_run("pins");
        report.created = plan.creates.len();
        report.removed = plan.removes.len();
    } else {
        report.absorb(plan.apply("pins")?);
    }

    crate::log_stage_complete!(report);
    Ok(report)
}
