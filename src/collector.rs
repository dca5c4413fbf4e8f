//! Digest collector.
//!
//! Consolidates every digest-annotated pin into the persisted digest map,
//! merging legacy pin trees under the current one, and cleans up pins and
//! map entries whose image or platform is no longer declared.
use crate::config::Layout;
use crate::declarations::Declarations;
use crate::error::{storage_err, Result};
use crate::report::StageReport;
use crate::tree::merge::{merge_ordered, RefTree};
use crate::tree::reconcile::ReconcilePlan;
use crate::tree::scanner::{scan_tree, PIN_SCHEMA};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const STAGE: &str = "collect";

/// The freshly derived digest map and what was left out of it.
#[derive(Debug, Default)]
pub struct Collection {
    pub map: RefTree,
    /// Pins without a digest yet
    pub pending: usize,
    /// Malformed or misplaced pin leaves, across all trees
    pub skipped: usize,
    /// Leaves of the current pin tree whose image or platform is undeclared
    pub undeclared: Vec<PathBuf>,
}

/// Scan all pin trees and build the digest map. Reads only.
pub fn collect_map(layout: &Layout, decls: &Declarations) -> Collection {
    let mut collection = Collection::default();
    let mut trees = Vec::new();

    for root in layout.pin_trees() {
        let is_current = root == layout.pins_dir.as_path();
        let scan = scan_tree(root, &PIN_SCHEMA);
        collection.skipped += scan.diagnostics.len();

        let mut tree = RefTree::new();
        for record in &scan.records {
            let key = &record.keys[0];
            let declared = decls
                .get(key)
                .filter(|spec| spec.declares_platform(record.platform.as_deref()));
            let Some(spec) = declared else {
                tracing::debug!(path = %record.path.display(), "Pin no longer declared");
                if is_current {
                    collection.undeclared.push(record.path.clone());
                }
                continue;
            };

            if record.directive.image != spec.image {
                tracing::warn!(
                    path = %record.path.display(),
                    found = %record.directive.image,
                    declared = %spec.image,
                    "Pin names a different image"
                );
                collection.skipped += 1;
                continue;
            }
            if !record.directive.is_digested() {
                tracing::debug!(path = %record.path.display(), "Pin has no digest yet");
                collection.pending += 1;
                continue;
            }

            // copied verbatim, never rebuilt from parts
            if !tree.insert(&record.tree_path(), record.directive.reference.clone()) {
                tracing::warn!(
                    path = %record.path.display(),
                    "Platform-less and platform leaves share a tag, platform leaves win"
                );
            }
        }
        trees.push(tree);
    }

    collection.map = merge_ordered(trees);
    collection
}

/// Read the previously persisted digest map, if there is a usable one.
pub fn load_previous(path: &Path) -> Option<RefTree> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str::<RefTree>(&content) {
        Ok(tree) => Some(tree),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable previous digest map");
            None
        }
    }
}

/// Key paths present in `previous` but gone from `current`.
pub fn orphaned_entries(previous: &RefTree, current: &RefTree) -> Vec<Vec<String>> {
    let current: BTreeSet<Vec<String>> = current.leaves().into_iter().map(|(path, _)| path).collect();
    previous
        .leaves()
        .into_iter()
        .map(|(path, _)| path)
        .filter(|path| !current.contains(path))
        .collect()
}

/// Render the digest map: pretty JSON, sorted keys, trailing newline.
pub fn render_map(map: &RefTree) -> Result<String> {
    let mut out = serde_json::to_string_pretty(map)?;
    out.push('\n');
    Ok(out)
}

/// Write the digest map through a sibling temp file so readers never see a
/// half-written document.
pub fn write_map(path: &Path, map: &RefTree) -> Result<()> {
    let rendered = render_map(map)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(storage_err("create output directory", parent))?;
        }
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, rendered).map_err(storage_err("write digest map", &tmp))?;
    fs::rename(&tmp, path).map_err(storage_err("replace digest map", path))?;
    Ok(())
}

/// Collect digests, drop orphans, and persist the digest map.
pub fn collect(layout: &Layout, decls: &Declarations, dry_run: bool) -> Result<StageReport> {
    let mut report = StageReport::new(STAGE, dry_run);
    let collection = collect_map(layout, decls);
    report.pending = collection.pending;
    report.skipped = collection.skipped;
    report.collected = collection.map.leaf_count();

    if let Some(previous) = load_previous(&layout.output_file) {
        let orphans = orphaned_entries(&previous, &collection.map);
        for entry in &orphans {
            tracing::info!(entry = %entry.join(" → "), "Dropping orphaned digest entry");
        }
        report.orphaned = orphans.len();
    }

    let cleanup = ReconcilePlan::removals(&layout.pins_dir, collection.undeclared);
    if dry_run {
        cleanup.log_dry_run("pins");
        report.removed = cleanup.removes.len();
    } else {
        if layout.pins_dir.exists() {
            report.absorb(cleanup.apply("pins")?);
        }
        write_map(&layout.output_file, &collection.map)?;
        tracing::info!(
            path = %layout.output_file.display(),
            entries = report.collected,
            images = collection.map.children().map_or(0, |c| c.len()),
            "Wrote digest map"
        );
    }

    crate::log_stage_complete!(report);
    Ok(report)
}
