use crate::docker::{parse_leaf, DirectiveError, FromDirective};
use crate::tree::merge::RefTree;
use crate::tree::walker::{leaf_segments, walk_leaves};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Directory schema of a tree: the fixed key segments above each leaf, and
/// whether any extra segments below them form a platform key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeSchema {
    pub name: &'static str,
    pub keys: &'static [&'static str],
    pub platform: bool,
}

/// `versions/<strategy>/<image>/<version>/Dockerfile`
pub const VERSION_SCHEMA: TreeSchema = TreeSchema {
    name: "versions",
    keys: &["strategy", "image", "version"],
    platform: false,
};

/// `pins/<image>/<tag>/[<platform>/]Dockerfile`
pub const PIN_SCHEMA: TreeSchema = TreeSchema {
    name: "pins",
    keys: &["image", "tag"],
    platform: true,
};

/// A leaf record that parsed cleanly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafRecord {
    pub path: PathBuf,
    /// Fixed key segments, in schema order
    pub keys: Vec<String>,
    /// Remaining path segments joined with `/`
    pub platform: Option<String>,
    pub directive: FromDirective,
}

impl LeafRecord {
    /// Key segments followed by the platform, if any.
    pub fn tree_path(&self) -> Vec<String> {
        let mut path = self.keys.clone();
        if let Some(platform) = &self.platform {
            path.push(platform.clone());
        }
        path
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeafIssue {
    /// Leaf sits at a depth the schema does not allow
    Misplaced { depth: usize },
    Unreadable(String),
    Malformed(DirectiveError),
}

impl std::fmt::Display for LeafIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Misplaced { depth } => write!(f, "leaf at unexpected depth {}", depth),
            Self::Unreadable(reason) => write!(f, "unreadable leaf: {}", reason),
            Self::Malformed(err) => write!(f, "malformed leaf: {}", err),
        }
    }
}

/// Soft failure for a single leaf; the leaf counts as absent for this run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafDiagnostic {
    pub path: PathBuf,
    pub issue: LeafIssue,
}

/// Result of scanning one tree.
#[derive(Clone, Debug, Default)]
pub struct Scan {
    pub root: PathBuf,
    pub records: Vec<LeafRecord>,
    pub diagnostics: Vec<LeafDiagnostic>,
    /// Every leaf file found, parsed or not
    pub leaf_paths: Vec<PathBuf>,
}

impl Scan {
    /// Build a reference tree from the records `value` accepts.
    pub fn to_ref_tree<F>(&self, value: F) -> RefTree
    where
        F: Fn(&LeafRecord) -> Option<String>,
    {
        let mut tree = RefTree::new();
        for record in &self.records {
            let Some(v) = value(record) else { continue };
            if !tree.insert(&record.tree_path(), v) {
                tracing::warn!(
                    path = %record.path.display(),
                    "Platform-less and platform leaves share a tag, platform leaves win"
                );
            }
        }
        tree
    }
}

enum LeafOutcome {
    Record(LeafRecord),
    Issue(LeafDiagnostic),
}

/// Scan a tree into parsed leaf records. Never writes to the filesystem; a
/// missing root yields an empty scan.
pub fn scan_tree(root: &Path, schema: &TreeSchema) -> Scan {
    let leaf_paths = walk_leaves(root);

    // leaves are independent, so read them in parallel; collect keeps order
    let outcomes: Vec<LeafOutcome> = leaf_paths
        .par_iter()
        .map(|path| read_leaf(root, schema, path))
        .collect();

    let mut scan = Scan {
        root: root.to_path_buf(),
        leaf_paths: leaf_paths.clone(),
        ..Scan::default()
    };
    for outcome in outcomes {
        match outcome {
            LeafOutcome::Record(record) => scan.records.push(record),
            LeafOutcome::Issue(diag) => {
                crate::log_leaf_skipped!(schema.name, diag.path, diag.issue);
                scan.diagnostics.push(diag);
            }
        }
    }

    tracing::debug!(
        tree = schema.name,
        root = %root.display(),
        leaves = scan.leaf_paths.len(),
        records = scan.records.len(),
        skipped = scan.diagnostics.len(),
        "Scanned tree"
    );
    scan
}

fn read_leaf(root: &Path, schema: &TreeSchema, path: &Path) -> LeafOutcome {
    let skip = |issue| {
        LeafOutcome::Issue(LeafDiagnostic {
            path: path.to_path_buf(),
            issue,
        })
    };

    let Some(segments) = leaf_segments(root, path) else {
        return skip(LeafIssue::Misplaced { depth: 0 });
    };
    let depth = segments.len();
    let fixed = schema.keys.len();
    if depth < fixed || (!schema.platform && depth > fixed) {
        return skip(LeafIssue::Misplaced { depth });
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return skip(LeafIssue::Unreadable(e.to_string())),
    };
    let directive = match parse_leaf(&content) {
        Ok(d) => d,
        Err(e) => return skip(LeafIssue::Malformed(e)),
    };

    let platform = if depth > fixed {
        Some(segments[fixed..].join("/"))
    } else {
        None
    };
    let mut keys = segments;
    keys.truncate(fixed);

    LeafOutcome::Record(LeafRecord {
        path: path.to_path_buf(),
        keys,
        platform,
        directive,
    })
}
