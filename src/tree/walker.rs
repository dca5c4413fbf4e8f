use crate::constants::LEAF_FILE_NAME;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Walk a tree and return every leaf record file, sorted by path.
/// A missing root is an empty tree.
pub fn walk_leaves(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }

    let mut leaves: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "Skipping unreadable tree entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name() == LEAF_FILE_NAME)
        .map(|entry| entry.into_path())
        .collect();

    // explicit sort so callers never depend on directory iteration order
    leaves.sort();
    leaves
}

/// Path segments of a leaf's parent directories relative to `root`.
pub fn leaf_segments(root: &Path, leaf: &Path) -> Option<Vec<String>> {
    let rel = leaf.strip_prefix(root).ok()?;
    let parent = rel.parent()?;
    parent
        .components()
        .map(|c| c.as_os_str().to_str().map(str::to_string))
        .collect()
}

/// Every directory below `root` (root excluded), deepest first.
pub fn walk_dirs_bottom_up(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }

    WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .contents_first(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}
