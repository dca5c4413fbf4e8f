use crate::constants::{
    DEFAULT_IMAGES_FILE, DEFAULT_OUTPUT_FILE, DEFAULT_PINS_DIR, DEFAULT_VERSIONS_DIR,
};
use std::path::{Path, PathBuf};

/// Where every stage reads and writes. Passed explicitly into each stage so
/// that nothing depends on the working directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub images_file: PathBuf,
    pub versions_dir: PathBuf,
    pub pins_dir: PathBuf,
    /// Read-only pin trees of older layouts, lowest precedence first.
    /// The current pin tree always overrides all of them.
    pub legacy_pin_dirs: Vec<PathBuf>,
    pub output_file: PathBuf,
}

impl Layout {
    /// Default layout under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            images_file: root.join(DEFAULT_IMAGES_FILE),
            versions_dir: root.join(DEFAULT_VERSIONS_DIR),
            pins_dir: root.join(DEFAULT_PINS_DIR),
            legacy_pin_dirs: Vec::new(),
            output_file: root.join(DEFAULT_OUTPUT_FILE),
            root,
        }
    }

    pub fn with_images_file(mut self, path: impl AsRef<Path>) -> Self {
        self.images_file = self.resolve(path.as_ref());
        self
    }

    pub fn with_output_file(mut self, path: impl AsRef<Path>) -> Self {
        self.output_file = self.resolve(path.as_ref());
        self
    }

    pub fn with_legacy_pins(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        let resolved: Vec<PathBuf> = dirs.into_iter().map(|d| self.resolve(&d)).collect();
        self.legacy_pin_dirs.extend(resolved);
        self
    }

    /// Pin trees in merge order: legacy trees first, the current tree last.
    pub fn pin_trees(&self) -> Vec<&Path> {
        self.legacy_pin_dirs
            .iter()
            .map(PathBuf::as_path)
            .chain(std::iter::once(self.pins_dir.as_path()))
            .collect()
    }

    /// Relative paths are taken relative to the root
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
