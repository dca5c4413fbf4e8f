// Centralized constants for the imagepin tree layout and naming policies

/// File name of every leaf record in the version and pin trees
pub const LEAF_FILE_NAME: &str = "Dockerfile";

/// Declarative source, relative to the tree root
pub const DEFAULT_IMAGES_FILE: &str = "images.json";

/// Strategy-partitioned version records, relative to the tree root
pub const DEFAULT_VERSIONS_DIR: &str = "versions";

/// Tag-pinned records, relative to the tree root
pub const DEFAULT_PINS_DIR: &str = "pins";

/// Consolidated digest map read by downstream consumers
pub const DEFAULT_OUTPUT_FILE: &str = "digests.json";

/// Tag that marks a record as not yet resolved by the update agent
pub const PLACEHOLDER_TAG: &str = "latest";

/// Prefix of a content digest suffix on an image reference
pub const DIGEST_PREFIX: &str = "@sha256:";

/// Hex length of a sha256 digest
pub const DIGEST_HEX_LEN: usize = 64;

/// Default tracing filter when RUST_LOG is unset
pub const DEFAULT_LOG_FILTER: &str = "imagepin=info";
