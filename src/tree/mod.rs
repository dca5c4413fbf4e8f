pub mod merge;
pub mod reconcile;
pub mod scanner;
pub mod walker;

pub use merge::{merge_ordered, RefTree};
pub use scanner::{scan_tree, LeafDiagnostic, LeafRecord, Scan, TreeSchema, PIN_SCHEMA, VERSION_SCHEMA};
