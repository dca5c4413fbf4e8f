pub mod parser;

pub use parser::{parse_leaf, render_leaf, DirectiveError, FromDirective};
