pub mod html;
pub mod lines;

pub use html::tree_to_html;
pub use lines::{ViewLine, ViewLineKind, tree_lines, tree_to_text};
