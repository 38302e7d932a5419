//! Path transformation (C1): a sed-like `s/from/to[/g]` expression language.

pub mod path;

pub use path::{effective_path, transform_path};
