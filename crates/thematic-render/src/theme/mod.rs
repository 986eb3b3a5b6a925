//! Theme fields: the named, themeable variables of a stylesheet.
//!
//! A theme field is declared once (in a vars file or in configuration) and
//! then referenced as `$name` throughout the stylesheet sources. The rewriter
//! replaces those references with field literals, which later become either
//! the field's concrete value or a template placeholder.

mod fields;

pub use fields::{FieldsError, ThemeFields};
