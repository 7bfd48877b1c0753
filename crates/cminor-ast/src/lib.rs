//! Data model for the Cminor front-end.
//!
//! Mirrors `lang-c`'s role in the teacher crate: this crate carries only
//! the shapes the rest of the pipeline passes around (parsed/resolved
//! types, declarations, expressions, statements). It has no lookup logic
//! and no I/O - that lives in `cminor`.

pub mod decl;
pub mod expr;
pub mod stmt;
pub mod types;

pub use decl::*;
pub use expr::*;
pub use stmt::*;
pub use types::*;

/// A location in a translation unit's source, used for diagnostics.
///
/// `path` is `None` for synthesized nodes (inserted casts, propagated
/// types) that never picked up a source location; the analyser falls
/// back to `line N: message` in that case (spec.md S6).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub path: Option<std::rc::Rc<str>>,
    pub line: i32,
}

impl Location {
    pub fn new(path: std::rc::Rc<str>, line: i32) -> Self {
        Location {
            path: Some(path),
            line,
        }
    }

    pub fn synthesized() -> Self {
        Location {
            path: None,
            line: 0,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{}", path, self.line),
            None => write!(f, "line {}", self.line),
        }
    }
}
