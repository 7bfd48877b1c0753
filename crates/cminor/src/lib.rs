//! The Cminor front-end: preprocessor (C1), type operations (C2), header
//! store/index (C3), translation-unit driver (C4), and semantic analyser
//! (C5). Plays the role of `cpr` in the teacher crate this workspace is
//! grounded on; `cminor_ast` plays the role of `lang-c`.

pub mod driver;
pub mod error;
pub mod header;
pub mod parser;
pub mod preprocessor;
pub mod sema;
pub mod types;

pub use driver::{CompileReport, CompilerContext};
pub use error::{DriverError, ParseError, PreprocessorError};
pub use sema::Diagnostic;
