//! Error types. Grounded on `cpr::parser::Error` (`thiserror`-derived, one
//! variant per failure mode, `#[from]` for the wrapped I/O case) - the
//! teacher's crate never accumulates soft diagnostics in an error enum, so
//! `Diagnostic` (sema's accumulating error log, spec.md S4.5/S6/S7) is kept
//! separate and is plain data, not `std::error::Error`.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum PreprocessorError {
    #[error("{path}:{line}: unterminated string or character literal")]
    UnterminatedLiteral { path: String, line: i32 },

    #[error("{path}:{line}: malformed numeric suffix {suffix:?}")]
    MalformedSuffix {
        path: String,
        line: i32,
        suffix: String,
    },

    #[error("{path}:{line}: 'defined' requires an identifier")]
    MalformedDefined { path: String, line: i32 },

    #[error("{path}:{line}: unclosed macro invocation for {name:?}")]
    UnclosedInvocation {
        path: String,
        line: i32,
        name: String,
    },

    #[error("{path}:{line}: malformed #if expression: {detail}")]
    MalformedExpression {
        path: String,
        line: i32,
        detail: String,
    },

    #[error("could not read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The minimal statement/declaration recognizer's own failures - distinct
/// from `Diagnostic` (sema's accumulating error log): a parse error means
/// the token stream itself couldn't be turned into AST nodes, so there is
/// nothing for the analyser to best-effort walk (SPEC_FULL.md "Non-goals"
/// Open Question: the parser is a consumer-of-tokens stand-in, not a
/// general C grammar, and fails fast rather than recovering).
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("{location}: unexpected token, expected {expected}")]
    Unexpected {
        location: String,
        expected: String,
    },

    #[error("{location}: unterminated {what}")]
    Unterminated { location: String, what: String },

    #[error("{location}: malformed attribute {text:?}: {detail}")]
    MalformedAttribute {
        location: String,
        text: String,
        detail: String,
    },

    #[error(transparent)]
    Preprocessor(#[from] PreprocessorError),
}

#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("source file not found: {0:?}")]
    SourceNotFound(PathBuf),

    #[error(transparent)]
    Preprocessor(#[from] PreprocessorError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{0} diagnostics logged for {1:?}, aborting before code generation")]
    TranslationFailed(usize, PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
