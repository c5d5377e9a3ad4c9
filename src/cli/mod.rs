//! CLI support for clove-match
//!
//! Provides programmatic access to the `clove-match` command so other tools
//! can run filters over newline-delimited JSON without shelling out.

mod convert;
mod filter;

pub use convert::{expression_to_json, parse_expression};
pub use filter::{DEFAULT_MAX_BYTES, FilterOptions, FilterResult, execute_filter};

use std::io;

use thiserror::Error;

use crate::compiler::CompileError;
use crate::matcher::MatchError;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid expression: {0}")]
    Expression(#[source] serde_json::Error),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("line {line}: {source}")]
    Match {
        line: usize,
        #[source]
        source: MatchError,
    },

    #[error("line {line}: document is {len} bytes, limit is {max}")]
    TooLarge { line: usize, len: usize, max: usize },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No input provided. Use --input or pipe NDJSON to stdin.")]
    NoInput,
}
