//! Run a filter over newline-delimited JSON input

use tracing::debug;

use super::{CliError, parse_expression};
use crate::compiler::Transformer;
use crate::matcher::Matcher;
use crate::output::explain;

/// Default per-document size limit (16 MiB)
pub const DEFAULT_MAX_BYTES: usize = 16 * 1024 * 1024;

/// Options for the filter command
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// The filter expression in its JSON form
    pub expression: String,
    /// NDJSON input, one document per line
    pub input: Option<String>,
    /// Documents longer than this are rejected
    pub max_bytes: usize,
    /// Only compile the expression, don't run it
    pub syntax_only: bool,
    /// Print the compiled plan instead of running it
    pub explain: bool,
    /// Keep the documents that do not match
    pub invert: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions {
            expression: String::new(),
            input: None,
            max_bytes: DEFAULT_MAX_BYTES,
            syntax_only: false,
            explain: false,
            invert: false,
        }
    }
}

/// Result of a filter operation
#[derive(Debug, PartialEq, Eq)]
pub enum FilterResult {
    /// The expression compiled
    SyntaxValid { buckets: usize, slots: usize },
    /// The rendered plan
    Explained(String),
    /// The documents that passed, in input order
    Filtered { lines: Vec<String>, scanned: usize },
}

/// Execute a filter operation
pub fn execute_filter(options: &FilterOptions) -> Result<FilterResult, CliError> {
    let expr = parse_expression(&options.expression)?;
    let def = Transformer::new().transform(&expr)?;

    if options.syntax_only {
        return Ok(FilterResult::SyntaxValid {
            buckets: def.num_buckets(),
            slots: def.num_slots,
        });
    }
    if options.explain {
        return Ok(FilterResult::Explained(explain(&def)));
    }

    let input = options.input.as_ref().ok_or(CliError::NoInput)?;

    let mut matcher = Matcher::new(&def);
    let mut lines = Vec::new();
    let mut scanned = 0;
    for (idx, line) in input.lines().enumerate() {
        let doc = line.trim();
        if doc.is_empty() {
            continue;
        }
        if doc.len() > options.max_bytes {
            return Err(CliError::TooLarge {
                line: idx + 1,
                len: doc.len(),
                max: options.max_bytes,
            });
        }

        matcher.reset();
        let matched = matcher
            .match_bytes(doc.as_bytes())
            .map_err(|source| CliError::Match { line: idx + 1, source })?;
        scanned += 1;
        if matched != options.invert {
            lines.push(doc.to_string());
        }
    }

    debug!(scanned, kept = lines.len(), "filtered input");
    Ok(FilterResult::Filtered { lines, scanned })
}
