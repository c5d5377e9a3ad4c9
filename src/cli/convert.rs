//! Expression <-> JSON conversion utilities

use super::CliError;
use crate::ast::Expr;

/// Parse an expression from its serde JSON form
pub fn parse_expression(text: &str) -> Result<Expr, CliError> {
    serde_json::from_str(text).map_err(CliError::Expression)
}

/// Serialize an expression to its compact JSON form
pub fn expression_to_json(expr: &Expr) -> Result<String, CliError> {
    serde_json::to_string(expr).map_err(CliError::Expression)
}
