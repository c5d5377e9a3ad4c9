//! # Filter Expression AST
//!
//! The boolean expression vocabulary the compiler accepts. Front-ends (a
//! textual grammar, a JSON encoding, hand-built trees in tests) produce an
//! [`Expr`]; the [`compiler`](crate::compiler) lowers it into a match plan.
//!
//! ## Variables
//!
//! Every field reference names the variable it starts from. Variable
//! [`ROOT_VAR`] (`0`) is the document itself. Loop binders
//! ([`Expr::AnyIn`], [`Expr::EveryIn`], [`Expr::AnyEveryIn`]) introduce a new
//! numbered variable that refers to the current array element inside their
//! body.
//!
//! ## Example
//!
//! `(name.first == "Brett") OR (age < 50 AND isActive == true)`:
//!
//! ```
//! use clove_match::ast::Expr;
//! use serde_json::json;
//!
//! let expr = Expr::or(vec![
//!     Expr::equals(Expr::field(&["name", "first"]), Expr::value(json!("Brett"))),
//!     Expr::and(vec![
//!         Expr::less_than(Expr::field(&["age"]), Expr::value(json!(50))),
//!         Expr::equals(Expr::field(&["isActive"]), Expr::value(json!(true))),
//!     ]),
//! ]);
//! assert_eq!(expr.field_refs().len(), 3);
//! ```
//!
//! ## Serialized form
//!
//! The AST derives serde. The command-line tool reads expressions in this
//! form:
//!
//! ```text
//! {"any_in": {"var": 1, "target": {"field": {"root": 0, "path": ["tags"]}},
//!             "body": {"equals": {"lhs": {"field": {"root": 1, "path": []}},
//!                                 "rhs": {"value": "red"}}}}}
//! ```
pub mod expressions;
pub mod operators;

pub use expressions::{Expr, FieldExpr, ROOT_VAR, VariableId};
pub use operators::{CompareOp, FuncName, LoopMode};
