pub mod ast;
pub mod bintree;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compiler;
pub mod lexer;
pub mod matcher;
pub mod output;
pub mod value;

pub use ast::{CompareOp, Expr, FieldExpr, FuncName, LoopMode};
pub use bintree::{BinTree, BinTreeState, NodeState, NodeType, TreeError};
pub use compiler::{CompileError, MatchDef, Transformer, compile};
pub use lexer::{LexError, Token, TokenKind, Tokenizer};
pub use matcher::{MatchError, Matcher};
pub use output::explain;
pub use value::{FastVal, ValueKind};
