use serde::{Deserialize, Serialize};

/// Comparison and test operators a leaf of the expression can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// `==`
    Equals,
    /// `!=`
    NotEquals,
    /// `<`
    LessThan,
    /// `<=`
    LessEquals,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterEquals,
    /// Regular expression match against a literal pattern.
    Matches,
    /// The operand is present (not Missing).
    Exists,
    /// The operand is absent.
    NotExists,
    /// The operand is boolean `true`. Used for truth values in boolean position.
    IsTrue,
}

impl CompareOp {
    /// True for operators that take a single operand.
    pub fn is_unary(self) -> bool {
        matches!(self, CompareOp::Exists | CompareOp::NotExists | CompareOp::IsTrue)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Equals => "==",
            CompareOp::NotEquals => "!=",
            CompareOp::LessThan => "<",
            CompareOp::LessEquals => "<=",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterEquals => ">=",
            CompareOp::Matches => "=~",
            CompareOp::Exists => "exists",
            CompareOp::NotExists => "not-exists",
            CompareOp::IsTrue => "is-true",
        }
    }
}

/// How a loop combines the results of its iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    /// True as soon as one element satisfies the body.
    Any,
    /// False as soon as one element fails the body; true for an empty array.
    Every,
    /// Every element satisfies the body and there is at least one element.
    AnyEvery,
}

/// Functions usable as operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuncName {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,

    // Math
    Abs,
    Acos,
    Asin,
    Atan,
    Atan2,
    Ceil,
    Cos,
    Degrees,
    Exp,
    Floor,
    Ln,
    Log,
    Pow,
    Radians,
    Round,
    Sin,
    Sqrt,
    Tan,
}

impl FuncName {
    pub fn arity(self) -> usize {
        match self {
            FuncName::Add
            | FuncName::Sub
            | FuncName::Mul
            | FuncName::Div
            | FuncName::Mod
            | FuncName::Pow
            | FuncName::Atan2 => 2,
            _ => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FuncName::Add => "add",
            FuncName::Sub => "sub",
            FuncName::Mul => "mul",
            FuncName::Div => "div",
            FuncName::Mod => "mod",
            FuncName::Neg => "neg",
            FuncName::Abs => "abs",
            FuncName::Acos => "acos",
            FuncName::Asin => "asin",
            FuncName::Atan => "atan",
            FuncName::Atan2 => "atan2",
            FuncName::Ceil => "ceil",
            FuncName::Cos => "cos",
            FuncName::Degrees => "degrees",
            FuncName::Exp => "exp",
            FuncName::Floor => "floor",
            FuncName::Ln => "ln",
            FuncName::Log => "log",
            FuncName::Pow => "pow",
            FuncName::Radians => "radians",
            FuncName::Round => "round",
            FuncName::Sin => "sin",
            FuncName::Sqrt => "sqrt",
            FuncName::Tan => "tan",
        }
    }
}
