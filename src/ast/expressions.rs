use serde::{Deserialize, Serialize};

use crate::ast::{CompareOp, FuncName, LoopMode};

/// Identifies a variable: [`ROOT_VAR`] or a loop variable.
pub type VariableId = usize;

/// The document root.
pub const ROOT_VAR: VariableId = 0;

/// A path of object keys starting at a variable.
///
/// # Example
/// ```text
/// name.first   // FieldExpr { root: 0, path: ["name", "first"] }
/// x            // FieldExpr { root: 1, path: [] } inside `ANY x IN ...`
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldExpr {
    pub root: VariableId,
    #[serde(default)]
    pub path: Vec<String>,
}

/// Filter expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    // Constants and operands
    /// Always true
    True,

    /// Always false
    False,

    /// A literal value
    Value(serde_json::Value),

    /// A field of the document or of a loop variable
    Field(FieldExpr),

    /// A function applied to operands
    ///
    /// # Example
    /// ```text
    /// abs(balance) > 100
    /// ```
    Func { name: FuncName, params: Vec<Expr> },

    // Boolean structure
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),

    // Loops
    /// `ANY var IN target SATISFIES body`
    AnyIn {
        var: VariableId,
        target: Box<Expr>,
        body: Box<Expr>,
    },

    /// `EVERY var IN target SATISFIES body`
    EveryIn {
        var: VariableId,
        target: Box<Expr>,
        body: Box<Expr>,
    },

    /// `ANY AND EVERY var IN target SATISFIES body`
    AnyEveryIn {
        var: VariableId,
        target: Box<Expr>,
        body: Box<Expr>,
    },

    // Tests
    Exists(Box<Expr>),
    NotExists(Box<Expr>),
    Equals { lhs: Box<Expr>, rhs: Box<Expr> },
    NotEquals { lhs: Box<Expr>, rhs: Box<Expr> },
    LessThan { lhs: Box<Expr>, rhs: Box<Expr> },
    LessEquals { lhs: Box<Expr>, rhs: Box<Expr> },
    GreaterThan { lhs: Box<Expr>, rhs: Box<Expr> },
    GreaterEquals { lhs: Box<Expr>, rhs: Box<Expr> },

    /// Regular expression match. `rhs` must be a string literal.
    Like { lhs: Box<Expr>, rhs: Box<Expr> },
}

impl Expr {
    /// A field of the document root.
    pub fn field(path: &[&str]) -> Expr {
        Expr::var_field(super::ROOT_VAR, path)
    }

    /// A field of the given variable. An empty path is the variable itself.
    pub fn var_field(root: VariableId, path: &[&str]) -> Expr {
        Expr::Field(FieldExpr {
            root,
            path: path.iter().map(|p| p.to_string()).collect(),
        })
    }

    pub fn value(value: serde_json::Value) -> Expr {
        Expr::Value(value)
    }

    pub fn func(name: FuncName, params: Vec<Expr>) -> Expr {
        Expr::Func { name, params }
    }

    pub fn not(expr: Expr) -> Expr {
        Expr::Not(Box::new(expr))
    }

    pub fn and(exprs: Vec<Expr>) -> Expr {
        Expr::And(exprs)
    }

    pub fn or(exprs: Vec<Expr>) -> Expr {
        Expr::Or(exprs)
    }

    pub fn exists(expr: Expr) -> Expr {
        Expr::Exists(Box::new(expr))
    }

    pub fn not_exists(expr: Expr) -> Expr {
        Expr::NotExists(Box::new(expr))
    }

    pub fn equals(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Equals { lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn not_equals(lhs: Expr, rhs: Expr) -> Expr {
        Expr::NotEquals { lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn less_than(lhs: Expr, rhs: Expr) -> Expr {
        Expr::LessThan { lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn less_equals(lhs: Expr, rhs: Expr) -> Expr {
        Expr::LessEquals { lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn greater_than(lhs: Expr, rhs: Expr) -> Expr {
        Expr::GreaterThan { lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn greater_equals(lhs: Expr, rhs: Expr) -> Expr {
        Expr::GreaterEquals { lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn like(lhs: Expr, pattern: &str) -> Expr {
        Expr::Like {
            lhs: Box::new(lhs),
            rhs: Box::new(Expr::Value(serde_json::Value::String(pattern.to_string()))),
        }
    }

    pub fn any_in(var: VariableId, target: Expr, body: Expr) -> Expr {
        Expr::AnyIn { var, target: Box::new(target), body: Box::new(body) }
    }

    pub fn every_in(var: VariableId, target: Expr, body: Expr) -> Expr {
        Expr::EveryIn { var, target: Box::new(target), body: Box::new(body) }
    }

    pub fn any_every_in(var: VariableId, target: Expr, body: Expr) -> Expr {
        Expr::AnyEveryIn { var, target: Box::new(target), body: Box::new(body) }
    }

    /// Splits a test node into its operator and operands.
    pub fn as_test(&self) -> Option<(CompareOp, &Expr, Option<&Expr>)> {
        let test = match self {
            Expr::Exists(e) => (CompareOp::Exists, e.as_ref(), None),
            Expr::NotExists(e) => (CompareOp::NotExists, e.as_ref(), None),
            Expr::Equals { lhs, rhs } => (CompareOp::Equals, lhs.as_ref(), Some(rhs.as_ref())),
            Expr::NotEquals { lhs, rhs } => (CompareOp::NotEquals, lhs.as_ref(), Some(rhs.as_ref())),
            Expr::LessThan { lhs, rhs } => (CompareOp::LessThan, lhs.as_ref(), Some(rhs.as_ref())),
            Expr::LessEquals { lhs, rhs } => (CompareOp::LessEquals, lhs.as_ref(), Some(rhs.as_ref())),
            Expr::GreaterThan { lhs, rhs } => {
                (CompareOp::GreaterThan, lhs.as_ref(), Some(rhs.as_ref()))
            }
            Expr::GreaterEquals { lhs, rhs } => {
                (CompareOp::GreaterEquals, lhs.as_ref(), Some(rhs.as_ref()))
            }
            Expr::Like { lhs, rhs } => (CompareOp::Matches, lhs.as_ref(), Some(rhs.as_ref())),
            _ => return None,
        };
        Some(test)
    }

    /// Splits a loop node into its mode, variable, target and body.
    pub fn as_loop(&self) -> Option<(LoopMode, VariableId, &Expr, &Expr)> {
        match self {
            Expr::AnyIn { var, target, body } => Some((LoopMode::Any, *var, target, body)),
            Expr::EveryIn { var, target, body } => Some((LoopMode::Every, *var, target, body)),
            Expr::AnyEveryIn { var, target, body } => {
                Some((LoopMode::AnyEvery, *var, target, body))
            }
            _ => None,
        }
    }

    /// Every field reference in this expression, in walk order, including
    /// references to variables bound inside it.
    pub fn field_refs(&self) -> Vec<&FieldExpr> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs<'e>(&'e self, refs: &mut Vec<&'e FieldExpr>) {
        match self {
            Expr::True | Expr::False | Expr::Value(_) => {}
            Expr::Field(field) => refs.push(field),
            Expr::Func { params, .. } => params.iter().for_each(|p| p.collect_refs(refs)),
            Expr::Not(e) | Expr::Exists(e) | Expr::NotExists(e) => e.collect_refs(refs),
            Expr::And(exprs) | Expr::Or(exprs) => exprs.iter().for_each(|e| e.collect_refs(refs)),
            Expr::AnyIn { target, body, .. }
            | Expr::EveryIn { target, body, .. }
            | Expr::AnyEveryIn { target, body, .. } => {
                target.collect_refs(refs);
                body.collect_refs(refs);
            }
            Expr::Equals { lhs, rhs }
            | Expr::NotEquals { lhs, rhs }
            | Expr::LessThan { lhs, rhs }
            | Expr::LessEquals { lhs, rhs }
            | Expr::GreaterThan { lhs, rhs }
            | Expr::GreaterEquals { lhs, rhs }
            | Expr::Like { lhs, rhs } => {
                lhs.collect_refs(refs);
                rhs.collect_refs(refs);
            }
        }
    }

    /// Variables bound by loops inside this expression, itself included.
    pub fn bound_vars(&self) -> Vec<VariableId> {
        let mut vars = Vec::new();
        self.collect_bound(&mut vars);
        vars
    }

    fn collect_bound(&self, vars: &mut Vec<VariableId>) {
        if let Some((_, var, target, body)) = self.as_loop() {
            vars.push(var);
            target.collect_bound(vars);
            body.collect_bound(vars);
            return;
        }
        match self {
            Expr::Func { params: exprs, .. } | Expr::And(exprs) | Expr::Or(exprs) => {
                exprs.iter().for_each(|e| e.collect_bound(vars))
            }
            Expr::Not(e) | Expr::Exists(e) | Expr::NotExists(e) => e.collect_bound(vars),
            _ => {
                if let Some((_, lhs, rhs)) = self.as_test() {
                    lhs.collect_bound(vars);
                    if let Some(rhs) = rhs {
                        rhs.collect_bound(vars);
                    }
                }
            }
        }
    }
}
