//! Lowers an [`Expr`] into a [`MatchDef`].
//!
//! The boolean structure becomes a [`BinTree`] laid out in the order the
//! expression is walked, one bucket per And/Or/Not, test and loop. Every test
//! and loop is then attached to the [`ExecNode`] that sees its data:
//!
//! - a test on one field of the current scope goes on that field's node and
//!   reads the field's value directly;
//! - a test that needs several fields goes in the After block of their
//!   deepest common ancestor, and the fields it needs are captured in slots;
//! - a loop goes on its array's node when the body reads nothing else from
//!   the enclosing scope, and in an After block otherwise.
//!
//! Fields of an enclosing scope read from inside a loop body are always
//! captured in slots. The enclosing loop is itself deferred until they have
//! been seen, so by the time the body runs the slots are filled.

pub mod plan;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::ast::{CompareOp, Expr, FieldExpr, LoopMode, ROOT_VAR, VariableId};
use crate::bintree::{BinTree, BinTreeNode, NodeType, TreeError};
use crate::value::FastVal;

pub use plan::{AfterNode, ExecNode, FuncRef, LoopNode, MatchDef, OpNode, Operand, SlotId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("variable {var} is not bound here")]
    UnboundVariable { var: VariableId },

    #[error("loop target must be a field reference")]
    InvalidLoopTarget,

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("the right side of a match must be a string literal")]
    NonLiteralPattern,

    #[error("{func} takes {expected} argument(s), found {found}")]
    FunctionArity {
        func: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("a boolean expression cannot be used as a value")]
    BooleanOperand,

    #[error("no expressions to compile")]
    EmptyBatch,

    #[error("invalid resolution tree: {0}")]
    Tree(#[from] TreeError),
}

/// Compiles filter expressions into executable plans.
///
/// # Example
///
/// ```
/// use clove_match::ast::Expr;
/// use clove_match::compiler::Transformer;
/// use serde_json::json;
///
/// let expr = Expr::equals(Expr::field(&["name"]), Expr::value(json!("Brett")));
/// let def = Transformer::new().transform(&expr).unwrap();
/// assert_eq!(def.num_buckets(), 1);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Transformer;

impl Transformer {
    pub fn new() -> Self {
        Transformer
    }

    pub fn transform(&self, expr: &Expr) -> Result<MatchDef, CompileError> {
        self.transform_batch(std::slice::from_ref(expr))
    }

    /// Compiles several independent expressions into one plan so a single
    /// pass over a document answers all of them.
    pub fn transform_batch(&self, exprs: &[Expr]) -> Result<MatchDef, CompileError> {
        if exprs.is_empty() {
            return Err(CompileError::EmptyBatch);
        }

        let mut ctx = CompileContext::new();
        ctx.compile_batch(exprs, 0)?;

        let root = ctx.scopes.swap_remove(0);
        let tree = BinTree::new(ctx.nodes)?;
        debug!(
            expressions = exprs.len(),
            buckets = tree.len(),
            slots = ctx.num_slots,
            deferred = ctx.deferred,
            "compiled filter"
        );

        Ok(MatchDef {
            root: root.node,
            tree,
            match_buckets: ctx.match_buckets,
            num_slots: ctx.num_slots,
        })
    }
}

/// Shorthand for `Transformer::new().transform(expr)`.
pub fn compile(expr: &Expr) -> Result<MatchDef, CompileError> {
    Transformer::new().transform(expr)
}

/// The plan under construction for one variable.
struct Scope {
    var: VariableId,
    node: ExecNode,
    /// Slots assigned to nodes of this scope.
    slots: Vec<SlotId>,
}

impl Scope {
    fn new(var: VariableId) -> Self {
        Scope {
            var,
            node: ExecNode::default(),
            slots: Vec::new(),
        }
    }
}

/// Where a test or loop ends up in its scope's plan.
enum Placement {
    /// On the node at this path, reading it as the active value.
    Node(Vec<String>),
    /// In the After block of the node at this path.
    After(Vec<String>),
}

struct CompileContext {
    nodes: Vec<BinTreeNode>,
    /// Innermost last. The root scope is always first.
    scopes: Vec<Scope>,
    match_buckets: Vec<usize>,
    num_slots: usize,
    deferred: usize,
}

impl CompileContext {
    fn new() -> Self {
        CompileContext {
            nodes: Vec::new(),
            scopes: vec![Scope::new(ROOT_VAR)],
            match_buckets: Vec::new(),
            num_slots: 0,
            deferred: 0,
        }
    }

    fn push_node(&mut self, kind: NodeType, parent: usize) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(BinTreeNode {
            parent,
            kind,
            left: 0,
            right: 0,
        });
        idx
    }

    fn compile_batch(&mut self, exprs: &[Expr], parent: usize) -> Result<usize, CompileError> {
        if let [expr] = exprs {
            let bucket = self.compile_bool(expr, parent)?;
            self.match_buckets.push(bucket);
            return Ok(bucket);
        }

        let glue = self.push_node(NodeType::Barrier, parent);
        let left = self.compile_bool(&exprs[0], glue)?;
        self.match_buckets.push(left);
        let right = self.compile_batch(&exprs[1..], glue)?;
        self.nodes[glue].left = left;
        self.nodes[glue].right = right;
        Ok(glue)
    }

    fn compile_bool(&mut self, expr: &Expr, parent: usize) -> Result<usize, CompileError> {
        if let Some((op, lhs, rhs)) = expr.as_test() {
            return self.compile_test(op, lhs, rhs, parent);
        }
        if let Some((mode, var, target, body)) = expr.as_loop() {
            return self.compile_loop(mode, var, target, body, parent);
        }

        match expr {
            Expr::And(exprs) => self.compile_chain(NodeType::And, exprs, parent),
            Expr::Or(exprs) => self.compile_chain(NodeType::Or, exprs, parent),
            Expr::Not(inner) => {
                let idx = self.push_node(NodeType::Not, parent);
                let child = self.compile_bool(inner, idx)?;
                self.nodes[idx].left = child;
                Ok(idx)
            }
            _ => self.compile_test(CompareOp::IsTrue, expr, None, parent),
        }
    }

    /// Folds a list into a right-leaning chain of binary nodes.
    fn compile_chain(
        &mut self,
        kind: NodeType,
        exprs: &[Expr],
        parent: usize,
    ) -> Result<usize, CompileError> {
        match exprs {
            [] => {
                let constant = if kind == NodeType::And { Expr::True } else { Expr::False };
                self.compile_test(CompareOp::IsTrue, &constant, None, parent)
            }
            [expr] => self.compile_bool(expr, parent),
            [first, rest @ ..] => {
                let idx = self.push_node(kind, parent);
                let left = self.compile_bool(first, idx)?;
                let right = self.compile_chain(kind, rest, idx)?;
                self.nodes[idx].left = left;
                self.nodes[idx].right = right;
                Ok(idx)
            }
        }
    }

    fn compile_test(
        &mut self,
        op: CompareOp,
        lhs: &Expr,
        rhs: Option<&Expr>,
        parent: usize,
    ) -> Result<usize, CompileError> {
        let bucket = self.push_node(NodeType::Leaf, parent);

        let (rhs, pattern) = match (op, rhs) {
            (CompareOp::Matches, Some(rhs)) => (None, Some(compile_pattern(rhs)?)),
            _ => (rhs, None),
        };

        let mut refs = lhs.field_refs();
        if let Some(rhs) = rhs {
            refs.extend(rhs.field_refs());
        }
        let current = self.scopes.len() - 1;
        let mut local = Vec::new();
        for field in refs {
            if self.scope_of(field.root)? == current && !local.contains(&&field.path) {
                local.push(&field.path);
            }
        }

        let placement = match local.as_slice() {
            [path] => Placement::Node(path.to_vec()),
            paths => Placement::After(common_prefix(paths)),
        };
        let active = match &placement {
            Placement::Node(path) => Some(path.as_slice()),
            Placement::After(_) => None,
        };

        let lhs = self.lower_operand(lhs, active)?;
        let rhs = rhs.map(|rhs| self.lower_operand(rhs, active)).transpose()?;
        let op_node = OpNode {
            bucket,
            op,
            lhs,
            rhs,
            pattern,
        };

        let scope = &mut self.scopes[current].node;
        match placement {
            Placement::Node(path) => scope.node_at_mut(&path).ops.push(op_node),
            Placement::After(path) => {
                debug!(bucket, ?path, "deferring test to after block");
                self.deferred += 1;
                scope.node_at_mut(&path).after_mut().ops.push(op_node);
            }
        }
        Ok(bucket)
    }

    fn compile_loop(
        &mut self,
        mode: LoopMode,
        var: VariableId,
        target: &Expr,
        body: &Expr,
        parent: usize,
    ) -> Result<usize, CompileError> {
        let Expr::Field(target) = target else {
            return Err(CompileError::InvalidLoopTarget);
        };
        let bucket = self.push_node(NodeType::Barrier, parent);

        let current = self.scopes.len() - 1;
        let target_scope = self.scope_of(target.root)?;

        // Fields of the current scope the loop needs before it can run.
        let mut bound = body.bound_vars();
        bound.push(var);
        let mut local: Vec<&Vec<String>> = Vec::new();
        for field in std::iter::once(target).chain(body.field_refs()) {
            if bound.contains(&field.root) {
                continue;
            }
            if self.scope_of(field.root)? == current && !local.contains(&&field.path) {
                local.push(&field.path);
            }
        }
        let inline = target_scope == current && local.as_slice() == [&target.path];

        self.scopes.push(Scope::new(var));
        let body_bucket = self.compile_bool(body, bucket)?;
        self.nodes[bucket].left = body_bucket;
        let inner = self.scopes.remove(current + 1);

        let mut lp = LoopNode {
            bucket,
            mode,
            target: Operand::Active,
            node: inner.node,
            local_slots: inner.slots,
        };

        if inline {
            self.scopes[current]
                .node
                .node_at_mut(&target.path)
                .loops
                .push(lp);
        } else {
            lp.target = Operand::Slot(self.slot_for(target_scope, &target.path));
            let path = common_prefix(&local);
            debug!(bucket, ?path, "deferring loop to after block");
            self.deferred += 1;
            self.scopes[current]
                .node
                .node_at_mut(&path)
                .after_mut()
                .loops
                .push(lp);
        }
        Ok(bucket)
    }

    fn lower_operand(
        &mut self,
        expr: &Expr,
        active: Option<&[String]>,
    ) -> Result<Operand, CompileError> {
        match expr {
            Expr::True => Ok(Operand::Literal(FastVal::True)),
            Expr::False => Ok(Operand::Literal(FastVal::False)),
            Expr::Value(value) => Ok(Operand::Literal(FastVal::from(value))),
            Expr::Field(field) => self.lower_field(field, active),
            Expr::Func { name, params } => {
                if params.len() != name.arity() {
                    return Err(CompileError::FunctionArity {
                        func: name.name(),
                        expected: name.arity(),
                        found: params.len(),
                    });
                }
                let args = params
                    .iter()
                    .map(|param| self.lower_operand(param, active))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Operand::Func(FuncRef { name: *name, args }))
            }
            _ => Err(CompileError::BooleanOperand),
        }
    }

    fn lower_field(
        &mut self,
        field: &FieldExpr,
        active: Option<&[String]>,
    ) -> Result<Operand, CompileError> {
        let scope = self.scope_of(field.root)?;
        if scope == self.scopes.len() - 1 && active == Some(field.path.as_slice()) {
            return Ok(Operand::Active);
        }
        Ok(Operand::Slot(self.slot_for(scope, &field.path)))
    }

    /// The slot capturing the node at `path` in `scope`, assigned on first use.
    fn slot_for(&mut self, scope: usize, path: &[String]) -> SlotId {
        let Scope { node, slots, .. } = &mut self.scopes[scope];
        let node = node.node_at_mut(path);
        match node.slot {
            Some(slot) => slot,
            None => {
                let slot = self.num_slots;
                self.num_slots += 1;
                node.slot = Some(slot);
                slots.push(slot);
                slot
            }
        }
    }

    /// Index of the innermost scope binding `var`.
    fn scope_of(&self, var: VariableId) -> Result<usize, CompileError> {
        self.scopes
            .iter()
            .rposition(|scope| scope.var == var)
            .ok_or(CompileError::UnboundVariable { var })
    }
}

fn compile_pattern(rhs: &Expr) -> Result<Regex, CompileError> {
    let Expr::Value(serde_json::Value::String(pattern)) = rhs else {
        return Err(CompileError::NonLiteralPattern);
    };
    Regex::new(pattern).map_err(|e| CompileError::InvalidPattern {
        pattern: pattern.clone(),
        message: e.to_string(),
    })
}

/// Longest path shared by all of `paths`. Empty when there are none.
fn common_prefix(paths: &[&Vec<String>]) -> Vec<String> {
    let Some((first, rest)) = paths.split_first() else {
        return Vec::new();
    };
    let len = rest.iter().fold(first.len(), |len, path| {
        first[..len]
            .iter()
            .zip(path.iter())
            .take_while(|(a, b)| a == b)
            .count()
    });
    first[..len].to_vec()
}
