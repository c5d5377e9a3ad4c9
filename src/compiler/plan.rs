//! The compiled form of a filter.
//!
//! An [`ExecNode`] tree mirrors the parts of the document the filter looks
//! at. Each node says what to do with the value found at its position: which
//! tests to run on it ([`OpNode`]), which loops to run over it
//! ([`LoopNode`]), which of its object fields to descend into, whether to
//! remember where it was ([`ExecNode::slot`]), and what to run once it has been
//! read completely ([`AfterNode`]).

use std::collections::HashMap;

use regex::Regex;

use crate::ast::{CompareOp, FuncName, LoopMode};
use crate::bintree::BinTree;
use crate::value::FastVal;

/// Index into a matcher's slot array.
pub type SlotId = usize;

/// Where an operand's value comes from at match time.
#[derive(Debug, Clone)]
pub enum Operand {
    /// A constant from the expression.
    Literal(FastVal<'static>),
    /// The value of a field captured earlier in the document.
    Slot(SlotId),
    /// A function of other operands.
    Func(FuncRef),
    /// The value at the node the op is attached to.
    Active,
}

#[derive(Debug, Clone)]
pub struct FuncRef {
    pub name: FuncName,
    pub args: Vec<Operand>,
}

/// One test. Its boolean outcome is marked into `bucket`.
#[derive(Debug, Clone)]
pub struct OpNode {
    pub bucket: usize,
    pub op: CompareOp,
    pub lhs: Operand,
    /// `None` for unary operators and for `Matches`, whose right side is
    /// compiled into `pattern`.
    pub rhs: Option<Operand>,
    pub pattern: Option<Regex>,
}

/// A loop over an array. The body runs once per element against `node`.
#[derive(Debug, Clone)]
pub struct LoopNode {
    pub bucket: usize,
    pub mode: LoopMode,
    /// `Active` when the loop is attached to the array's own node, `Slot`
    /// when it runs from an After block.
    pub target: Operand,
    pub node: ExecNode,
    /// Slots captured inside the loop body. They are cleared before every
    /// element so one element never sees another's fields.
    pub local_slots: Vec<SlotId>,
}

/// Work deferred until a node has been read completely.
#[derive(Debug, Clone, Default)]
pub struct AfterNode {
    pub ops: Vec<OpNode>,
    pub loops: Vec<LoopNode>,
}

impl AfterNode {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.loops.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecNode {
    pub slot: Option<SlotId>,
    pub ops: Vec<OpNode>,
    pub loops: Vec<LoopNode>,
    pub elems: HashMap<String, ExecNode>,
    pub after: Option<AfterNode>,
}

impl ExecNode {
    /// The descendant at `path`, created if it does not exist yet.
    pub fn node_at_mut(&mut self, path: &[String]) -> &mut ExecNode {
        path.iter().fold(self, |node, key| node.elems.entry(key.clone()).or_default())
    }

    pub fn after_mut(&mut self) -> &mut AfterNode {
        self.after.get_or_insert_with(AfterNode::default)
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
            && self.ops.is_empty()
            && self.loops.is_empty()
            && self.elems.is_empty()
            && self.after.as_ref().is_none_or(AfterNode::is_empty)
    }
}

/// A compiled filter: the execution plan plus the resolution tree template.
/// Immutable once built and freely shareable between matchers.
#[derive(Debug, Clone)]
pub struct MatchDef {
    pub root: ExecNode,
    pub tree: BinTree,
    /// The bucket of each expression of a batch compile, in input order.
    pub match_buckets: Vec<usize>,
    pub num_slots: usize,
}

impl MatchDef {
    pub fn num_buckets(&self) -> usize {
        self.tree.len()
    }

    pub fn is_batch(&self) -> bool {
        self.match_buckets.len() > 1
    }
}
