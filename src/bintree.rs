//! Binary resolution tree.
//!
//! A compiled filter's boolean structure is flattened into a [`BinTree`]: a
//! pre-order array of nodes where node `0` is the root and every node's
//! subtree occupies the contiguous index range right after it. Each node is a
//! *bucket* that ends up holding one boolean sub-result.
//!
//! A [`BinTreeState`] overlays the static tree with a ternary state per node
//! for one match. Marking a leaf resolves as much of the tree above it as the
//! AND/OR/NOT rules allow, and marks everything below a newly resolved node as
//! irrelevant, which is what lets the matcher stop reading a document the
//! moment the root is known.
//!
//! ```
//! use clove_match::bintree::{BinTree, BinTreeNode, BinTreeState, NodeState, NodeType};
//!
//! // 0: OR(1, 2)
//! let tree = BinTree::new(vec![
//!     BinTreeNode { parent: 0, kind: NodeType::Or, left: 1, right: 2 },
//!     BinTreeNode::leaf(0),
//!     BinTreeNode::leaf(0),
//! ])
//! .unwrap();
//!
//! let mut state = BinTreeState::new(&tree);
//! state.mark_node(1, true);
//! assert!(state.is_true(0));
//! assert_eq!(state.get(2), NodeState::Resolved);
//! ```

use std::ops::Range;

use thiserror::Error;

/// How a node derives its value from its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Marked directly; has no children.
    Leaf,
    And,
    Or,
    /// Negation of its `left` child.
    Not,
    /// Holds sub-expressions but never takes a value from them; it resolves
    /// only when marked directly. Loop buckets are barriers over their body,
    /// and batch compiles join independent expressions with them.
    Barrier,
}

/// One node of a [`BinTree`].
///
/// Index `0` is the root, so it doubles as "no child" in `left` and `right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinTreeNode {
    pub parent: usize,
    pub kind: NodeType,
    pub left: usize,
    pub right: usize,
}

impl BinTreeNode {
    pub fn leaf(parent: usize) -> Self {
        BinTreeNode {
            parent,
            kind: NodeType::Leaf,
            left: 0,
            right: 0,
        }
    }
}

/// Structural problems [`BinTree::new`] rejects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("tree is empty")]
    Empty,

    #[error("node {node}: child index out of bounds")]
    ChildOutOfBounds { node: usize },

    #[error("node {node}: {kind:?} node has the wrong children")]
    BadChildren { node: usize, kind: NodeType },

    #[error("node {node}: expected parent {expected}, found {found}")]
    BadParent {
        node: usize,
        expected: usize,
        found: usize,
    },

    #[error("node {node} is not laid out in pre-order")]
    NotPreOrder { node: usize },

    #[error("pre-order walk consumed {consumed} of {len} nodes")]
    Unreachable { consumed: usize, len: usize },
}

/// Immutable, pre-order binary resolution tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinTree {
    nodes: Vec<BinTreeNode>,
    /// One past the last descendant of each node.
    ends: Vec<usize>,
}

impl BinTree {
    /// Validates `nodes` and builds the tree.
    pub fn new(nodes: Vec<BinTreeNode>) -> Result<Self, TreeError> {
        let ends = validate(&nodes)?;
        Ok(BinTree { nodes, ends })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &BinTreeNode {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[BinTreeNode] {
        &self.nodes
    }

    /// Indices of the strict descendants of `idx`.
    pub fn descendants(&self, idx: usize) -> Range<usize> {
        idx + 1..self.ends[idx]
    }
}

/// Checks structural well-formedness: a pre-order walk from node 0 must visit
/// every node exactly once, each node sitting where the walk expects it, with
/// the right parent and the children its type calls for. Returns the subtree
/// end of every node.
pub fn validate(nodes: &[BinTreeNode]) -> Result<Vec<usize>, TreeError> {
    if nodes.is_empty() {
        return Err(TreeError::Empty);
    }

    let mut ends = vec![0; nodes.len()];
    let consumed = walk(nodes, 0, 0, &mut ends)?;
    if consumed != nodes.len() {
        return Err(TreeError::Unreachable {
            consumed,
            len: nodes.len(),
        });
    }
    Ok(ends)
}

fn walk(
    nodes: &[BinTreeNode],
    idx: usize,
    parent: usize,
    ends: &mut [usize],
) -> Result<usize, TreeError> {
    let node = nodes[idx];
    if node.parent != parent {
        return Err(TreeError::BadParent {
            node: idx,
            expected: parent,
            found: node.parent,
        });
    }
    let in_bounds = |child: usize| child > 0 && child < nodes.len();

    let mut next = idx + 1;
    match node.kind {
        NodeType::Leaf => {
            if node.left != 0 || node.right != 0 {
                return Err(TreeError::BadChildren {
                    node: idx,
                    kind: node.kind,
                });
            }
        }
        NodeType::Not => {
            if node.right != 0 {
                return Err(TreeError::BadChildren {
                    node: idx,
                    kind: node.kind,
                });
            }
            next = walk_child(nodes, idx, node.left, next, ends, in_bounds)?;
        }
        NodeType::Barrier => {
            next = walk_child(nodes, idx, node.left, next, ends, in_bounds)?;
            if node.right != 0 {
                next = walk_child(nodes, idx, node.right, next, ends, in_bounds)?;
            }
        }
        NodeType::And | NodeType::Or => {
            next = walk_child(nodes, idx, node.left, next, ends, in_bounds)?;
            next = walk_child(nodes, idx, node.right, next, ends, in_bounds)?;
        }
    }

    ends[idx] = next;
    Ok(next)
}

fn walk_child(
    nodes: &[BinTreeNode],
    parent: usize,
    child: usize,
    expected: usize,
    ends: &mut [usize],
    in_bounds: impl Fn(usize) -> bool,
) -> Result<usize, TreeError> {
    if !in_bounds(child) {
        return Err(TreeError::ChildOutOfBounds { node: parent });
    }
    if child != expected {
        return Err(TreeError::NotPreOrder { node: child });
    }
    walk(nodes, child, parent, ends)
}

/// Resolution state of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    Unknown,
    /// Settled without a value: an ancestor resolved first, so this node no
    /// longer matters.
    Resolved,
    True,
    False,
}

impl From<bool> for NodeState {
    fn from(value: bool) -> Self {
        if value { NodeState::True } else { NodeState::False }
    }
}

/// Per-match mutable state over a [`BinTree`].
#[derive(Debug, Clone)]
pub struct BinTreeState<'t> {
    tree: &'t BinTree,
    data: Vec<NodeState>,
    stall: Option<usize>,
}

impl<'t> BinTreeState<'t> {
    pub fn new(tree: &'t BinTree) -> Self {
        BinTreeState {
            tree,
            data: vec![NodeState::Unknown; tree.len()],
            stall: None,
        }
    }

    pub fn tree(&self) -> &'t BinTree {
        self.tree
    }

    /// Returns every node to `Unknown` and clears the stall index.
    pub fn reset(&mut self) {
        self.data.fill(NodeState::Unknown);
        self.stall = None;
    }

    pub fn get(&self, idx: usize) -> NodeState {
        self.data[idx]
    }

    pub fn is_unknown(&self, idx: usize) -> bool {
        self.data[idx] == NodeState::Unknown
    }

    pub fn is_resolved(&self, idx: usize) -> bool {
        self.data[idx] != NodeState::Unknown
    }

    pub fn is_true(&self, idx: usize) -> bool {
        self.data[idx] == NodeState::True
    }

    pub fn stall_index(&self) -> Option<usize> {
        self.stall
    }

    /// Bounds upward propagation at `idx`: nothing below it resolves it or
    /// anything above it until the stall is restored. Returns the previous
    /// stall index for [`restore_stall`](Self::restore_stall).
    pub fn set_stall(&mut self, idx: usize) -> Option<usize> {
        self.stall.replace(idx)
    }

    pub fn restore_stall(&mut self, previous: Option<usize>) {
        self.stall = previous;
    }

    /// Whether evaluation can stop: the root is resolved, or while stalled,
    /// the body under the stall node is.
    pub fn is_settled(&self) -> bool {
        match self.stall {
            Some(stall) => self.is_resolved(self.tree.node(stall).left),
            None => self.is_resolved(0),
        }
    }

    /// Returns the strict descendants of `idx` to `Unknown`.
    pub fn reset_subtree(&mut self, idx: usize) {
        let range = self.tree.descendants(idx);
        self.data[range].fill(NodeState::Unknown);
    }

    /// Records the value of a node and propagates it.
    ///
    /// # Panics
    ///
    /// Panics if the node is already resolved. A correctly compiled plan
    /// never marks a bucket twice.
    pub fn mark_node(&mut self, idx: usize, value: bool) {
        assert!(
            self.data[idx] == NodeState::Unknown,
            "bucket {idx} marked while already {:?}",
            self.data[idx]
        );

        self.settle(idx, value);

        let mut child = idx;
        while child != 0 {
            let parent = self.tree.node(child).parent;
            if self.stall == Some(parent) || self.data[parent] != NodeState::Unknown {
                break;
            }
            match self.combine(parent) {
                Some(value) => {
                    self.settle(parent, value);
                    child = parent;
                }
                None => break,
            }
        }
    }

    fn settle(&mut self, idx: usize, value: bool) {
        self.data[idx] = value.into();
        for state in &mut self.data[self.tree.descendants(idx)] {
            if *state == NodeState::Unknown {
                *state = NodeState::Resolved;
            }
        }
    }

    fn combine(&self, idx: usize) -> Option<bool> {
        let node = self.tree.node(idx);
        let left = self.data[node.left];
        match node.kind {
            NodeType::Or => {
                let right = self.data[node.right];
                if left == NodeState::True || right == NodeState::True {
                    Some(true)
                } else if left == NodeState::False && right == NodeState::False {
                    Some(false)
                } else {
                    None
                }
            }
            NodeType::And => {
                let right = self.data[node.right];
                if left == NodeState::False || right == NodeState::False {
                    Some(false)
                } else if left == NodeState::True && right == NodeState::True {
                    Some(true)
                } else {
                    None
                }
            }
            NodeType::Not => match left {
                NodeState::True => Some(false),
                NodeState::False => Some(true),
                _ => None,
            },
            NodeType::Leaf | NodeType::Barrier => None,
        }
    }
}
