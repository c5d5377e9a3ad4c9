//! Runs a compiled plan against JSON documents.
//!
//! The matcher walks the document once, front to back, and only descends into
//! the parts the plan names. Everything else is skipped by bracket counting.
//! Each test marks its bucket in the resolution tree as soon as its operands
//! are known, and the walk stops the moment the result is decided.
//!
//! ```
//! use clove_match::ast::Expr;
//! use clove_match::compiler::compile;
//! use clove_match::matcher::Matcher;
//! use serde_json::json;
//!
//! let def = compile(&Expr::greater_than(Expr::field(&["age"]), Expr::value(json!(21)))).unwrap();
//! let mut matcher = Matcher::new(&def);
//!
//! assert!(matcher.match_bytes(br#"{"age": 30}"#).unwrap());
//! matcher.reset();
//! assert!(!matcher.match_bytes(br#"{"name": "Ann"}"#).unwrap());
//! ```

use std::borrow::Cow;

use regex::Regex;
use thiserror::Error;
use tracing::trace;

use crate::ast::{CompareOp, LoopMode};
use crate::bintree::BinTreeState;
use crate::compiler::{ExecNode, LoopNode, MatchDef, OpNode, Operand};
use crate::lexer::{LexError, Token, TokenKind, Tokenizer};
use crate::value::{FastVal, apply_func, unescape_into};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("unexpected {found:?} at offset {offset}, expected {expected}")]
    UnexpectedToken {
        offset: usize,
        found: TokenKind,
        expected: &'static str,
    },

    #[error("document ended before a value was found")]
    UnexpectedEnd,

    #[error("unexpected data after the document at offset {offset}")]
    TrailingData { offset: usize },

    #[error("match called again without a reset")]
    StaleState,
}

/// A captured `[offset, offset + len)` range of the document.
/// Empty means the field has not been seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slot {
    pub offset: usize,
    pub len: usize,
}

impl Slot {
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Per-worker match state over a shared [`MatchDef`].
///
/// A matcher is reused across documents: call [`reset`](Matcher::reset)
/// between matches. Resetting and matching again never allocates once the
/// scratch buffers have grown to fit the documents seen.
#[derive(Debug)]
pub struct Matcher<'p> {
    def: &'p MatchDef,
    state: BinTreeState<'p>,
    slots: Vec<Slot>,
    /// Decoded copy of the last escaped key or string.
    scratch: String,
    tokens_read: usize,
    position: usize,
    used: bool,
}

impl<'p> Matcher<'p> {
    pub fn new(def: &'p MatchDef) -> Self {
        Matcher {
            def,
            state: BinTreeState::new(&def.tree),
            slots: vec![Slot::default(); def.num_slots],
            scratch: String::new(),
            tokens_read: 0,
            position: 0,
            used: false,
        }
    }

    pub fn def(&self) -> &'p MatchDef {
        self.def
    }

    pub fn reset(&mut self) {
        self.state.reset();
        self.slots.fill(Slot::default());
        self.scratch.clear();
        self.tokens_read = 0;
        self.position = 0;
        self.used = false;
    }

    /// Matches one complete JSON document. For a batch plan, returns whether
    /// any of the expressions matched.
    pub fn match_bytes(&mut self, data: &[u8]) -> Result<bool, MatchError> {
        if self.used {
            return Err(MatchError::StaleState);
        }
        self.used = true;

        let mut walker = Walker {
            def: self.def,
            state: &mut self.state,
            slots: &mut self.slots,
            scratch: &mut self.scratch,
            tokens: Tokenizer::new(data),
            data,
        };
        let outcome = walker.run();
        self.tokens_read = walker.tokens.steps();
        self.position = walker.tokens.position();
        outcome?;

        Ok(self.matched())
    }

    /// Whether expression `idx` of a batch plan matched the last document.
    pub fn expression_matched(&self, idx: usize) -> bool {
        self.def
            .match_buckets
            .get(idx)
            .is_some_and(|&bucket| self.state.is_true(bucket))
    }

    pub fn matched(&self) -> bool {
        (0..self.def.match_buckets.len()).any(|idx| self.expression_matched(idx))
    }

    /// Tokens the last match read, not counting skipped containers.
    pub fn tokens_read(&self) -> usize {
        self.tokens_read
    }

    /// Where the last match stopped reading.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn state(&self) -> &BinTreeState<'p> {
        &self.state
    }
}

/// One pass over one document.
///
/// Every method returns early, leaving the tokenizer wherever it was, as soon
/// as [`settled`](Walker::settled) holds. Callers check it after each call.
struct Walker<'m, 'p, 'b> {
    def: &'p MatchDef,
    state: &'m mut BinTreeState<'p>,
    slots: &'m mut [Slot],
    scratch: &'m mut String,
    tokens: Tokenizer<'b>,
    data: &'b [u8],
}

impl<'p, 'b> Walker<'_, 'p, 'b> {
    fn run(&mut self) -> Result<(), MatchError> {
        let token = self.tokens.step()?;
        if token.kind == TokenKind::End {
            return Err(MatchError::UnexpectedEnd);
        }
        let root = &self.def.root;
        let Some(value) = self.read_value(root, &token)? else {
            trace!(offset = self.tokens.position(), "result decided early");
            return Ok(());
        };
        self.finish_value(root, &token, &value)?;

        // The root was read whole, so anything after it is malformed.
        let trailing = self.tokens.step()?;
        if trailing.kind != TokenKind::End {
            return Err(MatchError::TrailingData {
                offset: trailing.offset,
            });
        }
        Ok(())
    }

    /// Whether nothing more needs to be read: the root is known, or, inside a
    /// loop iteration, the body is. A batch plan is done once every
    /// expression is.
    fn settled(&self) -> bool {
        if self.state.stall_index().is_none() && self.def.is_batch() {
            return self
                .def
                .match_buckets
                .iter()
                .all(|&bucket| self.state.is_resolved(bucket));
        }
        self.state.is_settled()
    }

    fn mark(&mut self, bucket: usize, value: bool) {
        self.state.mark_node(bucket, value);
    }

    fn match_value(&mut self, node: &'p ExecNode, token: Token<'b>) -> Result<(), MatchError> {
        match self.read_value(node, &token)? {
            Some(value) => self.finish_value(node, &token, &value),
            None => Ok(()),
        }
    }

    /// Reads the value starting at `token`, descending only where the plan
    /// asks. `None` means the walk settled partway through a container.
    fn read_value(
        &mut self,
        node: &'p ExecNode,
        token: &Token<'b>,
    ) -> Result<Option<FastVal<'b>>, MatchError> {
        let start = token.offset;
        let value = match token.kind {
            TokenKind::ObjectStart => {
                if node.elems.is_empty() {
                    self.tokens.skip_container()?;
                } else {
                    self.match_object(node)?;
                    if self.settled() {
                        return Ok(None);
                    }
                }
                FastVal::Object(Cow::Borrowed(&self.data[start..self.tokens.position()]))
            }
            TokenKind::ArrayStart => {
                if node.loops.is_empty() {
                    self.tokens.skip_container()?;
                } else {
                    self.run_inline_loops(node)?;
                    if self.settled() {
                        return Ok(None);
                    }
                }
                FastVal::Array(Cow::Borrowed(&self.data[start..self.tokens.position()]))
            }
            kind if kind.is_scalar() => FastVal::from_token(token),
            _ => return Err(unexpected(token, "a value")),
        };
        Ok(Some(value))
    }

    /// Everything that runs once a node's value has been read whole.
    fn finish_value(
        &mut self,
        node: &'p ExecNode,
        token: &Token<'b>,
        value: &FastVal<'b>,
    ) -> Result<(), MatchError> {
        // Duplicate keys: the first occurrence is the one captured.
        if let Some(slot) = node.slot.filter(|&slot| self.slots[slot].is_empty()) {
            self.slots[slot] = Slot {
                offset: token.offset,
                len: self.tokens.position() - token.offset,
            };
        }

        for op in &node.ops {
            self.eval_op(op, value);
            if self.settled() {
                return Ok(());
            }
        }
        if token.kind != TokenKind::ArrayStart {
            self.fail_loops(&node.loops);
            if self.settled() {
                return Ok(());
            }
        }
        if token.kind != TokenKind::ObjectStart {
            for child in node.elems.values() {
                self.resolve_missing(child)?;
                if self.settled() {
                    return Ok(());
                }
            }
        }
        self.run_after(node)
    }

    fn match_object(&mut self, node: &'p ExecNode) -> Result<(), MatchError> {
        let mut key = self.tokens.step()?;
        if key.kind != TokenKind::ObjectEnd {
            loop {
                if !matches!(key.kind, TokenKind::String | TokenKind::EscString) {
                    return Err(unexpected(&key, "an object key"));
                }
                let delim = self.tokens.step()?;
                if delim.kind != TokenKind::KeyDelim {
                    return Err(unexpected(&delim, "':'"));
                }

                let value = self.tokens.step()?;
                match self.lookup(node, &key) {
                    Some(child) => {
                        self.match_value(child, value)?;
                        if self.settled() {
                            return Ok(());
                        }
                    }
                    None => self.skip_value(&value)?,
                }

                let next = self.tokens.step()?;
                match next.kind {
                    TokenKind::ListDelim => key = self.tokens.step()?,
                    TokenKind::ObjectEnd => break,
                    _ => return Err(unexpected(&next, "',' or '}'")),
                }
            }
        }

        // Fields that were never seen. Those that were are fully marked already.
        for child in node.elems.values() {
            self.resolve_missing(child)?;
            if self.settled() {
                return Ok(());
            }
        }
        Ok(())
    }

    fn lookup(&mut self, node: &'p ExecNode, key: &Token<'b>) -> Option<&'p ExecNode> {
        let body = std::str::from_utf8(key.string_body()).ok()?;
        if key.kind == TokenKind::String {
            return node.elems.get(body);
        }
        self.scratch.clear();
        unescape_into(body, self.scratch);
        node.elems.get(self.scratch.as_str())
    }

    fn skip_value(&mut self, token: &Token<'b>) -> Result<(), MatchError> {
        match token.kind {
            TokenKind::ObjectStart | TokenKind::ArrayStart => {
                self.tokens.skip_container()?;
                Ok(())
            }
            kind if kind.is_scalar() => Ok(()),
            _ => Err(unexpected(token, "a value")),
        }
    }

    /// Resolves everything under a node whose value is absent from the
    /// document.
    fn resolve_missing(&mut self, node: &'p ExecNode) -> Result<(), MatchError> {
        let missing = FastVal::Missing;
        for op in &node.ops {
            self.eval_op(op, &missing);
            if self.settled() {
                return Ok(());
            }
        }
        self.fail_loops(&node.loops);
        if self.settled() {
            return Ok(());
        }
        for child in node.elems.values() {
            self.resolve_missing(child)?;
            if self.settled() {
                return Ok(());
            }
        }
        self.run_after(node)
    }

    /// Loops whose target is not an array conclude false.
    fn fail_loops(&mut self, loops: &[LoopNode]) {
        for lp in loops {
            if self.state.is_unknown(lp.bucket) {
                self.mark(lp.bucket, false);
                if self.settled() {
                    return;
                }
            }
        }
    }

    fn run_after(&mut self, node: &'p ExecNode) -> Result<(), MatchError> {
        let Some(after) = &node.after else {
            return Ok(());
        };

        let missing = FastVal::Missing;
        for op in &after.ops {
            self.eval_op(op, &missing);
            if self.settled() {
                return Ok(());
            }
        }
        for lp in &after.loops {
            if self.state.is_unknown(lp.bucket) {
                self.run_captured_loop(lp)?;
                if self.settled() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Runs every loop attached to an array's own node. The tokenizer sits
    /// just past the `[` and is left just past the `]`.
    fn run_inline_loops(&mut self, node: &'p ExecNode) -> Result<(), MatchError> {
        let body = self.tokens.position();
        for (idx, lp) in node.loops.iter().enumerate() {
            if idx > 0 {
                self.tokens.seek(body);
            }
            if self.state.is_unknown(lp.bucket) {
                self.run_loop(lp)?;
                if self.settled() {
                    return Ok(());
                }
            } else {
                self.tokens.skip_container()?;
            }
        }
        Ok(())
    }

    /// Runs a loop from an After block over the array captured in its slot.
    fn run_captured_loop(&mut self, lp: &'p LoopNode) -> Result<(), MatchError> {
        let Operand::Slot(slot) = lp.target else {
            unreachable!("loop in an after block must read its target from a slot");
        };
        let slot = self.slots[slot];
        if slot.is_empty() || self.data[slot.offset] != b'[' {
            self.mark(lp.bucket, false);
            return Ok(());
        }

        let resume = self.tokens.position();
        self.tokens.seek(slot.offset + 1);
        let outcome = self.run_loop(lp);
        self.tokens.seek(resume);
        outcome
    }

    /// Iterates the array whose `[` was just read, evaluating the body
    /// against each element until the loop's mode decides it.
    fn run_loop(&mut self, lp: &'p LoopNode) -> Result<(), MatchError> {
        let previous = self.state.set_stall(lp.bucket);
        let body = self.state.tree().node(lp.bucket).left;

        let mut any_true = false;
        let mut decided = None;
        let mut elem_start = 0;
        let mut count = 0usize;

        let mut token = self.tokens.step()?;
        if token.kind != TokenKind::ArrayEnd {
            loop {
                elem_start = token.offset;
                count += 1;
                self.state.reset_subtree(lp.bucket);
                for &slot in &lp.local_slots {
                    self.slots[slot] = Slot::default();
                }

                self.match_value(&lp.node, token)?;
                let early = self.settled();
                let satisfied = self.state.is_true(body);

                match lp.mode {
                    LoopMode::Any if satisfied => decided = Some(true),
                    LoopMode::Every | LoopMode::AnyEvery if !satisfied => decided = Some(false),
                    _ => any_true |= satisfied,
                }
                if decided.is_some() {
                    break;
                }

                // A scalar is consumed whole; a container may have been left
                // partway through.
                if early && !token.kind.is_scalar() {
                    self.tokens.seek(elem_start);
                    let first = self.tokens.step()?;
                    self.skip_value(&first)?;
                }
                let next = self.tokens.step()?;
                match next.kind {
                    TokenKind::ListDelim => token = self.tokens.step()?,
                    TokenKind::ArrayEnd => break,
                    _ => return Err(unexpected(&next, "',' or ']'")),
                }
            }
        }

        let result = decided.unwrap_or(match lp.mode {
            LoopMode::Any => false,
            LoopMode::Every => true,
            LoopMode::AnyEvery => any_true,
        });
        trace!(bucket = lp.bucket, mode = ?lp.mode, elements = count, result, "loop decided");

        self.state.reset_subtree(lp.bucket);
        self.state.restore_stall(previous);
        self.mark(lp.bucket, result);
        if self.settled() {
            return Ok(());
        }

        if decided.is_some() {
            // Stopped partway: skip the current element and the rest.
            self.tokens.seek(elem_start);
            let first = self.tokens.step()?;
            self.skip_value(&first)?;
            self.tokens.skip_container()?;
        }
        Ok(())
    }

    fn eval_op(&mut self, op: &'p OpNode, active: &FastVal<'b>) {
        if !self.state.is_unknown(op.bucket) {
            return;
        }

        let lhs = resolve(&op.lhs, active, self.data, self.slots);
        let result = match op.op {
            CompareOp::Exists => !lhs.is_missing(),
            CompareOp::NotExists => lhs.is_missing(),
            CompareOp::IsTrue => lhs == FastVal::True,
            CompareOp::Matches => match &op.pattern {
                Some(pattern) => is_match(pattern, &lhs, self.scratch),
                None => false,
            },
            cmp => match &op.rhs {
                Some(rhs) => {
                    let rhs = resolve(rhs, active, self.data, self.slots);
                    compare(cmp, &lhs, &rhs)
                }
                None => false,
            },
        };
        self.mark(op.bucket, result);
    }
}

/// Produces an operand's value without copying anything out of the document.
fn resolve<'s>(
    operand: &'s Operand,
    active: &'s FastVal<'s>,
    data: &'s [u8],
    slots: &[Slot],
) -> FastVal<'s> {
    match operand {
        Operand::Literal(value) => value.reborrow(),
        Operand::Active => active.reborrow(),
        Operand::Slot(id) => replay(data, slots[*id]),
        Operand::Func(func) => {
            let lhs = func
                .args
                .first()
                .map_or(FastVal::Missing, |arg| resolve(arg, active, data, slots));
            let rhs = func.args.get(1).map(|arg| resolve(arg, active, data, slots));
            apply_func(func.name, &lhs, rhs.as_ref())
        }
    }
}

/// Re-reads the value a slot captured.
fn replay(data: &[u8], slot: Slot) -> FastVal<'_> {
    if slot.is_empty() {
        return FastVal::Missing;
    }
    let span = &data[slot.offset..slot.offset + slot.len];
    match span[0] {
        b'{' => FastVal::Object(Cow::Borrowed(span)),
        b'[' => FastVal::Array(Cow::Borrowed(span)),
        _ => {
            let mut tokens = Tokenizer::new(data);
            tokens.seek(slot.offset);
            match tokens.step() {
                Ok(token) => FastVal::from_token(&token),
                Err(_) => FastVal::Invalid,
            }
        }
    }
}

fn compare(op: CompareOp, lhs: &FastVal<'_>, rhs: &FastVal<'_>) -> bool {
    if lhs.is_absent() || rhs.is_absent() {
        return false;
    }
    let ord = lhs.compare(rhs);
    match op {
        CompareOp::Equals => ord.is_eq(),
        CompareOp::NotEquals => ord.is_ne(),
        CompareOp::LessThan => ord.is_lt(),
        CompareOp::LessEquals => ord.is_le(),
        CompareOp::GreaterThan => ord.is_gt(),
        CompareOp::GreaterEquals => ord.is_ge(),
        _ => false,
    }
}

fn is_match(pattern: &Regex, value: &FastVal<'_>, scratch: &mut String) -> bool {
    match value {
        FastVal::String(s) => pattern.is_match(s),
        FastVal::JsonString(s) => {
            scratch.clear();
            unescape_into(s, scratch);
            pattern.is_match(scratch)
        }
        FastVal::BinString(b) => std::str::from_utf8(b).is_ok_and(|s| pattern.is_match(s)),
        _ => false,
    }
}

fn unexpected(token: &Token<'_>, expected: &'static str) -> MatchError {
    match token.kind {
        TokenKind::End => MatchError::UnexpectedEnd,
        found => MatchError::UnexpectedToken {
            offset: token.offset,
            found,
            expected,
        },
    }
}
