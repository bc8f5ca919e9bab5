//! Per-parse mutable state, transactions and changesets.
//!
//! Positions follow one convention throughout the engine. An expression is
//! invoked with `start` at its first character. On success it leaves `start`
//! untouched and sets `end`; `black_end` is the end of its last
//! non-whitespace character. On failure `end == start` and
//! `black_end == black_start`.

use super::custom::{CustomState, SlotId, StateDelta, StateInputs};
use crate::error::GroveError;
use crate::text::TextRange;
use crate::tree::{ParseNode, TreeBuilder};
use compact_str::CompactString;
use smallvec::SmallVec;
use std::any::type_name;
use std::rc::Rc;

/// Mutable record of one parse.
#[derive(Debug)]
pub struct ParseState {
    start: usize,
    end: usize,
    black_start: usize,
    black_end: usize,
    tree: TreeBuilder,
    custom: Vec<Box<dyn CustomState>>,
    /// Failures are reported to the error handler
    pub(crate) record_errors: bool,
    /// Nesting depth of token expressions
    pub(crate) token_depth: u32,
    build_tree: bool,
    open: usize,
}

/// Restore point opened by [`ParseState::begin`].
///
/// Must be resolved by exactly one of [`ParseState::commit`],
/// [`ParseState::rollback`] or [`ParseState::extract`], innermost first.
#[derive(Debug)]
#[must_use = "a transaction must be committed, rolled back or extracted"]
pub struct Transaction {
    level: usize,
    start: usize,
    black_start: usize,
    tree_len: usize,
}

/// Net effect of matching one expression, detached from any parse state.
///
/// Cached by the memo table and held as left-recursion seeds; replayed onto a
/// live state with [`ParseState::merge`].
#[derive(Debug, Clone)]
pub struct Changeset {
    end: usize,
    black_end: usize,
    matched: bool,
    nodes: Rc<[ParseNode]>,
    deltas: SmallVec<[(SlotId, StateDelta); 2]>,
}

impl Changeset {
    /// A failed match at `start`.
    #[must_use]
    pub fn failure(start: usize, black_start: usize) -> Self {
        Self {
            end: start,
            black_end: black_start,
            matched: false,
            nodes: Rc::from(Vec::new()),
            deltas: SmallVec::new(),
        }
    }

    #[must_use]
    pub const fn matched(&self) -> bool {
        self.matched
    }

    #[must_use]
    pub const fn end(&self) -> usize {
        self.end
    }

    #[must_use]
    pub const fn black_end(&self) -> usize {
        self.black_end
    }

    /// Tree fragment produced by the match.
    #[must_use]
    pub fn nodes(&self) -> &[ParseNode] {
        &self.nodes
    }

    /// Slots whose custom state the match changed.
    pub fn changed_slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.deltas.iter().map(|(slot, _)| *slot)
    }
}

impl ParseState {
    pub(crate) fn new(custom: Vec<Box<dyn CustomState>>, build_tree: bool) -> Self {
        Self {
            start: 0,
            end: 0,
            black_start: 0,
            black_end: 0,
            tree: TreeBuilder::default(),
            custom,
            record_errors: true,
            token_depth: 0,
            build_tree,
            open: 0,
        }
    }

    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> usize {
        self.end
    }

    /// End of the last non-whitespace input before `start`.
    #[must_use]
    pub const fn black_start(&self) -> usize {
        self.black_start
    }

    #[must_use]
    pub const fn black_end(&self) -> usize {
        self.black_end
    }

    /// Whether captures build tree nodes (false on the recognition path).
    #[must_use]
    pub const fn builds_tree(&self) -> bool {
        self.build_tree
    }

    /// Number of unresolved transactions.
    #[must_use]
    pub const fn open_transactions(&self) -> usize {
        self.open
    }

    /// Match `len` bytes at `start`.
    pub fn succeed(&mut self, len: usize) {
        self.end = self.start + len;
        self.black_end = if len > 0 { self.end } else { self.black_start };
    }

    /// Mark the current expression as failed.
    pub fn fail(&mut self) {
        self.end = self.start;
        self.black_end = self.black_start;
    }

    /// Move `start` past the last match, as a sequence does between items.
    pub fn advance(&mut self) {
        self.start = self.end;
        self.black_start = self.black_end;
    }

    pub(crate) fn set_black_end(&mut self, black_end: usize) {
        self.black_end = black_end;
    }

    /// Open a restore point on positions, the tree and every custom state.
    pub fn begin(&mut self) -> Transaction {
        for state in &mut self.custom {
            state.snapshot();
        }
        self.open += 1;
        Transaction {
            level: self.open,
            start: self.start,
            black_start: self.black_start,
            tree_len: self.tree.len(),
        }
    }

    fn close(&mut self, tx: &Transaction) -> Result<(), GroveError> {
        if tx.level != self.open {
            return Err(GroveError::TransactionOrder {
                open: self.open,
                found: tx.level,
            });
        }
        self.open -= 1;
        Ok(())
    }

    /// Keep everything done since `tx`; `start` returns to the transaction's
    /// start while `end` stays where the work left it.
    ///
    /// # Errors
    ///
    /// [`GroveError::TransactionOrder`] if `tx` is not the innermost open transaction.
    pub fn commit(&mut self, tx: Transaction) -> Result<(), GroveError> {
        self.close(&tx)?;
        for state in &mut self.custom {
            state.commit();
        }
        self.start = tx.start;
        self.black_start = tx.black_start;
        Ok(())
    }

    /// Undo everything done since `tx` and leave a failed (or empty) match.
    ///
    /// # Errors
    ///
    /// [`GroveError::TransactionOrder`] if `tx` is not the innermost open transaction.
    pub fn rollback(&mut self, tx: Transaction) -> Result<(), GroveError> {
        self.close(&tx)?;
        for state in &mut self.custom {
            state.restore();
        }
        self.reset_to(&tx);
        self.tree.truncate(tx.tree_len);
        Ok(())
    }

    /// Undo everything done since `tx`, returning it as a [`Changeset`].
    ///
    /// # Errors
    ///
    /// [`GroveError::TransactionOrder`] if `tx` is not the innermost open transaction.
    pub fn extract(&mut self, tx: Transaction, matched: bool) -> Result<Changeset, GroveError> {
        self.close(&tx)?;
        let deltas = self
            .custom
            .iter_mut()
            .enumerate()
            .filter_map(|(index, state)| {
                state
                    .uncommit()
                    .map(|delta| (SlotId::from_index(index), delta))
            })
            .collect();
        let nodes: Rc<[ParseNode]> = self.tree.split_off(tx.tree_len).into();
        let changeset = if matched {
            Changeset {
                end: self.end,
                black_end: self.black_end,
                matched,
                nodes,
                deltas,
            }
        } else {
            Changeset {
                deltas,
                ..Changeset::failure(tx.start, tx.black_start)
            }
        };
        self.reset_to(&tx);
        Ok(changeset)
    }

    fn reset_to(&mut self, tx: &Transaction) {
        self.start = tx.start;
        self.black_start = tx.black_start;
        self.fail();
    }

    /// Replay a changeset recorded at the current start.
    ///
    /// # Errors
    ///
    /// Propagates slot errors from the custom states' `merge`.
    pub fn merge(&mut self, changeset: &Changeset) -> Result<(), GroveError> {
        self.end = changeset.end;
        self.black_end = changeset.black_end;
        if self.build_tree {
            self.tree.extend_from_slice(&changeset.nodes);
        }
        for (slot, delta) in &changeset.deltas {
            let state = self
                .custom
                .get_mut(slot.index())
                .ok_or(GroveError::UnknownSlot { slot: slot.index() })?;
            state.merge(&**delta)?;
        }
        Ok(())
    }

    /// Custom state in `slot`.
    ///
    /// # Errors
    ///
    /// [`GroveError::UnknownSlot`] or [`GroveError::SlotTypeMismatch`].
    pub fn custom<T: CustomState>(&self, slot: SlotId) -> Result<&T, GroveError> {
        self.custom
            .get(slot.index())
            .ok_or(GroveError::UnknownSlot { slot: slot.index() })?
            .as_any()
            .downcast_ref::<T>()
            .ok_or(GroveError::SlotTypeMismatch {
                slot: slot.index(),
                expected: type_name::<T>(),
            })
    }

    /// Mutable custom state in `slot`.
    ///
    /// # Errors
    ///
    /// [`GroveError::UnknownSlot`] or [`GroveError::SlotTypeMismatch`].
    pub fn custom_mut<T: CustomState>(&mut self, slot: SlotId) -> Result<&mut T, GroveError> {
        self.custom
            .get_mut(slot.index())
            .ok_or(GroveError::UnknownSlot { slot: slot.index() })?
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or(GroveError::SlotTypeMismatch {
                slot: slot.index(),
                expected: type_name::<T>(),
            })
    }

    /// Inputs of every custom state, each prefixed by its length.
    pub(crate) fn inputs(&self) -> SmallVec<[u64; 8]> {
        let mut all = SmallVec::new();
        let mut scratch = StateInputs::new();
        for state in &self.custom {
            scratch.clear();
            state.inputs(&mut scratch);
            all.push(scratch.len() as u64);
            all.extend_from_slice(&scratch);
        }
        all
    }

    pub(crate) fn tree_len(&self) -> usize {
        self.tree.len()
    }

    pub(crate) fn truncate_tree(&mut self, mark: usize) {
        self.tree.truncate(mark);
    }

    pub(crate) fn close_node(&mut self, mark: usize, kind: &CompactString, span: TextRange) {
        self.tree.close(mark, kind, span);
    }

    pub(crate) fn label_nodes(&mut self, mark: usize, label: &CompactString) {
        self.tree.label_from(mark, label);
    }

    pub(crate) fn take_nodes(&mut self) -> Vec<ParseNode> {
        std::mem::take(&mut self.tree).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::custom::ExtensionRegistry;
    use crate::parse::left_rec::{Precedence, PrecedenceState};

    fn state() -> ParseState {
        ParseState::new(ExtensionRegistry::new().instantiate(), true)
    }

    fn leaf(start: usize, end: usize) -> ParseNode {
        ParseNode::new("x", TextRange::of(start, end), Vec::new())
    }

    #[test]
    fn test_commit_keeps_end_and_restores_start() {
        let mut state = state();
        let tx = state.begin();
        state.succeed(2);
        state.advance();
        state.succeed(3);
        state.commit(tx).unwrap();

        assert_eq!(state.start(), 0);
        assert_eq!(state.end(), 5);
        assert_eq!(state.black_end(), 5);
        assert_eq!(state.open_transactions(), 0);
    }

    #[test]
    fn test_rollback_restores_everything() {
        let mut state = state();
        let tx = state.begin();
        state.succeed(2);
        state.tree.push(leaf(0, 2));
        state
            .custom_mut::<PrecedenceState>(SlotId::PRECEDENCE)
            .unwrap()
            .set(Precedence::floor(3));
        state.rollback(tx).unwrap();

        assert_eq!(state.end(), 0);
        assert_eq!(state.tree_len(), 0);
        assert_eq!(
            state
                .custom::<PrecedenceState>(SlotId::PRECEDENCE)
                .unwrap()
                .get(),
            Precedence::default()
        );
    }

    #[test]
    fn test_extract_then_merge_replays() {
        let mut state = state();
        let tx = state.begin();
        state.succeed(4);
        state.tree.push(leaf(0, 4));
        state
            .custom_mut::<PrecedenceState>(SlotId::PRECEDENCE)
            .unwrap()
            .set(Precedence::floor(7));
        let changeset = state.extract(tx, true).unwrap();

        assert_eq!(state.end(), 0);
        assert_eq!(state.tree_len(), 0);
        assert_eq!(changeset.end(), 4);
        assert_eq!(changeset.nodes().len(), 1);
        assert_eq!(changeset.changed_slots().collect::<Vec<_>>(), [SlotId::PRECEDENCE]);

        state.merge(&changeset).unwrap();
        assert_eq!(state.end(), 4);
        assert_eq!(state.tree_len(), 1);
        assert_eq!(
            state
                .custom::<PrecedenceState>(SlotId::PRECEDENCE)
                .unwrap()
                .get(),
            Precedence::floor(7)
        );
    }

    #[test]
    fn test_out_of_order_resolution_is_fatal() {
        let mut state = state();
        let outer = state.begin();
        let inner = state.begin();

        let error = state.commit(outer).unwrap_err();
        assert!(matches!(
            error,
            GroveError::TransactionOrder { open: 2, found: 1 }
        ));
        state.rollback(inner).unwrap();
    }

    #[test]
    fn test_slot_errors() {
        let state = state();
        assert!(matches!(
            state.custom::<PrecedenceState>(SlotId::SEEDS),
            Err(GroveError::SlotTypeMismatch { slot: 0, .. })
        ));
        assert!(matches!(
            state.custom::<PrecedenceState>(SlotId::from_index(9)),
            Err(GroveError::UnknownSlot { slot: 9 })
        ));
    }
}
