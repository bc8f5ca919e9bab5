//! # Custom State Protocol
//!
//! Extensions keep per-parse state in a slot of the [`ParseState`]. Every
//! custom state follows one transactional protocol, driven by the transactions
//! the engine opens around speculative work:
//!
//! | Operation  | Effect |
//! |------------|--------|
//! | `snapshot` | push a restore point |
//! | `commit`   | pop the restore point, keeping changes made since |
//! | `restore`  | pop the restore point, undoing changes made since |
//! | `uncommit` | like `restore`, but return the undone changes as a delta |
//!
//! Deltas end up in [`Changeset`](super::Changeset)s and are replayed with
//! `merge` when a memoized result or a left-recursion seed is reused.
//! `inputs` exposes the part of the state that affects matching; it is part of
//! every memo key, so results computed under a different state are never
//! reused.
//!
//! The built-in left-recursion seed table and precedence cell occupy the
//! first two slots and go through exactly the same protocol.
//!
//! [`ParseState`]: super::ParseState

use super::engine::ParseContext;
use super::left_rec::{PrecedenceState, SeedState};
use crate::error::GroveError;
use crate::grammar::ExprId;
use compact_str::CompactString;
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Exact words identifying the matching-relevant part of a custom state.
pub type StateInputs = SmallVec<[u64; 4]>;

/// Net effect of a speculative branch on one custom state.
pub type StateDelta = Rc<dyn Any>;

/// Index of a custom state inside a [`ParseState`](super::ParseState).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    /// Left-recursion seeds
    pub const SEEDS: Self = Self(0);
    /// Current cluster precedence
    pub const PRECEDENCE: Self = Self(1);

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-extension state living in one slot of a parse state.
///
/// Implementations must resolve restore points in LIFO order and must only
/// ever be mutated through their own slot.
pub trait CustomState: Any + fmt::Debug {
    fn snapshot(&mut self);

    fn commit(&mut self);

    fn restore(&mut self);

    /// Undo to the last restore point and return what was undone, or `None`
    /// if nothing changed.
    fn uncommit(&mut self) -> Option<StateDelta>;

    /// Re-apply a delta produced by `uncommit` on this slot.
    ///
    /// # Errors
    ///
    /// Returns [`GroveError::SlotTypeMismatch`] if the delta came from a
    /// different kind of state.
    fn merge(&mut self, delta: &dyn Any) -> Result<(), GroveError>;

    /// Append the words that influence matching.
    fn inputs(&self, inputs: &mut StateInputs);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

type Factory = Box<dyn Fn() -> Box<dyn CustomState> + Send + Sync>;

/// Slot assignments, fixed before any parse starts.
///
/// Each parse instantiates a fresh state per registered extension, in slot
/// order. Share a finished registry between parsers with an `Arc`.
pub struct ExtensionRegistry {
    entries: Vec<(CompactString, Factory)>,
}

impl ExtensionRegistry {
    /// Registry holding only the built-in seed and precedence states.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::new(),
        };
        registry.register("left-recursion", SeedState::default);
        registry.register("precedence", PrecedenceState::default);
        registry
    }

    /// Assign the next slot to an extension.
    pub fn register<S, F>(&mut self, name: impl Into<CompactString>, factory: F) -> SlotId
    where
        S: CustomState,
        F: Fn() -> S + Send + Sync + 'static,
    {
        let slot = SlotId(self.entries.len());
        self.entries.push((
            name.into(),
            Box::new(move || Box::new(factory()) as Box<dyn CustomState>),
        ));
        slot
    }

    /// Slot registered under `name`.
    #[must_use]
    pub fn slot(&self, name: &str) -> Option<SlotId> {
        self.entries
            .iter()
            .position(|(entry, _)| entry == name)
            .map(SlotId)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn instantiate(&self) -> Vec<Box<dyn CustomState>> {
        self.entries.iter().map(|(_, factory)| factory()).collect()
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

/// Expression kind supplied by an extension.
///
/// `parse` runs with the same contract as built-in kinds: on success the
/// state's end is set and the start is unchanged; on failure every effect,
/// custom states included, must be undone (open a transaction on the
/// [`ParseState`](super::ParseState) to get that for free).
pub trait CustomExpr: fmt::Debug + Send + Sync {
    /// Name used in descriptions and error messages.
    fn name(&self) -> &str;

    /// Match at the current position.
    ///
    /// # Errors
    ///
    /// Fatal errors only; a mismatch is `Ok(false)`.
    fn parse(&self, cx: &mut ParseContext<'_>, operands: &[ExprId]) -> Result<bool, GroveError>;

    /// Whether the node may succeed without consuming input.
    fn nullable(&self) -> bool {
        true
    }
}
