//! # Memoization
//!
//! Packrat cache from [`ParseInputs`] to the [`Changeset`] the expression
//! produced. A key covers everything that can influence a match: the
//! expression's identity, its start, the whitespace-adjusted start, the
//! inputs of every custom state (which includes the active cluster precedence
//! and left-recursion seeds), and the error-recording context.
//!
//! A hit replays no inner error candidates: they went to the error handler
//! when the entry was computed. An entry computed where failures are not
//! recorded (under `Not`, or leaves inside a token) is therefore never reused
//! where they are.

use super::state::{Changeset, ParseState};
use crate::grammar::ExprId;
use hashbrown::HashMap;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Memo key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseInputs {
    pub expr: ExprId,
    pub start: usize,
    pub black_start: usize,
    /// Inputs of every custom state, length-prefixed per slot
    pub custom: SmallVec<[u64; 8]>,
    /// Failures are reported to the error handler
    pub record_errors: bool,
    /// Evaluated inside a token, where bare leaves are not candidates
    pub in_token: bool,
}

impl ParseInputs {
    /// Key for evaluating `expr` in the current state.
    #[must_use]
    pub fn new(expr: ExprId, state: &ParseState) -> Self {
        Self {
            expr,
            start: state.start(),
            black_start: state.black_start(),
            custom: state.inputs(),
            record_errors: state.record_errors,
            in_token: state.token_depth > 0,
        }
    }
}

/// Memo table counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct MemoStats {
    pub hits: usize,
    pub misses: usize,
    pub stored: usize,
    /// Entries dropped by `cut` or by the size limit
    pub evictions: usize,
}

/// Packrat memo table for one parse.
#[derive(Debug)]
pub struct MemoTable {
    entries: HashMap<ParseInputs, Changeset, ahash::RandomState>,
    max_entries: Option<usize>,
    stats: MemoStats,
}

impl MemoTable {
    /// Create a table, optionally bounded to `max_entries`.
    #[must_use]
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            entries: HashMap::default(),
            max_entries,
            stats: MemoStats::default(),
        }
    }

    /// Cached result for `key`, counting the hit or miss.
    pub fn get(&mut self, key: &ParseInputs) -> Option<Changeset> {
        if let Some(changeset) = self.entries.get(key) {
            self.stats.hits += 1;
            Some(changeset.clone())
        } else {
            self.stats.misses += 1;
            None
        }
    }

    /// Store the result of evaluating `key`.
    ///
    /// When the table is bounded and full, entries with the smallest start
    /// position are evicted first.
    pub fn memoize(&mut self, key: ParseInputs, changeset: Changeset) {
        self.entries.insert(key, changeset);
        self.stats.stored += 1;

        if let Some(max) = self.max_entries {
            while self.entries.len() > max {
                let Some(oldest) = self.entries.keys().map(|key| key.start).min() else {
                    break;
                };
                self.evict_where(|start| start <= oldest);
            }
        }
    }

    /// Drop every entry starting before `position`.
    ///
    /// Returns the number of evicted entries.
    pub fn cut(&mut self, position: usize) -> usize {
        self.evict_where(|start| start < position)
    }

    fn evict_where(&mut self, evict: impl Fn(usize) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !evict(key.start));
        let evicted = before - self.entries.len();
        self.stats.evictions += evicted;
        evicted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn stats(&self) -> MemoStats {
        self.stats
    }
}
