//! # Parse Events and Statistics
//!
//! The engine reports what it does through a [`ParseEventHandler`] passed to
//! [`Parser::parse_with_events`](super::Parser::parse_with_events). Handlers
//! see every expression entry and exit, memo hits, seed growth, backtracking
//! and recorded error candidates. [`TraceLog`] collects events for tests and
//! debugging; [`ParseStats`] is gathered for every parse when enabled.

use super::errors::Candidate;
use crate::grammar::{ExprId, Grammar};
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// A parsing event for debugging/tracing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    /// Started evaluating an expression
    Enter { expr: ExprId, position: usize },
    /// Finished evaluating an expression
    Exit {
        expr: ExprId,
        matched: bool,
        end: usize,
    },
    /// Replayed a memoized result
    MemoHit { expr: ExprId, position: usize },
    /// A left-recursive or cluster seed grew
    SeedGrown {
        expr: ExprId,
        position: usize,
        end: usize,
    },
    /// A choice alternative was rejected
    Backtrack { expr: ExprId, position: usize },
    /// An error candidate was recorded
    ErrorRecorded { candidate: Candidate, position: usize },
}

/// Trait for receiving parse events
pub trait ParseEventHandler {
    fn handle(&mut self, event: ParseEvent);
}

/// A no-op event handler
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventHandler;

impl ParseEventHandler for NullEventHandler {
    fn handle(&mut self, _event: ParseEvent) {}
}

/// Collects events up to a limit.
#[derive(Debug, Clone)]
pub struct TraceLog {
    events: Vec<ParseEvent>,
    limit: usize,
    dropped: usize,
}

impl TraceLog {
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            events: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    #[must_use]
    pub fn events(&self) -> &[ParseEvent] {
        &self.events
    }

    /// Events that arrived after the limit was reached.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// Indented dump, one line per event.
    #[must_use]
    pub fn dump(&self, grammar: &Grammar) -> String {
        let mut out = String::new();
        let mut depth = 0usize;
        for event in &self.events {
            if matches!(event, ParseEvent::Exit { .. }) {
                depth = depth.saturating_sub(1);
            }
            let _ = write!(out, "{:indent$}", "", indent = depth * 2);
            let _ = match *event {
                ParseEvent::Enter { expr, position } => {
                    depth += 1;
                    writeln!(out, "> {} @{position}", grammar.describe(expr))
                }
                ParseEvent::Exit { expr, matched, end } => {
                    let outcome = if matched { "ok" } else { "fail" };
                    writeln!(out, "< {} {outcome} @{end}", grammar.describe(expr))
                }
                ParseEvent::MemoHit { expr, position } => {
                    writeln!(out, "memo {} @{position}", grammar.describe(expr))
                }
                ParseEvent::SeedGrown {
                    expr,
                    position,
                    end,
                } => writeln!(
                    out,
                    "seed {} @{position}..{end}",
                    grammar.describe(expr)
                ),
                ParseEvent::Backtrack { expr, position } => {
                    writeln!(out, "backtrack {} @{position}", grammar.describe(expr))
                }
                ParseEvent::ErrorRecorded {
                    candidate,
                    position,
                } => writeln!(out, "expected {} @{position}", candidate.describe(grammar)),
            };
        }
        if self.dropped > 0 {
            let _ = writeln!(out, "... {} more events", self.dropped);
        }
        out
    }
}

impl Default for TraceLog {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl ParseEventHandler for TraceLog {
    fn handle(&mut self, event: ParseEvent) {
        if self.events.len() < self.limit {
            self.events.push(event);
        } else {
            self.dropped += 1;
        }
    }
}

/// Statistics collected during parsing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ParseStats {
    /// Number of expression evaluations, memo hits included
    pub expressions_evaluated: usize,
    pub memo_hits: usize,
    pub memo_misses: usize,
    /// Rejected choice alternatives
    pub backtracks: usize,
    pub seeds_grown: usize,
    /// Maximum expression nesting depth
    pub max_depth: usize,
}

impl ParseStats {
    /// Create new empty stats
    #[must_use]
    pub const fn new() -> Self {
        Self {
            expressions_evaluated: 0,
            memo_hits: 0,
            memo_misses: 0,
            backtracks: 0,
            seeds_grown: 0,
            max_depth: 0,
        }
    }

    /// Merge stats from another instance
    pub fn merge(&mut self, other: &Self) {
        self.expressions_evaluated += other.expressions_evaluated;
        self.memo_hits += other.memo_hits;
        self.memo_misses += other.memo_misses;
        self.backtracks += other.backtracks;
        self.seeds_grown += other.seeds_grown;
        self.max_depth = self.max_depth.max(other.max_depth);
    }
}
