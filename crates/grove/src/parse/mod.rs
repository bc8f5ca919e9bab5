//! # Parsing
//!
//! [`Parser`] runs a [`Grammar`] against input text. Each call owns a fresh
//! [`ParseState`], memo table and error handler, so one parser (and one
//! grammar) can serve any number of parses, including from several threads.
//!
//! ```rust
//! use grove::grammar::GrammarBuilder;
//! use grove::parse::Parser;
//!
//! let mut b = GrammarBuilder::new();
//! let digit = b.char_range('0', '9');
//! let digits = b.one_or_more(digit);
//! let number = b.capture("num", digits);
//! b.root(number);
//! let grammar = b.build().unwrap();
//!
//! let outcome = Parser::new(&grammar).parse("42").unwrap();
//! assert!(outcome.is_success());
//! assert_eq!(outcome.render(), "42");
//! assert_eq!(outcome.root().unwrap().kind, "num");
//! ```

mod custom;
mod engine;
mod errors;
mod left_rec;
mod memo;
mod state;
mod trace;

pub use custom::{CustomExpr, CustomState, ExtensionRegistry, SlotId, StateDelta, StateInputs};
pub use engine::ParseContext;
pub use errors::{Candidate, ErrorHandler, ErrorReport, FarthestFailure};
pub use left_rec::{Precedence, PrecedenceState, Seed, SeedState};
pub use memo::{MemoStats, MemoTable, ParseInputs};
pub use state::{Changeset, ParseState, Transaction};
pub use trace::{NullEventHandler, ParseEvent, ParseEventHandler, ParseStats, TraceLog};

use crate::error::{GroveError, SyntaxError};
use crate::grammar::Grammar;
use crate::source::Source;
use crate::tree::{ParseNode, render_all};
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration options for the parser.
///
/// ```rust
/// use grove::parse::ParserConfig;
///
/// let config = ParserConfig {
///     memoize_rules: true,
///     max_memo_entries: Some(10_000),
///     ..ParserConfig::default()
/// };
/// assert!(config.enable_memoization);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ParserConfig {
    /// Memo nodes consult the memo table; when disabled they are transparent
    pub enable_memoization: bool,

    /// Memoize every named node, as if wrapped in a memo node
    pub memoize_rules: bool,

    /// Bound on memo entries; the entries with the smallest start are evicted first
    pub max_memo_entries: Option<usize>,

    /// The root must consume the whole input
    pub require_full_match: bool,

    /// Leaves outside tokens are error candidates
    pub record_leaf_errors: bool,

    /// Gather [`ParseStats`]
    pub collect_stats: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            enable_memoization: true,
            memoize_rules: false,
            max_memo_entries: None,
            require_full_match: true,
            record_leaf_errors: true,
            collect_stats: true,
        }
    }
}

/// Result of a top-level parse.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub matched: bool,
    /// End of the root match, trailing whitespace included
    pub end: usize,
    /// Top-level tree nodes; empty when the parse failed
    pub nodes: Vec<ParseNode>,
    /// Farthest failure; describes zero candidates on success
    pub report: ErrorReport,
    pub stats: ParseStats,
    pub memo: MemoStats,
    pub source: Source,
}

impl ParseOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.matched
    }

    /// The first top-level node, usually the only one.
    #[must_use]
    pub fn root(&self) -> Option<&ParseNode> {
        self.nodes.first()
    }

    /// Diagnostic for a failed parse.
    #[must_use]
    pub fn error(&self) -> Option<SyntaxError> {
        (!self.matched).then(|| self.report.to_syntax_error())
    }

    /// The tree on success, the diagnostic otherwise.
    ///
    /// # Errors
    ///
    /// Returns the farthest-failure [`SyntaxError`] when the parse failed.
    pub fn into_result(self) -> Result<Vec<ParseNode>, SyntaxError> {
        if self.matched {
            Ok(self.nodes)
        } else {
            Err(self.report.to_syntax_error())
        }
    }

    /// The rendered tree on success, the rendered report otherwise.
    #[must_use]
    pub fn render(&self) -> String {
        if self.matched {
            render_all(&self.nodes, &self.source)
        } else {
            self.report.render(&self.source)
        }
    }
}

/// Runs a grammar against input.
#[derive(Debug, Clone)]
pub struct Parser<'g> {
    grammar: &'g Grammar,
    config: ParserConfig,
    extensions: Arc<ExtensionRegistry>,
}

impl<'g> Parser<'g> {
    /// Parser with the default configuration and only the built-in extensions.
    #[must_use]
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            config: ParserConfig::default(),
            extensions: Arc::new(ExtensionRegistry::new()),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a registry with additional custom states.
    #[must_use]
    pub fn with_extensions(mut self, extensions: Arc<ExtensionRegistry>) -> Self {
        self.extensions = extensions;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }

    #[must_use]
    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    #[must_use]
    pub const fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Parse `source`, building a tree.
    ///
    /// A mismatch is not an error: it is reported through
    /// [`ParseOutcome::report`].
    ///
    /// # Errors
    ///
    /// Fatal errors only (see [`GroveError`]).
    pub fn parse(&self, source: impl Into<Source>) -> Result<ParseOutcome, GroveError> {
        self.run(source.into(), true, None)
    }

    /// Parse `source`, streaming [`ParseEvent`]s to `events`.
    ///
    /// # Errors
    ///
    /// Fatal errors only (see [`GroveError`]).
    pub fn parse_with_events(
        &self,
        source: impl Into<Source>,
        events: &mut dyn ParseEventHandler,
    ) -> Result<ParseOutcome, GroveError> {
        self.run(source.into(), true, Some(events))
    }

    /// Match without building a tree, returning the end of the match.
    ///
    /// # Errors
    ///
    /// [`GroveError::UnsupportedOperation`] if a capture or label is reached,
    /// and any other fatal error.
    pub fn recognize(&self, text: &str) -> Result<Option<usize>, GroveError> {
        let outcome = self.run(Source::new(text), false, None)?;
        Ok(outcome.matched.then_some(outcome.end))
    }

    fn run(
        &self,
        source: Source,
        build_tree: bool,
        events: Option<&mut dyn ParseEventHandler>,
    ) -> Result<ParseOutcome, GroveError> {
        let events = events.map(|events| events as &mut dyn ParseEventHandler);
        let state = ParseState::new(self.extensions.instantiate(), build_tree);
        let mut cx = ParseContext::new(self.grammar, source.text(), &self.config, state, events);

        let mut matched = cx.parse(self.grammar.root())?;
        let open = cx.state.open_transactions();
        if open != 0 {
            return Err(GroveError::TransactionOrder { open, found: 0 });
        }

        let end = cx.state.end();
        if matched && self.config.require_full_match && end < source.len() {
            cx.errors.handle(Candidate::EndOfInput, end);
            cx.emit(ParseEvent::ErrorRecorded {
                candidate: Candidate::EndOfInput,
                position: end,
            });
            matched = false;
        }

        let report = if matched {
            ErrorReport::none(&source)
        } else {
            cx.errors.report(self.grammar, &source)
        };
        let memo = cx.memo.stats();
        let stats = if self.config.collect_stats {
            ParseStats {
                memo_hits: memo.hits,
                memo_misses: memo.misses,
                ..cx.stats
            }
        } else {
            ParseStats::default()
        };
        let nodes = if matched {
            cx.state.take_nodes()
        } else {
            Vec::new()
        };

        Ok(ParseOutcome {
            matched,
            end,
            nodes,
            report,
            stats,
            memo,
            source,
        })
    }
}
