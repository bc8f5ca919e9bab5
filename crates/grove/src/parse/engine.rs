//! # Expression Evaluation
//!
//! [`ParseContext`] owns everything one parse mutates (the [`ParseState`], the
//! memo table, the error handler and the statistics) and evaluates grammar
//! nodes against the input.
//!
//! Every node kind follows the contract documented on [`ParseState`]: on
//! success `end` is set and `start` is untouched, on failure no effect of the
//! attempt survives. Combinators that may discard speculative work open a
//! [`Transaction`](super::Transaction) first.

use super::ParserConfig;
use super::errors::{Candidate, ErrorHandler, FarthestFailure};
use super::memo::{MemoTable, ParseInputs};
use super::state::ParseState;
use super::trace::{ParseEvent, ParseEventHandler, ParseStats};
use crate::error::GroveError;
use crate::grammar::{ExprId, ExprKind, ExprNode, Grammar, RepeatKind};
use crate::text::TextRange;
use std::mem;

/// Evaluation context handed to the engine and to [`CustomExpr`](super::CustomExpr)s.
pub struct ParseContext<'p> {
    pub(super) grammar: &'p Grammar,
    pub(super) text: &'p str,
    pub(super) config: &'p ParserConfig,
    pub(super) state: ParseState,
    pub(super) memo: MemoTable,
    pub(super) errors: FarthestFailure,
    pub(super) events: Option<&'p mut dyn ParseEventHandler>,
    pub(super) stats: ParseStats,
    depth: usize,
}

impl<'p> ParseContext<'p> {
    pub(super) fn new(
        grammar: &'p Grammar,
        text: &'p str,
        config: &'p ParserConfig,
        state: ParseState,
        events: Option<&'p mut dyn ParseEventHandler>,
    ) -> Self {
        Self {
            grammar,
            text,
            config,
            state,
            memo: MemoTable::new(config.max_memo_entries),
            errors: FarthestFailure::new(),
            events,
            stats: ParseStats::new(),
            depth: 0,
        }
    }

    /// Whole input text.
    #[must_use]
    pub const fn text(&self) -> &'p str {
        self.text
    }

    /// Input from the current start position.
    #[must_use]
    pub fn rest(&self) -> &'p str {
        self.text.get(self.state.start()..).unwrap_or_default()
    }

    #[must_use]
    pub const fn grammar(&self) -> &'p Grammar {
        self.grammar
    }

    #[must_use]
    pub const fn state(&self) -> &ParseState {
        &self.state
    }

    pub const fn state_mut(&mut self) -> &mut ParseState {
        &mut self.state
    }

    /// Evaluate `id` at the current start position.
    ///
    /// Returns whether it matched; the match itself is recorded in the state.
    ///
    /// # Errors
    ///
    /// Fatal errors only: an unresolved reference, an unsupported operation,
    /// misused transactions or a failing extension.
    pub fn parse(&mut self, id: ExprId) -> Result<bool, GroveError> {
        let grammar = self.grammar;
        let node = grammar.node(id);
        let position = self.state.start();

        self.state.fail();
        self.depth += 1;
        self.stats.expressions_evaluated += 1;
        self.stats.max_depth = self.stats.max_depth.max(self.depth);
        self.emit(ParseEvent::Enter { expr: id, position });

        let memoize = self.config.enable_memoization
            && self.config.memoize_rules
            && node.name.is_some()
            && !matches!(node.kind, ExprKind::Memo(_));
        let result = if memoize {
            self.parse_memoized(id, |cx| cx.parse_kind(id, &node.kind))
        } else {
            self.parse_kind(id, &node.kind)
        };
        self.depth -= 1;

        let matched = result?;
        if !matched {
            self.state.fail();
            self.record_failure(id, node);
        }
        self.emit(ParseEvent::Exit {
            expr: id,
            matched,
            end: self.state.end(),
        });
        Ok(matched)
    }

    pub(super) fn emit(&mut self, event: ParseEvent) {
        if let Some(handler) = self.events.as_deref_mut() {
            handler.handle(event);
        }
    }

    fn record_failure(&mut self, id: ExprId, node: &ExprNode) {
        if !self.state.record_errors {
            return;
        }
        let eligible = node.flags.record_errors
            || matches!(node.kind, ExprKind::Token(_))
            || (self.config.record_leaf_errors
                && self.state.token_depth == 0
                && node.kind.is_leaf());
        if eligible {
            let candidate = Candidate::Expr(id);
            let position = self.state.start();
            self.errors.handle(candidate, position);
            self.emit(ParseEvent::ErrorRecorded {
                candidate,
                position,
            });
        }
    }

    fn parse_memoized(
        &mut self,
        id: ExprId,
        body: impl FnOnce(&mut Self) -> Result<bool, GroveError>,
    ) -> Result<bool, GroveError> {
        let key = ParseInputs::new(id, &self.state);
        if let Some(changeset) = self.memo.get(&key) {
            self.emit(ParseEvent::MemoHit {
                expr: id,
                position: key.start,
            });
            self.state.merge(&changeset)?;
            return Ok(changeset.matched());
        }

        let tx = self.state.begin();
        let matched = body(self)?;
        let changeset = self.state.extract(tx, matched)?;
        self.state.merge(&changeset)?;
        self.memo.memoize(key, changeset);
        Ok(matched)
    }

    fn match_leaf(&mut self, matcher: impl FnOnce(&str) -> Option<usize>) -> bool {
        let rest = self.rest();
        match matcher(rest) {
            Some(len) => {
                self.state.succeed(len);
                true
            }
            None => false,
        }
    }

    fn parse_kind(&mut self, id: ExprId, kind: &'p ExprKind) -> Result<bool, GroveError> {
        match kind {
            ExprKind::Literal(literal) => Ok(self.match_leaf(|rest| {
                rest.starts_with(literal.as_str()).then_some(literal.len())
            })),
            ExprKind::CharSet(set) => Ok(self.match_leaf(|rest| {
                rest.chars()
                    .next()
                    .filter(|&c| set.contains(c))
                    .map(char::len_utf8)
            })),
            ExprKind::Any => Ok(self.match_leaf(|rest| rest.chars().next().map(char::len_utf8))),
            ExprKind::Empty => {
                self.state.succeed(0);
                Ok(true)
            }
            ExprKind::EndOfInput => Ok(self.match_leaf(|rest| rest.is_empty().then_some(0))),
            ExprKind::Sequence(items) => self.parse_sequence(items),
            ExprKind::Choice(alternatives) => self.parse_choice(alternatives),
            ExprKind::Repeat { expr, kind } => self.parse_repeat(*expr, *kind),
            ExprKind::Until {
                body,
                terminator,
                min,
            } => self.parse_until(*body, *terminator, *min),
            ExprKind::Lookahead(expr) => self.parse_lookahead(*expr, false),
            ExprKind::Not(expr) => self.parse_lookahead(*expr, true),
            ExprKind::Capture { expr, name } => {
                self.require_tree(id)?;
                let mark = self.state.tree_len();
                let start = self.state.start();
                if !self.parse(*expr)? {
                    return Ok(false);
                }
                let span = TextRange::of(start, self.state.black_end().max(start));
                self.state.close_node(mark, name, span);
                Ok(true)
            }
            ExprKind::Label { expr, label } => {
                self.require_tree(id)?;
                let mark = self.state.tree_len();
                if !self.parse(*expr)? {
                    return Ok(false);
                }
                self.state.label_nodes(mark, label);
                Ok(true)
            }
            ExprKind::Reference(name) => Err(GroveError::UnresolvedReference { name: name.clone() }),
            ExprKind::Token(expr) => {
                self.state.token_depth += 1;
                let matched = self.parse(*expr);
                self.state.token_depth -= 1;
                if !matched? {
                    return Ok(false);
                }
                self.skip_whitespace()?;
                Ok(true)
            }
            ExprKind::Memo(expr) => {
                if self.config.enable_memoization {
                    self.parse_memoized(id, |cx| cx.parse(*expr))
                } else {
                    self.parse(*expr)
                }
            }
            ExprKind::LeftRecursive { expr, left_assoc } => {
                self.parse_left_recursive(id, *expr, *left_assoc)
            }
            ExprKind::Cluster { groups } => self.parse_cluster(id, groups),
            ExprKind::Floor { expr, precedence } => self.parse_floor(*expr, *precedence),
            ExprKind::Cut => {
                self.memo.cut(self.state.start());
                self.state.succeed(0);
                Ok(true)
            }
            ExprKind::Custom { node, operands } => node.parse(self, operands),
        }
    }

    fn require_tree(&self, id: ExprId) -> Result<(), GroveError> {
        if self.state.builds_tree() {
            Ok(())
        } else {
            Err(GroveError::unsupported("recognition", self.grammar.describe(id)))
        }
    }

    fn parse_sequence(&mut self, items: &[ExprId]) -> Result<bool, GroveError> {
        let tx = self.state.begin();
        for &item in items {
            if !self.parse(item)? {
                self.state.rollback(tx)?;
                return Ok(false);
            }
            self.state.advance();
        }
        self.state.commit(tx)?;
        Ok(true)
    }

    fn parse_choice(&mut self, alternatives: &[ExprId]) -> Result<bool, GroveError> {
        for &alternative in alternatives {
            let tx = self.state.begin();
            if self.parse(alternative)? {
                self.state.commit(tx)?;
                return Ok(true);
            }
            self.state.rollback(tx)?;
            self.stats.backtracks += 1;
            self.emit(ParseEvent::Backtrack {
                expr: alternative,
                position: self.state.start(),
            });
        }
        Ok(false)
    }

    fn parse_repeat(&mut self, expr: ExprId, kind: RepeatKind) -> Result<bool, GroveError> {
        let tx = self.state.begin();
        let mut count = 0;
        loop {
            let iteration = self.state.begin();
            if !self.parse(expr)? {
                self.state.rollback(iteration)?;
                break;
            }
            let progressed = self.state.end() > self.state.start();
            self.state.commit(iteration)?;
            self.state.advance();
            count += 1;
            if !progressed || kind == RepeatKind::Optional {
                break;
            }
        }

        if count < kind.min() {
            self.state.rollback(tx)?;
            return Ok(false);
        }
        self.state.commit(tx)?;
        Ok(true)
    }

    fn parse_until(
        &mut self,
        body: ExprId,
        terminator: ExprId,
        min: usize,
    ) -> Result<bool, GroveError> {
        let tx = self.state.begin();
        let mut count = 0;
        loop {
            if count >= min && self.parse(terminator)? {
                self.state.advance();
                self.state.commit(tx)?;
                return Ok(true);
            }
            if !self.parse(body)? || self.state.end() == self.state.start() {
                self.state.rollback(tx)?;
                return Ok(false);
            }
            self.state.advance();
            count += 1;
        }
    }

    fn parse_lookahead(&mut self, expr: ExprId, negate: bool) -> Result<bool, GroveError> {
        let record = self.state.record_errors;
        if negate {
            self.state.record_errors = false;
        }
        let tx = self.state.begin();
        let result = self.parse(expr);
        self.state.record_errors = record;

        let matched = result? != negate;
        self.state.rollback(tx)?;
        if matched {
            self.state.succeed(0);
        }
        Ok(matched)
    }

    /// Skip the grammar's whitespace after a token.
    ///
    /// Whitespace never produces tree nodes or error candidates and does not
    /// move `black_end`.
    fn skip_whitespace(&mut self) -> Result<(), GroveError> {
        let Some(whitespace) = self.grammar.whitespace() else {
            return Ok(());
        };
        let black_end = self.state.black_end();
        let tx = self.state.begin();
        self.state.advance();

        let record = mem::replace(&mut self.state.record_errors, false);
        let mark = self.state.tree_len();
        let result = self.parse(whitespace);
        self.state.record_errors = record;
        result?;

        self.state.truncate_tree(mark);
        self.state.set_black_end(black_end);
        self.state.commit(tx)
    }
}
