//! # Error Reporting
//!
//! Farthest-failure strategy: the most useful error is the one reached
//! furthest into the input. Every error-eligible failure is reported with its
//! position; a later position replaces the candidate set, an equal position
//! adds to it, an earlier one is ignored.
//!
//! Record points isolate the bookkeeping of a nested region (a seed-growing
//! loop) and fold it back into the enclosing region when dismissed. The
//! [`ErrorHandler`] hooks exist for strategies that rank failures by region.
//! For [`FarthestFailure`] folding is order-independent, so a region boundary
//! is purely structural: the report is the same with or without it.

use crate::error::diagnostics::{did_you_mean, render_snippet, word_at};
use crate::error::{SyntaxError, format_expected_list};
use crate::grammar::{ExprId, Grammar};
use crate::source::{LineCol, Source};
use crate::text::TextRange;
use smallvec::SmallVec;
use std::fmt::{self, Write};

/// Something that could have matched at the error position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Candidate {
    Expr(ExprId),
    /// Input remained after the root matched
    EndOfInput,
}

impl Candidate {
    #[must_use]
    pub fn describe(self, grammar: &Grammar) -> String {
        match self {
            Self::Expr(id) => grammar.describe(id),
            Self::EndOfInput => "end of input".to_string(),
        }
    }
}

/// Error bookkeeping strategy.
pub trait ErrorHandler {
    /// An eligible expression failed at `position`.
    fn handle(&mut self, candidate: Candidate, position: usize);

    /// Open a nested bookkeeping region.
    fn request_record_point(&mut self);

    /// Close the innermost region, folding it into its parent.
    fn dismiss_record_point(&mut self);

    /// Farthest failure position recorded so far.
    fn farthest(&self) -> Option<usize>;

    /// Candidates at the farthest position, in recording order.
    fn candidates(&self) -> Vec<Candidate>;

    /// Render the current state.
    fn report(&self, grammar: &Grammar, source: &Source) -> ErrorReport {
        ErrorReport::new(grammar, source, self.farthest(), &self.candidates())
    }
}

#[derive(Debug, Default, Clone)]
struct Checkpoint {
    position: Option<usize>,
    candidates: SmallVec<[Candidate; 4]>,
}

impl Checkpoint {
    fn record(&mut self, candidate: Candidate, position: usize) {
        match self.position {
            Some(best) if position < best => {}
            Some(best) if position == best => {
                if !self.candidates.contains(&candidate) {
                    self.candidates.push(candidate);
                }
            }
            _ => {
                self.position = Some(position);
                self.candidates.clear();
                self.candidates.push(candidate);
            }
        }
    }

    fn absorb(&mut self, other: Self) {
        if let Some(position) = other.position {
            for candidate in other.candidates {
                self.record(candidate, position);
            }
        }
    }
}

/// Farthest-failure [`ErrorHandler`].
///
/// Each record point gets its own checkpoint; queries fold the whole
/// stack, so open regions never hide candidates from [`ErrorHandler::report`].
#[derive(Debug, Clone)]
pub struct FarthestFailure {
    /// Root region first; never empty
    stack: Vec<Checkpoint>,
}

impl FarthestFailure {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stack: vec![Checkpoint::default()],
        }
    }

    fn merged(&self) -> Checkpoint {
        let mut all = Checkpoint::default();
        for checkpoint in &self.stack {
            all.absorb(checkpoint.clone());
        }
        all
    }
}

impl Default for FarthestFailure {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorHandler for FarthestFailure {
    fn handle(&mut self, candidate: Candidate, position: usize) {
        if let Some(top) = self.stack.last_mut() {
            top.record(candidate, position);
        }
    }

    fn request_record_point(&mut self) {
        self.stack.push(Checkpoint::default());
    }

    fn dismiss_record_point(&mut self) {
        if self.stack.len() > 1
            && let Some(top) = self.stack.pop()
            && let Some(parent) = self.stack.last_mut()
        {
            parent.absorb(top);
        }
    }

    fn farthest(&self) -> Option<usize> {
        self.merged().position
    }

    fn candidates(&self) -> Vec<Candidate> {
        self.merged().candidates.into_vec()
    }
}

/// Rendered farthest-failure information.
///
/// Always available; after a successful parse it describes zero candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub position: usize,
    pub line_col: LineCol,
    /// Sorted, de-duplicated candidate descriptions
    pub expected: Vec<String>,
    /// Word (or character) found at the error position, `None` at end of input
    pub found: Option<String>,
    pub suggestion: Option<String>,
}

impl ErrorReport {
    /// Report with no candidates.
    #[must_use]
    pub fn none(source: &Source) -> Self {
        Self::new_unchecked(source, 0, Vec::new())
    }

    /// Build a report from the farthest position and its candidates.
    #[must_use]
    pub fn new(
        grammar: &Grammar,
        source: &Source,
        position: Option<usize>,
        candidates: &[Candidate],
    ) -> Self {
        let mut expected: Vec<String> = candidates
            .iter()
            .map(|candidate| candidate.describe(grammar))
            .collect();
        expected.sort();
        expected.dedup();
        Self::new_unchecked(source, position.unwrap_or(0), expected)
    }

    fn new_unchecked(source: &Source, position: usize, expected: Vec<String>) -> Self {
        let position = position.min(source.len());
        let found = Some(word_at(source.text(), position))
            .filter(|word| !word.is_empty())
            .map(str::to_string);
        let literals: Vec<String> = expected
            .iter()
            .filter(|e| e.starts_with('"'))
            .cloned()
            .collect();
        let suggestion = found
            .as_deref()
            .and_then(|word| did_you_mean(word, &literals));

        Self {
            position,
            line_col: source.position(position),
            expected,
            found,
            suggestion,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expected.is_empty()
    }

    /// Convert into the public diagnostic type.
    #[must_use]
    pub fn to_syntax_error(&self) -> SyntaxError {
        let found_len = self.found.as_ref().map_or(0, String::len);
        SyntaxError {
            span: TextRange::of(self.position, self.position + found_len),
            position: self.line_col,
            expected: self.expected.clone(),
            suggestion: self.suggestion.clone(),
        }
    }

    /// Multi-line rendering with the offending line and a caret.
    #[must_use]
    pub fn render(&self, source: &Source) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "error: {self}");
        out.push_str(&render_snippet(source, self.position));
        if let Some(suggestion) = &self.suggestion {
            let _ = write!(out, "\n  = help: did you mean {suggestion}?");
        }
        out
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("no syntax errors");
        }
        write!(
            f,
            "expected {} at {}",
            format_expected_list(&self.expected),
            self.line_col
        )?;
        match &self.found {
            Some(found) => write!(f, ", found {found:?}"),
            None => f.write_str(", found end of input"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: usize) -> Candidate {
        Candidate::Expr(ExprId::new(n))
    }

    #[test]
    fn test_farthest_position_wins() {
        let mut errors = FarthestFailure::new();
        errors.handle(id(0), 3);
        errors.handle(id(1), 1);
        errors.handle(id(2), 3);
        assert_eq!(errors.farthest(), Some(3));
        assert_eq!(errors.candidates(), [id(0), id(2)]);

        errors.handle(id(3), 5);
        assert_eq!(errors.candidates(), [id(3)]);
    }

    #[test]
    fn test_record_points_merge_into_parent() {
        let mut errors = FarthestFailure::new();
        errors.handle(id(0), 2);
        errors.request_record_point();
        errors.handle(id(1), 2);
        errors.handle(id(2), 1);
        assert_eq!(errors.candidates(), [id(0), id(1)]);

        errors.dismiss_record_point();
        assert_eq!(errors.farthest(), Some(2));
        assert_eq!(errors.candidates(), [id(0), id(1)]);

        // The root region is never popped.
        errors.dismiss_record_point();
        assert_eq!(errors.farthest(), Some(2));
    }

    #[test]
    fn test_record_points_do_not_change_the_report() {
        let failures = [(0, 4), (1, 2), (2, 4), (3, 1), (4, 4)];

        let mut flat = FarthestFailure::new();
        for (candidate, position) in failures {
            flat.handle(id(candidate), position);
        }

        let mut scoped = FarthestFailure::new();
        for (index, (candidate, position)) in failures.into_iter().enumerate() {
            if index % 2 == 0 {
                scoped.request_record_point();
            }
            scoped.handle(id(candidate), position);
        }
        assert_eq!(scoped.farthest(), flat.farthest());
        assert_eq!(scoped.candidates(), flat.candidates());

        for _ in 0..3 {
            scoped.dismiss_record_point();
        }
        assert_eq!(scoped.candidates(), [id(0), id(2), id(4)]);
        assert_eq!(scoped.candidates(), flat.candidates());
    }

    #[test]
    fn test_empty_report() {
        let source = Source::new("abc");
        let report = ErrorReport::none(&source);
        assert!(report.is_empty());
        assert_eq!(report.to_string(), "no syntax errors");
    }
}
