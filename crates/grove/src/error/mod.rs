//! # Error Types
//!
//! The engine distinguishes three classes of failure:
//!
//! - **Mismatch**: an expression did not match. This is the `false` result of
//!   evaluation and drives backtracking; it never allocates an error.
//! - **Syntax errors**: farthest-failure information collected while parsing,
//!   surfaced as a [`SyntaxError`] only when the whole parse fails.
//! - **Fatal errors**: contract violations ([`GroveError`]) that abort the
//!   parse and propagate to the caller of [`Parser::parse`](crate::Parser::parse).
//!
//! Grammar construction problems are reported as [`GrammarError`].
//!
//! ## Diagnostics Support
//!
//! When the `diagnostics` feature is enabled, errors integrate with [`miette`]
//! for rich error reporting with source code snippets.

pub mod diagnostics;

use crate::source::LineCol;
use crate::text::TextRange;
use compact_str::CompactString;
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// Fatal error: the parse is aborted instead of backtracking.
#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum GroveError {
    #[error("reference to `{name}` reached while parsing; the grammar is not closed")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::unresolved_reference)))]
    UnresolvedReference { name: CompactString },

    #[error("{operation} is not supported by {expr}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::unsupported_operation)))]
    UnsupportedOperation {
        operation: &'static str,
        expr: String,
    },

    #[error("transaction resolved out of order: open depth is {open}, transaction depth is {found}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(grove::transaction_order),
            help("transactions must be committed or rolled back in LIFO order")
        )
    )]
    TransactionOrder { open: usize, found: usize },

    #[error("no custom state is registered in slot {slot}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::unknown_slot)))]
    UnknownSlot { slot: usize },

    #[error("custom state in slot {slot} is not a `{expected}`")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::slot_type_mismatch)))]
    SlotTypeMismatch { slot: usize, expected: &'static str },

    #[error("extension `{name}` failed: {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::extension)))]
    Extension { name: CompactString, message: String },

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Grammar(#[from] GrammarError),
}

impl GroveError {
    /// Create an unsupported operation error
    #[must_use]
    pub fn unsupported(operation: &'static str, expr: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation,
            expr: expr.into(),
        }
    }

    /// Create an extension failure
    #[must_use]
    pub fn extension(name: impl Into<CompactString>, message: impl Into<String>) -> Self {
        Self::Extension {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Error raised while building or preprocessing a grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum GrammarError {
    #[error("undefined rule `{name}`")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::undefined_rule)))]
    UndefinedRule { name: CompactString },

    #[error("rule `{name}` is defined more than once")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::duplicate_rule)))]
    DuplicateRule { name: CompactString },

    #[error("grammar has no root expression")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(code(grammar::missing_root), help("call `GrammarBuilder::root`"))
    )]
    MissingRoot,

    #[error("cluster `{cluster}` has no groups")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::empty_cluster)))]
    EmptyCluster { cluster: String },

    #[error(
        "cluster `{cluster}` lists precedence {next} after {previous}; groups must go from highest to lowest"
    )]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::cluster_order)))]
    ClusterOrder {
        cluster: String,
        previous: i32,
        next: i32,
    },

    #[error("invalid character range {start:?}-{end:?}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::char_range)))]
    InvalidCharRange { start: char, end: char },

    #[error("rule `{name}` is defined only through a cycle of references")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::reference_cycle)))]
    ReferenceCycle { name: CompactString },

    #[error("expression handle {index} does not belong to this grammar")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::foreign_handle)))]
    ForeignHandle { index: usize },
}

/// Failed parse, located at the farthest position any candidate failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[cfg_attr(feature = "diagnostics", diagnostic(code(grove::syntax)))]
#[error("syntax error at {position}: expected {}", format_expected_list(.expected))]
pub struct SyntaxError {
    #[cfg_attr(feature = "diagnostics", label("unexpected input"))]
    pub span: TextRange,
    pub position: LineCol,
    /// Descriptions of the expressions that could have matched here
    pub expected: Vec<String>,
    /// Similar candidate to the word found at the error, if any
    #[cfg_attr(feature = "diagnostics", help)]
    pub suggestion: Option<String>,
}

/// Format a list of expected candidates as `a`, `a or b`, `a, b, or c`.
#[must_use]
pub fn format_expected_list(expected: &[String]) -> String {
    match expected {
        [] => "nothing".to_string(),
        [only] => only.clone(),
        [first, second] => format!("{first} or {second}"),
        [init @ .., last] => format!("{}, or {last}", init.join(", ")),
    }
}
