//! # Parsing Expression Graph
//!
//! A grammar is a directed, possibly cyclic graph of parsing expressions stored
//! in an arena and addressed by [`ExprId`] handles. Handles are stable once the
//! grammar is built, so node identity (not structural equality) keys the memo
//! table and the left-recursion seed table.
//!
//! Grammars are assembled with [`GrammarBuilder`]. Building runs two
//! preprocessing passes over the graph:
//!
//! 1. [`resolve`]: named references are replaced by their target rules
//! 2. [`left_recursion`]: left-recursive cycles are detected and their heads
//!    wrapped in [`ExprKind::LeftRecursive`] nodes
//!
//! After that the graph is closed and immutable.
//!
//! ## Example
//!
//! ```rust
//! use grove::grammar::GrammarBuilder;
//!
//! let mut b = GrammarBuilder::new();
//! let a = b.literal("a");
//! let rec = b.reference("A");
//! let grow = b.sequence([rec, a]);
//! let body = b.choice([grow, a]);
//! b.rule("A", body);
//! b.root(body);
//!
//! let grammar = b.build().expect("valid grammar");
//! assert!(grammar.is_left_recursive(grammar.rule("A").unwrap()));
//! ```

mod builder;
pub mod left_recursion;
pub mod resolve;
pub mod visit;

pub use builder::GrammarBuilder;

use crate::error::GrammarError;
use crate::parse::CustomExpr;
use compact_str::CompactString;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::fmt::{self, Write};
use std::sync::Arc;

/// Opaque handle to an expression in a grammar arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExprId(u32);

impl ExprId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-node flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExprFlags {
    /// Failure of this node is reported as an error candidate
    pub record_errors: bool,
}

/// Repetition flavour of [`ExprKind::Repeat`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatKind {
    Optional,
    ZeroOrMore,
    OneOrMore,
}

impl RepeatKind {
    #[must_use]
    pub const fn min(self) -> usize {
        match self {
            Self::Optional | Self::ZeroOrMore => 0,
            Self::OneOrMore => 1,
        }
    }

    const fn suffix(self) -> char {
        match self {
            Self::Optional => '?',
            Self::ZeroOrMore => '*',
            Self::OneOrMore => '+',
        }
    }
}

/// A set of characters given as inclusive ranges, optionally negated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharSet {
    ranges: SmallVec<[(char, char); 4]>,
    negated: bool,
}

impl CharSet {
    /// Inclusive range `start..=end`. Reversed ranges are rejected at build time.
    #[must_use]
    pub fn range(start: char, end: char) -> Self {
        Self {
            ranges: SmallVec::from_elem((start, end), 1),
            negated: false,
        }
    }

    /// Every character of `chars`.
    #[must_use]
    pub fn one_of(chars: &str) -> Self {
        Self {
            ranges: chars.chars().map(|c| (c, c)).collect(),
            negated: false,
        }
    }

    #[must_use]
    pub fn with_range(mut self, start: char, end: char) -> Self {
        self.ranges.push((start, end));
        self
    }

    #[must_use]
    pub fn negated(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    #[must_use]
    pub fn contains(&self, c: char) -> bool {
        let hit = self.ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi);
        hit != self.negated
    }

    pub(crate) fn validate(&self) -> Result<(), GrammarError> {
        match self.ranges.iter().find(|(lo, hi)| lo > hi) {
            Some(&(start, end)) => Err(GrammarError::InvalidCharRange { start, end }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('[')?;
        if self.negated {
            f.write_char('^')?;
        }
        for &(lo, hi) in &self.ranges {
            if lo == hi {
                write!(f, "{}", lo.escape_debug())?;
            } else {
                write!(f, "{}-{}", lo.escape_debug(), hi.escape_debug())?;
            }
        }
        f.write_char(']')
    }
}

/// One precedence level of a [`ExprKind::Cluster`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub precedence: i32,
    /// Alternatives may start with a recursive call to the cluster
    pub left_recursive: bool,
    pub left_assoc: bool,
    pub alternatives: Vec<ExprId>,
}

impl Group {
    /// A non-recursive group (atoms, prefix operators).
    #[must_use]
    pub fn new(precedence: i32, alternatives: impl IntoIterator<Item = ExprId>) -> Self {
        Self {
            precedence,
            left_recursive: false,
            left_assoc: false,
            alternatives: alternatives.into_iter().collect(),
        }
    }

    /// Left-recursive, left-associative (`a - b - c` is `(a - b) - c`).
    #[must_use]
    pub fn left(precedence: i32, alternatives: impl IntoIterator<Item = ExprId>) -> Self {
        Self {
            left_recursive: true,
            left_assoc: true,
            ..Self::new(precedence, alternatives)
        }
    }

    /// Left-recursive, right-associative (`a ^ b ^ c` is `a ^ (b ^ c)`).
    #[must_use]
    pub fn right(precedence: i32, alternatives: impl IntoIterator<Item = ExprId>) -> Self {
        Self {
            left_recursive: true,
            ..Self::new(precedence, alternatives)
        }
    }
}

/// Kind-specific data of a parsing expression.
#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(CompactString),
    CharSet(CharSet),
    /// Any single character
    Any,
    /// Always matches, consuming nothing
    Empty,
    EndOfInput,
    Sequence(Vec<ExprId>),
    /// Ordered choice: the first matching alternative wins
    Choice(Vec<ExprId>),
    Repeat {
        expr: ExprId,
        kind: RepeatKind,
    },
    /// Repeat `body` until `terminator` matches, with at least `min` bodies
    Until {
        body: ExprId,
        terminator: ExprId,
        min: usize,
    },
    Lookahead(ExprId),
    Not(ExprId),
    Capture {
        expr: ExprId,
        name: CompactString,
    },
    Label {
        expr: ExprId,
        label: CompactString,
    },
    /// Named placeholder, replaced by its target while building
    Reference(CompactString),
    /// Atomic unit followed by whitespace; an error candidate on failure
    Token(ExprId),
    /// Explicit memoization point
    Memo(ExprId),
    LeftRecursive {
        expr: ExprId,
        left_assoc: bool,
    },
    /// Precedence groups, highest precedence first
    Cluster {
        groups: Vec<Group>,
    },
    /// Parse `expr` with a minimum precedence floor, ignoring enclosing clusters
    Floor {
        expr: ExprId,
        precedence: i32,
    },
    /// Commit point: memo entries behind this position are no longer needed
    Cut,
    Custom {
        node: Arc<dyn CustomExpr>,
        operands: Vec<ExprId>,
    },
}

impl ExprKind {
    /// Direct operands in evaluation order.
    #[must_use]
    pub fn children(&self) -> SmallVec<[ExprId; 4]> {
        match self {
            Self::Literal(_)
            | Self::CharSet(_)
            | Self::Any
            | Self::Empty
            | Self::EndOfInput
            | Self::Reference(_)
            | Self::Cut => SmallVec::new(),
            Self::Sequence(items) | Self::Choice(items) => items.iter().copied().collect(),
            Self::Repeat { expr, .. }
            | Self::Lookahead(expr)
            | Self::Not(expr)
            | Self::Capture { expr, .. }
            | Self::Label { expr, .. }
            | Self::Token(expr)
            | Self::Memo(expr)
            | Self::LeftRecursive { expr, .. }
            | Self::Floor { expr, .. } => smallvec::smallvec![*expr],
            Self::Until {
                body, terminator, ..
            } => smallvec::smallvec![*body, *terminator],
            Self::Cluster { groups } => groups
                .iter()
                .flat_map(|group| group.alternatives.iter().copied())
                .collect(),
            Self::Custom { operands, .. } => operands.iter().copied().collect(),
        }
    }

    /// Mutable access to the `index`th operand, in [`children`](Self::children) order.
    pub(crate) fn child_mut(&mut self, index: usize) -> Option<&mut ExprId> {
        match self {
            Self::Sequence(items) | Self::Choice(items) => items.get_mut(index),
            Self::Custom { operands, .. } => operands.get_mut(index),
            Self::Repeat { expr, .. }
            | Self::Lookahead(expr)
            | Self::Not(expr)
            | Self::Capture { expr, .. }
            | Self::Label { expr, .. }
            | Self::Token(expr)
            | Self::Memo(expr)
            | Self::LeftRecursive { expr, .. }
            | Self::Floor { expr, .. } => (index == 0).then_some(expr),
            Self::Until {
                body, terminator, ..
            } => match index {
                0 => Some(body),
                1 => Some(terminator),
                _ => None,
            },
            Self::Cluster { groups } => groups
                .iter_mut()
                .flat_map(|group| group.alternatives.iter_mut())
                .nth(index),
            _ => None,
        }
    }

    /// Leaves match characters directly and never contain other expressions.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(
            self,
            Self::Literal(_) | Self::CharSet(_) | Self::Any | Self::EndOfInput
        )
    }
}

/// A node of the expression graph.
#[derive(Debug, Clone)]
pub struct ExprNode {
    pub kind: ExprKind,
    /// Rule or display name
    pub name: Option<CompactString>,
    pub flags: ExprFlags,
}

impl ExprNode {
    pub(crate) const fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            name: None,
            flags: ExprFlags {
                record_errors: false,
            },
        }
    }
}

/// Node storage shared by the builder and the preprocessing passes.
#[derive(Debug, Clone, Default)]
pub(crate) struct Arena {
    nodes: Vec<ExprNode>,
}

impl Arena {
    pub(crate) fn push(&mut self, node: ExprNode) -> ExprId {
        let id = ExprId::new(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub(crate) fn get(&self, id: ExprId) -> Option<&ExprNode> {
        self.nodes.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: ExprId) -> Option<&mut ExprNode> {
        self.nodes.get_mut(id.index())
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = ExprId> + use<> {
        (0..self.nodes.len()).map(ExprId::new)
    }

    pub(crate) fn nodes(&self) -> &[ExprNode] {
        &self.nodes
    }
}

impl visit::Graph for Arena {
    type Node = ExprId;

    fn children(&self, node: ExprId) -> SmallVec<[ExprId; 4]> {
        self.get(node)
            .map(|n| n.kind.children())
            .unwrap_or_default()
    }

    fn set_child(&mut self, parent: ExprId, index: usize, child: ExprId) {
        if let Some(slot) = self
            .get_mut(parent)
            .and_then(|node| node.kind.child_mut(index))
        {
            *slot = child;
        }
    }
}

/// A closed, preprocessed expression graph.
///
/// Immutable once built; any number of parses may read it concurrently.
#[derive(Debug, Clone)]
pub struct Grammar {
    arena: Arena,
    rules: HashMap<CompactString, ExprId, ahash::RandomState>,
    rule_order: Vec<CompactString>,
    root: ExprId,
    whitespace: Option<ExprId>,
}

impl Grammar {
    /// Entry expression of every parse.
    #[must_use]
    pub const fn root(&self) -> ExprId {
        self.root
    }

    /// Expression skipped after every token.
    #[must_use]
    pub const fn whitespace(&self) -> Option<ExprId> {
        self.whitespace
    }

    /// Look up a rule by name.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<ExprId> {
        self.rules.get(name).copied()
    }

    /// Rule names in definition order.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rule_order.iter().map(CompactString::as_str)
    }

    /// The node behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this grammar's builder.
    #[must_use]
    pub fn node(&self, id: ExprId) -> &ExprNode {
        &self.arena.nodes()[id.index()]
    }

    /// Number of nodes in the arena, including nodes made unreachable by
    /// preprocessing.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }

    #[must_use]
    pub fn is_left_recursive(&self, id: ExprId) -> bool {
        matches!(self.node(id).kind, ExprKind::LeftRecursive { .. })
    }

    /// Short human-readable description, used in error messages.
    ///
    /// Named nodes print as their name; anonymous composites print their
    /// structure down to a small depth.
    #[must_use]
    pub fn describe(&self, id: ExprId) -> String {
        let mut out = String::new();
        self.describe_into(id, 0, &mut out);
        out
    }

    /// Render every rule as `name = body`, in definition order.
    #[must_use]
    pub fn display_rules(&self) -> String {
        let mut out = String::new();
        for name in &self.rule_order {
            let Some(&id) = self.rules.get(name) else {
                continue;
            };
            let _ = write!(out, "{name} = ");
            self.describe_kind(id, 0, &mut out);
            out.push('\n');
        }
        out
    }

    fn describe_into(&self, id: ExprId, depth: usize, out: &mut String) {
        match &self.node(id).name {
            Some(name) => out.push_str(name),
            None => self.describe_kind(id, depth, out),
        }
    }

    fn describe_kind(&self, id: ExprId, depth: usize, out: &mut String) {
        const MAX_DEPTH: usize = 3;

        if depth > MAX_DEPTH {
            out.push_str("...");
            return;
        }
        let depth = depth + 1;
        let list = |items: &[ExprId], sep: &str, out: &mut String| {
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(sep);
                }
                self.describe_into(*item, depth, out);
            }
            out.push(')');
        };

        match &self.node(id).kind {
            ExprKind::Literal(text) => {
                let _ = write!(out, "{text:?}");
            }
            ExprKind::CharSet(set) => {
                let _ = write!(out, "{set}");
            }
            ExprKind::Any => out.push_str("any character"),
            ExprKind::Empty => out.push_str("empty"),
            ExprKind::EndOfInput => out.push_str("end of input"),
            ExprKind::Sequence(items) => list(items, " ", out),
            ExprKind::Choice(items) => list(items, " / ", out),
            ExprKind::Repeat { expr, kind } => {
                self.describe_into(*expr, depth, out);
                out.push(kind.suffix());
            }
            ExprKind::Until {
                body, terminator, ..
            } => {
                self.describe_into(*body, depth, out);
                out.push_str(" until ");
                self.describe_into(*terminator, depth, out);
            }
            ExprKind::Lookahead(expr) => {
                out.push('&');
                self.describe_into(*expr, depth, out);
            }
            ExprKind::Not(expr) => {
                out.push('!');
                self.describe_into(*expr, depth, out);
            }
            ExprKind::Capture { name, .. } => {
                let _ = write!(out, "capture `{name}`");
            }
            ExprKind::Label { expr, label } => {
                let _ = write!(out, "{label}:");
                self.describe_into(*expr, depth, out);
            }
            ExprKind::Reference(name) => {
                let _ = write!(out, "<{name}>");
            }
            ExprKind::Token(expr)
            | ExprKind::Memo(expr)
            | ExprKind::LeftRecursive { expr, .. }
            | ExprKind::Floor { expr, .. } => self.describe_into(*expr, depth, out),
            ExprKind::Cluster { groups } => {
                out.push_str("cluster");
                for group in groups {
                    let _ = write!(out, " {}:", group.precedence);
                    list(&group.alternatives, " / ", out);
                }
            }
            ExprKind::Cut => out.push_str("cut"),
            ExprKind::Custom { node, .. } => out.push_str(node.name()),
        }
    }
}
