//! Parse trees produced by capture expressions.
//!
//! Only `Capture` expressions create nodes; everything else is structural. A
//! capture gathers the nodes its operand produced as children, so the tree
//! mirrors capture nesting rather than grammar nesting.

use crate::source::Source;
use crate::text::TextRange;
use compact_str::CompactString;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// A node of the parse tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ParseNode {
    /// Capture name that produced this node
    pub kind: CompactString,
    /// Field label set by an enclosing `Label` expression
    pub label: Option<CompactString>,
    /// Matched span, trailing whitespace excluded
    pub span: TextRange,
    pub children: Vec<ParseNode>,
}

impl ParseNode {
    #[must_use]
    pub fn new(kind: impl Into<CompactString>, span: TextRange, children: Vec<Self>) -> Self {
        Self {
            kind: kind.into(),
            label: None,
            span,
            children,
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Text covered by this node.
    #[must_use]
    pub fn text<'s>(&self, source: &'s Source) -> &'s str {
        self.span.slice(source.text()).unwrap_or_default()
    }

    /// First direct child carrying `label`.
    #[must_use]
    pub fn child_by_label(&self, label: &str) -> Option<&Self> {
        self.children
            .iter()
            .find(|child| child.label.as_deref() == Some(label))
    }

    /// Pre-order iterator over this node and all of its descendants.
    pub fn descendants(&self) -> impl Iterator<Item = &Self> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Compact rendering: leaves print as their text, inner nodes as
    /// `kind(child, child)`.
    ///
    /// `1+2*3` under an arithmetic grammar renders as `add(1, mul(2, 3))`.
    #[must_use]
    pub fn render(&self, source: &Source) -> String {
        let mut out = String::new();
        self.render_into(source, &mut out);
        out
    }

    fn render_into(&self, source: &Source, out: &mut String) {
        if self.is_leaf() {
            out.push_str(self.text(source));
            return;
        }
        out.push_str(&self.kind);
        out.push('(');
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            child.render_into(source, out);
        }
        out.push(')');
    }

    /// Indented multi-line dump with spans and leaf text.
    #[must_use]
    pub fn pretty(&self, source: &Source) -> String {
        let mut out = String::new();
        self.pretty_into(source, 0, &mut out);
        out
    }

    fn pretty_into(&self, source: &Source, depth: usize, out: &mut String) {
        let _ = write!(out, "{:indent$}{}", "", self.kind, indent = depth * 2);
        if let Some(label) = &self.label {
            let _ = write!(out, " [{label}]");
        }
        let _ = write!(out, " @{}", self.span);
        if self.is_leaf() {
            let _ = write!(out, " {:?}", self.text(source));
        }
        out.push('\n');
        for child in &self.children {
            child.pretty_into(source, depth + 1, out);
        }
    }
}

/// Render a forest of top-level nodes, comma separated.
#[must_use]
pub fn render_all(nodes: &[ParseNode], source: &Source) -> String {
    nodes
        .iter()
        .map(|node| node.render(source))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Stack of completed nodes at the current nesting level.
///
/// A capture remembers the stack height on entry and, on success, folds every
/// node pushed since into a single parent.
#[derive(Debug, Default, Clone)]
pub(crate) struct TreeBuilder {
    nodes: Vec<ParseNode>,
}

impl TreeBuilder {
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn truncate(&mut self, mark: usize) {
        self.nodes.truncate(mark);
    }

    pub(crate) fn push(&mut self, node: ParseNode) {
        self.nodes.push(node);
    }

    pub(crate) fn extend_from_slice(&mut self, nodes: &[ParseNode]) {
        self.nodes.extend_from_slice(nodes);
    }

    pub(crate) fn split_off(&mut self, mark: usize) -> Vec<ParseNode> {
        self.nodes.split_off(mark.min(self.nodes.len()))
    }

    /// Fold everything above `mark` into one node.
    pub(crate) fn close(&mut self, mark: usize, kind: &CompactString, span: TextRange) {
        let children = self.split_off(mark);
        self.nodes.push(ParseNode::new(kind.clone(), span, children));
    }

    /// Label every top-level node pushed since `mark`.
    pub(crate) fn label_from(&mut self, mark: usize, label: &CompactString) {
        for node in self.nodes.iter_mut().skip(mark) {
            node.label = Some(label.clone());
        }
    }

    pub(crate) fn finish(self) -> Vec<ParseNode> {
        self.nodes
    }
}
