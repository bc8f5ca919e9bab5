use super::left_recursion::detect_left_recursion;
use super::resolve::resolve_references;
use super::{Arena, CharSet, ExprId, ExprKind, ExprNode, Grammar, Group, RepeatKind};
use crate::error::GrammarError;
use crate::parse::CustomExpr;
use compact_str::CompactString;
use hashbrown::HashMap;
use std::sync::Arc;

/// Builder for [`Grammar`].
///
/// Every constructor allocates a node in the arena and returns its handle.
/// Recursive rules are written with [`reference`](Self::reference), which is
/// resolved by [`build`](Self::build).
///
/// # Example
///
/// ```rust
/// use grove::grammar::{CharSet, Group, GrammarBuilder};
///
/// let mut b = GrammarBuilder::new();
/// let digit = b.char_set(CharSet::range('0', '9'));
/// let digits = b.one_or_more(digit);
/// let num = b.capture("num", digits);
///
/// let expr = b.reference("Expr");
/// let plus = b.literal("+");
/// let add = b.sequence([expr, plus, expr]);
/// let add = b.capture("add", add);
///
/// let cluster = b.cluster([Group::left(1, [add]), Group::new(2, [num])]);
/// b.rule("Expr", cluster);
/// b.root(cluster);
///
/// let grammar = b.build().expect("valid grammar");
/// assert_eq!(grammar.rule("Expr"), Some(cluster));
/// ```
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    arena: Arena,
    rules: Vec<(CompactString, ExprId)>,
    root: Option<ExprId>,
    whitespace: Option<ExprId>,
}

impl GrammarBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: ExprKind) -> ExprId {
        self.arena.push(ExprNode::new(kind))
    }

    pub fn literal(&mut self, text: impl Into<CompactString>) -> ExprId {
        self.push(ExprKind::Literal(text.into()))
    }

    pub fn char_set(&mut self, set: CharSet) -> ExprId {
        self.push(ExprKind::CharSet(set))
    }

    pub fn char_range(&mut self, start: char, end: char) -> ExprId {
        self.char_set(CharSet::range(start, end))
    }

    pub fn any(&mut self) -> ExprId {
        self.push(ExprKind::Any)
    }

    pub fn empty(&mut self) -> ExprId {
        self.push(ExprKind::Empty)
    }

    pub fn end_of_input(&mut self) -> ExprId {
        self.push(ExprKind::EndOfInput)
    }

    pub fn sequence(&mut self, items: impl IntoIterator<Item = ExprId>) -> ExprId {
        self.push(ExprKind::Sequence(items.into_iter().collect()))
    }

    pub fn choice(&mut self, alternatives: impl IntoIterator<Item = ExprId>) -> ExprId {
        self.push(ExprKind::Choice(alternatives.into_iter().collect()))
    }

    pub fn optional(&mut self, expr: ExprId) -> ExprId {
        self.repeat(expr, RepeatKind::Optional)
    }

    pub fn zero_or_more(&mut self, expr: ExprId) -> ExprId {
        self.repeat(expr, RepeatKind::ZeroOrMore)
    }

    pub fn one_or_more(&mut self, expr: ExprId) -> ExprId {
        self.repeat(expr, RepeatKind::OneOrMore)
    }

    pub fn repeat(&mut self, expr: ExprId, kind: RepeatKind) -> ExprId {
        self.push(ExprKind::Repeat { expr, kind })
    }

    /// Repeat `body` until `terminator` matches; the terminator is consumed.
    pub fn until(&mut self, body: ExprId, terminator: ExprId, min: usize) -> ExprId {
        self.push(ExprKind::Until {
            body,
            terminator,
            min,
        })
    }

    pub fn lookahead(&mut self, expr: ExprId) -> ExprId {
        self.push(ExprKind::Lookahead(expr))
    }

    pub fn not(&mut self, expr: ExprId) -> ExprId {
        self.push(ExprKind::Not(expr))
    }

    /// Wrap the nodes produced by `expr` into a single `name` node.
    pub fn capture(&mut self, name: impl Into<CompactString>, expr: ExprId) -> ExprId {
        self.push(ExprKind::Capture {
            expr,
            name: name.into(),
        })
    }

    /// Set the field label of every top-level node produced by `expr`.
    pub fn label(&mut self, label: impl Into<CompactString>, expr: ExprId) -> ExprId {
        self.push(ExprKind::Label {
            expr,
            label: label.into(),
        })
    }

    pub fn reference(&mut self, name: impl Into<CompactString>) -> ExprId {
        self.push(ExprKind::Reference(name.into()))
    }

    pub fn token(&mut self, expr: ExprId) -> ExprId {
        self.push(ExprKind::Token(expr))
    }

    pub fn memo(&mut self, expr: ExprId) -> ExprId {
        self.push(ExprKind::Memo(expr))
    }

    /// Explicit left-recursive wrapper. Left recursion is also detected
    /// automatically; use this for left-associative rules.
    pub fn left_recursive(&mut self, expr: ExprId, left_assoc: bool) -> ExprId {
        self.push(ExprKind::LeftRecursive { expr, left_assoc })
    }

    /// Precedence cluster. Groups must be listed from highest to lowest precedence.
    pub fn cluster(&mut self, groups: impl IntoIterator<Item = Group>) -> ExprId {
        self.push(ExprKind::Cluster {
            groups: groups.into_iter().collect(),
        })
    }

    pub fn floor(&mut self, expr: ExprId, precedence: i32) -> ExprId {
        self.push(ExprKind::Floor { expr, precedence })
    }

    pub fn cut(&mut self) -> ExprId {
        self.push(ExprKind::Cut)
    }

    pub fn custom(
        &mut self,
        node: Arc<dyn CustomExpr>,
        operands: impl IntoIterator<Item = ExprId>,
    ) -> ExprId {
        self.push(ExprKind::Custom {
            node,
            operands: operands.into_iter().collect(),
        })
    }

    /// Give `expr` a display name without making it a rule.
    pub fn name(&mut self, expr: ExprId, name: impl Into<CompactString>) -> &mut Self {
        if let Some(node) = self.arena.get_mut(expr) {
            node.name = Some(name.into());
        }
        self
    }

    /// Report failures of `expr` as error candidates.
    pub fn record_errors(&mut self, expr: ExprId) -> &mut Self {
        if let Some(node) = self.arena.get_mut(expr) {
            node.flags.record_errors = true;
        }
        self
    }

    /// Define rule `name` as `expr`. An unnamed `expr` takes the rule's name.
    pub fn rule(&mut self, name: impl Into<CompactString>, expr: ExprId) -> &mut Self {
        let name = name.into();
        if let Some(node) = self.arena.get_mut(expr)
            && node.name.is_none()
            && !matches!(node.kind, ExprKind::Reference(_))
        {
            node.name = Some(name.clone());
        }
        self.rules.push((name, expr));
        self
    }

    pub fn root(&mut self, expr: ExprId) -> &mut Self {
        self.root = Some(expr);
        self
    }

    /// Expression skipped after every token.
    pub fn whitespace(&mut self, expr: ExprId) -> &mut Self {
        self.whitespace = Some(expr);
        self
    }

    /// Validate, resolve references and detect left recursion.
    ///
    /// # Errors
    ///
    /// Returns a [`GrammarError`] for a missing root, duplicate or undefined
    /// rules, malformed clusters and character ranges, and handles that were
    /// not produced by this builder.
    pub fn build(self) -> Result<Grammar, GrammarError> {
        let Self {
            mut arena,
            rules: rule_list,
            root,
            whitespace,
        } = self;
        let root = root.ok_or(GrammarError::MissingRoot)?;

        let mut rules = HashMap::with_capacity_and_hasher(rule_list.len(), ahash::RandomState::new());
        let mut rule_order = Vec::with_capacity(rule_list.len());
        for (name, id) in rule_list {
            if rules.insert(name.clone(), id).is_some() {
                return Err(GrammarError::DuplicateRule { name });
            }
            rule_order.push(name);
        }

        validate(&arena, root, whitespace)?;

        let mut roots = vec![root];
        roots.extend(whitespace);
        resolve_references(&mut arena, &mut rules, &mut roots)?;

        let mut lr_roots = roots.clone();
        lr_roots.extend(rule_order.iter().filter_map(|name| rules.get(name).copied()));
        detect_left_recursion(&mut arena, &lr_roots);

        Ok(Grammar {
            arena,
            rules,
            rule_order,
            root: roots[0],
            whitespace: whitespace.and(roots.get(1).copied()),
        })
    }
}

fn validate(arena: &Arena, root: ExprId, whitespace: Option<ExprId>) -> Result<(), GrammarError> {
    let in_bounds = |id: ExprId| {
        if id.index() < arena.len() {
            Ok(())
        } else {
            Err(GrammarError::ForeignHandle { index: id.index() })
        }
    };

    in_bounds(root)?;
    if let Some(ws) = whitespace {
        in_bounds(ws)?;
    }

    for (index, node) in arena.nodes().iter().enumerate() {
        for child in node.kind.children() {
            in_bounds(child)?;
        }
        match &node.kind {
            ExprKind::CharSet(set) => set.validate()?,
            ExprKind::Cluster { groups } => validate_cluster(node, index, groups)?,
            _ => {}
        }
    }
    Ok(())
}

fn validate_cluster(node: &ExprNode, index: usize, groups: &[Group]) -> Result<(), GrammarError> {
    let cluster = || {
        node.name
            .as_ref()
            .map_or_else(|| format!("#{index}"), ToString::to_string)
    };
    if groups.is_empty() {
        return Err(GrammarError::EmptyCluster { cluster: cluster() });
    }
    for pair in groups.windows(2) {
        if pair[1].precedence > pair[0].precedence {
            return Err(GrammarError::ClusterOrder {
                cluster: cluster(),
                previous: pair[0].precedence,
                next: pair[1].precedence,
            });
        }
    }
    Ok(())
}
