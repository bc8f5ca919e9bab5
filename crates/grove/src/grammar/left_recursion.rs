//! Left-recursion detection.
//!
//! An expression `e` is in the *firsts* of `p` when `p` may invoke `e` at its
//! own start position: the operands of a choice, the nullable prefix of a
//! sequence plus the first non-nullable item, the operand of a wrapper, and so
//! on. A cycle in the firsts graph is left recursion. The walk over that graph
//! reports each cycle through a cutoff at its head; every head that is not
//! already handled by the seed-growing engine is wrapped in place in an
//! [`ExprKind::LeftRecursive`] node.

use super::visit::{self, Graph, Slot, VisitState, Visitor};
use super::{Arena, ExprId, ExprKind, ExprNode};
use hashbrown::HashSet;
use smallvec::SmallVec;

/// Nullability of every node: whether it can succeed without consuming input.
///
/// Computed as a least fixed point; extension nodes are assumed nullable
/// unless they say otherwise.
#[must_use]
pub(crate) fn nullable(arena: &Arena) -> Vec<bool> {
    let mut nullable = vec![false; arena.len()];
    let mut changed = true;
    while changed {
        changed = false;
        for (index, node) in arena.nodes().iter().enumerate() {
            if !nullable[index] && is_nullable(&node.kind, &nullable) {
                nullable[index] = true;
                changed = true;
            }
        }
    }
    nullable
}

fn is_nullable(kind: &ExprKind, known: &[bool]) -> bool {
    let n = |id: &ExprId| known[id.index()];
    match kind {
        ExprKind::Literal(text) => text.is_empty(),
        ExprKind::CharSet(_) | ExprKind::Any | ExprKind::Reference(_) => false,
        ExprKind::Empty
        | ExprKind::EndOfInput
        | ExprKind::Lookahead(_)
        | ExprKind::Not(_)
        | ExprKind::Cut => true,
        ExprKind::Sequence(items) => items.iter().all(n),
        ExprKind::Choice(items) => items.iter().any(n),
        ExprKind::Repeat { expr, kind } => kind.min() == 0 || n(expr),
        ExprKind::Until {
            body,
            terminator,
            min,
        } => (*min == 0 || n(body)) && n(terminator),
        ExprKind::Capture { expr, .. }
        | ExprKind::Label { expr, .. }
        | ExprKind::Token(expr)
        | ExprKind::Memo(expr)
        | ExprKind::LeftRecursive { expr, .. }
        | ExprKind::Floor { expr, .. } => n(expr),
        ExprKind::Cluster { groups } => groups
            .iter()
            .flat_map(|group| group.alternatives.iter())
            .any(n),
        ExprKind::Custom { node, .. } => node.nullable(),
    }
}

/// Expressions `kind` may invoke at its own start position.
fn firsts(kind: &ExprKind, nullable: &[bool]) -> SmallVec<[ExprId; 4]> {
    match kind {
        ExprKind::Sequence(items) => {
            let mut firsts = SmallVec::new();
            for item in items {
                firsts.push(*item);
                if !nullable[item.index()] {
                    break;
                }
            }
            firsts
        }
        other => other.children(),
    }
}

/// The firsts relation as a graph over the arena's handles.
struct FirstsGraph {
    edges: Vec<SmallVec<[ExprId; 4]>>,
}

impl FirstsGraph {
    fn new(arena: &Arena) -> Self {
        let nullable = nullable(arena);
        let edges = arena
            .nodes()
            .iter()
            .map(|node| firsts(&node.kind, &nullable))
            .collect();
        Self { edges }
    }
}

impl Graph for FirstsGraph {
    type Node = ExprId;

    fn children(&self, node: ExprId) -> SmallVec<[ExprId; 4]> {
        self.edges.get(node.index()).cloned().unwrap_or_default()
    }

    fn set_child(&mut self, parent: ExprId, index: usize, child: ExprId) {
        if let Some(edge) = self
            .edges
            .get_mut(parent.index())
            .and_then(|edges| edges.get_mut(index))
        {
            *edge = child;
        }
    }
}

/// Collects the targets of cutoffs: the nodes closing a firsts cycle.
///
/// Cycles passing through a node the seed-growing engine already handles are
/// skipped.
struct CycleHeads {
    /// `Cluster` and `LeftRecursive` nodes, by index
    grows_seeds: Vec<bool>,
    path: Vec<ExprId>,
    heads: Vec<ExprId>,
    seen: HashSet<ExprId, ahash::RandomState>,
}

impl CycleHeads {
    fn new(arena: &Arena) -> Self {
        let grows_seeds = arena
            .nodes()
            .iter()
            .map(|node| {
                matches!(
                    node.kind,
                    ExprKind::LeftRecursive { .. } | ExprKind::Cluster { .. }
                )
            })
            .collect();
        Self {
            grows_seeds,
            path: Vec::new(),
            heads: Vec::new(),
            seen: HashSet::default(),
        }
    }

    fn grows_seeds(&self, id: ExprId) -> bool {
        self.grows_seeds.get(id.index()).copied().unwrap_or(false)
    }
}

impl Visitor<FirstsGraph> for CycleHeads {
    fn before(&mut self, _graph: &FirstsGraph, node: ExprId, _slot: Slot<ExprId>) -> bool {
        self.path.push(node);
        true
    }

    fn after(
        &mut self,
        _graph: &FirstsGraph,
        _node: ExprId,
        _slot: Slot<ExprId>,
        _state: VisitState,
    ) -> Option<ExprId> {
        self.path.pop();
        None
    }

    fn revisit(
        &mut self,
        _graph: &FirstsGraph,
        node: ExprId,
        _slot: Slot<ExprId>,
        state: VisitState,
    ) -> Option<ExprId> {
        if state != VisitState::Cutoff {
            return None;
        }
        let from = self.path.iter().rposition(|&id| id == node)?;
        let handled = self.path[from..].iter().any(|&id| self.grows_seeds(id));
        if !handled && self.seen.insert(node) {
            self.heads.push(node);
        }
        None
    }
}

/// Find left-recursive cycles reachable from `roots` and wrap their heads.
///
/// Returns the wrapped heads. Heads keep their handle (and name), so every
/// existing edge into them now reaches the wrapper.
pub(crate) fn detect_left_recursion(arena: &mut Arena, roots: &[ExprId]) -> Vec<ExprId> {
    let mut graph = FirstsGraph::new(arena);
    let mut roots = roots.to_vec();
    let mut heads = CycleHeads::new(arena);
    visit::walk(&mut graph, &mut roots, &mut heads);

    let mut wrapped = Vec::new();
    for head in heads.heads {
        let Some(kind) = arena.get(head).map(|node| node.kind.clone()) else {
            continue;
        };
        // The wrapper keeps the head's name and flags; the body stays anonymous.
        let body = arena.push(ExprNode::new(kind));
        if let Some(node) = arena.get_mut(head) {
            node.kind = ExprKind::LeftRecursive {
                expr: body,
                left_assoc: false,
            };
        }
        wrapped.push(head);
    }
    wrapped
}
