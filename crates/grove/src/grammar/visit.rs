//! # Graph Visitor
//!
//! Cycle-safe depth-first traversal over any graph exposing a children
//! accessor. Preprocessing passes are written as [`Visitor`]s; a visitor can
//! replace the node it is looking at by returning a new node from a hook, and
//! the walker writes it into the node's [`Slot`] (a parent operand or a root).
//!
//! Each node gets `before` and `after` exactly once, on its first visit, with
//! its children walked in between. Any later encounter of the same node goes to
//! `revisit` instead and is not descended into: [`VisitState::Cutoff`] when
//! the node is on the active path (a cycle), [`VisitState::Visited`] otherwise.

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use std::hash::Hash;

/// A graph the walker can traverse and patch.
pub trait Graph {
    type Node: Copy + Eq + Hash;

    /// Outgoing edges of `node`, in order.
    fn children(&self, node: Self::Node) -> SmallVec<[Self::Node; 4]>;

    /// Point the `index`th edge of `parent` at `child`.
    fn set_child(&mut self, parent: Self::Node, index: usize, child: Self::Node);
}

/// How the walker reached a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    FirstVisit,
    /// First visit, and the node turned out to be on a cycle
    FirstVisitInCycle,
    Visited,
    /// The node is on the active traversal stack
    Cutoff,
}

/// Where a node hangs in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot<N> {
    /// The `n`th root handed to [`walk`]
    Root(usize),
    Child { parent: N, index: usize },
}

/// Hooks called by [`walk`]. Returning `Some(node)` from `after` or
/// `revisit` stores `node` in the slot.
pub trait Visitor<G: Graph> {
    /// First visit, before children. Returning `false` skips the children.
    fn before(&mut self, _graph: &G, _node: G::Node, _slot: Slot<G::Node>) -> bool {
        true
    }

    /// First visit, after children. `state` is `FirstVisit` or `FirstVisitInCycle`.
    fn after(
        &mut self,
        _graph: &G,
        _node: G::Node,
        _slot: Slot<G::Node>,
        _state: VisitState,
    ) -> Option<G::Node> {
        None
    }

    /// Any later encounter. `state` is `Visited` or `Cutoff`.
    fn revisit(
        &mut self,
        _graph: &G,
        _node: G::Node,
        _slot: Slot<G::Node>,
        _state: VisitState,
    ) -> Option<G::Node> {
        None
    }
}

/// Walk every node reachable from `roots`, in order.
///
/// Root replacements are written back into `roots`.
pub fn walk<G, V>(graph: &mut G, roots: &mut [G::Node], visitor: &mut V)
where
    G: Graph,
    V: Visitor<G>,
{
    let mut walker = Walker::<G::Node>::default();
    for index in 0..roots.len() {
        if let Some(replacement) = walker.visit(graph, roots[index], Slot::Root(index), visitor) {
            roots[index] = replacement;
        }
    }
}

struct Walker<N> {
    visited: HashSet<N, ahash::RandomState>,
    /// Active path, with each node's depth
    on_stack: HashMap<N, usize, ahash::RandomState>,
    stack: Vec<N>,
    in_cycle: HashSet<N, ahash::RandomState>,
}

impl<N> Default for Walker<N> {
    fn default() -> Self {
        Self {
            visited: HashSet::default(),
            on_stack: HashMap::default(),
            stack: Vec::new(),
            in_cycle: HashSet::default(),
        }
    }
}

impl<N: Copy + Eq + Hash> Walker<N> {
    fn visit<G, V>(&mut self, graph: &mut G, node: N, slot: Slot<N>, visitor: &mut V) -> Option<N>
    where
        G: Graph<Node = N>,
        V: Visitor<G>,
    {
        if let Some(&depth) = self.on_stack.get(&node) {
            self.in_cycle.extend(self.stack[depth..].iter().copied());
            return visitor.revisit(graph, node, slot, VisitState::Cutoff);
        }
        if !self.visited.insert(node) {
            return visitor.revisit(graph, node, slot, VisitState::Visited);
        }

        if visitor.before(graph, node, slot) {
            self.on_stack.insert(node, self.stack.len());
            self.stack.push(node);

            for (index, child) in graph.children(node).into_iter().enumerate() {
                let child_slot = Slot::Child {
                    parent: node,
                    index,
                };
                if let Some(replacement) = self.visit(graph, child, child_slot, visitor) {
                    graph.set_child(node, index, replacement);
                }
            }

            self.stack.pop();
            self.on_stack.remove(&node);
        }

        let state = if self.in_cycle.contains(&node) {
            VisitState::FirstVisitInCycle
        } else {
            VisitState::FirstVisit
        };
        visitor.after(graph, node, slot, state)
    }
}
