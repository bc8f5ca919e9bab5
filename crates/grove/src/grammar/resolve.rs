//! Reference resolution.
//!
//! Replaces every [`ExprKind::Reference`] operand with the rule it names.
//! Rules that are themselves bare references (`A = B`) are aliased to the
//! final target. Cycles through real expressions are fine; a rule made only of
//! references (`A = B`, `B = A`) has no target and is rejected.

use super::visit::{self, Slot, VisitState, Visitor};
use super::{Arena, ExprId, ExprKind};
use crate::error::GrammarError;
use compact_str::CompactString;
use hashbrown::{HashMap, HashSet};

type Rules = HashMap<CompactString, ExprId, ahash::RandomState>;

/// Resolve all references reachable from `roots` and from the rule table.
///
/// `roots` and `rules` are updated in place.
pub(crate) fn resolve_references(
    arena: &mut Arena,
    rules: &mut Rules,
    roots: &mut [ExprId],
) -> Result<(), GrammarError> {
    let targets = final_targets(arena, rules)?;
    for id in rules.values_mut() {
        *id = target_of(arena, &targets, *id)?;
    }

    let mut all_roots: Vec<ExprId> = roots.iter().copied().collect();
    all_roots.extend(rules.values().copied());

    let mut resolver = Resolver {
        targets: &targets,
        error: None,
    };
    visit::walk(arena, &mut all_roots, &mut resolver);
    if let Some(error) = resolver.error {
        return Err(error);
    }

    roots.copy_from_slice(&all_roots[..roots.len()]);
    Ok(())
}

/// Map every rule name to the first non-reference expression behind it.
fn final_targets(
    arena: &Arena,
    rules: &Rules,
) -> Result<HashMap<CompactString, ExprId, ahash::RandomState>, GrammarError> {
    let mut targets = HashMap::with_capacity_and_hasher(rules.len(), ahash::RandomState::new());
    for (name, &start) in rules {
        let mut seen = HashSet::<ExprId, ahash::RandomState>::default();
        let mut current = start;
        while let Some(ExprKind::Reference(next)) = arena.get(current).map(|n| &n.kind) {
            if !seen.insert(current) {
                return Err(GrammarError::ReferenceCycle { name: name.clone() });
            }
            current = *rules
                .get(next)
                .ok_or_else(|| GrammarError::UndefinedRule { name: next.clone() })?;
        }
        targets.insert(name.clone(), current);
    }
    Ok(targets)
}

fn target_of(
    arena: &Arena,
    targets: &HashMap<CompactString, ExprId, ahash::RandomState>,
    id: ExprId,
) -> Result<ExprId, GrammarError> {
    match arena.get(id).map(|n| &n.kind) {
        Some(ExprKind::Reference(name)) => targets
            .get(name)
            .copied()
            .ok_or_else(|| GrammarError::UndefinedRule { name: name.clone() }),
        _ => Ok(id),
    }
}

struct Resolver<'t> {
    targets: &'t HashMap<CompactString, ExprId, ahash::RandomState>,
    error: Option<GrammarError>,
}

impl Resolver<'_> {
    fn replace(&mut self, arena: &Arena, node: ExprId) -> Option<ExprId> {
        match target_of(arena, self.targets, node) {
            Ok(target) => (target != node).then_some(target),
            Err(error) => {
                self.error.get_or_insert(error);
                None
            }
        }
    }
}

impl Visitor<Arena> for Resolver<'_> {
    fn before(&mut self, _arena: &Arena, _node: ExprId, _slot: Slot<ExprId>) -> bool {
        self.error.is_none()
    }

    fn after(
        &mut self,
        arena: &Arena,
        node: ExprId,
        _slot: Slot<ExprId>,
        _state: VisitState,
    ) -> Option<ExprId> {
        self.replace(arena, node)
    }

    fn revisit(
        &mut self,
        arena: &Arena,
        node: ExprId,
        _slot: Slot<ExprId>,
        _state: VisitState,
    ) -> Option<ExprId> {
        self.replace(arena, node)
    }
}

#[cfg(test)]
mod tests {
    use super::super::ExprNode;
    use super::*;

    fn rules(entries: &[(&str, ExprId)]) -> Rules {
        entries
            .iter()
            .map(|(name, id)| (CompactString::from(*name), *id))
            .collect()
    }

    #[test]
    fn test_references_point_at_rules() {
        let mut arena = Arena::default();
        let a = arena.push(ExprNode::new(ExprKind::Literal("a".into())));
        let r = arena.push(ExprNode::new(ExprKind::Reference("A".into())));
        let seq = arena.push(ExprNode::new(ExprKind::Sequence(vec![r, r])));

        let mut table = rules(&[("A", a), ("S", seq)]);
        let mut roots = [r];
        resolve_references(&mut arena, &mut table, &mut roots).unwrap();

        assert_eq!(roots, [a]);
        assert_eq!(arena.get(seq).unwrap().kind.children().as_slice(), &[a, a]);
    }

    #[test]
    fn test_alias_rules_collapse() {
        let mut arena = Arena::default();
        let x = arena.push(ExprNode::new(ExprKind::Any));
        let to_b = arena.push(ExprNode::new(ExprKind::Reference("B".into())));

        let mut table = rules(&[("A", to_b), ("B", x)]);
        resolve_references(&mut arena, &mut table, &mut []).unwrap();

        assert_eq!(table["A"], x);
    }

    #[test]
    fn test_undefined_and_cyclic_references() {
        let mut arena = Arena::default();
        let missing = arena.push(ExprNode::new(ExprKind::Reference("Nope".into())));
        let mut table = rules(&[("A", missing)]);
        assert_eq!(
            resolve_references(&mut arena, &mut table, &mut []),
            Err(GrammarError::UndefinedRule { name: "Nope".into() })
        );

        let mut arena = Arena::default();
        let to_b = arena.push(ExprNode::new(ExprKind::Reference("B".into())));
        let to_a = arena.push(ExprNode::new(ExprKind::Reference("A".into())));
        let mut table = rules(&[("A", to_b), ("B", to_a)]);
        assert!(matches!(
            resolve_references(&mut arena, &mut table, &mut []),
            Err(GrammarError::ReferenceCycle { .. })
        ));
    }
}
