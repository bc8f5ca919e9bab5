//! # Left Recursion and Precedence Climbing
//!
//! Simple left-recursive nodes and precedence clusters share one seed-growing
//! algorithm:
//!
//! 1. A seed already installed for `(node, start)` means this is a recursive
//!    re-entry: replay the seed and return.
//! 2. Otherwise install a failing seed and evaluate the body repeatedly. A
//!    result reaching further than the seed replaces it and the loop starts
//!    over; a result that does not grow it ends the loop.
//! 3. Remove the seed and replay the best result.
//!
//! Clusters try their groups from the highest precedence down and skip groups
//! below the minimum enforced by the [`PrecedenceState`] cell. Left-associative
//! simple rules are blocked while they grow, so a nested entry at another
//! position parses once instead of growing to the right.
//!
//! Seeds, the blocked set and the precedence cell are ordinary custom states:
//! they follow the transactional protocol and contribute to memo keys.

use super::custom::{CustomState, SlotId, StateDelta, StateInputs};
use super::engine::ParseContext;
use super::errors::ErrorHandler;
use super::state::Changeset;
use super::trace::ParseEvent;
use crate::error::GroveError;
use crate::grammar::{ExprId, Group};
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use std::any::{Any, type_name};
use std::rc::Rc;

type SeedKey = (ExprId, usize);

/// Provisional result of a node that is currently growing.
#[derive(Debug, Clone)]
pub struct Seed {
    pub changeset: Changeset,
    /// Precedence of the cluster group that produced it, `i32::MAX` otherwise
    pub precedence: i32,
}

#[derive(Debug, Clone)]
enum SeedOp {
    Seed {
        key: SeedKey,
        old: Option<Seed>,
        new: Option<Seed>,
    },
    Block {
        id: ExprId,
        old: bool,
        new: bool,
    },
}

#[derive(Debug)]
struct SeedDelta(Vec<SeedOp>);

/// Seed table and blocked set of the left-recursion engine.
///
/// Changes are journaled while a restore point is open, so `restore` and
/// `uncommit` can undo exactly what happened since the matching `snapshot`.
#[derive(Debug, Default)]
pub struct SeedState {
    seeds: HashMap<SeedKey, Seed, ahash::RandomState>,
    blocked: HashSet<ExprId, ahash::RandomState>,
    log: Vec<SeedOp>,
    marks: Vec<usize>,
}

impl SeedState {
    /// Seed installed for `id` at `position`.
    #[must_use]
    pub fn get(&self, id: ExprId, position: usize) -> Option<&Seed> {
        self.seeds.get(&(id, position))
    }

    /// Whether `id` is a left-associative rule currently growing.
    #[must_use]
    pub fn is_blocked(&self, id: ExprId) -> bool {
        self.blocked.contains(&id)
    }

    /// Blocked rules, in no particular order.
    #[must_use]
    pub fn blocked_ids(&self) -> Vec<ExprId> {
        self.blocked.iter().copied().collect()
    }

    #[must_use]
    pub fn seed_count(&self) -> usize {
        self.seeds.len()
    }

    /// Install, replace or (with `None`) remove the seed of `id` at `position`.
    pub fn set_seed(&mut self, id: ExprId, position: usize, seed: Option<Seed>) {
        let key = (id, position);
        let old = self.apply_seed(key, seed.clone());
        if !self.marks.is_empty() {
            self.log.push(SeedOp::Seed {
                key,
                old,
                new: seed,
            });
        }
    }

    pub fn set_blocked(&mut self, id: ExprId, blocked: bool) {
        let old = self.apply_block(id, blocked);
        if !self.marks.is_empty() && old != blocked {
            self.log.push(SeedOp::Block {
                id,
                old,
                new: blocked,
            });
        }
    }

    fn apply_seed(&mut self, key: SeedKey, seed: Option<Seed>) -> Option<Seed> {
        match seed {
            Some(seed) => self.seeds.insert(key, seed),
            None => self.seeds.remove(&key),
        }
    }

    fn apply_block(&mut self, id: ExprId, blocked: bool) -> bool {
        if blocked {
            !self.blocked.insert(id)
        } else {
            self.blocked.remove(&id)
        }
    }

    fn undo_to_mark(&mut self) -> Vec<SeedOp> {
        let mark = self.marks.pop().unwrap_or(0).min(self.log.len());
        let ops = self.log.split_off(mark);
        for op in ops.iter().rev() {
            match op {
                SeedOp::Seed { key, old, .. } => {
                    self.apply_seed(*key, old.clone());
                }
                SeedOp::Block { id, old, .. } => {
                    self.apply_block(*id, *old);
                }
            }
        }
        ops
    }
}

/// Collapse a journal to one op per seed key and blocked id.
///
/// Seeds installed and removed again, as every nested growing loop does, and
/// blocks toggled back leave nothing behind.
fn net_effect(ops: Vec<SeedOp>) -> Vec<SeedOp> {
    let mut seeds: HashMap<SeedKey, usize, ahash::RandomState> = HashMap::default();
    let mut blocks: HashMap<ExprId, usize, ahash::RandomState> = HashMap::default();
    let mut net: Vec<SeedOp> = Vec::new();

    for op in ops {
        let index = match &op {
            SeedOp::Seed { key, .. } => seeds.get(key).copied(),
            SeedOp::Block { id, .. } => blocks.get(id).copied(),
        };
        match (index, op) {
            (Some(index), SeedOp::Seed { new, .. }) => {
                if let Some(SeedOp::Seed { new: last, .. }) = net.get_mut(index) {
                    *last = new;
                }
            }
            (Some(index), SeedOp::Block { new, .. }) => {
                if let Some(SeedOp::Block { new: last, .. }) = net.get_mut(index) {
                    *last = new;
                }
            }
            (None, op) => {
                match &op {
                    SeedOp::Seed { key, .. } => seeds.insert(*key, net.len()),
                    SeedOp::Block { id, .. } => blocks.insert(*id, net.len()),
                };
                net.push(op);
            }
        }
    }

    net.retain(|op| match op {
        SeedOp::Seed { old, new, .. } => old.is_some() || new.is_some(),
        SeedOp::Block { old, new, .. } => old != new,
    });
    net
}

impl CustomState for SeedState {
    fn snapshot(&mut self) {
        self.marks.push(self.log.len());
    }

    fn commit(&mut self) {
        self.marks.pop();
        if self.marks.is_empty() {
            self.log.clear();
        }
    }

    fn restore(&mut self) {
        self.undo_to_mark();
    }

    fn uncommit(&mut self) -> Option<StateDelta> {
        let ops = net_effect(self.undo_to_mark());
        (!ops.is_empty()).then(|| Rc::new(SeedDelta(ops)) as StateDelta)
    }

    fn merge(&mut self, delta: &dyn Any) -> Result<(), GroveError> {
        let SeedDelta(ops) =
            delta
                .downcast_ref::<SeedDelta>()
                .ok_or(GroveError::SlotTypeMismatch {
                    slot: SlotId::SEEDS.index(),
                    expected: type_name::<SeedDelta>(),
                })?;
        for op in ops {
            match op {
                SeedOp::Seed { key, new, .. } => self.set_seed(key.0, key.1, new.clone()),
                SeedOp::Block { id, new, .. } => self.set_blocked(*id, *new),
            }
        }
        Ok(())
    }

    fn inputs(&self, inputs: &mut StateInputs) {
        let mut seeds: SmallVec<[[u64; 5]; 4]> = self
            .seeds
            .iter()
            .map(|(&(id, position), seed)| {
                [
                    id.index() as u64,
                    position as u64,
                    seed.changeset.end() as u64,
                    u64::from(seed.changeset.matched()),
                    u64::from(seed.precedence.cast_unsigned()),
                ]
            })
            .collect();
        seeds.sort_unstable();
        inputs.push(seeds.len() as u64);
        for seed in &seeds {
            inputs.extend_from_slice(seed);
        }

        let mut blocked: SmallVec<[u64; 4]> =
            self.blocked.iter().map(|id| id.index() as u64).collect();
        blocked.sort_unstable();
        inputs.extend_from_slice(&blocked);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Precedence constraint for the next cluster entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precedence {
    /// Cluster that set the constraint, `None` for a floor
    pub cluster: Option<ExprId>,
    /// Groups below this precedence are skipped
    pub min: i32,
    /// Precedence of the group being evaluated
    pub group: i32,
}

impl Precedence {
    /// Constraint applied by a [`Floor`](crate::grammar::ExprKind::Floor) node.
    #[must_use]
    pub const fn floor(precedence: i32) -> Self {
        Self {
            cluster: None,
            min: precedence,
            group: i32::MIN,
        }
    }
}

impl Default for Precedence {
    fn default() -> Self {
        Self::floor(i32::MIN)
    }
}

#[derive(Debug)]
struct PrecedenceDelta(Precedence);

/// The "current precedence" cell shared by every cluster.
#[derive(Debug, Default)]
pub struct PrecedenceState {
    current: Precedence,
    saved: Vec<Precedence>,
}

impl PrecedenceState {
    #[must_use]
    pub const fn get(&self) -> Precedence {
        self.current
    }

    pub fn set(&mut self, precedence: Precedence) {
        self.current = precedence;
    }
}

impl CustomState for PrecedenceState {
    fn snapshot(&mut self) {
        self.saved.push(self.current);
    }

    fn commit(&mut self) {
        self.saved.pop();
    }

    fn restore(&mut self) {
        if let Some(saved) = self.saved.pop() {
            self.current = saved;
        }
    }

    fn uncommit(&mut self) -> Option<StateDelta> {
        let saved = self.saved.pop()?;
        let changed = std::mem::replace(&mut self.current, saved);
        (changed != saved).then(|| Rc::new(PrecedenceDelta(changed)) as StateDelta)
    }

    fn merge(&mut self, delta: &dyn Any) -> Result<(), GroveError> {
        let PrecedenceDelta(precedence) =
            delta
                .downcast_ref::<PrecedenceDelta>()
                .ok_or(GroveError::SlotTypeMismatch {
                    slot: SlotId::PRECEDENCE.index(),
                    expected: type_name::<PrecedenceDelta>(),
                })?;
        self.current = *precedence;
        Ok(())
    }

    fn inputs(&self, inputs: &mut StateInputs) {
        let cluster = self.current.cluster.map_or(u64::MAX, |id| id.index() as u64);
        inputs.push(cluster);
        inputs.push(u64::from(self.current.min.cast_unsigned()));
        inputs.push(u64::from(self.current.group.cast_unsigned()));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl ParseContext<'_> {
    fn seeds(&mut self) -> Result<&mut SeedState, GroveError> {
        self.state.custom_mut::<SeedState>(SlotId::SEEDS)
    }

    fn precedence(&self) -> Result<Precedence, GroveError> {
        Ok(self
            .state
            .custom::<PrecedenceState>(SlotId::PRECEDENCE)?
            .get())
    }

    fn set_precedence(&mut self, precedence: Precedence) -> Result<(), GroveError> {
        self.state
            .custom_mut::<PrecedenceState>(SlotId::PRECEDENCE)?
            .set(precedence);
        Ok(())
    }

    fn grew(&mut self, id: ExprId, best: &Changeset, result: &Changeset) -> bool {
        let grew = result.matched() && (!best.matched() || result.end() > best.end());
        if grew {
            self.stats.seeds_grown += 1;
            self.emit(ParseEvent::SeedGrown {
                expr: id,
                position: self.state.start(),
                end: result.end(),
            });
        }
        grew
    }

    /// Evaluate a `LeftRecursive` node by growing a seed.
    pub(super) fn parse_left_recursive(
        &mut self,
        id: ExprId,
        body: ExprId,
        left_assoc: bool,
    ) -> Result<bool, GroveError> {
        let start = self.state.start();
        if let Some(seed) = self.seeds()?.get(id, start) {
            let changeset = seed.changeset.clone();
            self.state.merge(&changeset)?;
            return Ok(changeset.matched());
        }

        let mut best = Changeset::failure(start, self.state.black_start());
        let failing = Seed {
            changeset: best.clone(),
            precedence: i32::MAX,
        };
        self.seeds()?.set_seed(id, start, Some(failing));

        if left_assoc && self.seeds()?.is_blocked(id) {
            let tx = self.state.begin();
            let matched = self.parse(body)?;
            let result = self.state.extract(tx, matched)?;
            self.seeds()?.set_seed(id, start, None);
            self.state.merge(&result)?;
            return Ok(result.matched());
        }

        if left_assoc {
            self.seeds()?.set_blocked(id, true);
        }
        self.errors.request_record_point();

        loop {
            let tx = self.state.begin();
            let matched = self.parse(body)?;
            let result = self.state.extract(tx, matched)?;
            if !self.grew(id, &best, &result) {
                break;
            }
            let seed = Seed {
                changeset: result.clone(),
                precedence: i32::MAX,
            };
            self.seeds()?.set_seed(id, start, Some(seed));
            best = result;
        }

        self.errors.dismiss_record_point();
        if left_assoc {
            self.seeds()?.set_blocked(id, false);
        }
        self.seeds()?.set_seed(id, start, None);
        self.state.merge(&best)?;
        Ok(best.matched())
    }

    /// Evaluate a `Cluster` by growing a seed through its precedence groups.
    pub(super) fn parse_cluster(&mut self, id: ExprId, groups: &[Group]) -> Result<bool, GroveError> {
        let start = self.state.start();
        let entry = self.precedence()?;
        let within = entry.cluster.is_none_or(|cluster| cluster == id);

        if let Some(seed) = self.seeds()?.get(id, start) {
            if entry.cluster == Some(id) && seed.precedence < entry.group {
                return Ok(false);
            }
            let changeset = seed.changeset.clone();
            self.state.merge(&changeset)?;
            return Ok(changeset.matched());
        }

        let min = if within { entry.min } else { i32::MIN };
        let mut best = Changeset::failure(start, self.state.black_start());
        let failing = Seed {
            changeset: best.clone(),
            precedence: i32::MAX,
        };
        self.seeds()?.set_seed(id, start, Some(failing));
        self.errors.request_record_point();

        'grow: loop {
            for group in groups {
                if group.precedence < min {
                    break;
                }
                if best.matched() && !group.left_recursive {
                    continue;
                }

                let min = if group.left_assoc {
                    group.precedence.saturating_add(1)
                } else {
                    group.precedence
                };
                self.set_precedence(Precedence {
                    cluster: Some(id),
                    min,
                    group: group.precedence,
                })?;

                for &alternative in &group.alternatives {
                    let tx = self.state.begin();
                    let matched = self.parse(alternative)?;
                    let result = self.state.extract(tx, matched)?;
                    if self.grew(id, &best, &result) {
                        let seed = Seed {
                            changeset: result.clone(),
                            precedence: group.precedence,
                        };
                        self.seeds()?.set_seed(id, start, Some(seed));
                        best = result;
                        self.set_precedence(entry)?;
                        continue 'grow;
                    }
                }
                self.set_precedence(entry)?;
            }
            break;
        }

        self.errors.dismiss_record_point();
        self.seeds()?.set_seed(id, start, None);
        self.state.merge(&best)?;
        Ok(best.matched())
    }

    /// Evaluate `expr` under a precedence floor, outside any growing rule.
    pub(super) fn parse_floor(&mut self, expr: ExprId, precedence: i32) -> Result<bool, GroveError> {
        let entry = self.precedence()?;
        let blocked = self.seeds()?.blocked_ids();
        self.set_precedence(Precedence::floor(precedence))?;
        for &id in &blocked {
            self.seeds()?.set_blocked(id, false);
        }

        let matched = self.parse(expr)?;

        for &id in &blocked {
            self.seeds()?.set_blocked(id, true);
        }
        self.set_precedence(entry)?;
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(end: usize) -> Seed {
        let mut state = crate::parse::state::ParseState::new(Vec::new(), false);
        let tx = state.begin();
        state.succeed(end);
        Seed {
            changeset: state.extract(tx, true).unwrap(),
            precedence: 1,
        }
    }

    fn words(state: &dyn CustomState) -> Vec<u64> {
        let mut inputs = StateInputs::new();
        state.inputs(&mut inputs);
        inputs.into_vec()
    }

    #[test]
    fn test_seed_restore_undoes_changes() {
        let id = ExprId::new(4);
        let mut seeds = SeedState::default();
        seeds.set_seed(id, 0, Some(seed(1)));

        seeds.snapshot();
        seeds.set_seed(id, 0, Some(seed(3)));
        seeds.set_seed(id, 2, Some(seed(5)));
        seeds.set_blocked(id, true);
        seeds.restore();

        assert_eq!(seeds.get(id, 0).map(|s| s.changeset.end()), Some(1));
        assert!(seeds.get(id, 2).is_none());
        assert!(!seeds.is_blocked(id));
    }

    #[test]
    fn test_seed_uncommit_then_merge_replays() {
        let id = ExprId::new(1);
        let mut seeds = SeedState::default();
        let before = words(&seeds);

        seeds.snapshot();
        seeds.set_seed(id, 3, Some(seed(6)));
        seeds.set_blocked(id, true);
        let delta = seeds.uncommit().unwrap();
        assert_eq!(words(&seeds), before);

        seeds.merge(&*delta).unwrap();
        assert_eq!(seeds.get(id, 3).map(|s| s.changeset.end()), Some(6));
        assert!(seeds.is_blocked(id));
    }

    #[test]
    fn test_seed_uncommit_keeps_only_net_changes() {
        let outer = ExprId::new(1);
        let inner = ExprId::new(2);
        let mut seeds = SeedState::default();

        seeds.snapshot();
        for _ in 0..10 {
            seeds.set_seed(inner, 4, Some(seed(5)));
            seeds.set_blocked(inner, true);
            seeds.set_seed(inner, 4, None);
            seeds.set_blocked(inner, false);
        }
        seeds.set_seed(outer, 0, Some(seed(2)));
        seeds.set_seed(outer, 0, Some(seed(6)));
        let delta = seeds.uncommit().unwrap();

        let SeedDelta(ops) = delta.downcast_ref::<SeedDelta>().unwrap();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            SeedOp::Seed { key, old: None, new: Some(seed) }
                if *key == (outer, 0) && seed.changeset.end() == 6
        ));

        seeds.merge(&*delta).unwrap();
        assert_eq!(seeds.seed_count(), 1);
        assert!(!seeds.is_blocked(inner));
    }

    #[test]
    fn test_seed_uncommit_of_install_and_remove_is_none() {
        let id = ExprId::new(3);
        let mut seeds = SeedState::default();
        seeds.snapshot();
        seeds.set_seed(id, 0, Some(seed(1)));
        seeds.set_seed(id, 0, None);
        assert!(seeds.uncommit().is_none());
    }

    #[test]
    fn test_seed_uncommit_without_changes_is_none() {
        let mut seeds = SeedState::default();
        seeds.snapshot();
        assert!(seeds.uncommit().is_none());
    }

    #[test]
    fn test_nested_commit_keeps_journal_for_outer_restore() {
        let id = ExprId::new(2);
        let mut seeds = SeedState::default();
        seeds.snapshot();
        seeds.snapshot();
        seeds.set_seed(id, 0, Some(seed(2)));
        seeds.commit();
        assert!(seeds.get(id, 0).is_some());
        seeds.restore();
        assert!(seeds.get(id, 0).is_none());
    }

    #[test]
    fn test_precedence_uncommit_reports_net_change_only() {
        let mut cell = PrecedenceState::default();
        cell.snapshot();
        cell.set(Precedence::floor(3));
        cell.set(Precedence::default());
        assert!(cell.uncommit().is_none());

        cell.snapshot();
        cell.set(Precedence::floor(3));
        let delta = cell.uncommit().unwrap();
        assert_eq!(cell.get(), Precedence::default());
        cell.merge(&*delta).unwrap();
        assert_eq!(cell.get(), Precedence::floor(3));
    }

    #[test]
    fn test_merge_rejects_foreign_delta() {
        let mut cell = PrecedenceState::default();
        let error = cell.merge(&42_u8).unwrap_err();
        assert!(matches!(error, GroveError::SlotTypeMismatch { slot: 1, .. }));
    }

    #[test]
    fn test_inputs_are_order_independent() {
        let (a, b) = (ExprId::new(1), ExprId::new(2));
        let mut first = SeedState::default();
        first.set_seed(a, 0, Some(seed(1)));
        first.set_seed(b, 0, Some(seed(2)));
        let mut second = SeedState::default();
        second.set_seed(b, 0, Some(seed(2)));
        second.set_seed(a, 0, Some(seed(1)));

        assert_eq!(words(&first), words(&second));
        assert_eq!(words(&first)[0], 2);
    }
}
