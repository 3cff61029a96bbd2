//! Enumerated state sets for small tasks.
//!
//! Every set is an ordered set of packed states and every relation is a
//! list of operators applied one state at a time. Slow, but obviously
//! correct, so it doubles as a reference for the symbolic backend.

use std::collections::BTreeSet;
use std::rc::Rc;

use log::debug;
use num_bigint::BigUint;

use crate::error::{PlannerError, Result};
use crate::packer::PackedState;
use crate::session::Session;
use crate::sets::StateSets;
use crate::task::FactPair;

pub type ExplicitSet = Rc<BTreeSet<PackedState>>;

#[derive(Debug, Clone)]
pub struct ExplicitRelation {
    ops: Vec<usize>,
}

impl ExplicitRelation {
    pub fn operators(&self) -> &[usize] {
        &self.ops
    }
}

pub struct ExplicitStateSets<'a> {
    session: &'a Session,
    valid: ExplicitSet,
}

impl<'a> ExplicitStateSets<'a> {
    /// Largest state space [`ExplicitStateSets::new`] agrees to enumerate.
    pub const DEFAULT_LIMIT: u128 = 1 << 20;

    pub fn new(session: &'a Session) -> Result<Self> {
        Self::with_limit(session, Self::DEFAULT_LIMIT)
    }

    pub fn with_limit(session: &'a Session, limit: u128) -> Result<Self> {
        let domains = session.task().domains();
        let states = domains
            .iter()
            .try_fold(1u128, |acc, &d| acc.checked_mul(d as u128))
            .unwrap_or(u128::MAX);
        if states > limit {
            return Err(PlannerError::TooManyStates { states, limit });
        }

        let packer = session.packer();
        let mut valid = BTreeSet::new();
        let mut state = vec![0i32; domains.len()];
        'enumerate: loop {
            if session.is_valid_state(&state) {
                valid.insert(packer.pack(&state));
            }
            // Odometer step, last variable fastest.
            for var in (0..domains.len()).rev() {
                state[var] += 1;
                if (state[var] as usize) < domains[var] {
                    continue 'enumerate;
                }
                state[var] = 0;
            }
            break;
        }

        debug!("Enumerated {} valid states out of {}", valid.len(), states);
        Ok(Self {
            session,
            valid: Rc::new(valid),
        })
    }

    fn filter_valid(&self, keep: impl Fn(&[i32]) -> bool) -> ExplicitSet {
        let packer = self.session.packer();
        Rc::new(
            self.valid
                .iter()
                .filter(|s| keep(&packer.unpack(s)))
                .cloned()
                .collect(),
        )
    }
}

impl<'a> StateSets for ExplicitStateSets<'a> {
    type Set = ExplicitSet;
    type Relation = ExplicitRelation;

    fn session(&self) -> &Session {
        self.session
    }

    fn empty(&self) -> ExplicitSet {
        Rc::new(BTreeSet::new())
    }

    fn valid_states(&self) -> ExplicitSet {
        self.valid.clone()
    }

    fn from_state(&self, state: &[i32]) -> ExplicitSet {
        Rc::new(BTreeSet::from([self.session.packer().pack(state)]))
    }

    fn from_partial_state(&self, facts: &[FactPair]) -> ExplicitSet {
        self.filter_valid(|s| facts.iter().all(|f| f.is_undefined() || s[f.var] == f.value))
    }

    fn union(&self, a: &ExplicitSet, b: &ExplicitSet) -> ExplicitSet {
        if b.is_empty() {
            return a.clone();
        }
        if a.is_empty() {
            return b.clone();
        }
        Rc::new(a.union(b).cloned().collect())
    }

    fn intersect(&self, a: &ExplicitSet, b: &ExplicitSet) -> ExplicitSet {
        Rc::new(a.intersection(b).cloned().collect())
    }

    fn subtract(&self, a: &ExplicitSet, b: &ExplicitSet) -> ExplicitSet {
        if b.is_empty() {
            return a.clone();
        }
        Rc::new(a.difference(b).cloned().collect())
    }

    fn exists(&self, set: &ExplicitSet, vars: &[usize]) -> ExplicitSet {
        let packer = self.session.packer();
        let project = |state: &mut Vec<i32>| {
            for &var in vars {
                state[var] = 0;
            }
        };
        let keys: BTreeSet<Vec<i32>> = set
            .iter()
            .map(|s| {
                let mut state = packer.unpack(s);
                project(&mut state);
                state
            })
            .collect();
        self.filter_valid(|s| {
            let mut state = s.to_vec();
            project(&mut state);
            keys.contains(&state)
        })
    }

    fn is_empty(&self, set: &ExplicitSet) -> bool {
        set.is_empty()
    }

    fn contains(&self, set: &ExplicitSet, state: &PackedState) -> bool {
        set.contains(state)
    }

    fn pick_state(&self, set: &ExplicitSet) -> Option<Vec<i32>> {
        set.first().map(|s| self.session.packer().unpack(s))
    }

    fn count_states(&self, set: &ExplicitSet) -> BigUint {
        BigUint::from(set.len())
    }

    fn size(&self, set: &ExplicitSet) -> usize {
        set.len()
    }

    fn relation(&self, ops: &[usize]) -> ExplicitRelation {
        ExplicitRelation { ops: ops.to_vec() }
    }

    fn image(&self, set: &ExplicitSet, relation: &ExplicitRelation) -> ExplicitSet {
        let task = self.session.task();
        let packer = self.session.packer();
        let mut next = BTreeSet::new();
        for s in set.iter() {
            let state = packer.unpack(s);
            for &op in &relation.ops {
                if let Some(succ) = task.apply(op, &state) {
                    if self.session.is_valid_state(&succ) {
                        next.insert(packer.pack(&succ));
                    }
                }
            }
        }
        Rc::new(next)
    }

    fn preimage(&self, set: &ExplicitSet, relation: &ExplicitRelation) -> ExplicitSet {
        let task = self.session.task();
        let packer = self.session.packer();
        self.filter_valid(|state| {
            relation.ops.iter().any(|&op| {
                task.apply(op, state)
                    .is_some_and(|succ| set.contains(&packer.pack(&succ)))
            })
        })
    }

    fn num_nodes(&self) -> usize {
        self.valid.len()
    }

    fn collect_garbage(&self, _live: &[ExplicitSet]) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::task::{Effect, Operator, Task, Variable};

    fn task() -> Task {
        Task {
            variables: vec![Variable::new("x", 3), Variable::new("y", 2)],
            operators: vec![Operator::new(
                "inc-x",
                vec![FactPair::new(0, 0)],
                vec![Effect::new(FactPair::new(0, 1))],
                1,
            )],
            initial_state: vec![0, 0],
            goal: vec![FactPair::new(1, 1)],
            mutex_groups: vec![vec![FactPair::new(0, 2), FactPair::new(1, 1)]],
            ..Task::default()
        }
    }

    #[test]
    fn test_enumeration_respects_mutexes() {
        let session = Session::new(task()).unwrap();
        let sets = ExplicitStateSets::new(&session).unwrap();
        assert_eq!(sets.count_states(&sets.valid_states()), BigUint::from(5u32));
    }

    #[test]
    fn test_limit() {
        let session = Session::new(task()).unwrap();
        assert_eq!(
            ExplicitStateSets::with_limit(&session, 4).err(),
            Some(PlannerError::TooManyStates { states: 6, limit: 4 })
        );
    }

    #[test]
    fn test_image_preimage() {
        let session = Session::new(task()).unwrap();
        let sets = ExplicitStateSets::new(&session).unwrap();
        let rel = sets.relation(&[0]);
        let init = sets.from_state(&[0, 1]);
        assert_eq!(sets.image(&init, &rel), sets.from_state(&[1, 1]));
        assert_eq!(sets.preimage(&sets.from_state(&[1, 1]), &rel), init);
        assert!(sets.is_empty(&sets.preimage(&init, &rel)));
    }
}
