//! The state-set algebra used by the searches.
//!
//! Search code is written against [`StateSets`] only, so the symbolic
//! backend ([`SymVariables`][crate::symbolic::SymVariables]) and the
//! enumerating one ([`ExplicitStateSets`][crate::explicit::ExplicitStateSets])
//! are interchangeable. Sets never contain a state outside the valid states
//! (in range and mutex-free), except singletons built by [`StateSets::from_state`].

use std::fmt::Debug;

use num_bigint::BigUint;

use crate::packer::PackedState;
use crate::session::Session;
use crate::task::FactPair;

pub trait StateSets {
    /// Immutable set handle. Equal sets compare equal.
    type Set: Clone + PartialEq + Debug;
    /// Transition relation of a group of operators.
    type Relation;

    fn session(&self) -> &Session;

    fn empty(&self) -> Self::Set;

    /// All in-range states that violate no mutex pair.
    fn valid_states(&self) -> Self::Set;

    /// The singleton `{state}`.
    fn from_state(&self, state: &[i32]) -> Self::Set;

    /// Valid states satisfying every defined fact of `facts`.
    fn from_partial_state(&self, facts: &[FactPair]) -> Self::Set;

    fn union(&self, a: &Self::Set, b: &Self::Set) -> Self::Set;
    fn intersect(&self, a: &Self::Set, b: &Self::Set) -> Self::Set;
    fn subtract(&self, a: &Self::Set, b: &Self::Set) -> Self::Set;

    /// Forget the values of `vars`: every valid state agreeing with some
    /// member of `set` on the remaining variables.
    fn exists(&self, set: &Self::Set, vars: &[usize]) -> Self::Set;

    fn is_empty(&self, set: &Self::Set) -> bool;
    fn contains(&self, set: &Self::Set, state: &PackedState) -> bool;

    /// A deterministic member of `set`.
    fn pick_state(&self, set: &Self::Set) -> Option<Vec<i32>>;

    fn count_states(&self, set: &Self::Set) -> BigUint;

    /// Representation size of `set` (nodes, or states when enumerated).
    fn size(&self, set: &Self::Set) -> usize;

    /// Disjunctive relation of `ops`.
    fn relation(&self, ops: &[usize]) -> Self::Relation;

    /// Valid successors of `set` under `relation`.
    fn image(&self, set: &Self::Set, relation: &Self::Relation) -> Self::Set;

    /// Valid predecessors of `set` under `relation`.
    fn preimage(&self, set: &Self::Set, relation: &Self::Relation) -> Self::Set;

    /// Total size of the shared backing store.
    fn num_nodes(&self) -> usize;

    /// Release everything not reachable from `live` or from relations built so far.
    fn collect_garbage(&self, live: &[Self::Set]) -> usize;

    fn union_many<'s>(&self, sets: impl IntoIterator<Item = &'s Self::Set>) -> Self::Set
    where
        Self::Set: 's,
    {
        sets.into_iter()
            .fold(self.empty(), |acc, set| self.union(&acc, set))
    }
}
