//! One direction of the bidirectional search.
//!
//! A [`UnidirectionalSearch`] is a uniform-cost search over sets of states.
//! Open layers are keyed by accumulated cost. Expanding the cheapest layer
//! first closes it under zero-cost operators, then pushes its successors
//! into the layers `g + c` of every positive operator cost `c`.

use std::collections::BTreeMap;
use std::fmt;

use log::debug;

use crate::relation::OperatorRelations;
use crate::sets::StateSets;
use crate::task::Cost;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "fw"),
            Direction::Backward => write!(f, "bw"),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SearchState {
    Initialized,
    Stepping,
    Exhausted,
}

/// What one call to [`UnidirectionalSearch::step`] produced.
#[derive(Debug, Clone)]
pub struct Expansion<Set> {
    /// Cost of the expanded layer.
    pub g: Cost,
    /// States closed at cost `g`, zero-cost closure included.
    pub closed: Set,
    /// States newly added to open layers, with their cost.
    pub new_open: Vec<(Cost, Set)>,
}

/// A closed layer: `steps[0]` holds the states first reached at its cost,
/// `steps[k]` the states reached from `steps[k - 1]` by zero-cost operators.
#[derive(Debug, Clone)]
struct ClosedLayer<Set> {
    steps: Vec<Set>,
    union: Set,
}

pub struct UnidirectionalSearch<'s, S: StateSets> {
    sets: &'s S,
    relations: &'s OperatorRelations<S>,
    direction: Direction,
    state: SearchState,
    seed: S::Set,
    open: BTreeMap<Cost, S::Set>,
    closed: BTreeMap<Cost, ClosedLayer<S::Set>>,
    closed_total: S::Set,
    /// Exclusive bound on the cost of states worth keeping.
    upper_bound: Option<Cost>,
    pruned: bool,
    num_steps: usize,
}

impl<'s, S: StateSets> UnidirectionalSearch<'s, S> {
    pub fn new(sets: &'s S, relations: &'s OperatorRelations<S>, direction: Direction, seed: S::Set) -> Self {
        let mut open = BTreeMap::new();
        if !sets.is_empty(&seed) {
            open.insert(0, seed.clone());
        }
        let state = if open.is_empty() {
            SearchState::Exhausted
        } else {
            SearchState::Initialized
        };
        Self {
            sets,
            relations,
            direction,
            state,
            seed,
            open,
            closed: BTreeMap::new(),
            closed_total: sets.empty(),
            upper_bound: None,
            pruned: false,
            num_steps: 0,
        }
    }

    /// Search from the initial state.
    pub fn forward(sets: &'s S, relations: &'s OperatorRelations<S>) -> Self {
        let seed = sets.from_state(sets.session().initial_state());
        Self::new(sets, relations, Direction::Forward, seed)
    }

    /// Search from the goal states.
    pub fn backward(sets: &'s S, relations: &'s OperatorRelations<S>) -> Self {
        let seed = sets.from_partial_state(&sets.session().task().goal);
        Self::new(sets, relations, Direction::Backward, seed)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
    pub fn state(&self) -> SearchState {
        self.state
    }
    pub fn is_exhausted(&self) -> bool {
        self.state == SearchState::Exhausted
    }
    pub fn seed(&self) -> &S::Set {
        &self.seed
    }
    pub fn sets(&self) -> &'s S {
        self.sets
    }
    pub fn relations(&self) -> &'s OperatorRelations<S> {
        self.relations
    }
    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// True if some successor was dropped for reaching the upper bound.
    pub fn pruned(&self) -> bool {
        self.pruned
    }

    pub fn upper_bound(&self) -> Option<Cost> {
        self.upper_bound
    }

    /// Lower the exclusive cost bound. Never raises it.
    pub fn set_upper_bound(&mut self, bound: Cost) {
        if self.upper_bound.map_or(true, |b| bound < b) {
            self.upper_bound = Some(bound);
        }
    }

    /// Cost of the cheapest open layer, `None` standing for infinity.
    pub fn peek_min_open_cost(&self) -> Option<Cost> {
        self.open.keys().next().copied()
    }

    /// Size of the cheapest open layer.
    pub fn min_open_size(&self) -> Option<usize> {
        self.open.values().next().map(|set| self.sets.size(set))
    }

    pub fn open_layers(&self) -> impl Iterator<Item = (Cost, &S::Set)> {
        self.open.iter().map(|(&g, set)| (g, set))
    }

    pub fn closed_layers(&self) -> impl Iterator<Item = (Cost, &S::Set)> {
        self.closed.iter().map(|(&g, layer)| (g, &layer.union))
    }

    pub fn closed_layer(&self, g: Cost) -> Option<&S::Set> {
        self.closed.get(&g).map(|layer| &layer.union)
    }

    /// Zero-cost sub-steps of the closed layer at `g`.
    pub fn closed_steps(&self, g: Cost) -> &[S::Set] {
        self.closed.get(&g).map_or(&[], |layer| &layer.steps)
    }

    pub fn closed_total(&self) -> &S::Set {
        &self.closed_total
    }

    /// Every set this search holds on to.
    pub fn roots(&self) -> Vec<S::Set> {
        let mut roots = vec![self.seed.clone(), self.closed_total.clone()];
        roots.extend(self.open.values().cloned());
        for layer in self.closed.values() {
            roots.extend(layer.steps.iter().cloned());
            roots.push(layer.union.clone());
        }
        roots
    }

    /// One step away from the seed: image forward, preimage backward.
    pub fn advance(&self, set: &S::Set, relation: &S::Relation) -> S::Set {
        match self.direction {
            Direction::Forward => self.sets.image(set, relation),
            Direction::Backward => self.sets.preimage(set, relation),
        }
    }

    /// One step toward the seed: preimage forward, image backward.
    pub fn retreat(&self, set: &S::Set, relation: &S::Relation) -> S::Set {
        match self.direction {
            Direction::Forward => self.sets.preimage(set, relation),
            Direction::Backward => self.sets.image(set, relation),
        }
    }

    fn exceeds_bound(&self, g: Cost) -> bool {
        self.upper_bound.is_some_and(|b| g >= b)
    }

    /// Expand the cheapest open layer.
    ///
    /// Returns `None` once nothing is left to expand.
    pub fn step(&mut self) -> Option<Expansion<S::Set>> {
        if self.is_exhausted() {
            return None;
        }
        self.state = SearchState::Stepping;

        while let Some((g, layer)) = self.open.pop_first() {
            if self.exceeds_bound(g) {
                // Every remaining layer costs at least `g`.
                self.pruned = true;
                self.open.clear();
                break;
            }

            let frontier = self.sets.subtract(&layer, &self.closed_total);
            if self.sets.is_empty(&frontier) {
                continue;
            }

            let expansion = self.expand(g, frontier);
            self.num_steps += 1;
            if self.open.is_empty() {
                self.state = SearchState::Exhausted;
                debug!("{}: exhausted after {} steps", self.direction, self.num_steps);
            }
            return Some(expansion);
        }

        self.state = SearchState::Exhausted;
        debug!("{}: exhausted after {} steps", self.direction, self.num_steps);
        None
    }

    fn expand(&mut self, g: Cost, frontier: S::Set) -> Expansion<S::Set> {
        let sets = self.sets;

        let mut reached = sets.union(&self.closed_total, &frontier);
        let mut union = frontier.clone();
        let mut steps = vec![frontier];
        if let Some(zero) = self.relations.zero_cost() {
            loop {
                let last = &steps[steps.len() - 1];
                let next = sets.subtract(&self.advance(last, zero), &reached);
                if sets.is_empty(&next) {
                    break;
                }
                reached = sets.union(&reached, &next);
                union = sets.union(&union, &next);
                steps.push(next);
            }
        }
        self.closed_total = reached;

        debug!(
            "{}: expanding g = {} ({} zero-cost steps, {} nodes, {} states)",
            self.direction,
            g,
            steps.len() - 1,
            sets.size(&union),
            sets.count_states(&union)
        );

        let mut new_open = Vec::new();
        for (cost, relation) in self.relations.costed() {
            let Some(succ_g) = g.checked_add(*cost) else {
                self.pruned = true;
                continue;
            };
            let succ = sets.subtract(&self.advance(&union, relation), &self.closed_total);
            if sets.is_empty(&succ) {
                continue;
            }
            if self.exceeds_bound(succ_g) {
                self.pruned = true;
                continue;
            }
            let merged = match self.open.get(&succ_g) {
                Some(existing) => sets.union(existing, &succ),
                None => succ.clone(),
            };
            self.open.insert(succ_g, merged);
            new_open.push((succ_g, succ));
        }

        self.closed.insert(
            g,
            ClosedLayer {
                steps,
                union: union.clone(),
            },
        );

        Expansion {
            g,
            closed: union,
            new_open,
        }
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use test_log::test;

    use super::*;
    use crate::explicit::ExplicitStateSets;
    use crate::session::Session;
    use crate::task::{Effect, FactPair, Operator, Task, Variable};

    /// A counter `x` in `0..4`: `inc` costs 2, `skip` jumps by two for 3,
    /// and `noop-y` toggles `y` for free.
    fn task() -> Task {
        let mut operators = Vec::new();
        for v in 0..3 {
            operators.push(Operator::new(
                format!("inc-{}", v),
                vec![FactPair::new(0, v)],
                vec![Effect::new(FactPair::new(0, v + 1))],
                2,
            ));
        }
        for v in 0..2 {
            operators.push(Operator::new(
                format!("skip-{}", v),
                vec![FactPair::new(0, v)],
                vec![Effect::new(FactPair::new(0, v + 2))],
                3,
            ));
        }
        operators.push(Operator::new(
            "set-y",
            vec![FactPair::new(1, 0)],
            vec![Effect::new(FactPair::new(1, 1))],
            0,
        ));
        Task {
            variables: vec![Variable::new("x", 4), Variable::new("y", 2)],
            operators,
            initial_state: vec![0, 0],
            goal: vec![FactPair::new(0, 3)],
            ..Task::default()
        }
    }

    #[test]
    fn test_layers_follow_cost() {
        let session = Session::new(task()).unwrap();
        let sets = ExplicitStateSets::new(&session).unwrap();
        let relations = OperatorRelations::new(&sets);
        let mut search = UnidirectionalSearch::forward(&sets, &relations);

        assert_eq!(search.state(), SearchState::Initialized);
        assert_eq!(search.peek_min_open_cost(), Some(0));

        let first = search.step().unwrap();
        assert_eq!(first.g, 0);
        // The free operator closes the layer over both values of y.
        assert_eq!(search.closed_steps(0).len(), 2);
        assert_eq!(sets.count_states(&first.closed), BigUint::from(2u32));
        let costs: Vec<Cost> = first.new_open.iter().map(|(g, _)| *g).collect();
        assert_eq!(costs, vec![2, 3]);

        let mut closed_costs = vec![0];
        while let Some(expansion) = search.step() {
            closed_costs.push(expansion.g);
        }
        // Skipping reaches x=2 at 3, so the layer at 4 holds nothing new.
        assert_eq!(closed_costs, vec![0, 2, 3, 5]);
        assert!(search.is_exhausted());
        assert_eq!(search.peek_min_open_cost(), None);
        assert_eq!(search.closed_total(), &sets.valid_states());
    }

    #[test]
    fn test_backward_layers() {
        let session = Session::new(task()).unwrap();
        let sets = ExplicitStateSets::new(&session).unwrap();
        let relations = OperatorRelations::new(&sets);
        let mut search = UnidirectionalSearch::backward(&sets, &relations);

        let mut layers = Vec::new();
        while let Some(expansion) = search.step() {
            layers.push((expansion.g, sets.size(&expansion.closed)));
        }
        assert_eq!(layers, vec![(0, 2), (2, 2), (3, 2), (5, 2)]);
    }

    #[test]
    fn test_upper_bound_prunes() {
        let session = Session::new(task()).unwrap();
        let sets = ExplicitStateSets::new(&session).unwrap();
        let relations = OperatorRelations::new(&sets);
        let mut search = UnidirectionalSearch::forward(&sets, &relations);
        search.set_upper_bound(4);
        search.set_upper_bound(9);
        assert_eq!(search.upper_bound(), Some(4));

        let mut closed_costs = Vec::new();
        while let Some(expansion) = search.step() {
            closed_costs.push(expansion.g);
        }
        assert_eq!(closed_costs, vec![0, 2, 3]);
        assert!(search.pruned());
    }
}
