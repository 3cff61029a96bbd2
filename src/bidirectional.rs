//! Bidirectional coordination of two [`UnidirectionalSearch`]es.
//!
//! After every step the newly closed layer is intersected with every layer
//! of the other direction, and the new open additions with every closed
//! layer of the other direction. The cheapest nonempty intersection is the
//! incumbent cut. It is certified optimal once the cheapest open layers of
//! both directions add up to at least its cost.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::error::{PlannerError, Result};
use crate::relation::OperatorRelations;
use crate::search::{Direction, Expansion, UnidirectionalSearch};
use crate::session::Session;
use crate::sets::StateSets;
use crate::solution::{Plan, SymSolution};
use crate::symbolic::SymVariables;
use crate::task::Cost;

/// Which direction to step next.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum DirectionPolicy {
    Forward,
    Backward,
    Alternate,
    /// Step the direction whose cheapest open layer is smaller.
    #[default]
    SmallerFrontier,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub policy: DirectionPolicy,
    /// Abort once the node table stays above this size after compaction.
    pub max_nodes: Option<usize>,
    /// Node count that triggers compaction.
    pub gc_threshold: usize,
    pub time_limit: Option<Duration>,
    /// Exclusive bound on plan cost.
    pub cost_bound: Option<Cost>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            policy: DirectionPolicy::default(),
            max_nodes: None,
            gc_threshold: 1 << 20,
            time_limit: None,
            cost_bound: None,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.gc_threshold == 0 {
            return Err(PlannerError::InvalidConfig("gc_threshold must be positive".to_string()));
        }
        if self.max_nodes == Some(0) {
            return Err(PlannerError::InvalidConfig("max_nodes must be positive".to_string()));
        }
        if self.time_limit == Some(Duration::ZERO) {
            return Err(PlannerError::InvalidConfig("time_limit must be positive".to_string()));
        }
        if self.cost_bound == Some(0) {
            return Err(PlannerError::InvalidConfig(
                "cost_bound is exclusive and must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SearchOutcome {
    /// An optimal plan of this cost exists and is certified.
    Solved { cost: Cost },
    /// Both directions exhausted without meeting.
    Unsolvable,
    /// No plan cheaper than the bound exists.
    NoSolutionWithinBound(Cost),
    /// Time or node budget ran out before certification.
    ResourcesExhausted,
}

/// A nonempty intersection of a forward and a backward layer.
#[derive(Debug, Clone)]
pub struct Cut<Set> {
    pub g: Cost,
    pub h: Cost,
    pub states: Set,
}

impl<Set> Cut<Set> {
    pub fn cost(&self) -> Cost {
        self.g + self.h
    }
}

pub struct BidirectionalSearch<'s, S: StateSets> {
    sets: &'s S,
    fw: UnidirectionalSearch<'s, S>,
    bw: UnidirectionalSearch<'s, S>,
    config: SearchConfig,
    best: Option<Cut<S::Set>>,
    last: Direction,
    gc_threshold: usize,
    out_of_nodes: bool,
}

impl<'s, S: StateSets> BidirectionalSearch<'s, S> {
    pub fn new(sets: &'s S, relations: &'s OperatorRelations<S>, config: SearchConfig) -> Result<Self> {
        config.validate()?;
        if sets.session().task().has_axioms() {
            return Err(PlannerError::Unsupported { feature: "axioms" });
        }

        let mut fw = UnidirectionalSearch::forward(sets, relations);
        let mut bw = UnidirectionalSearch::backward(sets, relations);
        if let Some(bound) = config.cost_bound {
            fw.set_upper_bound(bound);
            bw.set_upper_bound(bound);
        }

        let mut search = Self {
            sets,
            fw,
            bw,
            gc_threshold: config.gc_threshold,
            config,
            best: None,
            last: Direction::Backward,
            out_of_nodes: false,
        };

        let cut = sets.intersect(search.fw.seed(), search.bw.seed());
        if !sets.is_empty(&cut) {
            debug!("Initial state satisfies the goal");
            search.record(Cut { g: 0, h: 0, states: cut });
        }

        Ok(search)
    }

    pub fn forward(&self) -> &UnidirectionalSearch<'s, S> {
        &self.fw
    }
    pub fn backward(&self) -> &UnidirectionalSearch<'s, S> {
        &self.bw
    }

    /// The cheapest cut found so far, certified or not.
    pub fn best_candidate(&self) -> Option<&Cut<S::Set>> {
        self.best.as_ref()
    }

    pub fn best_cost(&self) -> Option<Cost> {
        self.best.as_ref().map(Cut::cost)
    }

    /// Lower bound on the cost of any plan not found yet, `None` for infinity.
    pub fn lower_bound(&self) -> Option<Cost> {
        let fw = self.fw.peek_min_open_cost()?;
        let bw = self.bw.peek_min_open_cost()?;
        Some(fw.saturating_add(bw))
    }

    /// True once the incumbent cut is provably optimal.
    pub fn is_certified(&self) -> bool {
        match (self.best_cost(), self.lower_bound()) {
            (Some(best), Some(bound)) => bound >= best,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.fw.is_exhausted() && self.bw.is_exhausted()
    }

    /// The certified solution, or an unsolved one.
    pub fn solution(&self) -> SymSolution<'_, 's, S> {
        match &self.best {
            Some(cut) if self.is_certified() => SymSolution::new(&self.fw, &self.bw, cut.g, cut.h, cut.states.clone()),
            _ => SymSolution::unsolved(),
        }
    }

    fn choose(&self) -> Option<Direction> {
        let (fw, bw) = (!self.fw.is_exhausted(), !self.bw.is_exhausted());
        match (fw, bw) {
            (false, false) => None,
            (true, false) => Some(Direction::Forward),
            (false, true) => Some(Direction::Backward),
            (true, true) => Some(match self.config.policy {
                DirectionPolicy::Forward => Direction::Forward,
                DirectionPolicy::Backward => Direction::Backward,
                DirectionPolicy::Alternate => self.last.opposite(),
                DirectionPolicy::SmallerFrontier => {
                    match (self.fw.min_open_size(), self.bw.min_open_size()) {
                        (Some(f), Some(b)) if b < f => Direction::Backward,
                        (None, Some(_)) => Direction::Backward,
                        _ => Direction::Forward,
                    }
                }
            }),
        }
    }

    /// Step one direction and look for cheaper cuts.
    ///
    /// Returns the stepped direction, or `None` if both are exhausted.
    pub fn step(&mut self) -> Option<Direction> {
        let direction = self.choose()?;
        self.last = direction;

        let expansion = match direction {
            Direction::Forward => self.fw.step(),
            Direction::Backward => self.bw.step(),
        };
        if let Some(expansion) = expansion {
            self.check_cuts(direction, &expansion);
        }

        self.maybe_collect_garbage();
        Some(direction)
    }

    fn check_cuts(&mut self, direction: Direction, expansion: &Expansion<S::Set>) {
        let sets = self.sets;
        let other = match direction {
            Direction::Forward => &self.bw,
            Direction::Backward => &self.fw,
        };
        // Cuts must beat both the incumbent and the configured bound.
        let mut best = self.best_cost().or(self.config.cost_bound);
        let mut found = None;

        let mut try_cut = |cost_here: Cost, here: &S::Set, cost_there: Cost, there: &S::Set| {
            let Some(total) = cost_here.checked_add(cost_there) else {
                return;
            };
            if best.is_some_and(|b| total >= b) {
                return;
            }
            let states = sets.intersect(here, there);
            if sets.is_empty(&states) {
                return;
            }
            let (g, h) = match direction {
                Direction::Forward => (cost_here, cost_there),
                Direction::Backward => (cost_there, cost_here),
            };
            best = Some(total);
            found = Some(Cut { g, h, states });
        };

        for (h, there) in other.closed_layers().chain(other.open_layers()) {
            try_cut(expansion.g, &expansion.closed, h, there);
        }
        for (g, here) in &expansion.new_open {
            for (h, there) in other.closed_layers() {
                try_cut(*g, here, h, there);
            }
        }

        if let Some(cut) = found {
            self.record(cut);
        }
    }

    fn record(&mut self, cut: Cut<S::Set>) {
        debug!(
            "New best cut: g = {}, h = {}, cost = {} ({} states)",
            cut.g,
            cut.h,
            cut.cost(),
            self.sets.count_states(&cut.states)
        );
        // States at or above the incumbent cannot lead to anything cheaper.
        self.fw.set_upper_bound(cut.cost());
        self.bw.set_upper_bound(cut.cost());
        self.best = Some(cut);
    }

    fn roots(&self) -> Vec<S::Set> {
        let mut roots = self.fw.roots();
        roots.extend(self.bw.roots());
        if let Some(cut) = &self.best {
            roots.push(cut.states.clone());
        }
        roots
    }

    fn maybe_collect_garbage(&mut self) {
        if self.sets.num_nodes() <= self.gc_threshold {
            return;
        }
        self.sets.collect_garbage(&self.roots());
        let alive = self.sets.num_nodes();
        self.gc_threshold = self.config.gc_threshold.max(2 * alive);
        if self.config.max_nodes.is_some_and(|max| alive > max) {
            self.out_of_nodes = true;
        }
    }

    /// Step until a certified solution, a proof of unsolvability, or the
    /// end of the budget.
    pub fn run(&mut self) -> SearchOutcome {
        let start = Instant::now();
        loop {
            if self.is_certified() {
                let cost = self.best_cost().unwrap_or_default();
                info!(
                    "Solution certified: cost {} after {} fw and {} bw steps",
                    cost,
                    self.fw.num_steps(),
                    self.bw.num_steps()
                );
                return SearchOutcome::Solved { cost };
            }

            if self.is_exhausted() {
                let pruned = self.fw.pruned() || self.bw.pruned();
                return match self.config.cost_bound {
                    Some(bound) if pruned => {
                        info!("No plan cheaper than {}", bound);
                        SearchOutcome::NoSolutionWithinBound(bound)
                    }
                    _ => {
                        info!("Task is unsolvable: both directions exhausted");
                        SearchOutcome::Unsolvable
                    }
                };
            }

            if self.out_of_nodes || self.config.time_limit.is_some_and(|limit| start.elapsed() >= limit) {
                info!(
                    "Resources exhausted: {} nodes, {:?} elapsed",
                    self.sets.num_nodes(),
                    start.elapsed()
                );
                return SearchOutcome::ResourcesExhausted;
            }

            self.step();
        }
    }
}

/// Search `session` symbolically and extract a plan if one exists.
pub fn find_optimal_plan(session: &Session, config: SearchConfig) -> Result<(SearchOutcome, Option<Plan>)> {
    let vars = SymVariables::new(session);
    let relations = OperatorRelations::new(&vars);
    let mut search = BidirectionalSearch::new(&vars, &relations, config)?;
    let outcome = search.run();
    let plan = search.solution().get_plan();
    Ok((outcome, plan))
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::explicit::ExplicitStateSets;
    use crate::task::{AxiomRule, Effect, FactPair, Operator, Task, Variable};

    fn chain(len: i32) -> Task {
        Task {
            variables: vec![Variable::new("x", len as usize + 1)],
            operators: (0..len)
                .map(|v| {
                    Operator::new(
                        format!("step-{}", v),
                        vec![FactPair::new(0, v)],
                        vec![Effect::new(FactPair::new(0, v + 1))],
                        1,
                    )
                })
                .collect(),
            initial_state: vec![0],
            goal: vec![FactPair::new(0, len)],
            ..Task::default()
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(SearchConfig::default().validate().is_ok());
        let config = SearchConfig {
            gc_threshold: 0,
            ..SearchConfig::default()
        };
        assert!(matches!(config.validate(), Err(PlannerError::InvalidConfig(_))));
        let config = SearchConfig {
            cost_bound: Some(0),
            ..SearchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_every_policy_finds_optimum() {
        let session = Session::new(chain(5)).unwrap();
        let sets = ExplicitStateSets::new(&session).unwrap();
        let relations = OperatorRelations::new(&sets);
        for policy in [
            DirectionPolicy::Forward,
            DirectionPolicy::Backward,
            DirectionPolicy::Alternate,
            DirectionPolicy::SmallerFrontier,
        ] {
            let config = SearchConfig {
                policy,
                ..SearchConfig::default()
            };
            let mut search = BidirectionalSearch::new(&sets, &relations, config).unwrap();
            assert_eq!(search.run(), SearchOutcome::Solved { cost: 5 }, "{:?}", policy);
        }
    }

    #[test]
    fn test_goal_holds_initially() {
        let mut task = chain(2);
        task.goal = vec![FactPair::new(0, 0)];
        let session = Session::new(task).unwrap();
        let sets = ExplicitStateSets::new(&session).unwrap();
        let relations = OperatorRelations::new(&sets);
        let mut search = BidirectionalSearch::new(&sets, &relations, SearchConfig::default()).unwrap();
        assert_eq!(search.best_cost(), Some(0));
        assert_eq!(search.run(), SearchOutcome::Solved { cost: 0 });
        assert_eq!(search.solution().get_plan().map(|p| p.operators), Some(vec![]));
    }

    #[test]
    fn test_cost_bound() {
        let config = SearchConfig {
            cost_bound: Some(4),
            ..SearchConfig::default()
        };
        let session = Session::new(chain(4)).unwrap();
        let (outcome, plan) = find_optimal_plan(&session, config.clone()).unwrap();
        assert_eq!(outcome, SearchOutcome::NoSolutionWithinBound(4));
        assert!(plan.is_none());

        let session = Session::new(chain(3)).unwrap();
        let (outcome, plan) = find_optimal_plan(&session, config).unwrap();
        assert_eq!(outcome, SearchOutcome::Solved { cost: 3 });
        assert_eq!(plan.map(|p| p.operators), Some(vec![0, 1, 2]));
    }

    #[test]
    fn test_node_limit() {
        let session = Session::new(chain(30)).unwrap();
        let vars = SymVariables::new(&session);
        let relations = OperatorRelations::new(&vars);
        let config = SearchConfig {
            gc_threshold: 1,
            max_nodes: Some(1),
            ..SearchConfig::default()
        };
        let mut search = BidirectionalSearch::new(&vars, &relations, config).unwrap();
        assert_eq!(search.run(), SearchOutcome::ResourcesExhausted);
        assert!(!search.solution().solved());
    }

    #[test]
    fn test_time_limit() {
        let session = Session::new(chain(200)).unwrap();
        let sets = ExplicitStateSets::new(&session).unwrap();
        let relations = OperatorRelations::new(&sets);
        let config = SearchConfig {
            time_limit: Some(Duration::from_nanos(1)),
            ..SearchConfig::default()
        };
        let mut search = BidirectionalSearch::new(&sets, &relations, config).unwrap();
        assert_eq!(search.run(), SearchOutcome::ResourcesExhausted);
        assert!(!search.solution().solved());
        assert_eq!(search.best_cost(), None);

        // Without a deadline the same task is solved.
        let mut search = BidirectionalSearch::new(&sets, &relations, SearchConfig::default()).unwrap();
        assert_eq!(search.run(), SearchOutcome::Solved { cost: 200 });
    }

    #[test]
    fn test_rejects_axioms() {
        let mut task = chain(2);
        task.variables.push(Variable::new("d", 2).derived(1));
        task.initial_state.push(0);
        task.axioms.push(AxiomRule {
            condition: vec![FactPair::new(0, 2)],
            effect: FactPair::new(1, 1),
        });
        let session = Session::new(task).unwrap();
        let sets = ExplicitStateSets::new(&session).unwrap();
        let relations = OperatorRelations::new(&sets);
        assert_eq!(
            BidirectionalSearch::new(&sets, &relations, SearchConfig::default()).err(),
            Some(PlannerError::Unsupported { feature: "axioms" })
        );
    }
}
