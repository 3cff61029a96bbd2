//! Plan extraction from a certified cut.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::debug;

use crate::add::{AddManager, AddRef};
use crate::search::{Direction, UnidirectionalSearch};
use crate::sets::StateSets;
use crate::symbolic::SymVariables;
use crate::task::{Cost, Task};

/// A sequence of operator indices with its total cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub operators: Vec<usize>,
    pub cost: Cost,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn names<'t>(&self, task: &'t Task) -> Vec<&'t str> {
        self.operators
            .iter()
            .map(|&op| task.operators[op].name.as_str())
            .collect()
    }

    /// Listing with one `name (cost)` line per operator.
    pub fn display<'p>(&'p self, task: &'p Task) -> PlanDisplay<'p> {
        PlanDisplay { plan: self, task }
    }
}

pub struct PlanDisplay<'p> {
    plan: &'p Plan,
    task: &'p Task,
}

impl fmt::Display for PlanDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &op in &self.plan.operators {
            let operator = &self.task.operators[op];
            writeln!(f, "{} ({})", operator.name, operator.cost)?;
        }
        let kind = if self.task.is_unit_cost() { "unit cost" } else { "general cost" };
        write!(f, "; cost = {} ({})", self.plan.cost, kind)
    }
}

struct Meeting<'a, 's, S: StateSets> {
    fw: &'a UnidirectionalSearch<'s, S>,
    bw: &'a UnidirectionalSearch<'s, S>,
    g: Cost,
    h: Cost,
    cut: S::Set,
}

/// The meeting point of a forward and a backward search.
///
/// A solved instance holds a cut: states reached forward at cost `g` and
/// backward at cost `h`, with `g + h` optimal. An unsolved one answers
/// every query with `None` or an empty result.
pub struct SymSolution<'a, 's, S: StateSets> {
    meeting: Option<Meeting<'a, 's, S>>,
}

impl<'a, 's, S: StateSets> SymSolution<'a, 's, S> {
    pub fn new(
        fw: &'a UnidirectionalSearch<'s, S>,
        bw: &'a UnidirectionalSearch<'s, S>,
        g: Cost,
        h: Cost,
        cut: S::Set,
    ) -> Self {
        debug_assert_eq!(fw.direction(), Direction::Forward);
        debug_assert_eq!(bw.direction(), Direction::Backward);
        Self {
            meeting: Some(Meeting { fw, bw, g, h, cut }),
        }
    }

    /// No solution yet.
    pub fn unsolved() -> Self {
        Self { meeting: None }
    }

    pub fn solved(&self) -> bool {
        self.meeting.is_some()
    }

    pub fn get_cost(&self) -> Option<Cost> {
        self.meeting.as_ref().map(|m| m.g + m.h)
    }

    pub fn g(&self) -> Option<Cost> {
        self.meeting.as_ref().map(|m| m.g)
    }

    pub fn h(&self) -> Option<Cost> {
        self.meeting.as_ref().map(|m| m.h)
    }

    pub fn cut(&self) -> Option<&S::Set> {
        self.meeting.as_ref().map(|m| &m.cut)
    }

    /// One optimal plan.
    ///
    /// Deterministic: the witness state is the first member of each set and
    /// operators are tried by ascending index.
    pub fn get_plan(&self) -> Option<Plan> {
        let m = self.meeting.as_ref()?;
        let sets = m.fw.sets();
        let state = sets.pick_state(&m.cut)?;

        let mut operators = trace(m.fw, &state, m.g)?;
        operators.reverse();
        operators.extend(trace(m.bw, &state, m.h)?);

        let cost = sets.session().task().calculate_plan_cost(&operators);
        debug_assert_eq!(cost, m.g + m.h);
        debug!("Extracted plan: {} operators, cost {}", operators.len(), cost);
        Some(Plan { operators, cost })
    }

    /// Every operator used by some optimal plan through the cut.
    pub fn get_operators_optimal_plans(&self) -> BTreeSet<usize> {
        self.get_operators_optimal_plans_map().into_keys().collect()
    }

    /// Every operator used by some optimal plan through the cut, with the
    /// states where applying it continues such a plan.
    pub fn get_operators_optimal_plans_map(&self) -> BTreeMap<usize, S::Set> {
        let mut operators = BTreeMap::new();
        if let Some(m) = &self.meeting {
            collect_operators(m.fw, &m.cut, m.g, &mut operators);
            collect_operators(m.bw, &m.cut, m.h, &mut operators);
        }
        operators
    }
}

impl<'a, 's, 'v> SymSolution<'a, 's, SymVariables<'v>> {
    /// Cost-to-go along the extracted plan: each state the plan visits maps
    /// to the cost remaining from it, every other state to -1.
    pub fn get_add(&self, add: &AddManager) -> Option<AddRef> {
        let plan = self.get_plan()?;
        let vars = self.meeting.as_ref()?.fw.sets();
        let task = vars.session().task();

        let mut remaining = plan.cost as i64;
        let mut state = vars.session().initial_state().to_vec();
        let mut f = add.constant(-1);
        f = vars.add_max_with(add, f, vars.from_state(&state), remaining);
        for &op in &plan.operators {
            remaining -= task.operators[op].cost as i64;
            state = task.apply(op, &state)?;
            f = vars.add_max_with(add, f, vars.from_state(&state), remaining);
        }
        Some(f)
    }
}

/// Walk from `state`, reached at cost `g`, back to the seed of `search`.
///
/// Returns operators in the order they are traversed, cut side first.
fn trace<S: StateSets>(search: &UnidirectionalSearch<'_, S>, state: &[i32], mut g: Cost) -> Option<Vec<usize>> {
    let sets = search.sets();
    let relations = search.relations();
    let mut current = sets.from_state(state);
    let mut operators = Vec::new();

    loop {
        let steps = search.closed_steps(g);
        let step = steps
            .iter()
            .position(|s| !sets.is_empty(&sets.intersect(&current, s)))
            .filter(|&k| k > 0);

        let (op, prev, cost) = if let Some(k) = step {
            relations.zero_cost_operators().iter().find_map(|&op| {
                let prev = sets.intersect(&search.retreat(&current, relations.operator(op)), &steps[k - 1]);
                (!sets.is_empty(&prev)).then_some((op, prev, 0))
            })?
        } else if g == 0 {
            return Some(operators);
        } else {
            (0..relations.num_operators()).find_map(|op| {
                let cost = relations.cost(op);
                if cost == 0 || cost > g {
                    return None;
                }
                let layer = search.closed_layer(g - cost)?;
                let prev = sets.intersect(&search.retreat(&current, relations.operator(op)), layer);
                (!sets.is_empty(&prev)).then_some((op, prev, cost))
            })?
        };

        operators.push(op);
        current = sets.from_state(&sets.pick_state(&prev)?);
        g -= cost;
    }
}

/// The states of `here` from which `op` moves one step closer to the seed,
/// landing in `prev`.
fn sources<S: StateSets>(
    search: &UnidirectionalSearch<'_, S>,
    here: &S::Set,
    prev: &S::Set,
    relation: &S::Relation,
) -> S::Set {
    match search.direction() {
        Direction::Forward => prev.clone(),
        Direction::Backward => search.sets().intersect(here, &search.advance(prev, relation)),
    }
}

fn record<S: StateSets>(sets: &S, operators: &mut BTreeMap<usize, S::Set>, op: usize, states: S::Set) {
    let merged = match operators.get(&op) {
        Some(existing) => sets.union(existing, &states),
        None => states,
    };
    operators.insert(op, merged);
}

fn collect_operators<S: StateSets>(
    search: &UnidirectionalSearch<'_, S>,
    cut: &S::Set,
    g: Cost,
    operators: &mut BTreeMap<usize, S::Set>,
) {
    let sets = search.sets();
    let relations = search.relations();

    let mut pending: BTreeMap<Cost, S::Set> = BTreeMap::from([(g, cut.clone())]);
    while let Some((g, mut frontier)) = pending.pop_last() {
        let steps = search.closed_steps(g);
        for k in (1..steps.len()).rev() {
            let here = sets.intersect(&frontier, &steps[k]);
            if sets.is_empty(&here) {
                continue;
            }
            for &op in relations.zero_cost_operators() {
                let relation = relations.operator(op);
                let prev = sets.intersect(&search.retreat(&here, relation), &steps[k - 1]);
                if sets.is_empty(&prev) {
                    continue;
                }
                record(sets, operators, op, sources(search, &here, &prev, relation));
                frontier = sets.union(&frontier, &prev);
            }
        }

        for op in 0..relations.num_operators() {
            let cost = relations.cost(op);
            if cost == 0 || cost > g {
                continue;
            }
            let Some(layer) = search.closed_layer(g - cost) else {
                continue;
            };
            let relation = relations.operator(op);
            let prev = sets.intersect(&search.retreat(&frontier, relation), layer);
            if sets.is_empty(&prev) {
                continue;
            }
            record(sets, operators, op, sources(search, &frontier, &prev, relation));
            let merged = match pending.get(&(g - cost)) {
                Some(existing) => sets.union(existing, &prev),
                None => prev,
            };
            pending.insert(g - cost, merged);
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::explicit::ExplicitStateSets;
    use crate::task::{Operator, Variable};

    #[test]
    fn test_plan_display() {
        let task = Task {
            variables: vec![Variable::new("x", 2)],
            operators: vec![
                Operator::new("pick ball1", vec![], vec![], 1),
                Operator::new("drop ball1", vec![], vec![], 2),
            ],
            ..Task::default()
        };
        let plan = Plan {
            operators: vec![0, 1],
            cost: 3,
        };
        assert_eq!(plan.names(&task), vec!["pick ball1", "drop ball1"]);
        assert_eq!(
            plan.display(&task).to_string(),
            "pick ball1 (1)\ndrop ball1 (2)\n; cost = 3 (general cost)"
        );
    }

    #[test]
    fn test_unsolved() {
        let solution: SymSolution<ExplicitStateSets> = SymSolution::unsolved();
        assert!(!solution.solved());
        assert_eq!(solution.get_cost(), None);
        assert_eq!(solution.get_plan(), None);
        assert!(solution.get_operators_optimal_plans().is_empty());
    }
}
