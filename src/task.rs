//! The factored task model: variables, operators, goal and invariants.
//!
//! A [`Task`] is plain data. Construction through struct literals is
//! allowed; [`Task::validate`] checks every reference before a
//! [`Session`][crate::session::Session] accepts it.

use std::fmt;

use crate::error::{PlannerError, Result};

/// Operator cost.
pub type Cost = u32;

/// A `(variable, value)` pair.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FactPair {
    pub var: usize,
    pub value: i32,
}

impl FactPair {
    /// Value meaning "unconstrained" in a partial assignment.
    pub const UNDEFINED: i32 = -1;

    pub const fn new(var: usize, value: i32) -> Self {
        Self { var, value }
    }

    pub const fn undefined(var: usize) -> Self {
        Self::new(var, Self::UNDEFINED)
    }

    pub const fn is_undefined(&self) -> bool {
        self.value == Self::UNDEFINED
    }
}

impl fmt::Display for FactPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {}>", self.var, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub domain: usize,
    /// 0 for fluents; derived variables carry their layer, starting at 1.
    pub axiom_layer: usize,
    /// One name per value. Diagnostic only.
    pub fact_names: Vec<String>,
}

impl Variable {
    pub fn new(name: impl Into<String>, domain: usize) -> Self {
        let name = name.into();
        let fact_names = (0..domain).map(|v| format!("{}={}", name, v)).collect();
        Self {
            name,
            domain,
            axiom_layer: 0,
            fact_names,
        }
    }

    pub fn with_fact_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.fact_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn derived(mut self, layer: usize) -> Self {
        self.axiom_layer = layer;
        self
    }

    pub fn is_derived(&self) -> bool {
        self.axiom_layer > 0
    }
}

/// Assignment of `fact`, guarded by `conditions` (all evaluated on the state
/// before the operator applies).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    pub fact: FactPair,
    pub conditions: Vec<FactPair>,
}

impl Effect {
    pub fn new(fact: FactPair) -> Self {
        Self { fact, conditions: Vec::new() }
    }

    pub fn conditional(fact: FactPair, conditions: Vec<FactPair>) -> Self {
        Self { fact, conditions }
    }

    pub fn is_conditional(&self) -> bool {
        !self.conditions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub name: String,
    pub preconditions: Vec<FactPair>,
    pub effects: Vec<Effect>,
    pub cost: Cost,
}

impl Operator {
    pub fn new(name: impl Into<String>, preconditions: Vec<FactPair>, effects: Vec<Effect>, cost: Cost) -> Self {
        Self {
            name: name.into(),
            preconditions,
            effects,
            cost,
        }
    }
}

/// Derived-variable rule: `condition ⇒ effect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxiomRule {
    pub condition: Vec<FactPair>,
    pub effect: FactPair,
}

/// Completes a state whose fluents are set by computing its derived variables.
pub trait AxiomEvaluator {
    fn evaluate(&self, state: &mut [i32]);
}

/// Evaluator for tasks without derived variables.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoAxioms;

impl AxiomEvaluator for NoAxioms {
    fn evaluate(&self, _state: &mut [i32]) {}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Task {
    pub variables: Vec<Variable>,
    pub operators: Vec<Operator>,
    pub axioms: Vec<AxiomRule>,
    pub initial_state: Vec<i32>,
    pub goal: Vec<FactPair>,
    /// Invariant groups: at most one fact of each group holds in any reachable state.
    pub mutex_groups: Vec<Vec<FactPair>>,
}

impl Task {
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_facts(&self) -> usize {
        self.variables.iter().map(|v| v.domain).sum()
    }

    pub fn domains(&self) -> Vec<usize> {
        self.variables.iter().map(|v| v.domain).collect()
    }

    pub fn fact_name(&self, fact: FactPair) -> &str {
        &self.variables[fact.var].fact_names[fact.value as usize]
    }

    /// Check that `fact` names an existing variable and an in-range value.
    pub fn check_fact(&self, fact: FactPair, context: &str) -> Result<()> {
        let Some(variable) = self.variables.get(fact.var) else {
            return Err(PlannerError::UnknownVariable {
                context: context.to_string(),
                var: fact.var,
            });
        };
        if fact.value < 0 || fact.value as usize >= variable.domain {
            return Err(PlannerError::FactOutOfRange {
                context: context.to_string(),
                fact,
                domain: variable.domain,
            });
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (var, variable) in self.variables.iter().enumerate() {
            if variable.domain == 0 {
                return Err(PlannerError::EmptyDomain { var });
            }
        }

        if self.initial_state.len() != self.variables.len() {
            return Err(PlannerError::InitialStateLength {
                expected: self.variables.len(),
                actual: self.initial_state.len(),
            });
        }
        for (var, &value) in self.initial_state.iter().enumerate() {
            self.check_fact(FactPair::new(var, value), "initial state")?;
        }

        if self.goal.is_empty() {
            return Err(PlannerError::EmptyGoal);
        }
        for &fact in &self.goal {
            self.check_fact(fact, "goal")?;
        }

        for op in &self.operators {
            let context = format!("operator {}", op.name);
            for &fact in &op.preconditions {
                self.check_fact(fact, &context)?;
            }
            for (i, effect) in op.effects.iter().enumerate() {
                self.check_fact(effect.fact, &context)?;
                for &fact in &effect.conditions {
                    self.check_fact(fact, &context)?;
                }
                if effect.is_conditional() {
                    continue;
                }
                let conflict = op.effects[..i]
                    .iter()
                    .any(|e| !e.is_conditional() && e.fact.var == effect.fact.var && e.fact.value != effect.fact.value);
                if conflict {
                    return Err(PlannerError::ConflictingEffects {
                        operator: op.name.clone(),
                        var: effect.fact.var,
                    });
                }
            }
        }

        for (i, axiom) in self.axioms.iter().enumerate() {
            let context = format!("axiom {}", i);
            self.check_fact(axiom.effect, &context)?;
            for &fact in &axiom.condition {
                self.check_fact(fact, &context)?;
            }
        }

        for (i, group) in self.mutex_groups.iter().enumerate() {
            let context = format!("mutex group {}", i);
            for &fact in group {
                self.check_fact(fact, &context)?;
            }
        }

        Ok(())
    }

    pub fn has_axioms(&self) -> bool {
        !self.axioms.is_empty()
    }

    pub fn has_conditional_effects(&self) -> bool {
        self.first_conditional_effects_operator().is_some()
    }

    /// Index of the first operator with a conditional effect.
    pub fn first_conditional_effects_operator(&self) -> Option<usize> {
        self.operators
            .iter()
            .position(|op| op.effects.iter().any(Effect::is_conditional))
    }

    pub fn is_unit_cost(&self) -> bool {
        self.operators.iter().all(|op| op.cost == 1)
    }

    pub fn min_action_cost(&self) -> Option<Cost> {
        self.operators.iter().map(|op| op.cost).min()
    }

    pub fn max_action_cost(&self) -> Option<Cost> {
        self.operators.iter().map(|op| op.cost).max()
    }

    pub fn test_goal(&self, state: &[i32]) -> bool {
        holds(&self.goal, state)
    }

    pub fn is_applicable(&self, op: usize, state: &[i32]) -> bool {
        holds(&self.operators[op].preconditions, state)
    }

    /// Successor of `state` under operator `op`.
    ///
    /// Returns `None` if the operator is not applicable, or if two firing
    /// effects assign different values to the same variable (such a
    /// transition does not exist). Axioms are not evaluated.
    pub fn apply(&self, op: usize, state: &[i32]) -> Option<Vec<i32>> {
        if !self.is_applicable(op, state) {
            return None;
        }
        let mut next = state.to_vec();
        let mut assigned = vec![false; state.len()];
        for effect in &self.operators[op].effects {
            if !holds(&effect.conditions, state) {
                continue;
            }
            let var = effect.fact.var;
            if assigned[var] && next[var] != effect.fact.value {
                return None;
            }
            assigned[var] = true;
            next[var] = effect.fact.value;
        }
        Some(next)
    }

    pub fn calculate_plan_cost(&self, plan: &[usize]) -> Cost {
        plan.iter().map(|&op| self.operators[op].cost).sum()
    }

    /// Execute `plan` from `state`, returning the final state, or `None` if
    /// some operator is inapplicable along the way.
    pub fn simulate(&self, state: &[i32], plan: &[usize]) -> Option<Vec<i32>> {
        let mut current = state.to_vec();
        for &op in plan {
            current = self.apply(op, &current)?;
        }
        Some(current)
    }
}

fn holds(facts: &[FactPair], state: &[i32]) -> bool {
    facts.iter().all(|f| state[f.var] == f.value)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn toggles() -> Task {
        Task {
            variables: vec![Variable::new("a", 2), Variable::new("b", 3)],
            operators: vec![
                Operator::new(
                    "set-a",
                    vec![FactPair::new(0, 0)],
                    vec![Effect::new(FactPair::new(0, 1))],
                    1,
                ),
                Operator::new(
                    "bump-b",
                    vec![],
                    vec![
                        Effect::conditional(FactPair::new(1, 1), vec![FactPair::new(1, 0)]),
                        Effect::conditional(FactPair::new(1, 2), vec![FactPair::new(1, 1)]),
                    ],
                    2,
                ),
            ],
            initial_state: vec![0, 0],
            goal: vec![FactPair::new(0, 1), FactPair::new(1, 2)],
            ..Task::default()
        }
    }

    #[test]
    fn test_validate_ok() {
        assert_eq!(toggles().validate(), Ok(()));
    }

    #[test]
    fn test_validate_errors() {
        let mut task = toggles();
        task.goal.push(FactPair::new(7, 0));
        assert!(matches!(task.validate(), Err(PlannerError::UnknownVariable { var: 7, .. })));

        let mut task = toggles();
        task.goal = vec![];
        assert_eq!(task.validate(), Err(PlannerError::EmptyGoal));

        let mut task = toggles();
        task.initial_state = vec![0];
        assert_eq!(
            task.validate(),
            Err(PlannerError::InitialStateLength { expected: 2, actual: 1 })
        );

        let mut task = toggles();
        task.operators[0].preconditions.push(FactPair::new(1, 3));
        assert!(matches!(task.validate(), Err(PlannerError::FactOutOfRange { domain: 3, .. })));

        let mut task = toggles();
        task.operators[0].effects.push(Effect::new(FactPair::new(0, 0)));
        assert!(matches!(task.validate(), Err(PlannerError::ConflictingEffects { var: 0, .. })));

        let mut task = toggles();
        task.variables[1].domain = 0;
        assert_eq!(task.validate(), Err(PlannerError::EmptyDomain { var: 1 }));
    }

    #[test]
    fn test_queries() {
        let task = toggles();
        assert!(!task.has_axioms());
        assert!(task.has_conditional_effects());
        assert_eq!(task.first_conditional_effects_operator(), Some(1));
        assert!(!task.is_unit_cost());
        assert_eq!(task.min_action_cost(), Some(1));
        assert_eq!(task.max_action_cost(), Some(2));
        assert_eq!(task.num_facts(), 5);
        assert_eq!(task.fact_name(FactPair::new(1, 2)), "b=2");
    }

    #[test]
    fn test_conditional_effects_use_pre_state() {
        let task = toggles();
        // Both conditions are evaluated before any effect applies.
        assert_eq!(task.apply(1, &[0, 0]), Some(vec![0, 1]));
        assert_eq!(task.apply(1, &[0, 1]), Some(vec![0, 2]));
        assert_eq!(task.apply(1, &[0, 2]), Some(vec![0, 2]));
        assert_eq!(task.apply(0, &[1, 0]), None);
    }

    #[test]
    fn test_simulate() {
        let task = toggles();
        let plan = [1, 0, 1];
        let end = task.simulate(&task.initial_state, &plan).unwrap();
        assert!(task.test_goal(&end));
        assert_eq!(task.calculate_plan_cost(&plan), 5);
        assert_eq!(task.simulate(&task.initial_state, &[0, 0]), None);
    }
}
