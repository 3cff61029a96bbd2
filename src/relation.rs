use std::collections::BTreeMap;

use log::debug;

use crate::sets::StateSets;
use crate::task::Cost;

/// Transition relations of a task, built once per backend.
///
/// Operators are merged per cost so one expansion step needs one image per
/// distinct cost. Zero-cost operators form their own group. Per-operator
/// relations are kept for plan extraction.
pub struct OperatorRelations<S: StateSets> {
    zero_cost: Option<S::Relation>,
    /// Positive-cost groups, ascending by cost.
    costed: Vec<(Cost, S::Relation)>,
    operators: Vec<S::Relation>,
    costs: Vec<Cost>,
    zero_cost_ops: Vec<usize>,
}

impl<S: StateSets> OperatorRelations<S> {
    pub fn new(sets: &S) -> Self {
        let task = sets.session().task();

        let mut groups: BTreeMap<Cost, Vec<usize>> = BTreeMap::new();
        for (op, operator) in task.operators.iter().enumerate() {
            groups.entry(operator.cost).or_default().push(op);
        }

        let zero_cost_ops = groups.remove(&0).unwrap_or_default();
        let zero_cost = (!zero_cost_ops.is_empty()).then(|| sets.relation(&zero_cost_ops));
        let costed: Vec<(Cost, S::Relation)> = groups
            .iter()
            .map(|(&cost, ops)| (cost, sets.relation(ops)))
            .collect();
        let operators = (0..task.operators.len()).map(|op| sets.relation(&[op])).collect();

        debug!(
            "Built transition relations: {} operators, {} zero-cost, {} cost groups",
            task.operators.len(),
            zero_cost_ops.len(),
            costed.len()
        );

        Self {
            zero_cost,
            costed,
            operators,
            costs: task.operators.iter().map(|op| op.cost).collect(),
            zero_cost_ops,
        }
    }

    pub fn zero_cost(&self) -> Option<&S::Relation> {
        self.zero_cost.as_ref()
    }

    pub fn zero_cost_operators(&self) -> &[usize] {
        &self.zero_cost_ops
    }

    pub fn costed(&self) -> &[(Cost, S::Relation)] {
        &self.costed
    }

    pub fn operator(&self, op: usize) -> &S::Relation {
        &self.operators[op]
    }

    pub fn cost(&self, op: usize) -> Cost {
        self.costs[op]
    }

    pub fn num_operators(&self) -> usize {
        self.operators.len()
    }
}
