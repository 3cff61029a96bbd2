//! Pairwise mutual exclusion between facts.

use log::debug;

use crate::bitset::BitSet;
use crate::error::Result;
use crate::task::{FactPair, Task};
use crate::utils::{triangular_index, triangular_size};

/// Symmetric mutex relation over facts.
///
/// Facts are numbered globally (`first_fact[var] + value`) and each
/// unordered cross-variable pair owns one bit of a lower-triangular table.
/// Same-variable pairs are answered without the table.
#[derive(Debug, Clone)]
pub struct MutexIndex {
    first_fact: Vec<usize>,
    num_facts: usize,
    table: BitSet,
    num_pairs: usize,
}

impl MutexIndex {
    /// Mark every pair of facts sharing an invariant group of `task`.
    pub fn new(task: &Task) -> Result<Self> {
        let mut first_fact = Vec::with_capacity(task.num_variables());
        let mut num_facts = 0;
        for variable in &task.variables {
            first_fact.push(num_facts);
            num_facts += variable.domain;
        }

        let mut index = Self {
            first_fact,
            num_facts,
            table: BitSet::new(triangular_size(num_facts)),
            num_pairs: 0,
        };

        for (i, group) in task.mutex_groups.iter().enumerate() {
            let context = format!("mutex group {}", i);
            for &fact in group {
                task.check_fact(fact, &context)?;
            }
            for (k, &a) in group.iter().enumerate() {
                for &b in &group[k + 1..] {
                    // Same-variable pairs are implicit; a repeated fact is not self-mutex.
                    if a.var == b.var {
                        continue;
                    }
                    if index.table.insert(index.pair_index(a, b)) {
                        index.num_pairs += 1;
                    }
                }
            }
        }

        debug!(
            "Built mutex index: {} facts, {} cross-variable pairs from {} groups",
            num_facts,
            index.num_pairs,
            task.mutex_groups.len()
        );
        Ok(index)
    }

    fn fact_id(&self, fact: FactPair) -> usize {
        debug_assert!(fact.value >= 0);
        self.first_fact[fact.var] + fact.value as usize
    }

    fn pair_index(&self, a: FactPair, b: FactPair) -> usize {
        triangular_index(self.fact_id(a), self.fact_id(b))
    }

    pub fn are_mutex(&self, a: FactPair, b: FactPair) -> bool {
        if a.is_undefined() || b.is_undefined() {
            return false;
        }
        if a.var == b.var {
            return a.value != b.value;
        }
        self.table.contains(self.pair_index(a, b))
    }

    /// Number of facts in the task.
    pub fn num_facts(&self) -> usize {
        self.num_facts
    }

    /// Number of marked cross-variable pairs.
    pub fn num_pairs(&self) -> usize {
        self.num_pairs
    }

    /// All marked cross-variable pairs `(a, b)` with `a.var < b.var`.
    pub fn pairs(&self) -> Vec<(FactPair, FactPair)> {
        let facts: Vec<FactPair> = self
            .first_fact
            .iter()
            .enumerate()
            .flat_map(|(var, &first)| {
                let end = self.first_fact.get(var + 1).copied().unwrap_or(self.num_facts);
                (0..end - first).map(move |value| FactPair::new(var, value as i32))
            })
            .collect();

        let mut pairs = Vec::with_capacity(self.num_pairs);
        for (hi, &b) in facts.iter().enumerate() {
            for (lo, &a) in facts[..hi].iter().enumerate() {
                if a.var != b.var && self.table.contains(triangular_index(lo, hi)) {
                    pairs.push((a, b));
                }
            }
        }
        pairs
    }
}
