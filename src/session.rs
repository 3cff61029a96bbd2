use log::{info, warn};

use crate::error::Result;
use crate::mutex::MutexIndex;
use crate::packer::{PackedState, StatePacker};
use crate::task::{AxiomEvaluator, FactPair, NoAxioms, Task};

/// A planning session: the validated task plus the tables derived from it.
///
/// Built once, read-only afterwards. Every search component borrows it.
#[derive(Debug)]
pub struct Session {
    task: Task,
    mutexes: MutexIndex,
    packer: StatePacker,
    initial_state: Vec<i32>,
}

impl Session {
    pub fn new(task: Task) -> Result<Self> {
        Self::with_axioms(task, &NoAxioms)
    }

    /// Like [`Session::new`], completing the initial state with `evaluator`.
    pub fn with_axioms(task: Task, evaluator: &dyn AxiomEvaluator) -> Result<Self> {
        task.validate()?;

        let mutexes = MutexIndex::new(&task)?;
        let packer = StatePacker::new(&task.domains());

        let mut initial_state = task.initial_state.clone();
        evaluator.evaluate(&mut initial_state);

        let session = Self {
            task,
            mutexes,
            packer,
            initial_state,
        };

        info!(
            "Session: {} variables, {} facts, {} operators, {} bytes per state, {} mutex pairs",
            session.task.num_variables(),
            session.mutexes.num_facts(),
            session.task.operators.len(),
            session.packer.bytes_per_state(),
            session.mutexes.num_pairs()
        );
        if !session.is_valid_state(&session.initial_state) {
            warn!("Initial state violates a mutex invariant");
        }

        Ok(session)
    }

    pub fn task(&self) -> &Task {
        &self.task
    }
    pub fn mutexes(&self) -> &MutexIndex {
        &self.mutexes
    }
    pub fn packer(&self) -> &StatePacker {
        &self.packer
    }

    /// The initial state after axiom evaluation.
    pub fn initial_state(&self) -> &[i32] {
        &self.initial_state
    }

    pub fn packed_initial_state(&self) -> PackedState {
        self.packer.pack(&self.initial_state)
    }

    /// True if `state` is in range and violates no mutex pair.
    pub fn is_valid_state(&self, state: &[i32]) -> bool {
        if state.len() != self.task.num_variables() {
            return false;
        }
        let in_range = state
            .iter()
            .zip(&self.task.variables)
            .all(|(&value, variable)| value >= 0 && (value as usize) < variable.domain);
        if !in_range {
            return false;
        }
        (0..state.len()).all(|a| {
            (a + 1..state.len())
                .all(|b| !self.mutexes.are_mutex(FactPair::new(a, state[a]), FactPair::new(b, state[b])))
        })
    }
}
