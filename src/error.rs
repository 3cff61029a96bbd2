use std::fmt;

use crate::task::FactPair;

/// Errors raised while building a planning session or configuring a search.
///
/// Search outcomes (solved, unsolvable, out of budget) are not errors; see
/// [`SearchOutcome`][crate::bidirectional::SearchOutcome].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerError {
    /// A fact names a variable the task does not have.
    UnknownVariable { context: String, var: usize },
    /// A fact value lies outside its variable's domain.
    FactOutOfRange { context: String, fact: FactPair, domain: usize },
    /// A variable with no values.
    EmptyDomain { var: usize },
    /// The goal has no facts.
    EmptyGoal,
    /// The initial state does not assign every variable exactly once.
    InitialStateLength { expected: usize, actual: usize },
    /// Two unconditional effects of one operator assign different values to a variable.
    ConflictingEffects { operator: String, var: usize },
    /// The task uses a feature the requested component cannot handle.
    Unsupported { feature: &'static str },
    /// The explicit backend refuses to enumerate this many states.
    TooManyStates { states: u128, limit: u128 },
    /// Rejected search configuration.
    InvalidConfig(String),
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::UnknownVariable { context, var } => {
                write!(f, "{}: unknown variable {}", context, var)
            }
            PlannerError::FactOutOfRange { context, fact, domain } => {
                write!(f, "{}: fact {} out of range (domain size {})", context, fact, domain)
            }
            PlannerError::EmptyDomain { var } => write!(f, "variable {} has an empty domain", var),
            PlannerError::EmptyGoal => write!(f, "goal is empty"),
            PlannerError::InitialStateLength { expected, actual } => {
                write!(f, "initial state has {} values, expected {}", actual, expected)
            }
            PlannerError::ConflictingEffects { operator, var } => {
                write!(f, "operator {} assigns variable {} twice", operator, var)
            }
            PlannerError::Unsupported { feature } => write!(f, "unsupported feature: {}", feature),
            PlannerError::TooManyStates { states, limit } => {
                write!(f, "state space has {} states, limit is {}", states, limit)
            }
            PlannerError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for PlannerError {}

pub type Result<T, E = PlannerError> = std::result::Result<T, E>;
