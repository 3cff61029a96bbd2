//! # symplan: cost-optimal planning by bidirectional symbolic search
//!
//! **`symplan`** finds minimum-cost plans for factored transition systems
//! (finite-domain variables, operators with preconditions, possibly
//! conditional effects and costs, a conjunctive goal and invariant mutex
//! groups), or proves that none exists.
//!
//! Sets of states are represented by **Binary Decision Diagrams**. A
//! forward search from the initial state and a backward search from the
//! goal expand cost layers of such sets until they meet, and the meeting
//! point is certified optimal once no open layer can complete a cheaper
//! plan.
//!
//! ## Basic Usage
//!
//! ```rust
//! use symplan::bidirectional::{find_optimal_plan, SearchConfig, SearchOutcome};
//! use symplan::session::Session;
//! use symplan::task::{Effect, FactPair, Operator, Task, Variable};
//!
//! // Two switches: turning on `a` costs 1, turning on `b` costs 2.
//! let task = Task {
//!     variables: vec![Variable::new("a", 2), Variable::new("b", 2)],
//!     operators: vec![
//!         Operator::new("on-a", vec![FactPair::new(0, 0)], vec![Effect::new(FactPair::new(0, 1))], 1),
//!         Operator::new("on-b", vec![FactPair::new(1, 0)], vec![Effect::new(FactPair::new(1, 1))], 2),
//!     ],
//!     initial_state: vec![0, 0],
//!     goal: vec![FactPair::new(0, 1), FactPair::new(1, 1)],
//!     ..Task::default()
//! };
//!
//! let session = Session::new(task).unwrap();
//! let (outcome, plan) = find_optimal_plan(&session, SearchConfig::default()).unwrap();
//! assert_eq!(outcome, SearchOutcome::Solved { cost: 3 });
//!
//! let plan = plan.unwrap();
//! assert_eq!(plan.len(), 2);
//! println!("{}", plan.display(session.task()));
//! ```
//!
//! ## Core Components
//!
//! - **[`bdd`]**: the [`Bdd`][crate::bdd::Bdd] manager (hash-consed nodes, complement edges, ITE, quantification, relational product, renaming, garbage collection).
//! - **[`session`]**: the validated [`Task`][crate::task::Task] with its [`MutexIndex`][crate::mutex::MutexIndex] and [`StatePacker`][crate::packer::StatePacker].
//! - **[`sets`]**: the [`StateSets`][crate::sets::StateSets] algebra, implemented by [`symbolic`] (BDDs) and [`explicit`] (enumeration, for small tasks).
//! - **[`search`]** and **[`bidirectional`]**: one search direction, and the coordinator with its stopping rule.
//! - **[`solution`]**: plan extraction from the certified cut.

pub mod add;
pub mod bdd;
pub mod bidirectional;
pub mod bitset;
pub mod cache;
pub mod error;
pub mod explicit;
pub mod mutex;
pub mod node;
pub mod packer;
pub mod reference;
pub mod relation;
pub mod sat;
pub mod search;
pub mod session;
pub mod sets;
pub mod solution;
pub mod symbolic;
pub mod table;
pub mod task;
pub mod utils;
