use std::time::Duration;

use clap::{Parser, ValueEnum};

use symplan::bidirectional::{BidirectionalSearch, DirectionPolicy, SearchConfig, SearchOutcome};
use symplan::relation::OperatorRelations;
use symplan::session::Session;
use symplan::sets::StateSets;
use symplan::symbolic::SymVariables;

#[path = "../tests/common/mod.rs"]
mod common;

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Policy {
    Forward,
    Backward,
    Alternate,
    Smaller,
}

impl From<Policy> for DirectionPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Forward => DirectionPolicy::Forward,
            Policy::Backward => DirectionPolicy::Backward,
            Policy::Alternate => DirectionPolicy::Alternate,
            Policy::Smaller => DirectionPolicy::SmallerFrontier,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of balls.
    #[arg(value_name = "INT", default_value = "4")]
    balls: usize,

    /// Which direction to expand next.
    #[clap(long, value_enum, default_value = "smaller")]
    policy: Policy,

    /// BDD size (in bits, so the initial table has `2^size` buckets).
    #[clap(long, value_name = "INT", default_value = "16")]
    size: usize,

    /// Give up after this many seconds.
    #[clap(long, value_name = "SECONDS")]
    time_limit: Option<u64>,

    /// Give up once more nodes than this survive garbage collection.
    #[clap(long, value_name = "INT")]
    max_nodes: Option<usize>,

    /// Only look for plans cheaper than this.
    #[clap(long, value_name = "INT")]
    cost_bound: Option<u32>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let session = Session::new(common::gripper(args.balls))?;
    let vars = SymVariables::with_table_bits(&session, args.size);
    println!(
        "{} variables on {} bits, {} valid states",
        session.task().num_variables(),
        vars.num_bits(),
        vars.count_states(&vars.valid_states())
    );

    let relations = OperatorRelations::new(&vars);
    let config = SearchConfig {
        policy: args.policy.into(),
        max_nodes: args.max_nodes,
        time_limit: args.time_limit.map(Duration::from_secs),
        cost_bound: args.cost_bound,
        ..SearchConfig::default()
    };
    let mut search = BidirectionalSearch::new(&vars, &relations, config)?;
    let outcome = search.run();
    println!("outcome = {:?}", outcome);
    println!("bdd = {:?}", vars.bdd());

    if let SearchOutcome::Solved { .. } = outcome {
        let solution = search.solution();
        if let Some(plan) = solution.get_plan() {
            println!("{}", plan.display(session.task()));
        }
        println!(
            "{} operators appear in some optimal plan",
            solution.get_operators_optimal_plans().len()
        );
    }

    let (hits, misses) = vars.bdd().cache_stats();
    println!("cache hits: {}", hits);
    println!("cache misses: {}", misses);

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
