// Demonstration: run grid-world episodes with a baseline policy.
//
// Run from the repo root:
//   RUST_LOG=gridflock=debug cargo run --example gridworld_demo -- \
//       --policy greedy --episodes 10 --agents 6

use std::env;

use gridflock::{
    EnvConfig, GreedyPolicy, Grid, GridWorldEnv, Placement, Policy, RandomPolicy, SchedulerPolicy,
};
use tracing_subscriber::EnvFilter;

const LAYOUT: &str = "
    ..........
    ..#....#..
    ..#....#..
    ..........
    ....##....
    ....##....
    ..........
    ..#....#..
    ..#....#..
    ..........
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let policy_name = arg_value(&args, "--policy").unwrap_or("greedy");
    let episodes: u64 = arg_value(&args, "--episodes")
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);
    let seed: u64 = arg_value(&args, "--seed")
        .and_then(|s| s.parse().ok())
        .unwrap_or(42);
    let agents: u32 = arg_value(&args, "--agents")
        .and_then(|s| s.parse().ok())
        .unwrap_or(6);
    let scheduler = match arg_value(&args, "--scheduler").unwrap_or("clock") {
        "clock" => SchedulerPolicy::CentralClock,
        "round-robin" => SchedulerPolicy::RoundRobin,
        other => {
            eprintln!("Unknown --scheduler '{}'; expected 'clock' or 'round-robin'.", other);
            std::process::exit(2);
        }
    };

    let config = EnvConfig {
        grid: Grid::from_ascii(LAYOUT)?,
        placement: Placement::Random { agents },
        scheduler,
        step_budget: 200,
        ..EnvConfig::default()
    };
    let moves = config.moves;
    let mut env = GridWorldEnv::new(config)?;

    let mut policy: Box<dyn Policy> = match policy_name {
        "random" => Box::new(RandomPolicy::new(moves, seed)),
        "greedy" => Box::new(GreedyPolicy::new(moves)),
        other => {
            eprintln!("Unknown --policy '{}'; expected 'greedy' or 'random'.", other);
            std::process::exit(2);
        }
    };

    println!("Policy: {}", policy.name());
    let mut successes = 0.0;
    for episode in 0..episodes {
        env.reset(seed.wrapping_add(episode))?;
        if episode == 0 {
            println!("{}\n", env.render());
        }
        while !env.step_with(policy.as_mut())?.done {}
        let record = env.episode_record();
        successes += record.success_rate;
        println!("{}", record);
    }
    if episodes > 0 {
        println!("Mean success rate: {:.1}%", successes / episodes as f64 * 100.0);
    }
    Ok(())
}

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
