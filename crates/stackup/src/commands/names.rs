use colored::Colorize;
use stackup_cloud::{RunSeed, blueprint};
use stackup_config::StackConfig;

pub fn handle(config: &StackConfig, seed: Option<i64>) -> anyhow::Result<()> {
    let seed = seed.map(RunSeed::new).unwrap_or_else(RunSeed::now);
    let plan = blueprint::standard_plan(config)?;

    println!("Run seed: {}", seed.to_string().cyan());
    for (step_id, name) in plan.resolve_names(seed)? {
        println!("  {:<24} {}", step_id, name);
    }
    Ok(())
}
