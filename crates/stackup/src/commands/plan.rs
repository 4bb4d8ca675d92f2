use crate::utils;
use colored::Colorize;
use stackup_cloud::blueprint;
use stackup_config::StackConfig;
use std::path::Path;

pub fn handle(config: &StackConfig, file: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", "Validating plan...".blue());
    utils::print_config_source(file);
    println!("Region: {}", config.region.cyan());

    let plan = blueprint::standard_plan(config)?;

    println!();
    for (index, step) in plan.steps().iter().enumerate() {
        let required = if step.is_required() {
            String::new()
        } else {
            format!(" {}", "(optional)".yellow())
        };
        println!(
            "  {:>2}. {} [{}]{}",
            index + 1,
            step.id().cyan(),
            step.resource_type(),
            required
        );
        if !step.dependencies().is_empty() {
            println!("      after: {}", step.dependencies().join(", "));
        }
        if !step.exports().is_empty() {
            let keys: Vec<&str> = step.exports().values().map(String::as_str).collect();
            println!("      exports: {}", keys.join(", ").dimmed());
        }
    }

    println!();
    println!(
        "{}",
        format!("✓ Plan is valid ({} steps)", plan.len()).green().bold()
    );
    Ok(())
}
