use colored::Colorize;
use stackup_cloud::{ProgressReporter, ProvisioningStep, StepOutcome};
use std::io::Write;

/// Numbered `[k/N] <step>... done|failed` lines on stdout
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl ProgressReporter for ConsoleProgress {
    fn step_started(&mut self, position: usize, total: usize, step: &ProvisioningStep) {
        print!(
            "{} {}... ",
            format!("[{}/{}]", position, total).bold(),
            step.description()
        );
        let _ = std::io::stdout().flush();
    }

    fn step_finished(
        &mut self,
        _position: usize,
        _total: usize,
        _step: &ProvisioningStep,
        outcome: &StepOutcome,
    ) {
        match outcome {
            StepOutcome::Done => println!("{}", "done".green()),
            StepOutcome::Failed(cause) => {
                println!("{}", "failed".red().bold());
                println!("      {}", cause.red());
            }
            StepOutcome::Warned(cause) => {
                println!("{} {}", "failed".yellow(), "(optional, continuing)".dimmed());
                println!("      {}", cause.yellow());
            }
            StepOutcome::Skipped(cause) => {
                println!("{} {}", "skipped".yellow(), format!("({})", cause).dimmed());
            }
        }
    }

    fn cancelled(&mut self, position: usize, total: usize, step: &ProvisioningStep) {
        println!(
            "{} {}... {}",
            format!("[{}/{}]", position, total).bold(),
            step.description(),
            "cancelled".red()
        );
    }
}
