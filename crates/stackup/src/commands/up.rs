use crate::progress::ConsoleProgress;
use crate::utils;
use colored::Colorize;
use stackup_cloud::{
    CancelSignal, MockClient, Orchestrator, ProvisioningClient, ReportStore, RunReport, RunStatus,
    blueprint, output,
};
use stackup_cloud_azure::{Az, AzureClient};
use stackup_config::StackConfig;
use std::path::Path;

/// Mock client for dry runs, the az-backed client otherwise
pub fn client(
    dry_run: bool,
    subscription: Option<String>,
    fail_steps: Vec<String>,
) -> Box<dyn ProvisioningClient> {
    if dry_run {
        println!("{}", "Dry run: using the mock provider".yellow());
        let mock = fail_steps
            .into_iter()
            .fold(MockClient::new(), |mock, step| mock.fail_on(step));
        Box::new(mock)
    } else {
        Box::new(AzureClient::new(Az::new(subscription)))
    }
}

pub async fn handle(
    config: &StackConfig,
    file: Option<&Path>,
    client: &dyn ProvisioningClient,
) -> anyhow::Result<RunStatus> {
    println!("{}", "Provisioning stack...".blue().bold());
    utils::print_config_source(file);
    println!("Region: {}", config.region.cyan());

    let plan = blueprint::standard_plan(config)?;

    let auth = client.check_auth().await?;
    if !auth.authenticated {
        anyhow::bail!(
            "Not logged in to {}: {}\nRun `az login` first",
            client.name(),
            auth.error.unwrap_or_default()
        );
    }
    if let Some(account) = &auth.account_info {
        println!("Account: {}", account.cyan());
    }

    let cancel = CancelSignal::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{}", "Cancelling after the current step...".yellow());
                cancel.cancel();
            }
        }
    });

    println!();
    let started_at = chrono::Utc::now();
    let outcome = Orchestrator::new(client)
        .with_cancel(cancel)
        .with_reporter(ConsoleProgress)
        .run(&plan)
        .await?;
    let ctx = &outcome.context;

    output::write_to_path(ctx, &config.output_path).await?;

    let report = RunReport::new(
        client.name(),
        started_at,
        ctx.clone(),
        outcome.error.as_ref().map(ToString::to_string),
    );
    match std::env::current_dir() {
        Ok(root) => {
            if let Err(e) = ReportStore::new(root).save(&report).await {
                tracing::warn!("Failed to save run report: {}", e);
            }
        }
        Err(e) => tracing::warn!("Failed to save run report: {}", e),
    }

    println!();
    for warning in ctx.warnings() {
        println!("{} {}", "⚠".yellow(), warning);
    }

    match &outcome.error {
        None => {
            println!(
                "{}",
                format!(
                    "✓ Provisioned {} resources (run {})",
                    ctx.records().len(),
                    ctx.run_seed()
                )
                .green()
                .bold()
            );
        }
        Some(err) => {
            println!("{} {}", "✗ Run aborted:".red().bold(), err);
            println!(
                "  {} resources were created before the abort and were not rolled back",
                ctx.records().len()
            );
        }
    }
    println!(
        "Output written to {}",
        config.output_path.display().to_string().cyan()
    );

    Ok(ctx.status())
}
