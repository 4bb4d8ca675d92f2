//! Sequential plan executor
//!
//! Walks a [`ProvisioningPlan`] in order, one client call at a time, and
//! applies the fail-fast policy for required steps and the warn-and-continue
//! policy for best-effort ones.

use crate::context::{RunContext, RunStatus};
use crate::error::{ProvisionError, Result};
use crate::plan::{ProvisioningPlan, ProvisioningStep, StepRequest};
use crate::provider::ProvisioningClient;
use crate::resource::ResourceRecord;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Caller-owned cancellation flag, checked between steps
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a single step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A record was produced
    Done,
    /// Required step failed; the run aborts
    Failed(String),
    /// Best-effort step failed; recorded as a warning
    Warned(String),
    /// Best-effort step skipped because a dependency produced nothing
    Skipped(String),
}

/// Observer for per-step progress
pub trait ProgressReporter: Send {
    fn step_started(&mut self, _position: usize, _total: usize, _step: &ProvisioningStep) {}

    fn step_finished(
        &mut self,
        _position: usize,
        _total: usize,
        _step: &ProvisioningStep,
        _outcome: &StepOutcome,
    ) {
    }

    fn cancelled(&mut self, _position: usize, _total: usize, _step: &ProvisioningStep) {}
}

/// Reporter that ignores every event
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Final context of a run plus the error that aborted it, if any
#[derive(Debug)]
pub struct RunOutcome {
    pub context: RunContext,
    pub error: Option<ProvisionError>,
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        self.context.status()
    }

    pub fn is_success(&self) -> bool {
        self.context.status() == RunStatus::Completed
    }

    /// Context on success, the aborting error otherwise
    pub fn into_result(self) -> Result<RunContext> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.context),
        }
    }
}

/// Runs provisioning plans against a client
pub struct Orchestrator<'a> {
    client: &'a dyn ProvisioningClient,
    cancel: Option<CancelSignal>,
    reporter: Box<dyn ProgressReporter + 'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(client: &'a dyn ProvisioningClient) -> Self {
        Self {
            client,
            cancel: None,
            reporter: Box::new(NoProgress),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_reporter(mut self, reporter: impl ProgressReporter + 'a) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Run `plan` in a fresh context seeded from the wall clock
    pub async fn run(&mut self, plan: &ProvisioningPlan) -> Result<RunOutcome> {
        self.run_with_context(plan, RunContext::new()).await
    }

    /// Run `plan` in `ctx`, which must be fresh
    ///
    /// Returns `Err` only when the run cannot start (a used context, or a
    /// name that does not fit its policy); nothing has been created then.
    /// Step failures are reported through [`RunOutcome`].
    pub async fn run_with_context(
        &mut self,
        plan: &ProvisioningPlan,
        mut ctx: RunContext,
    ) -> Result<RunOutcome> {
        if ctx.status() != RunStatus::Idle || !ctx.records().is_empty() {
            return Err(ProvisionError::ContextReused {
                status: ctx.status(),
            });
        }

        let names = plan.resolve_names(ctx.run_seed())?;
        let total = plan.len();

        ctx.start();
        tracing::info!(
            "Starting run {} with {} steps via {}",
            ctx.run_seed(),
            total,
            self.client.name()
        );

        for (index, (step, (_, name))) in plan.steps().iter().zip(names).enumerate() {
            let position = index + 1;

            if self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
                tracing::warn!("Run cancelled before step {}", step.id());
                self.reporter.cancelled(position, total, step);
                ctx.finish(RunStatus::Aborted);
                return Ok(RunOutcome {
                    context: ctx,
                    error: Some(ProvisionError::Cancelled {
                        step_id: step.id().to_string(),
                    }),
                });
            }

            self.reporter.step_started(position, total, step);

            let missing: Vec<&str> = step
                .dependencies()
                .iter()
                .map(String::as_str)
                .filter(|dep| !ctx.has_record(dep))
                .collect();

            let result = if missing.is_empty() {
                self.execute(step, name, &ctx).await
            } else {
                Err(format!(
                    "skipped: dependency {} produced no resource",
                    missing.join(", ")
                ))
            };

            match result {
                Ok(record) => {
                    tracing::info!(
                        "Created {} {} ({})",
                        record.resource_type(),
                        record.name(),
                        step.id()
                    );
                    ctx.push_record(record);
                    self.reporter
                        .step_finished(position, total, step, &StepOutcome::Done);
                }
                Err(cause) if step.is_required() => {
                    tracing::error!("Required step {} failed: {}", step.id(), cause);
                    self.reporter.step_finished(
                        position,
                        total,
                        step,
                        &StepOutcome::Failed(cause.clone()),
                    );
                    ctx.finish(RunStatus::Aborted);
                    return Ok(RunOutcome {
                        context: ctx,
                        error: Some(ProvisionError::StepFailure {
                            step_id: step.id().to_string(),
                            cause,
                        }),
                    });
                }
                Err(cause) => {
                    tracing::warn!("Optional step {} did not complete: {}", step.id(), cause);
                    let outcome = if missing.is_empty() {
                        StepOutcome::Warned(cause.clone())
                    } else {
                        StepOutcome::Skipped(cause.clone())
                    };
                    self.reporter.step_finished(position, total, step, &outcome);
                    ctx.push_warning(step.id(), cause);
                }
            }
        }

        ctx.finish(RunStatus::Completed);
        tracing::info!(
            "Run {} completed: {} resources, {} warnings",
            ctx.run_seed(),
            ctx.records().len(),
            ctx.warnings().len()
        );

        Ok(RunOutcome {
            context: ctx,
            error: None,
        })
    }

    async fn execute(
        &self,
        step: &ProvisioningStep,
        name: String,
        ctx: &RunContext,
    ) -> std::result::Result<ResourceRecord, String> {
        let params = step.resolve_params(ctx).map_err(|e| e.to_string())?;
        let request = StepRequest {
            step_id: step.id().to_string(),
            name,
            params,
        };

        tracing::debug!("Provisioning {} {}", step.resource_type(), request.name);

        let mut attributes = self
            .client
            .provision(step.resource_type(), &request)
            .await
            .map_err(|e| e.to_string())?;
        attributes
            .entry("name".to_string())
            .or_insert_with(|| request.name.clone());

        Ok(ResourceRecord::new(
            request.step_id,
            step.resource_type(),
            request.name,
            attributes,
            step.exports().clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockClient;
    use crate::naming::RunSeed;
    use crate::plan::{ProvisioningStep, StepParams};
    use crate::resource::ResourceType;
    use std::sync::Mutex;

    fn small_plan() -> ProvisioningPlan {
        ProvisioningPlan::new(vec![
            ProvisioningStep::new("rg", ResourceType::Group),
            ProvisioningStep::new("sql", ResourceType::Server).depends_on("rg"),
            ProvisioningStep::new("db", ResourceType::Database)
                .depends_on("sql")
                .params(|ctx| {
                    Ok(StepParams::new().with("server", ctx.require_record("sql")?.name()))
                }),
        ])
        .unwrap()
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl ProgressReporter for Recorder {
        fn step_started(&mut self, position: usize, total: usize, step: &ProvisioningStep) {
            self.0
                .lock()
                .unwrap()
                .push(format!("start {}/{} {}", position, total, step.id()));
        }

        fn step_finished(
            &mut self,
            position: usize,
            total: usize,
            step: &ProvisioningStep,
            outcome: &StepOutcome,
        ) {
            self.0.lock().unwrap().push(format!(
                "end {}/{} {} {:?}",
                position,
                total,
                step.id(),
                outcome
            ));
        }
    }

    #[tokio::test]
    async fn test_run_completes_in_plan_order() {
        let client = MockClient::new();
        let recorder = Recorder::default();
        let outcome = Orchestrator::new(&client)
            .with_reporter(recorder.clone())
            .run_with_context(&small_plan(), RunContext::with_seed(RunSeed::new(1)))
            .await
            .unwrap();

        assert!(outcome.is_success());
        let ids: Vec<&str> = outcome.context.records().iter().map(|r| r.step_id()).collect();
        assert_eq!(ids, ["rg", "sql", "db"]);
        assert_eq!(client.calls(), ["rg", "sql", "db"]);

        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(events[0], "start 1/3 rg");
        assert_eq!(events[1], "end 1/3 rg Done");
        assert_eq!(events.len(), 6);
    }

    #[tokio::test]
    async fn test_params_see_earlier_records() {
        let client = MockClient::new();
        let outcome = Orchestrator::new(&client)
            .run_with_context(&small_plan(), RunContext::with_seed(RunSeed::new(9)))
            .await
            .unwrap();

        let db = outcome.context.record("db").unwrap();
        assert_eq!(db.attribute("server"), Some("sql-0000000000009"));
        assert_eq!(db.attribute("name"), Some(db.name()));
    }

    #[tokio::test]
    async fn test_params_failure_aborts_required_step() {
        let plan = ProvisioningPlan::new(vec![
            ProvisioningStep::new("rg", ResourceType::Group),
            ProvisioningStep::new("db", ResourceType::Database)
                .depends_on("rg")
                .params(|ctx| {
                    Ok(StepParams::new().with("fqdn", ctx.require_attribute("rg", "fqdn")?))
                }),
        ])
        .unwrap();

        let client = MockClient::new();
        let outcome = Orchestrator::new(&client).run(&plan).await.unwrap();

        assert_eq!(outcome.status(), RunStatus::Aborted);
        assert!(matches!(
            outcome.error,
            Some(ProvisionError::StepFailure { ref step_id, .. }) if step_id == "db"
        ));
        assert_eq!(client.calls(), ["rg"]);
    }

    #[tokio::test]
    async fn test_cancel_before_first_step() {
        let client = MockClient::new();
        let cancel = CancelSignal::new();
        cancel.cancel();

        let outcome = Orchestrator::new(&client)
            .with_cancel(cancel)
            .run(&small_plan())
            .await
            .unwrap();

        assert_eq!(outcome.status(), RunStatus::Aborted);
        assert!(outcome.context.records().is_empty());
        assert!(matches!(outcome.error, Some(ProvisionError::Cancelled { .. })));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_between_steps() {
        let cancel = CancelSignal::new();
        let client = MockClient::new().on_call({
            let cancel = cancel.clone();
            move |step_id| {
                if step_id == "sql" {
                    cancel.cancel();
                }
            }
        });

        let outcome = Orchestrator::new(&client)
            .with_cancel(cancel)
            .run(&small_plan())
            .await
            .unwrap();

        assert_eq!(outcome.status(), RunStatus::Aborted);
        assert_eq!(outcome.context.records().len(), 2);
        assert!(matches!(
            outcome.error,
            Some(ProvisionError::Cancelled { ref step_id }) if step_id == "db"
        ));
    }

    #[tokio::test]
    async fn test_used_context_is_rejected() {
        let client = MockClient::new();
        let plan = small_plan();
        let first = Orchestrator::new(&client).run(&plan).await.unwrap();

        let err = Orchestrator::new(&client)
            .run_with_context(&plan, first.context)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::ContextReused {
                status: RunStatus::Completed
            }
        ));
        assert!(!err.is_construction_error());
    }

    #[tokio::test]
    async fn test_skipped_required_step_aborts() {
        let plan = ProvisioningPlan::new(vec![
            ProvisioningStep::new("rg", ResourceType::Group),
            ProvisioningStep::new("fw", ResourceType::FirewallRule)
                .depends_on("rg")
                .optional(),
            ProvisioningStep::new("cors", ResourceType::CorsRule).depends_on("fw"),
        ])
        .unwrap();
        let client = MockClient::new().fail_on("fw");

        let outcome = Orchestrator::new(&client).run(&plan).await.unwrap();

        assert_eq!(outcome.status(), RunStatus::Aborted);
        assert_eq!(outcome.context.warnings().len(), 1);
        assert!(matches!(
            outcome.error,
            Some(ProvisionError::StepFailure { ref step_id, .. }) if step_id == "cors"
        ));
    }

    #[tokio::test]
    async fn test_skipped_optional_step_warns_and_continues() {
        let plan = ProvisioningPlan::new(vec![
            ProvisioningStep::new("rg", ResourceType::Group),
            ProvisioningStep::new("fw", ResourceType::FirewallRule)
                .depends_on("rg")
                .optional(),
            ProvisioningStep::new("cors", ResourceType::CorsRule)
                .depends_on("fw")
                .optional(),
            ProvisioningStep::new("acr", ResourceType::Registry).depends_on("rg"),
        ])
        .unwrap();
        let client = MockClient::new().fail_on("fw");

        let outcome = Orchestrator::new(&client).run(&plan).await.unwrap();

        assert_eq!(outcome.status(), RunStatus::Completed);
        assert_eq!(outcome.context.warnings().len(), 2);
        assert!(outcome.context.warnings()[1].cause.contains("skipped"));
        // The skipped step never reaches the client
        assert_eq!(client.calls(), ["rg", "fw", "acr"]);
    }
}
