//! stackup cloud provisioning core
//!
//! Turns an ordered, dependency-checked list of resources into created
//! resources against an injected provider client, one step at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   stackup CLI                    │
//! │                  (stackup up)                    │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                stackup-cloud                     │
//! │  ┌────────────┐ ┌──────────────┐ ┌───────────┐  │
//! │  │ Blueprint  │→│ Plan + Names │→│Orchestrator│  │
//! │  └────────────┘ └──────────────┘ └─────┬─────┘  │
//! │  ┌──────────────────────────────┐      │        │
//! │  │ trait ProvisioningClient     │◄─────┘        │
//! │  └──────────────────────────────┘               │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │ KEY=VALUE    │  │ Run report   │             │
//! │  └──────────────┘  └──────────────┘             │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │  azure (az)   │ │     mock      │
//! └───────────────┘ └───────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use stackup_cloud::{blueprint, output, MockClient, Orchestrator};
//!
//! let plan = blueprint::standard_plan(&config)?;
//! let client = MockClient::new();
//! let outcome = Orchestrator::new(&client).run(&plan).await?;
//! output::write_to_path(&outcome.context, "deployment-output.txt").await?;
//! ```

pub mod blueprint;
pub mod context;
pub mod error;
pub mod executor;
pub mod mock;
pub mod naming;
pub mod output;
pub mod plan;
pub mod provider;
pub mod report;
pub mod resource;

// Re-exports
pub use context::{RunContext, RunStatus, StepWarning};
pub use error::{ProvisionError, Result};
pub use executor::{CancelSignal, NoProgress, Orchestrator, ProgressReporter, RunOutcome, StepOutcome};
pub use mock::MockClient;
pub use naming::{NameCharset, NameGenerator, NamePolicy, RunSeed};
pub use plan::{ProvisioningPlan, ProvisioningStep, StepParams, StepRequest};
pub use provider::{AuthStatus, ProvisioningClient};
pub use report::{ReportStore, RunReport};
pub use resource::{Attributes, ResourceRecord, ResourceType};
