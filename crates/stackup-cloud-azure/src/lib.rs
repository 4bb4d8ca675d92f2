//! Azure provider for stackup
//!
//! This crate implements the ProvisioningClient trait for Azure,
//! creating the standard stack one `az` command at a time.
//!
//! # Resources
//!
//! - Resource group, SQL server, SQL database, SQL firewall rules
//! - Container registry
//! - App service plan and web apps, their connection strings and CORS
//!
//! # Requirements
//!
//! - `az` CLI must be installed
//! - `az login` must have been run; stackup never logs in by itself
//!
//! # Example
//!
//! ```ignore
//! use stackup_cloud_azure::AzureClient;
//! use stackup_cloud::ProvisioningClient;
//!
//! let client = AzureClient::default();
//!
//! let auth = client.check_auth().await?;
//! if !auth.authenticated {
//!     panic!("Not authenticated: {:?}", auth.error);
//! }
//! ```

pub mod az;
pub mod error;
pub mod provider;

pub use az::{AccountInfo, Az, AzResource, CorsInfo, SqlServerConfig};
pub use error::{AzureError, Result};
pub use provider::AzureClient;
