pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{LambdaConfig, TomlConfig};

pub use adapters::http::build_router;
pub use adapters::store::{InMemoryQuotationStore, PostgrestQuotationStore};
pub use adapters::workflow::HttpWorkflowClient;
pub use app::service::{build_service, ApprovalService};
pub use crate::core::{approval::ApprovalOrchestrator, retry::RetryPolicy};
pub use domain::model::{ApprovalRequest, ApprovalResult, Quotation, QuotationStatus};
pub use utils::error::{ApprovalError, Result, WorkflowFailure};
