#[cfg(feature = "cli")]
pub mod cli;
pub mod lambda;
pub mod toml_config;

use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_table_name,
    validate_url,
};

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use lambda::LambdaConfig;
pub use toml_config::TomlConfig;

/// 各種配置來源共用的檢查
pub(crate) fn validate_provider<C: ConfigProvider + ?Sized>(config: &C) -> Result<()> {
    validate_url("supabase_url", config.supabase_url())?;
    validate_non_empty_string("supabase_key", config.supabase_key())?;
    validate_table_name("quotations_table", config.quotations_table())?;
    validate_url("workflow_endpoint", config.workflow_endpoint())?;

    let policy = config.retry_policy();
    validate_range("retry.max_attempts", policy.max_attempts, 1, 10)?;
    validate_positive_number(
        "retry.attempt_timeout_secs",
        policy.attempt_timeout.as_secs(),
        1,
    )?;

    tracing::info!("✅ configuration validation passed");
    Ok(())
}
