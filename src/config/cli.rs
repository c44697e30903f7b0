use crate::core::retry::RetryPolicy;
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "mep-approval")]
#[command(about = "Quotation approval service for the MEP quotation workflow")]
pub struct CliConfig {
    #[arg(long, env = "SUPABASE_URL", default_value = "")]
    pub supabase_url: String,

    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", default_value = "", hide_env_values = true)]
    pub supabase_key: String,

    #[arg(long, env = "QUOTATIONS_TABLE", default_value = "quotations")]
    pub quotations_table: String,

    #[arg(long, env = "APPROVAL_WORKFLOW_URL", default_value = "")]
    pub workflow_url: String,

    #[arg(long, env = "APPROVAL_WORKFLOW_TOKEN", hide_env_values = true)]
    pub workflow_token: Option<String>,

    #[arg(long, env = "WORKFLOW_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    #[arg(long, env = "WORKFLOW_TIMEOUT_SECS", default_value_t = 180)]
    pub attempt_timeout_secs: u64,

    #[arg(long, env = "WORKFLOW_BASE_DELAY_SECS", default_value_t = 2)]
    pub base_delay_secs: u64,

    #[arg(long, env = "VERIFY_DELIVERY_BEFORE_ROLLBACK", help = "Re-read the quotation before reverting it")]
    pub verify_delivery: bool,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    #[arg(long, env = "APPROVAL_CONFIG", help = "Load settings from a TOML file instead")]
    pub config: Option<PathBuf>,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,
}

impl ConfigProvider for CliConfig {
    fn supabase_url(&self) -> &str {
        &self.supabase_url
    }

    fn supabase_key(&self) -> &str {
        &self.supabase_key
    }

    fn quotations_table(&self) -> &str {
        &self.quotations_table
    }

    fn workflow_endpoint(&self) -> &str {
        &self.workflow_url
    }

    fn workflow_auth_token(&self) -> Option<&str> {
        self.workflow_token.as_deref()
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
            base_delay: Duration::from_secs(self.base_delay_secs),
        }
    }

    fn verify_delivery_before_rollback(&self) -> bool {
        self.verify_delivery
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        super::validate_provider(self)
    }
}
