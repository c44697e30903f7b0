use crate::core::retry::{RetryPolicy, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use crate::core::ConfigProvider;
use crate::utils::error::{ApprovalError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub database: DatabaseConfig,
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub rollback: RollbackConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub service_key: String,
    #[serde(default = "default_table")]
    pub table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub endpoint: String,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub attempt_timeout_secs: Option<u64>,
    pub base_delay_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackConfig {
    #[serde(default)]
    pub verify_delivery: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: Option<SocketAddr>,
}

fn default_table() -> String {
    "quotations".to_string()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            attempt_timeout_secs: Some(DEFAULT_ATTEMPT_TIMEOUT.as_secs()),
            base_delay_secs: Some(DEFAULT_BASE_DELAY.as_secs()),
        }
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ApprovalError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ApprovalError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換 ${VAR_NAME}；找不到的變數直接報錯，避免把佔位字串當成金鑰送出
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| ApprovalError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        if let Some(missing) = re
            .captures_iter(content)
            .map(|caps| caps[1].to_string())
            .find(|name| std::env::var(name).is_err())
        {
            return Err(ApprovalError::MissingConfigError { field: missing });
        }

        let result = re.replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        Ok(result.to_string())
    }

    pub fn bind_addr(&self) -> Option<SocketAddr> {
        self.server.bind_addr
    }
}

impl ConfigProvider for TomlConfig {
    fn supabase_url(&self) -> &str {
        &self.database.url
    }

    fn supabase_key(&self) -> &str {
        &self.database.service_key
    }

    fn quotations_table(&self) -> &str {
        &self.database.table
    }

    fn workflow_endpoint(&self) -> &str {
        &self.workflow.endpoint
    }

    fn workflow_auth_token(&self) -> Option<&str> {
        self.workflow.auth_token.as_deref().filter(|t| !t.is_empty())
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            attempt_timeout: self
                .retry
                .attempt_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_ATTEMPT_TIMEOUT),
            base_delay: self
                .retry
                .base_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_BASE_DELAY),
        }
    }

    fn verify_delivery_before_rollback(&self) -> bool {
        self.rollback.verify_delivery
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        super::validate_provider(self)
    }
}
