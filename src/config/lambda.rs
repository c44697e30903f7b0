use crate::core::retry::{RetryPolicy, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use crate::core::ConfigProvider;
use crate::utils::error::{ApprovalError, Result};
use crate::utils::validation::{validate_required_field, Validate};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub supabase_url: String,
    pub supabase_key: String,
    pub quotations_table: String,
    pub workflow_url: String,
    pub workflow_token: Option<String>,
    pub retry_policy: RetryPolicy,
    pub verify_delivery: bool,
}

impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 從任意鍵值來源讀取，方便測試時不動到行程環境變數
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            let value = lookup(key).filter(|v| !v.trim().is_empty());
            validate_required_field(key, &value).cloned()
        };

        Ok(Self {
            supabase_url: required("SUPABASE_URL")?,
            supabase_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            quotations_table: lookup("QUOTATIONS_TABLE").unwrap_or_else(|| "quotations".to_string()),
            workflow_url: required("APPROVAL_WORKFLOW_URL")?,
            workflow_token: lookup("APPROVAL_WORKFLOW_TOKEN").filter(|v| !v.is_empty()),
            retry_policy: RetryPolicy {
                max_attempts: parse_or("WORKFLOW_MAX_ATTEMPTS", &lookup, DEFAULT_MAX_ATTEMPTS)?,
                attempt_timeout: Duration::from_secs(parse_or(
                    "WORKFLOW_TIMEOUT_SECS",
                    &lookup,
                    DEFAULT_ATTEMPT_TIMEOUT.as_secs(),
                )?),
                base_delay: Duration::from_secs(parse_or(
                    "WORKFLOW_BASE_DELAY_SECS",
                    &lookup,
                    DEFAULT_BASE_DELAY.as_secs(),
                )?),
            },
            verify_delivery: parse_or("VERIFY_DELIVERY_BEFORE_ROLLBACK", &lookup, false)?,
        })
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ApprovalError::InvalidConfigValueError {
                field: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

impl ConfigProvider for LambdaConfig {
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
        self.retry_policy
    }

    fn verify_delivery_before_rollback(&self) -> bool {
        self.verify_delivery
    }
}

impl Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        super::validate_provider(self)
    }
}
