use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// 外部呼叫的重試策略：固定次數、每次逾時、指數退避
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

/// 單次嘗試的結果
#[derive(Debug)]
pub enum AttemptResult<T, E> {
    Success(T),
    Retryable(String),
    Terminal(E),
}

#[derive(Debug, PartialEq)]
pub enum RetryError<E> {
    Terminal { attempt: u32, error: E },
    Exhausted {
        attempts: u32,
        last_error: String,
        /// 最後一次嘗試是否因逾時被取消；對方可能已處理了請求
        timed_out: bool,
    },
}

enum RetryState {
    Attempting(u32),
    Backoff { attempt: u32, last_error: String },
}

impl RetryPolicy {
    /// 第 `attempt` 次 (從 1 起算) 失敗後的等待時間：base × 2^(attempt-1)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// 依策略執行 `call`。逾時的嘗試會被取消 (future 被丟棄) 並視為可重試的失敗。
    pub async fn run<T, E, F, Fut>(&self, mut call: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptResult<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut state = RetryState::Attempting(1);

        loop {
            state = match state {
                RetryState::Attempting(attempt) => {
                    tracing::debug!(attempt, max_attempts, "workflow attempt starting");

                    let (outcome, timed_out) =
                        match tokio::time::timeout(self.attempt_timeout, call(attempt)).await {
                            Ok(outcome) => (outcome, false),
                            Err(_) => (
                                AttemptResult::Retryable(format!(
                                    "attempt timed out after {}s",
                                    self.attempt_timeout.as_secs_f64()
                                )),
                                true,
                            ),
                        };

                    match outcome {
                        AttemptResult::Success(value) => {
                            tracing::debug!(attempt, "workflow attempt succeeded");
                            return Ok(value);
                        }
                        AttemptResult::Terminal(error) => {
                            tracing::warn!(attempt, "workflow attempt failed terminally, not retrying");
                            return Err(RetryError::Terminal { attempt, error });
                        }
                        AttemptResult::Retryable(last_error) if attempt >= max_attempts => {
                            tracing::error!(attempt, error = %last_error, "❌ all workflow attempts failed");
                            return Err(RetryError::Exhausted {
                                attempts: attempt,
                                last_error,
                                timed_out,
                            });
                        }
                        AttemptResult::Retryable(last_error) => RetryState::Backoff {
                            attempt,
                            last_error,
                        },
                    }
                }
                RetryState::Backoff {
                    attempt,
                    last_error,
                } => {
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        attempt,
                        error = %last_error,
                        delay_ms = delay.as_millis() as u64,
                        "⚠️ workflow attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    RetryState::Attempting(attempt + 1)
                }
            };
        }
    }
}
