use thiserror::Error;

/// 外部工作流失敗的細節，呼叫端一律視為 WorkflowError
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowFailure {
    #[error("workflow call failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: String,
        timed_out: bool,
    },

    #[error("workflow returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("workflow returned an empty response")]
    EmptyResponse,

    #[error("workflow returned malformed JSON: {0}")]
    MalformedResponse(String),

    #[error("workflow reported failure: {0}")]
    ReportedFailure(String),
}

impl WorkflowFailure {
    /// 工作流可能已處理請求：回了 2xx 之後才失敗，或最後一次嘗試逾時被取消
    pub fn accepted_by_workflow(&self) -> bool {
        matches!(
            self,
            WorkflowFailure::EmptyResponse
                | WorkflowFailure::MalformedResponse(_)
                | WorkflowFailure::ReportedFailure(_)
                | WorkflowFailure::RetriesExhausted { timed_out: true, .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum ApprovalError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Quotation not found: {quotation_id}")]
    NotFound { quotation_id: String },

    #[error("Quotation {quotation_id} cannot be approved in status '{status}'")]
    InvalidState {
        quotation_id: String,
        status: String,
    },

    #[error("Persistence error: {message}")]
    PersistenceError { message: String },

    #[error("Workflow error: {0}")]
    WorkflowError(WorkflowFailure),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field} ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

impl ApprovalError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ApprovalError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        ApprovalError::PersistenceError {
            message: message.into(),
        }
    }

    /// 對應的 HTTP 狀態碼
    pub fn status_code(&self) -> u16 {
        match self {
            ApprovalError::InvalidInput { .. } | ApprovalError::InvalidState { .. } => 400,
            ApprovalError::NotFound { .. } => 404,
            _ => 500,
        }
    }

    /// 穩定的錯誤類別名稱，用於日誌
    pub fn kind(&self) -> &'static str {
        match self {
            ApprovalError::InvalidInput { .. } => "invalid_input",
            ApprovalError::NotFound { .. } => "not_found",
            ApprovalError::InvalidState { .. } => "invalid_state",
            ApprovalError::PersistenceError { .. }
            | ApprovalError::HttpError(_)
            | ApprovalError::IoError(_)
            | ApprovalError::SerializationError(_) => "persistence_error",
            ApprovalError::WorkflowError(_) => "workflow_error",
            ApprovalError::ConfigError { .. }
            | ApprovalError::MissingConfigError { .. }
            | ApprovalError::InvalidConfigValueError { .. } => "config_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, ApprovalError>;
