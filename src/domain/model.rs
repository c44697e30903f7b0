use crate::utils::error::{ApprovalError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

pub const APPROVE_AND_SEND: &str = "approve_and_send";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
    Expired,
    #[serde(other)]
    Unknown,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Draft => "draft",
            QuotationStatus::Sent => "sent",
            QuotationStatus::Approved => "approved",
            QuotationStatus::Rejected => "rejected",
            QuotationStatus::Expired => "expired",
            QuotationStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 報價單資料列，只包含核准流程會讀寫的欄位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: String,
    #[serde(default)]
    pub quotation_number: String,
    pub status: QuotationStatus,
    #[serde(default, rename = "analysis_data", alias = "analysis")]
    pub analysis: Option<Value>,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub last_error_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified_by: Option<String>,
}

impl Quotation {
    pub fn draft(id: impl Into<String>, quotation_number: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            quotation_number: quotation_number.into(),
            status: QuotationStatus::Draft,
            analysis: None,
            total_amount: None,
            approved_by: None,
            approved_at: None,
            error_message: None,
            last_error_at: None,
            last_modified_at: None,
            last_modified_by: None,
        }
    }

    /// analysis.pricing.currency，若有的話
    pub fn currency(&self) -> Option<&str> {
        self.analysis
            .as_ref()
            .and_then(|a| a.pointer("/pricing/currency"))
            .and_then(Value::as_str)
    }
}

/// 對單一報價單的寫入
#[derive(Debug, Clone, PartialEq)]
pub enum QuotationUpdate {
    /// 套用前端修改過的 analysis，並重算 total_amount
    AnalysisEdit {
        analysis: Value,
        total_amount: f64,
        modified_by: String,
        modified_at: DateTime<Utc>,
    },
    /// 補償動作：退回 draft 並清除核准資訊
    RevertToDraft {
        error_message: String,
        failed_at: DateTime<Utc>,
    },
    /// 只記錄錯誤，不動 status
    RecordFailure {
        error_message: String,
        failed_at: DateTime<Utc>,
    },
}

impl QuotationUpdate {
    pub fn analysis_edit(analysis: Value, user_id: &str) -> Self {
        let total_amount = grand_total(&analysis);
        QuotationUpdate::AnalysisEdit {
            analysis,
            total_amount,
            modified_by: user_id.to_string(),
            modified_at: Utc::now(),
        }
    }

    /// PATCH 用的欄位集合
    pub fn to_patch(&self) -> Value {
        match self {
            QuotationUpdate::AnalysisEdit {
                analysis,
                total_amount,
                modified_by,
                modified_at,
            } => json!({
                "analysis_data": analysis,
                "total_amount": total_amount,
                "last_modified_by": modified_by,
                "last_modified_at": modified_at,
            }),
            QuotationUpdate::RevertToDraft {
                error_message,
                failed_at,
            } => json!({
                "status": QuotationStatus::Draft,
                "approved_by": Value::Null,
                "approved_at": Value::Null,
                "error_message": error_message,
                "last_error_at": failed_at,
            }),
            QuotationUpdate::RecordFailure {
                error_message,
                failed_at,
            } => json!({
                "error_message": error_message,
                "last_error_at": failed_at,
            }),
        }
    }

    pub fn apply(&self, quotation: &mut Quotation) {
        match self {
            QuotationUpdate::AnalysisEdit {
                analysis,
                total_amount,
                modified_by,
                modified_at,
            } => {
                quotation.analysis = Some(analysis.clone());
                quotation.total_amount = Some(*total_amount);
                quotation.last_modified_by = Some(modified_by.clone());
                quotation.last_modified_at = Some(*modified_at);
            }
            QuotationUpdate::RevertToDraft {
                error_message,
                failed_at,
            } => {
                quotation.status = QuotationStatus::Draft;
                quotation.approved_by = None;
                quotation.approved_at = None;
                quotation.error_message = Some(error_message.clone());
                quotation.last_error_at = Some(*failed_at);
            }
            QuotationUpdate::RecordFailure {
                error_message,
                failed_at,
            } => {
                quotation.error_message = Some(error_message.clone());
                quotation.last_error_at = Some(*failed_at);
            }
        }
    }
}

/// analysis.pricing.grand_total，缺少或無法解析時為 0
pub fn grand_total(analysis: &Value) -> f64 {
    match analysis.pointer("/pricing/grand_total") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRequest {
    pub quotation_id: String,
    pub user_id: String,
    pub updated_analysis: Option<Value>,
}

impl ApprovalRequest {
    /// 解析並驗證請求本文；任何問題都是 InvalidInput
    pub fn from_body(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ApprovalError::invalid_input(format!("Invalid JSON in request body: {}", e)))?;

        let obj = value
            .as_object()
            .ok_or_else(|| ApprovalError::invalid_input("Request body must be a JSON object"))?;

        let quotation_id = required_string(obj, "quotation_id")?;
        let user_id = required_string(obj, "user_id")?;

        let updated_analysis = match obj.get("updated_analysis_data") {
            None | Some(Value::Null) => None,
            Some(v @ Value::Object(_)) => Some(v.clone()),
            Some(_) => {
                return Err(ApprovalError::invalid_input(
                    "updated_analysis_data must be a JSON object",
                ))
            }
        };

        Ok(Self {
            quotation_id,
            user_id,
            updated_analysis,
        })
    }
}

fn required_string(obj: &serde_json::Map<String, Value>, field: &str) -> Result<String> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(ApprovalError::invalid_input(format!(
            "{} is required and must be a non-empty string",
            field
        ))),
    }
}

/// 送往外部工作流的 payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowRequest {
    pub quotation_id: String,
    pub user_id: String,
    pub action: &'static str,
}

impl WorkflowRequest {
    pub fn approve_and_send(quotation_id: &str, user_id: &str) -> Self {
        Self {
            quotation_id: quotation_id.to_string(),
            user_id: user_id.to_string(),
            action: APPROVE_AND_SEND,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotationDetails {
    pub quotation_id: String,
    pub quotation_number: String,
    pub status: String,
    pub sent_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientInformation {
    pub client_name: Option<String>,
    pub project_name: Option<String>,
    pub total_amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailDetails {
    pub word_file_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_filename: Option<String>,
    pub email_thread_maintained: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentStorage {
    pub html_stored: bool,
    pub html_available_for_pdf: bool,
    pub pdf_generation: String,
}

/// 核准成功時回給呼叫端的內容
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalResult {
    pub success: bool,
    pub status: String,
    pub message: String,
    pub quotation_details: QuotationDetails,
    pub client_information: ClientInformation,
    pub email_details: EmailDetails,
    pub document_storage: DocumentStorage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<String>,
}
