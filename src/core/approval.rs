use crate::core::retry::{AttemptResult, RetryError, RetryPolicy};
use crate::domain::model::{
    ApprovalRequest, ApprovalResult, ClientInformation, DocumentStorage, EmailDetails, Quotation,
    QuotationDetails, QuotationStatus, QuotationUpdate, WorkflowRequest,
};
use crate::domain::ports::{ApprovalWorkflow, QuotationStore, WorkflowCallError};
use crate::utils::error::{ApprovalError, Result, WorkflowFailure};
use chrono::Utc;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::Instrument;

const DEFAULT_SUCCESS_MESSAGE: &str = "Quotation approved and sent successfully";
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_PDF_GENERATION: &str = "on_demand";

/// 報價單核准流程：驗證、套用修改、呼叫外部工作流，失敗時退回 draft
pub struct ApprovalOrchestrator<S: QuotationStore, W: ApprovalWorkflow> {
    store: S,
    workflow: W,
    retry_policy: RetryPolicy,
    verify_delivery_before_rollback: bool,
}

impl<S: QuotationStore, W: ApprovalWorkflow> ApprovalOrchestrator<S, W> {
    pub fn new(store: S, workflow: W, retry_policy: RetryPolicy) -> Self {
        Self {
            store,
            workflow,
            retry_policy,
            verify_delivery_before_rollback: false,
        }
    }

    /// 工作流已接受請求但回應無效時，先查詢實際狀態再決定是否退回
    pub fn with_delivery_verification(mut self, enabled: bool) -> Self {
        self.verify_delivery_before_rollback = enabled;
        self
    }

    pub fn workflow(&self) -> &W {
        &self.workflow
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub async fn approve(&self, request: ApprovalRequest) -> Result<ApprovalResult> {
        let span = tracing::info_span!(
            "approve_quotation",
            quotation_id = %request.quotation_id,
            user_id = %request.user_id
        );
        self.approve_inner(request).instrument(span).await
    }

    async fn approve_inner(&self, request: ApprovalRequest) -> Result<ApprovalResult> {
        let started = Instant::now();

        if request.quotation_id.trim().is_empty() || request.user_id.trim().is_empty() {
            return Err(ApprovalError::invalid_input(
                "quotation_id and user_id are required",
            ));
        }

        tracing::info!("🚀 approval requested");

        let quotation = self
            .store
            .fetch(&request.quotation_id)
            .await?
            .ok_or_else(|| ApprovalError::NotFound {
                quotation_id: request.quotation_id.clone(),
            })?;

        if quotation.status != QuotationStatus::Draft {
            tracing::warn!(status = %quotation.status, "quotation is not in draft, rejecting");
            return Err(ApprovalError::InvalidState {
                quotation_id: quotation.id.clone(),
                status: quotation.status.to_string(),
            });
        }

        let outcome = self.apply_and_send(quotation, &request, started).await;

        match &outcome {
            Ok(_) => tracing::info!("✅ quotation approved and sent"),
            // 條件更新失敗代表另一個請求已接手，不可覆寫其狀態
            Err(ApprovalError::InvalidState { .. }) => {
                tracing::warn!("quotation left draft concurrently, skipping rollback")
            }
            Err(error) => {
                tracing::error!(kind = error.kind(), error = %error, "❌ approval failed");
                self.rollback_to_draft(&request.quotation_id, error).await;
            }
        }

        outcome
    }

    async fn apply_and_send(
        &self,
        mut quotation: Quotation,
        request: &ApprovalRequest,
        started: Instant,
    ) -> Result<ApprovalResult> {
        if let Some(analysis) = &request.updated_analysis {
            let update = QuotationUpdate::analysis_edit(analysis.clone(), &request.user_id);

            let applied = self
                .store
                .update(&quotation.id, &update, Some(QuotationStatus::Draft))
                .await
                .map_err(|e| {
                    ApprovalError::persistence(format!("failed to save edited analysis: {}", e))
                })?;

            if !applied {
                return Err(ApprovalError::InvalidState {
                    quotation_id: quotation.id.clone(),
                    status: "no longer draft".to_string(),
                });
            }

            update.apply(&mut quotation);
            tracing::info!(total_amount = ?quotation.total_amount, "💾 edited analysis saved");
        }

        let workflow_request = WorkflowRequest::approve_and_send(&quotation.id, &request.user_id);
        let body = self.invoke_workflow(&workflow_request).await?;
        let response = parse_workflow_response(&body)?;

        Ok(build_result(&quotation, &response, started.elapsed()))
    }

    async fn invoke_workflow(&self, request: &WorkflowRequest) -> Result<String> {
        let workflow = &self.workflow;

        let result = self
            .retry_policy
            .run(|_attempt| async move {
                match workflow.send(request).await {
                    Ok(body) => AttemptResult::Success(body),
                    Err(WorkflowCallError::Transport(message)) => AttemptResult::Retryable(message),
                    Err(WorkflowCallError::Status { status, body }) => {
                        AttemptResult::Terminal(WorkflowFailure::HttpStatus { status, body })
                    }
                }
            })
            .await;

        result.map_err(|e| match e {
            RetryError::Terminal { error, .. } => ApprovalError::WorkflowError(error),
            RetryError::Exhausted {
                attempts,
                last_error,
                timed_out,
            } => ApprovalError::WorkflowError(WorkflowFailure::RetriesExhausted {
                attempts,
                last_error,
                timed_out,
            }),
        })
    }

    /// 補償動作。只從 approve 的單一位置呼叫；寫入失敗只記錄，不取代原始錯誤。
    async fn rollback_to_draft(&self, quotation_id: &str, reason: &ApprovalError) {
        let error_message = reason.to_string();
        let failed_at = Utc::now();

        let delivery_possible = matches!(
            reason,
            ApprovalError::WorkflowError(failure) if failure.accepted_by_workflow()
        );

        let update = if self.verify_delivery_before_rollback
            && delivery_possible
            && self.already_delivered(quotation_id).await
        {
            tracing::warn!("quotation already left draft after workflow call, recording error only");
            QuotationUpdate::RecordFailure {
                error_message,
                failed_at,
            }
        } else {
            QuotationUpdate::RevertToDraft {
                error_message,
                failed_at,
            }
        };

        match self.store.update(quotation_id, &update, None).await {
            Ok(true) => tracing::info!("↩️ quotation rolled back"),
            Ok(false) => tracing::warn!("rollback matched no quotation row"),
            Err(e) => tracing::error!(
                error = %e,
                original_error = %reason,
                "rollback write failed, reporting original error"
            ),
        }
    }

    async fn already_delivered(&self, quotation_id: &str) -> bool {
        match self.store.fetch(quotation_id).await {
            Ok(Some(current)) => current.status != QuotationStatus::Draft,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "could not verify delivery state, assuming not delivered");
                false
            }
        }
    }
}

/// 驗證工作流回應：非空、合法 JSON、success 為真值
pub fn parse_workflow_response(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Err(ApprovalError::WorkflowError(WorkflowFailure::EmptyResponse));
    }

    let value: Value = serde_json::from_str(body).map_err(|e| {
        ApprovalError::WorkflowError(WorkflowFailure::MalformedResponse(e.to_string()))
    })?;

    if !is_truthy(value.get("success")) {
        let reason = str_at(Some(&value), "error")
            .or_else(|| str_at(Some(&value), "message"))
            .unwrap_or_else(|| "workflow did not report success".to_string());
        return Err(ApprovalError::WorkflowError(
            WorkflowFailure::ReportedFailure(reason),
        ));
    }

    Ok(value)
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn str_at(parent: Option<&Value>, key: &str) -> Option<String> {
    parent
        .and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn bool_at(parent: Option<&Value>, key: &str) -> Option<bool> {
    parent.and_then(|v| v.get(key)).and_then(Value::as_bool)
}

fn number_at(parent: Option<&Value>, key: &str) -> Option<f64> {
    match parent.and_then(|v| v.get(key)) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 由工作流回應與本地資料組出回給呼叫端的結果
fn build_result(quotation: &Quotation, response: &Value, elapsed: Duration) -> ApprovalResult {
    let details = response.get("quotation_details");
    let client = response.get("client_information").or(details);
    let email = response.get("email_details");
    let documents = response.get("document_storage");

    let quotation_number = if quotation.quotation_number.is_empty() {
        str_at(details, "quotation_number").unwrap_or_default()
    } else {
        quotation.quotation_number.clone()
    };

    ApprovalResult {
        success: true,
        status: QuotationStatus::Sent.to_string(),
        message: str_at(Some(response), "message")
            .unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string()),
        quotation_details: QuotationDetails {
            quotation_id: str_at(details, "quotation_id").unwrap_or_else(|| quotation.id.clone()),
            quotation_number,
            status: str_at(details, "status")
                .unwrap_or_else(|| QuotationStatus::Sent.to_string()),
            sent_at: str_at(details, "sent_at")
                .or_else(|| str_at(Some(response), "sent_at"))
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
        },
        client_information: ClientInformation {
            client_name: str_at(client, "client_name"),
            project_name: str_at(client, "project_name"),
            total_amount: number_at(client, "total_amount")
                .or(quotation.total_amount)
                .unwrap_or(0.0),
            currency: str_at(client, "currency")
                .or_else(|| quotation.currency().map(str::to_string))
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        },
        email_details: EmailDetails {
            word_file_sent: bool_at(email, "word_file_sent").unwrap_or(false),
            word_filename: str_at(email, "word_filename"),
            email_thread_maintained: bool_at(email, "email_thread_maintained").unwrap_or(false),
        },
        document_storage: DocumentStorage {
            html_stored: bool_at(documents, "html_stored").unwrap_or(false),
            html_available_for_pdf: bool_at(documents, "html_available_for_pdf").unwrap_or(false),
            pdf_generation: str_at(documents, "pdf_generation")
                .unwrap_or_else(|| DEFAULT_PDF_GENERATION.to_string()),
        },
        workflow_metadata: response
            .get("workflow_metadata")
            .filter(|v| !v.is_null())
            .cloned(),
        processing_time: str_at(Some(response), "processing_time")
            .or_else(|| Some(format!("{:.2}s", elapsed.as_secs_f64()))),
    }
}
