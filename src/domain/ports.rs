use crate::core::retry::RetryPolicy;
use crate::domain::model::{Quotation, QuotationStatus, QuotationUpdate, WorkflowRequest};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 報價單儲存：單列讀取與單列更新
pub trait QuotationStore: Send + Sync {
    fn fetch(
        &self,
        quotation_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Quotation>>> + Send;

    /// 更新一列；給定 `expected_status` 時為條件更新，回傳是否有列被更新
    fn update(
        &self,
        quotation_id: &str,
        update: &QuotationUpdate,
        expected_status: Option<QuotationStatus>,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;
}

/// 單次工作流呼叫的失敗
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowCallError {
    /// 連線、逾時、讀取本文失敗：可重試
    Transport(String),
    /// 非 2xx：不重試
    Status { status: u16, body: String },
}

#[async_trait]
pub trait ApprovalWorkflow: Send + Sync {
    /// 呼叫一次外部工作流，成功時回傳原始回應本文
    async fn send(&self, request: &WorkflowRequest) -> std::result::Result<String, WorkflowCallError>;
}

pub trait ConfigProvider: Send + Sync {
    fn supabase_url(&self) -> &str;
    fn supabase_key(&self) -> &str;
    fn quotations_table(&self) -> &str;
    fn workflow_endpoint(&self) -> &str;
    fn workflow_auth_token(&self) -> Option<&str>;
    fn retry_policy(&self) -> RetryPolicy;
    fn verify_delivery_before_rollback(&self) -> bool;
}
