use crate::adapters::store::PostgrestQuotationStore;
use crate::adapters::workflow::HttpWorkflowClient;
use crate::core::approval::ApprovalOrchestrator;
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use reqwest::Client;

/// 正式環境使用的核准服務
pub type ApprovalService = ApprovalOrchestrator<PostgrestQuotationStore, HttpWorkflowClient>;

/// 每個行程建立一次，再交給 HTTP 層或 Lambda handler 共用
pub fn build_service<C: ConfigProvider + Validate>(config: &C) -> Result<ApprovalService> {
    config.validate()?;

    // 連線池由資料庫與工作流共用；逾時交給重試策略處理
    let client = Client::builder().build()?;

    let store = PostgrestQuotationStore::with_client(
        client.clone(),
        config.supabase_url(),
        config.supabase_key(),
        config.quotations_table(),
    );
    let workflow = HttpWorkflowClient::with_client(
        client,
        config.workflow_endpoint(),
        config.workflow_auth_token(),
    );

    let policy = config.retry_policy();
    tracing::info!(
        table = config.quotations_table(),
        workflow = config.workflow_endpoint(),
        max_attempts = policy.max_attempts,
        attempt_timeout_secs = policy.attempt_timeout.as_secs(),
        "approval service configured"
    );

    Ok(ApprovalOrchestrator::new(store, workflow, policy)
        .with_delivery_verification(config.verify_delivery_before_rollback()))
}
