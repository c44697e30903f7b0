use crate::domain::model::WorkflowRequest;
use crate::domain::ports::{ApprovalWorkflow, WorkflowCallError};
use async_trait::async_trait;
use reqwest::Client;

/// 透過 webhook 觸發外部「寄送報價單」工作流
#[derive(Debug, Clone)]
pub struct HttpWorkflowClient {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpWorkflowClient {
    pub fn new(endpoint: &str, auth_token: Option<&str>) -> Self {
        Self::with_client(Client::new(), endpoint, auth_token)
    }

    pub fn with_client(client: Client, endpoint: &str, auth_token: Option<&str>) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            auth_token: auth_token.map(str::to_string),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ApprovalWorkflow for HttpWorkflowClient {
    async fn send(&self, request: &WorkflowRequest) -> Result<String, WorkflowCallError> {
        tracing::debug!(endpoint = %self.endpoint, action = request.action, "calling approval workflow");

        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| WorkflowCallError::Transport(e.to_string()))?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "approval workflow responded");

        // 讀取本文中斷也算傳輸層失敗
        let body = response
            .text()
            .await
            .map_err(|e| WorkflowCallError::Transport(format!("failed to read workflow response: {}", e)))?;

        if !status.is_success() {
            return Err(WorkflowCallError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}
