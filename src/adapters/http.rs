use crate::core::approval::ApprovalOrchestrator;
use crate::domain::model::ApprovalRequest;
use crate::domain::ports::{ApprovalWorkflow, QuotationStore};
use crate::utils::error::{ApprovalError, Result};
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub const APPROVE_PATH: &str = "/approve-quotation";
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

const JSON_CONTENT_TYPE: &str = "application/json";

pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("access-control-allow-origin", "*"),
    (
        "access-control-allow-headers",
        "authorization, x-client-info, apikey, content-type",
    ),
    ("access-control-allow-methods", "POST, OPTIONS"),
];

/// 與傳輸層無關的回應；axum 與 Lambda 共用
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
    timestamp: String,
}

impl HttpReply {
    fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: JSON_CONTENT_TYPE,
            body,
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        let envelope = ErrorBody {
            success: false,
            error: message,
            timestamp: Utc::now().to_rfc3339(),
        };
        let body = serde_json::to_string(&envelope).unwrap_or_else(|_| {
            r#"{"success":false,"error":"internal error"}"#.to_string()
        });
        Self::json(status, body)
    }

    fn from_error(error: &ApprovalError) -> Self {
        Self::error(error.status_code(), &error.to_string())
    }
}

/// 依 HTTP 方法分派：OPTIONS 回應預檢，POST 執行核准，其他一律 405
pub async fn dispatch<S, W>(
    orchestrator: &ApprovalOrchestrator<S, W>,
    method: &str,
    body: &[u8],
) -> HttpReply
where
    S: QuotationStore,
    W: ApprovalWorkflow,
{
    match method.to_ascii_uppercase().as_str() {
        "OPTIONS" => HttpReply::json(200, r#""ok""#.to_string()),
        "POST" if body.len() > MAX_BODY_BYTES => {
            tracing::warn!(size = body.len(), "rejecting oversized approval request");
            HttpReply::error(413, "Request body too large")
        }
        "POST" => {
            let outcome = match ApprovalRequest::from_body(body) {
                Ok(request) => orchestrator.approve(request).await,
                Err(e) => {
                    tracing::warn!(error = %e, "rejecting approval request");
                    Err(e)
                }
            };

            match outcome {
                Ok(result) => match serde_json::to_string(&result) {
                    Ok(body) => HttpReply::json(200, body),
                    Err(e) => HttpReply::from_error(&ApprovalError::SerializationError(e)),
                },
                Err(e) => HttpReply::from_error(&e),
            }
        }
        other => {
            tracing::debug!(method = other, "method not allowed");
            HttpReply::error(405, "Method not allowed")
        }
    }
}

impl IntoResponse for HttpReply {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();

        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        for (name, value) in CORS_HEADERS {
            headers.insert(name, HeaderValue::from_static(value));
        }
        response
    }
}

pub fn build_router<S, W>(orchestrator: Arc<ApprovalOrchestrator<S, W>>) -> Router
where
    S: QuotationStore + 'static,
    W: ApprovalWorkflow + 'static,
{
    Router::new()
        .route(APPROVE_PATH, any(handle_approval::<S, W>))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(orchestrator)
}

async fn handle_approval<S, W>(
    State(orchestrator): State<Arc<ApprovalOrchestrator<S, W>>>,
    method: Method,
    body: std::result::Result<Bytes, BytesRejection>,
) -> HttpReply
where
    S: QuotationStore + 'static,
    W: ApprovalWorkflow + 'static,
{
    // 讀取 body 失敗 (例如超過上限) 也要回 JSON 與 CORS 標頭
    match body {
        Ok(body) => dispatch(&orchestrator, method.as_str(), &body).await,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "failed to read approval request body");
            HttpReply::error(rejection.status().as_u16(), &rejection.body_text())
        }
    }
}

async fn handle_health() -> impl IntoResponse {
    tracing::trace!("health check: ok");
    Json(serde_json::json!({
        "status": "healthy",
    }))
}

pub async fn serve(addr: SocketAddr, router: Router) -> Result<()> {
    tracing::info!(%addr, "binding approval server");
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "🚀 approval server ready");
    axum::serve(listener, router).await.map_err(|e| {
        tracing::error!(%addr, error = %e, "approval server terminated unexpectedly");
        ApprovalError::IoError(e)
    })
}

/// API Gateway (REST v1) 或 Function URL (v2) 的代理事件
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub request_context: Option<ProxyRequestContext>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyRequestContext {
    #[serde(default)]
    pub http: Option<ProxyHttpContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyHttpContext {
    #[serde(default)]
    pub method: Option<String>,
}

impl ProxyRequest {
    pub fn method(&self) -> &str {
        self.http_method
            .as_deref()
            .or_else(|| {
                self.request_context
                    .as_ref()
                    .and_then(|ctx| ctx.http.as_ref())
                    .and_then(|http| http.method.as_deref())
            })
            .unwrap_or("POST")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl From<HttpReply> for ProxyResponse {
    fn from(reply: HttpReply) -> Self {
        let mut headers: HashMap<String, String> = CORS_HEADERS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        headers.insert("content-type".to_string(), reply.content_type.to_string());

        Self {
            status_code: reply.status,
            headers,
            body: reply.body,
            is_base64_encoded: false,
        }
    }
}

pub async fn handle_proxy_event<S, W>(
    orchestrator: &ApprovalOrchestrator<S, W>,
    event: ProxyRequest,
) -> ProxyResponse
where
    S: QuotationStore,
    W: ApprovalWorkflow,
{
    if event.is_base64_encoded {
        return HttpReply::from_error(&ApprovalError::invalid_input(
            "Request body must be sent as application/json",
        ))
        .into();
    }

    let body = event.body.as_deref().unwrap_or_default();
    dispatch(orchestrator, event.method(), body.as_bytes())
        .await
        .into()
}
