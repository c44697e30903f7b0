#[cfg(feature = "lambda")]
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
#[cfg(feature = "lambda")]
use mep_approval::adapters::http::{handle_proxy_event, ProxyRequest, ProxyResponse};
#[cfg(feature = "lambda")]
use mep_approval::utils::logger;
#[cfg(feature = "lambda")]
use mep_approval::{build_service, ApprovalService, LambdaConfig};
#[cfg(feature = "lambda")]
use std::sync::Arc;

#[cfg(feature = "lambda")]
async fn function_handler(
    service: &ApprovalService,
    event: LambdaEvent<ProxyRequest>,
) -> Result<ProxyResponse, Error> {
    let request_id = event.context.request_id.clone();
    tracing::info!(request_id = %request_id, method = event.payload.method(), "approval event received");

    let response = handle_proxy_event(service, event.payload).await;

    tracing::info!(request_id = %request_id, status = response.status_code, "approval event handled");
    Ok(response)
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    // 冷啟動時建立一次，之後的呼叫共用連線池
    let config = LambdaConfig::from_env()
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
    let service = Arc::new(
        build_service(&config).map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?,
    );

    run(service_fn(move |event: LambdaEvent<ProxyRequest>| {
        let service = service.clone();
        async move { function_handler(&service, event).await }
    }))
    .await
}
