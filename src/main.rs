use anyhow::Context;
use clap::Parser;
use mep_approval::utils::logger;
use mep_approval::{build_router, build_service, ApprovalService, CliConfig, TomlConfig};
use std::net::SocketAddr;
use std::sync::Arc;

fn load_service(config: &CliConfig) -> anyhow::Result<(ApprovalService, SocketAddr)> {
    match &config.config {
        Some(path) => {
            tracing::info!("📄 Loading configuration from {}", path.display());
            let file_config = TomlConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            let bind_addr = file_config.bind_addr().unwrap_or(config.bind_addr);
            let service = build_service(&file_config).context("invalid configuration file")?;
            Ok((service, bind_addr))
        }
        None => {
            let service = build_service(config).context("invalid command line configuration")?;
            Ok((service, config.bind_addr))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting mep-approval server");

    let (service, bind_addr) = match load_service(&config) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("❌ Configuration failed: {:#}", e);
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        }
    };

    let router = build_router(Arc::new(service));

    if let Err(e) = mep_approval::adapters::http::serve(bind_addr, router)
        .await
        .with_context(|| format!("server on {} stopped", bind_addr))
    {
        eprintln!("❌ {:#}", e);
        std::process::exit(2);
    }

    Ok(())
}
