use medisave::server::{self, AppState};
use medisave::{AppConfig, YtDlpInvoker};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("medisave=info,info")),
        )
        .init();

    let config = AppConfig::from_env();
    std::fs::create_dir_all(&config.artifacts_root)?;

    match YtDlpInvoker::new(config.clone()).probe_version().await {
        Some(version) => {
            tracing::info!(tool = %config.ytdlp_path, %version, "extractor tool found")
        }
        None => tracing::warn!(
            tool = %config.ytdlp_path,
            "extractor tool not runnable; acquisitions will fail until it is installed"
        ),
    }

    let addr = config.bind_addr;
    let state = AppState::new(config);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, server::router(state)).await?;
    Ok(())
}
