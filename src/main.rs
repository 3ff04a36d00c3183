use rmcp::{ServiceExt, transport::stdio};

use gavel::config::ServerConfig;
use gavel::server::GavelServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    // MCP clients launch the server with an arbitrary working directory, so
    // look for .env next to the binary first, then fall back to the CWD search.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let env_path = dir.join(".env");
            if env_path.exists() {
                dotenvy::from_path(&env_path).ok();
            } else {
                dotenvy::dotenv().ok();
            }
        } else {
            dotenvy::dotenv().ok();
        }
    } else {
        dotenvy::dotenv().ok();
    }

    tracing::info!("gavel starting");

    let config = ServerConfig::load();
    let server = GavelServer::new(config);
    let shutdown_handle = server.clone();

    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| tracing::error!("serving error: {e:?}"))?;

    service.waiting().await?;

    shutdown_handle.cleanup();
    tracing::info!("gavel shutting down");
    Ok(())
}
