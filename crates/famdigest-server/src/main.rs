use famdigest_core::{TracingConfig, init_tracing};
use famdigest_server::{AppState, ServerConfig, build_router};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(TracingConfig::server())?;

    let config = ServerConfig::from_env()?;
    let state = AppState::from_config(&config)?;
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "famdigest server listening");

    axum::serve(listener, router).await?;
    Ok(())
}
