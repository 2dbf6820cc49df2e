use anyhow::Context;

use bloodbank_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bloodbank_observability::init();

    let config = ApiConfig::from_env()?;
    tracing::info!(
        max_conflict_retries = config.engine.max_conflict_retries,
        allocation_target = ?config.engine.allocation_target,
        "engine configured"
    );

    let app = bloodbank_api::app::build_app(config.engine);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
