use anyhow::Context;

use partforge_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    partforge_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(storage = ?config.storage, "starting partforge-api");

    let services = partforge_api::app::services::build_services(&config.storage)
        .await
        .context("failed to initialise the part catalog")?;
    let app = partforge_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server terminated")?;
    Ok(())
}
