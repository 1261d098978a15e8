use std::sync::Arc;

use caretrack_api::app::{build_app, services::AppServices};
use caretrack_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    caretrack_observability::init();

    let config = AppConfig::from_env()?;
    let services = AppServices::from_config(&config).await?;
    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
