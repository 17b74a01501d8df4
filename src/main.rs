use anyhow::Context;
use tracing::info;

use party_economy_service::{app, config::read_config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = read_config().context("failed to read configuration")?;
    app::init_tracing(&settings.application.log_filter);

    let _service = app::build(&settings).await?;
    info!(backend = ?settings.image_store.backend, "party service ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");

    Ok(())
}
