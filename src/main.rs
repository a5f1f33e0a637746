use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pvsave_core::SaveConfig;

/// Main entry point for the PV save server
///
/// Reads configuration once, then serves the REST API on `0.0.0.0:<port>`.
///
/// # Environment Variables
/// - `PV_SAVE_DIR`: Destination folder for records (default: "pv_one_saved")
/// - `PV_SAVE_PORT`: Listen port (default: 5000)
/// - `PV_SAVE_TOKEN`: If set, requests must carry this token in `X-SAVE-TOKEN` or `?token=`
/// - `PV_SAVE_MAX_BODY_BYTES`: Request body limit (default: 50 MiB)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration is invalid or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pvsave=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Arc::new(SaveConfig::from_env_values(
        std::env::var("PV_SAVE_DIR").ok(),
        std::env::var("PV_SAVE_PORT").ok(),
        std::env::var("PV_SAVE_TOKEN").ok(),
        std::env::var("PV_SAVE_MAX_BODY_BYTES").ok(),
    )?);

    tracing::info!(
        "++ Starting PV save server on 0.0.0.0:{}, saving to {}",
        cfg.port(),
        cfg.save_dir().display()
    );
    if cfg.token().is_some() {
        tracing::info!("++ Token auth enabled: clients must send X-SAVE-TOKEN or ?token=");
    } else {
        tracing::warn!("++ PV_SAVE_TOKEN not set, accepting unauthenticated saves");
    }

    api_rest::serve(cfg).await
}
