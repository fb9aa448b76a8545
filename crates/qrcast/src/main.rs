use std::sync::Arc;

use qrcast_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), qrcast_core::Error> {
    // `.env` may carry RUST_LOG, so it has to land before the subscriber.
    qrcast_core::config::load_dotenv()?;
    qrcast_core::logging::init("qrcast")?;

    let cfg = match Config::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!("{e}");
            return Err(e);
        }
    };
    tracing::info!(admin = %cfg.admin_id, "configuration loaded");

    qrcast_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| qrcast_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
