use std::sync::Arc;

use teloxide::{dptree, prelude::*};

use qrcast_core::{
    config::Config,
    dispatcher::Dispatcher,
    messaging::port::MessagingPort,
    qr::PngQrEncoder,
    registry::{FileRegistry, UserRegistry},
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub messenger: Arc<dyn MessagingPort>,
    pub dispatcher: Arc<Dispatcher>,
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    // Fail fast on a bad token instead of polling forever with 401s.
    let me = bot.get_me().await?;
    tracing::info!(username = %me.username(), "qrcast started");

    let registry: Arc<dyn UserRegistry> = Arc::new(FileRegistry::new(cfg.users_file.clone()));
    match registry.count().await {
        Ok(n) => tracing::info!(
            users = n,
            file = %cfg.users_file.display(),
            "user registry loaded"
        ),
        Err(e) => tracing::warn!(error = %e, "user registry is not readable yet"),
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let dispatcher = Arc::new(Dispatcher::new(
        &cfg,
        registry,
        messenger.clone(),
        Arc::new(PngQrEncoder::default()),
    ));

    let state = Arc::new(AppState {
        messenger,
        dispatcher,
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    teloxide::dispatching::Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("qrcast stopped");
    Ok(())
}
