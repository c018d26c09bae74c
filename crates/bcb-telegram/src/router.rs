use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use bcb_core::{
    config::Config,
    controller::SessionController,
    gateway::DeliveryGateway,
    rates::{GoogleRateSource, RateCache, RateSource},
    store::MemoryDraftStore,
};

use crate::{handlers, TelegramGateway};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub controller: Arc<SessionController>,
    pub gateway: Arc<dyn DeliveryGateway>,
    pub rates: Arc<RateCache>,
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!(username = me.username(), "bot started");
    }

    let gateway: Arc<dyn DeliveryGateway> = Arc::new(TelegramGateway::new(bot.clone()));
    let store = Arc::new(MemoryDraftStore::new());
    let controller = Arc::new(SessionController::new(
        store,
        gateway.clone(),
        cfg.draft_ttl,
    ));
    let rates = Arc::new(RateCache::new(
        cfg.rates_file.clone(),
        cfg.rate_currencies.clone(),
    ));

    // Refresh the rate table right away, then on the configured interval,
    // until the dispatcher winds down.
    let shutdown = CancellationToken::new();
    spawn_rate_refresh(cfg.clone(), rates.clone(), shutdown.child_token());

    let state = Arc::new(AppState {
        cfg,
        controller,
        gateway,
        rates,
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    shutdown.cancel();
    Ok(())
}

fn spawn_rate_refresh(cfg: Arc<Config>, rates: Arc<RateCache>, cancel: CancellationToken) {
    tokio::spawn(async move {
        let source: Box<dyn RateSource> = match GoogleRateSource::new(cfg.http_timeout) {
            Ok(s) => Box::new(s),
            Err(e) => {
                warn!(error = %e, "rate source unavailable; serving the cached table only");
                return;
            }
        };

        let mut tick = tokio::time::interval(cfg.rates_refresh_interval);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match rates.refresh(source.as_ref()).await {
                        Ok(table) => {
                            let pairs: usize = table.rates.values().map(|r| r.len()).sum();
                            info!(pairs, "rate table refreshed");
                        }
                        Err(e) => warn!(error = %e, "rate refresh failed"),
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    });
}
