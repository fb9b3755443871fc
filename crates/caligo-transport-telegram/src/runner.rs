use crate::bot;
use crate::bot::handlers::{get_user_id_safe, Command};
use crate::bot::{MessageCache, TelegramChatClient};
use crate::config::{get_message_cache_max_size, get_message_cache_ttl, BotSettings};
use caligo_core::FsStorage;
use caligo_runtime::TransmissionManager;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{debug, error, info};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let bot = Bot::new(settings.telegram.telegram_token.clone());
    let cache = init_message_cache();
    let manager = init_manager(&bot, &cache, &settings);
    let handler = setup_handler();

    info!(
        download_dir = %settings.transmission.download_dir.display(),
        "Bot is running..."
    );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![settings, cache, manager])
        .default_handler(|update| async move {
            debug!(update_id = ?update.id, "Unhandled update");
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn init_message_cache() -> Arc<MessageCache> {
    let ttl = get_message_cache_ttl();
    let max_size = get_message_cache_max_size();

    info!(ttl_secs = ttl, max_size, "Initializing MessageCache");

    Arc::new(MessageCache::new(ttl, max_size))
}

fn init_manager(
    bot: &Bot,
    cache: &Arc<MessageCache>,
    settings: &BotSettings,
) -> Arc<TransmissionManager> {
    let client = Arc::new(TelegramChatClient::new(bot.clone(), Arc::clone(cache)));
    let storage = Arc::new(FsStorage::new(settings.transmission.download_dir.clone()));
    Arc::new(TransmissionManager::new(
        client,
        storage,
        settings.transmission.as_ref(),
    ))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .inspect_async(|msg: Message, cache: Arc<MessageCache>| async move {
                    cache.observe(&msg).await;
                })
                .branch(
                    dptree::filter(|msg: Message, settings: Arc<BotSettings>| {
                        settings
                            .telegram
                            .allowed_users()
                            .contains(&get_user_id_safe(&msg))
                    })
                    .filter_command::<Command>()
                    .endpoint(handle_command),
                ),
        )
        .branch(Update::filter_channel_post().endpoint(observe_channel_post))
}

async fn observe_channel_post(
    msg: Message,
    cache: Arc<MessageCache>,
) -> Result<(), teloxide::RequestError> {
    cache.observe(&msg).await;
    respond(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    manager: Arc<TransmissionManager>,
    cache: Arc<MessageCache>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Download(args) => bot::handlers::download(bot, msg, &args, manager, cache).await,
        Command::Upload(args) => bot::handlers::upload(bot, msg, &args, manager, cache).await,
        Command::Abort(args) => bot::handlers::abort(bot, msg, &args, manager, cache).await,
        Command::Help => bot::handlers::help(bot, msg).await,
    };
    if let Err(e) = res {
        error!(error = %e, "Command error");
    }
    respond(())
}
