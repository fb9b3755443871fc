use crate::bot::link::parse_telegram_link;
use crate::bot::media::remote_message;
use crate::bot::message_cache::MessageCache;
use crate::bot::responder::TelegramResponder;
use anyhow::Result;
use caligo_core::{Direction, RequestId, Responder, TransmissionError};
use caligo_runtime::{
    DownloadRequest, DownloadTarget, TransferResult, TransmissionManager, UploadRequest,
};
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::{prelude::*, utils::command::BotCommands};
use tracing::{info, warn};

const NO_DOWNLOAD_TARGET: &str = "Reply to any media or provide a Telegram link!";
const REPLY_WITHOUT_MEDIA: &str = "The message you replied to doesn't contain any media.";
const NO_UPLOAD_PATH: &str = "Pass the file path.";
const UPLOAD_PATH_MISSING: &str = "The file you input doesn't exist.";
const ABORT_NO_TARGET: &str = "Pass GID or reply to the message of the task to abort transmission.";
const ABORT_BOTH_TARGETS: &str = "Can't pass GID/Message ID while replying to a message.";
const ABORT_NOT_FOUND: &str = "The message you chose is not in task.";
const PREPARING_DOWNLOAD: &str = "Preparing to download...";
const PREPARING_UPLOAD: &str = "Preparing to upload...";

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Download media from a replied message or a link
    #[command(
        description = "download replied media or a t.me link; -b: bulk media download.",
        alias = "dl"
    )]
    Download(String),
    /// Upload a local file to this chat
    #[command(
        description = "upload a file: <path> [-d] [-c caption] or -f <path>.",
        alias = "ul"
    )]
    Upload(String),
    /// Abort a running transmission
    #[command(description = "abort a transmission by reply or message id.")]
    Abort(String),
    /// Show help
    #[command(description = "show this text.")]
    Help,
}

/// Parsed `/download` arguments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DownloadArgs {
    /// Message link, if given
    pub link: Option<String>,
    /// Expand the whole media group
    pub bulk: bool,
}

/// Parse `/download` arguments: an optional link and the `-b` flag.
#[must_use]
pub fn parse_download_args(input: &str) -> DownloadArgs {
    let mut args = DownloadArgs::default();
    for token in input.split_whitespace() {
        match token {
            "-b" => args.bulk = true,
            link if args.link.is_none() && !link.starts_with('-') => {
                args.link = Some(link.to_string());
            }
            _ => {}
        }
    }
    args
}

/// Parsed `/upload` arguments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadArgs {
    /// Local file to upload
    pub path: Option<PathBuf>,
    /// Delete the file after a successful upload
    pub delete_after: bool,
    /// Caption for the posted file
    pub caption: Option<String>,
}

/// Parse `/upload` arguments.
///
/// Positional words form the path; `-f <path>` gives it explicitly. `-c`
/// takes every following word up to the next flag as caption; `-d` deletes
/// the file afterwards.
#[must_use]
pub fn parse_upload_args(input: &str) -> UploadArgs {
    let mut args = UploadArgs::default();
    let mut positional: Vec<&str> = Vec::new();
    let mut caption: Vec<&str> = Vec::new();
    let mut explicit_path: Option<&str> = None;
    let mut tokens = input.split_whitespace().peekable();

    while let Some(token) = tokens.next() {
        match token {
            "-d" => args.delete_after = true,
            "-f" => explicit_path = tokens.next(),
            "-c" => {
                while let Some(word) = tokens.next_if(|w| !is_upload_flag(w)) {
                    caption.push(word);
                }
            }
            word => positional.push(word),
        }
    }

    args.path = if positional.is_empty() {
        explicit_path.map(PathBuf::from)
    } else {
        Some(PathBuf::from(positional.join(" ")))
    };
    if !caption.is_empty() {
        args.caption = Some(caption.join(" "));
    }
    args
}

fn is_upload_flag(token: &str) -> bool {
    matches!(token, "-d" | "-f" | "-c")
}

/// Decide which message an `/abort` targets.
///
/// # Errors
///
/// Returns the guard message to show when the arguments are unusable.
pub fn abort_target(input: &str, reply_id: Option<i32>) -> Result<i32, &'static str> {
    let input = input.trim();
    match (input.is_empty(), reply_id) {
        (true, None) => Err(ABORT_NO_TARGET),
        (false, Some(_)) => Err(ABORT_BOTH_TARGETS),
        (true, Some(id)) => Ok(id),
        (false, None) => input.parse::<i32>().map_err(|_| ABORT_NOT_FOUND),
    }
}

/// Render the final status text of a transfer.
#[must_use]
pub fn render_outcome(
    direction: Direction,
    result: &Result<TransferResult, TransmissionError>,
) -> String {
    match result {
        Ok(result) => result.render(),
        Err(TransmissionError::InvalidTarget(_)) if direction == Direction::Upload => {
            format!("<i>{UPLOAD_PATH_MISSING}</i>")
        }
        Err(e) => format!("<i>{}</i>", html_escape::encode_text(&e.to_string())),
    }
}

/// Show the command list.
///
/// # Errors
///
/// Returns an error if the message cannot be sent.
pub async fn help(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

/// Handle `/download`.
///
/// # Errors
///
/// Returns an error if a guard message cannot be sent.
pub async fn download(
    bot: Bot,
    msg: Message,
    input: &str,
    manager: Arc<TransmissionManager>,
    cache: Arc<MessageCache>,
) -> Result<()> {
    let args = parse_download_args(input);
    let reply = msg.reply_to_message().map(remote_message);

    let target = match (reply, args.link) {
        (Some(reply), _) if reply.media.is_none() => {
            bot.send_message(msg.chat.id, REPLY_WITHOUT_MEDIA).await?;
            return Ok(());
        }
        (Some(reply), _) => DownloadTarget::Message(reply),
        (None, Some(link)) => match parse_telegram_link(&link) {
            Ok(link) => DownloadTarget::Link(link),
            Err(e) => {
                bot.send_message(msg.chat.id, e.to_string()).await?;
                return Ok(());
            }
        },
        (None, None) => {
            bot.send_message(msg.chat.id, NO_DOWNLOAD_TARGET).await?;
            return Ok(());
        }
    };

    let request = DownloadRequest {
        id: request_id(&msg),
        target,
        bulk: args.bulk,
    };
    info!(request_id = %request.id, bulk = request.bulk, "Download requested");

    let responder = Arc::new(TelegramResponder::new(bot, request.id, cache));
    responder.respond(PREPARING_DOWNLOAD).await?;

    // Run detached so /abort is handled while the transfer is in flight.
    tokio::spawn(async move {
        let result = manager
            .start_download(request, Arc::clone(&responder) as Arc<dyn Responder>)
            .await;
        finish(responder.as_ref(), Direction::Download, &result).await;
    });
    Ok(())
}

/// Handle `/upload`.
///
/// # Errors
///
/// Returns an error if a guard message cannot be sent.
pub async fn upload(
    bot: Bot,
    msg: Message,
    input: &str,
    manager: Arc<TransmissionManager>,
    cache: Arc<MessageCache>,
) -> Result<()> {
    let args = parse_upload_args(input);
    let Some(path) = args.path else {
        bot.send_message(msg.chat.id, NO_UPLOAD_PATH).await?;
        return Ok(());
    };

    let request = UploadRequest {
        id: request_id(&msg),
        path,
        delete_after: args.delete_after,
        caption: args.caption,
    };
    info!(
        request_id = %request.id,
        path = %request.path.display(),
        delete_after = request.delete_after,
        "Upload requested"
    );

    let responder = Arc::new(TelegramResponder::new(bot, request.id, cache));
    responder.respond(PREPARING_UPLOAD).await?;

    tokio::spawn(async move {
        let result = manager
            .start_upload(request, Arc::clone(&responder) as Arc<dyn Responder>)
            .await;
        finish(responder.as_ref(), Direction::Upload, &result).await;
    });
    Ok(())
}

/// Handle `/abort`.
///
/// # Errors
///
/// Returns an error if a reply cannot be sent.
pub async fn abort(
    bot: Bot,
    msg: Message,
    input: &str,
    manager: Arc<TransmissionManager>,
    cache: Arc<MessageCache>,
) -> Result<()> {
    let reply_id = msg.reply_to_message().map(|reply| reply.id.0);
    let target = match abort_target(input, reply_id) {
        Ok(id) => id,
        Err(guard) => {
            bot.send_message(msg.chat.id, guard).await?;
            return Ok(());
        }
    };

    let message_id = cache.request_for(msg.chat.id.0, target).await;
    match manager.abort(RequestId::new(msg.chat.id.0, message_id)).await {
        Ok(aborted) => {
            info!(request_id = %aborted.request_id, tasks = aborted.cancelled, "Abort signalled");
            if let Err(e) = bot.delete_message(msg.chat.id, msg.id).await {
                warn!(error = %e, "Failed to delete abort command");
            }
        }
        Err(e) => {
            warn!(message_id, error = %e, "Abort found no running transmission");
            bot.send_message(msg.chat.id, ABORT_NOT_FOUND).await?;
        }
    }
    Ok(())
}

fn request_id(msg: &Message) -> RequestId {
    RequestId::new(msg.chat.id.0, msg.id.0)
}

async fn finish(
    responder: &TelegramResponder,
    direction: Direction,
    result: &Result<TransferResult, TransmissionError>,
) {
    if let Err(e) = result {
        info!(direction = %direction, error = %e, "Transmission ended without success");
    }
    if let Err(e) = responder.respond(&render_outcome(direction, result)).await {
        warn!(error = %e, "Failed to post transmission report");
    }
}
