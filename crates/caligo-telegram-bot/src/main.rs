mod redact;

use caligo_core::config::TransmissionSettings;
use caligo_transport_telegram::config::{BotSettings, TelegramSettings};
use caligo_transport_telegram::runner::run_bot;
use dotenvy::dotenv;
use redact::{RedactingMakeWriter, Redactor};
use std::io;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "caligo_core=info,caligo_runtime=info,caligo_transport_telegram=info,caligo=info,hyper=warn,h2=error,reqwest=warn,tokio=warn,tower=warn";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Compile redaction rules before anything is logged
    let redactor = Arc::new(Redactor::new().map_err(|e| {
        eprintln!("Failed to compile redaction patterns: {e}");
        e
    })?);

    init_logging(redactor);

    info!("Starting Caligo transmission bot...");

    let settings = init_settings();

    run_bot(settings).await;

    Ok(())
}

fn init_logging(redactor: Arc<Redactor>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, redactor);

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug_mode {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<BotSettings> {
    let transmission_settings = match TransmissionSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Failed to load transmission configuration");
            std::process::exit(1);
        }
    };
    let telegram_settings = match TelegramSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Failed to load telegram configuration");
            std::process::exit(1);
        }
    };

    if telegram_settings.allowed_users().is_empty() {
        error!("ALLOWED_USERS is empty; every command will be ignored");
    }

    info!(
        download_dir = %transmission_settings.download_dir.display(),
        progress_interval_secs = transmission_settings.progress_interval_secs,
        "Configuration loaded successfully."
    );
    Arc::new(BotSettings::new(transmission_settings, telegram_settings))
}
