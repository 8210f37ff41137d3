use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use aegis_live::client::{CredentialStore, HttpBackend, TokenFile};
use aegis_live::config::Config;
use aegis_live::output::{OutputFormat, OutputHandler};
use aegis_live::stream::{LoadOutcome, RunOutcome, StreamController};

/// Live event stream daemon for the Aegis Forensics backend
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting Aegis live stream...");

    // Load configuration
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        log::warn!("Config file not found, using defaults");
        Config::default()
    };

    let credentials: Arc<dyn CredentialStore> = Arc::new(TokenFile::new(&config.auth.token_file));
    let backend = HttpBackend::new(
        &config.backend.base_url,
        config.backend.request_timeout(),
        credentials.clone(),
    )?;

    let mut output_handler = OutputHandler::new(
        OutputFormat::parse(&config.output.format),
        config.output.file_path.clone(),
    )?;

    let filter = config.filter.to_filter_state();
    let mut controller = StreamController::new(Arc::new(backend), credentials, config.stream.clone())
        .with_filter(filter.clone());

    // Setup graceful shutdown signal handling
    let stop = controller.stop_handle();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal, gracefully stopping...");
        stop.request_stop();
    })?;

    if config.stream.recent_limit > 0 {
        match controller.load_recent(config.stream.recent_limit).await {
            LoadOutcome::Loaded(_) => {
                for event in controller.visible().into_iter().rev() {
                    output_handler.write_event(event)?;
                }
            }
            LoadOutcome::Failed(banner) => eprintln!("{}", banner),
            LoadOutcome::LoginRequired => {
                login_required(&config);
                return Ok(());
            }
        }
    }

    log::info!("Streaming from {}. Press Ctrl+C to stop.", config.backend.base_url);

    // Oldest first on output so the terminal reads top to bottom
    let outcome = controller
        .run_until_stopped(|fresh| {
            for event in fresh.iter().rev().filter(|e| filter.matches(e)) {
                if let Err(e) = output_handler.write_event(event) {
                    log::error!("Failed to write event {}: {}", event.id, e);
                }
            }
        })
        .await;

    if outcome == RunOutcome::LoginRequired {
        login_required(&config);
    }

    output_handler.write_stats(controller.stats())?;
    output_handler.flush()?;
    log::info!("Aegis live stream stopped");
    Ok(())
}

fn login_required(config: &Config) {
    eprintln!("Session expired or missing. Run 'aegis_cli login --token <TOKEN>' and try again.");
    log::warn!("Credentials cleared from {:?}", config.auth.token_file);
}
