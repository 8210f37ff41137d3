use std::path::PathBuf;
use std::sync::Arc;

use structopt::StructOpt;

use aegis_live::adapter::{classify_severity, classify_type};
use aegis_live::client::{CredentialStore, HttpBackend, TokenFile};
use aegis_live::config::Config;
use aegis_live::filter::{agents, AgentFilter};
use aegis_live::models::{EventType, Severity};
use aegis_live::output::{OutputFormat, OutputHandler};
use aegis_live::stream::{LoadOutcome, StreamController};

/// Aegis Forensics live event command line interface
#[derive(StructOpt, Debug)]
#[structopt(name = "aegis", about = "Aegis Forensics live event CLI")]
pub enum Cli {
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// Store a bearer token obtained from the Aegis login flow
    Login {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Bearer token
        #[structopt(short, long)]
        token: String,
    },
    /// Forget the stored bearer token
    Logout {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Fetch, filter and display recent system events
    Recent {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Number of events to fetch
        #[structopt(short, long, default_value = "50")]
        limit: usize,
        /// Event types to show (repeatable; default all)
        #[structopt(long = "type")]
        types: Vec<EventType>,
        /// Severities to show (repeatable; default all)
        #[structopt(long = "severity")]
        severities: Vec<Severity>,
        /// Only events from this agent ("all" for every agent)
        #[structopt(long, default_value = "all")]
        agent: AgentFilter,
        /// Case-insensitive search over message, source and agent
        #[structopt(short, long, default_value = "")]
        query: String,
        /// Output format: json, jsonl or console
        #[structopt(short, long, default_value = "console")]
        format: String,
    },
    /// Show how free-text type and severity strings are classified
    Classify {
        /// Raw type text
        #[structopt(long = "type", default_value = "")]
        event_type: String,
        /// Raw severity or level text
        #[structopt(long, default_value = "")]
        severity: String,
    },
}

fn load_config(path: &PathBuf) -> Result<Config, Box<dyn std::error::Error>> {
    if path.exists() {
        Config::from_file(path)
    } else {
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();

    let cli = Cli::from_args();

    match cli {
        Cli::Config { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
        Cli::Login { config, token } => {
            let config = load_config(&config)?;
            let store = TokenFile::new(&config.auth.token_file);
            store.set_token(&token)?;
            println!("Token stored in {:?}", store.path());
        }
        Cli::Logout { config } => {
            let config = load_config(&config)?;
            TokenFile::new(&config.auth.token_file).clear()?;
            println!("Token cleared");
        }
        Cli::Recent {
            config,
            limit,
            types,
            severities,
            agent,
            query,
            format,
        } => {
            let config = load_config(&config)?;
            let credentials: Arc<dyn CredentialStore> =
                Arc::new(TokenFile::new(&config.auth.token_file));
            let backend = HttpBackend::new(
                &config.backend.base_url,
                config.backend.request_timeout(),
                credentials.clone(),
            )?;

            let mut filter = config.filter.to_filter_state();
            if !types.is_empty() {
                filter = filter.with_types(types);
            }
            if !severities.is_empty() {
                filter = filter.with_severities(severities);
            }
            filter.agent = agent;
            filter.query = query;

            let mut controller =
                StreamController::new(Arc::new(backend), credentials, config.stream.clone())
                    .with_filter(filter);

            match controller.load_recent(limit).await {
                LoadOutcome::Loaded(count) => {
                    let visible = controller.visible();
                    let mut output = OutputHandler::new(OutputFormat::parse(&format), None)?;
                    for event in &visible {
                        output.write_event(event)?;
                    }
                    eprintln!(
                        "Showing {} of {} event(s); agents: {}",
                        visible.len(),
                        count,
                        agents(controller.store().buffer()).join(", ")
                    );
                }
                LoadOutcome::Failed(banner) => {
                    eprintln!("{}", banner);
                    std::process::exit(1);
                }
                LoadOutcome::LoginRequired => {
                    eprintln!("Session expired or missing. Run 'aegis_cli login --token <TOKEN>' first.");
                    std::process::exit(2);
                }
            }
        }
        Cli::Classify {
            event_type,
            severity,
        } => {
            println!(
                "type: {:?} -> {}, severity: {:?} -> {}",
                event_type,
                classify_type(&event_type),
                severity,
                classify_severity(&severity)
            );
        }
    }

    Ok(())
}
