use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use hearth_domain::config::{Config, LogFormat, ObservabilityConfig};
use hearth_gateway::bootstrap;
use hearth_gateway::cli::{Cli, Command, ConfigCommand, SessionCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to chat when no subcommand is given.
        None | Some(Command::Chat) => {
            let (config, _) = hearth_gateway::cli::load_config()?;
            init_chat_tracing(&config)?;
            tracing::info!("hearth chat starting");
            hearth_gateway::cli::chat::chat(Arc::new(config)).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = hearth_gateway::cli::load_config()?;
            if !hearth_gateway::cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _) = hearth_gateway::cli::load_config()?;
            hearth_gateway::cli::config::show(&config)
        }
        Some(Command::Session(cmd)) => {
            init_cli_tracing();
            let (config, _) = hearth_gateway::cli::load_config()?;
            let store = bootstrap::open_store(&config)?;
            let session = store.read();
            match cmd {
                SessionCommand::Show => {
                    hearth_gateway::cli::session::show(&session);
                    Ok(())
                }
                SessionCommand::Export => hearth_gateway::cli::session::export(&session),
            }
        }
        Some(Command::Version) => {
            println!("hearth {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured tracing for the chat REPL.
///
/// The terminal belongs to the conversation, so events go to
/// `<state_path>/hearth.log` in the configured format.
fn init_chat_tracing(config: &Config) -> anyhow::Result<()> {
    let dir = &config.store.state_path;
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join("hearth.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    init_tracing(&config.observability, Mutex::new(file));
    Ok(())
}

fn init_tracing<W>(obs: &ObservabilityConfig, writer: W)
where
    W: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&obs.log_filter));

    match obs.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .init(),
    }
}

/// Compact stderr-only tracing for one-shot commands.
///
/// Defaults to `warn` so diagnostics do not pollute stdout.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
