pub mod chat;
pub mod config;
pub mod session;
pub mod terminal;

use clap::{Parser, Subcommand};

use hearth_domain::config::Config;

/// Hearth: a companion that remembers you, and sometimes writes first.
#[derive(Debug, Parser)]
#[command(name = "hearth", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Chat with your companion (default when no subcommand is given).
    Chat,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Inspect the stored session.
    #[command(subcommand)]
    Session(SessionCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Print a short summary of the stored session.
    Show,
    /// Write the stored session to stdout as pretty JSON.
    Export,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `HEARTH_CONFIG` (or
/// `hearth.toml` by default).  A missing file means all defaults.
/// Returns the parsed [`Config`] and the path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("HEARTH_CONFIG").unwrap_or_else(|_| "hearth.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_chat() {
        let cli = Cli::try_parse_from(["hearth"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn nested_subcommands_parse() {
        let cli = Cli::try_parse_from(["hearth", "session", "export"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Session(SessionCommand::Export))
        ));

        let cli = Cli::try_parse_from(["hearth", "config", "validate"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Config(ConfigCommand::Validate))
        ));
    }
}
