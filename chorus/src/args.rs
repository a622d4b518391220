use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Chat bot for Suno music generation
#[derive(Debug, Parser)]
#[command(name = "chorus", about = "Chat bot and admin panel for Suno music generation")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "chorus.toml", env = "CHORUS_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "CHORUS_LISTEN")]
    pub listen: Option<SocketAddr>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bot and the admin panel (default)
    Serve,
    /// Print the remaining credits of the generation account
    Credits,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default() {
        let args = Args::try_parse_from(["chorus"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.config, PathBuf::from("chorus.toml"));
    }

    #[test]
    fn credits_with_config_and_listen() {
        let args =
            Args::try_parse_from(["chorus", "--config", "/etc/chorus.toml", "--listen", "127.0.0.1:8080", "credits"])
                .unwrap();
        assert!(matches!(args.command, Some(Command::Credits)));
        assert_eq!(args.listen, Some(SocketAddr::from(([127, 0, 0, 1], 8080))));
    }
}
