use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Drive HeyGen streaming avatars for training simulations
#[derive(Debug, Parser)]
#[command(name = "avatar-sim", version, about)]
pub struct Cli {
    /// Configuration file (defaults to ./simulator.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Connect one avatar and relay SEND_TO_AVATAR lines from stdin
    Session {
        /// Roster key of the avatar
        #[arg(long, default_value = "noa")]
        avatar: String,
    },
    /// Run the three-phase training simulation
    Simulate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["avatar-sim", "session", "--avatar", "sam"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Session {
                avatar: "sam".to_string()
            }
        );
        assert!(cli.config.is_none());

        let cli = Cli::try_parse_from(["avatar-sim", "simulate", "--config", "lab.toml"]).unwrap();
        assert_eq!(cli.command, Command::Simulate);
        assert_eq!(cli.config, Some(PathBuf::from("lab.toml")));

        assert!(Cli::try_parse_from(["avatar-sim"]).is_err());
    }
}
