//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::Parser;
use mqchat_core::{Identity, Participants, Role};

use crate::error::{CliError, Result};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Your identity, or A / B for the fixed pairing
    pub identity: String,

    /// Identity of the person you are chatting with
    pub peer: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Attach to your running chat's GUI channels instead of starting a chat
    #[arg(long)]
    pub monitor: bool,
}

impl Cli {
    /// Resolve the pairing named on the command line
    pub fn participants(&self) -> Result<Participants> {
        let usage = |e: mqchat_core::ChatError| CliError::Usage(e.to_string());

        match &self.peer {
            Some(peer) => {
                let local = Identity::new(&self.identity).map_err(usage)?;
                let peer = Identity::new(peer).map_err(usage)?;
                Participants::named(local, peer).map_err(usage)
            }
            None => {
                let role: Role = self.identity.parse().map_err(usage)?;
                Ok(Participants::fixed_role(role))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use mqchat_core::ChatMode;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mqchat").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_named_pairing() {
        let cli = parse(&["alice", "bob", "--verbose"]);
        assert!(cli.verbose);
        assert!(!cli.monitor);

        let participants = cli.participants().unwrap();
        assert_eq!(participants.mode(), ChatMode::Named);
        assert_eq!(participants.local().as_str(), "alice");
        assert_eq!(participants.peer().as_str(), "bob");
    }

    #[test]
    fn test_fixed_role_pairing() {
        let cli = parse(&["b"]);
        let participants = cli.participants().unwrap();
        assert_eq!(participants.mode(), ChatMode::FixedRole);
        assert_eq!(participants.local().as_str(), "B");
        assert_eq!(participants.peer().as_str(), "A");
    }

    #[test]
    fn test_monitor_and_config_flags() {
        let cli = parse(&["--monitor", "-c", "chat.toml", "alice", "bob"]);
        assert!(cli.monitor);
        assert_eq!(cli.config, Some(PathBuf::from("chat.toml")));
    }

    #[test]
    fn test_invalid_arguments_are_usage_errors() {
        assert!(parse(&["C"]).participants().unwrap_err().is_usage());
        assert!(parse(&["alice", "Alice"]).participants().unwrap_err().is_usage());
        assert!(parse(&["al/ice", "bob"]).participants().unwrap_err().is_usage());
    }

    #[test]
    fn test_missing_identity_is_a_parse_error() {
        let err = Cli::try_parse_from(["mqchat"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
