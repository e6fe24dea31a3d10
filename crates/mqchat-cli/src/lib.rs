//! mqchat CLI library
//!
//! Argument parsing, configuration loading and command dispatch for the
//! `mqchat` binary.

pub mod cli;
pub mod commands;
pub mod error;

pub use cli::Cli;
pub use commands::{load_configuration, CommandDispatcher};
pub use error::{CliError, Result};
