//! CLI module for kcsync.
//!
//! This module provides the command-line interface for reconciling
//! Keycloak memberships from a configuration file.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, StateCommands};
pub use output::OutputFormatter;
