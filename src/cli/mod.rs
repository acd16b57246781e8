//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::StagesCommand;
use std::ffi::OsString;

/// Provision a host for the drone cabinet service and launch it
#[derive(Debug, Parser, Clone)]
#[command(name = "cabinetctl")]
#[command(version)]
#[command(about = "Provision and launch the drone cabinet service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the full provisioning pipeline on this host
    Provision,

    /// Run preflight checks, then start and supervise the application
    Launch,

    /// Run preflight checks only; never starts the application
    Preflight,

    /// List provisioning stages and their re-run contracts
    Stages(StagesCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
