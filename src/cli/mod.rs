//! Command-line interface
//!
//! The binary takes a single positional argument selecting which record
//! stream to backfill.

use clap::{Parser, ValueEnum};

use crate::schema::Kind;

pub mod run;

/// Backfill historical exchange account data into the archive
#[derive(Parser, Debug)]
#[command(name = "trade-archiver", version, about)]
pub struct Cli {
    /// Record stream to backfill
    #[arg(value_enum)]
    pub mode: RunMode,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Account fills
    Trades,
    /// Account orders
    Orders,
}

impl RunMode {
    pub fn kind(self) -> Kind {
        match self {
            RunMode::Trades => Kind::Trades,
            RunMode::Orders => Kind::Orders,
        }
    }
}
