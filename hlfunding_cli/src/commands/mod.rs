//! CLI subcommand implementations.

pub mod arbitrage;
pub mod check;
pub mod cleanup;
pub mod scrape;
pub mod stats;
