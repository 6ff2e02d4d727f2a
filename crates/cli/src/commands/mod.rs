//! CLI subcommand implementations.

pub mod keys;
pub mod migrate;
pub mod token;
