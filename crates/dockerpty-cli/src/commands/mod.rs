//! CLI subcommand implementations.

pub mod exec;
pub mod start;
