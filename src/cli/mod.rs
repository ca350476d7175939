//! Command-line interface for autosolo
//!
//! - `args`: clap definitions
//! - `run`: entry point, config discovery and dispatch
//! - `commands`: command implementations

pub mod args;
mod commands;
mod run;

#[cfg(test)]
mod tests;

pub use args::{Cli, Commands};
pub use run::run;
