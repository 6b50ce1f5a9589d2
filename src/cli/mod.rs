//! CLI module for autoloop - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running the loop,
//! reading persisted statistics and checking configuration.

pub mod commands;

pub use commands::Cli;
