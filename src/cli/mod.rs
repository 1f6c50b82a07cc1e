//! CLI module for aidev - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for single-repository
//! runs, ticket processing, and repository mapping inspection.

pub mod commands;

pub use commands::Cli;
