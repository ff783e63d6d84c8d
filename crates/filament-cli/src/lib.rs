//! Filament CLI library
//!
//! Command-line definitions, configuration loading, vault discovery, and
//! the markdown transforms behind the `filament` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod markdown;
