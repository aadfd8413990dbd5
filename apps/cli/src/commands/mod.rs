//! Command implementations for the multigrade CLI.

pub mod agents;
pub mod config;
pub mod generate;
pub mod history;
pub mod show;
pub mod split;
