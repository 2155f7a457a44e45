pub mod cli;
pub mod commands;
pub mod config;
pub mod demo_wallet;
pub mod error;
pub mod logging;
pub mod output;
