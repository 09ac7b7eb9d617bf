// src/cli/mod.rs
//! CLI command handlers.

pub mod args;
pub mod handlers;

pub use args::{Cli, Commands, PathArgs, RunArgs};
pub use handlers::{
    handle_check_tool, handle_correlate, handle_prune, handle_run, handle_status, load_config,
};
