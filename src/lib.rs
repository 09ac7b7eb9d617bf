pub mod candidates;
pub mod cli;
pub mod clone;
pub mod config;
pub mod correlate;
pub mod discovery;
pub mod error;
pub mod exit;
pub mod harvest;
pub mod ledger;
pub mod reporting;
pub mod selector;
pub mod summary;
pub mod tool;
pub mod types;
