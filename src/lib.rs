pub mod cli;
pub mod common;
pub mod config;
pub mod transcode;
pub mod utils;
pub mod vision;
pub mod workflow;
