//! Environment-backed configuration.
//!
//! Everything here has a sensible default; each field can be overridden with
//! a `FACEHARVEST_`-prefixed environment variable (or a `.env` file).

use dotenv::dotenv;
use log::warn;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Transcoder binary to invoke. Override to pin a specific ffmpeg build.
    pub ffmpeg_bin: String,
    /// Where per-item failures are appended.
    pub error_log: PathBuf,
    /// Worker count override; defaults to the number of CPU cores.
    pub workers: Option<usize>,
    /// Image format for sampled frames.
    pub frame_format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            error_log: PathBuf::from("faceharvest-errors.log"),
            workers: None,
            frame_format: "png".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Self {
        dotenv().ok();
        match envy::prefixed("FACEHARVEST_").from_env() {
            Ok(config) => config,
            Err(err) => {
                warn!("ignoring invalid environment configuration: {err}");
                Self::default()
            }
        }
    }

    /// Effective worker pool size; never zero.
    pub fn workers(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}
