use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use std::io::Write;

use faceharvest::cli::Cli;
use faceharvest::config::AppConfig;
use faceharvest::transcode::log_transcoder_version;
use faceharvest::workflow::flows;

fn initialize_logger() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = buf.timestamp();
            writeln!(
                buf,
                "{} {:<5} {} {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();
    initialize_logger();
    log_transcoder_version(&config.ffmpeg_bin);
    flows::run(&cli, &config)
}
