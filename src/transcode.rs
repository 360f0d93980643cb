//! External transcoder integration.
//!
//! Audio demux and frame sampling both go through one `Transcoder` seam and
//! are distinguished only by the argument vector, so tests can substitute a
//! recording stub for the real ffmpeg binary.

use crate::common::{AUDIO_CODEC, AUDIO_SAMPLE_RATE};
use log::{error, info};
use std::{
    path::Path,
    process::{Command, Stdio},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscodeFailure {
    #[error("failed to launch `{tool}`: {reason}")]
    Launch { tool: String, reason: String },
    #[error("`{tool}` exited with status {code}")]
    NonZero { tool: String, code: i32 },
}

pub trait Transcoder: Send + Sync {
    /// Whether the underlying tool can be invoked at all.
    fn is_available(&self) -> bool;

    /// Invoke the tool with `args` and block until it exits.
    fn invoke(&self, args: &[String]) -> Result<(), TranscodeFailure>;

    /// Name used in diagnostics.
    fn name(&self) -> &str;
}

// ────────────────────────────────────────────────────────────────
// ffmpeg
// ────────────────────────────────────────────────────────────────

/// The real transcoder: a silent, synchronous ffmpeg child process.
pub struct FfmpegTranscoder {
    bin: String,
}

impl FfmpegTranscoder {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn is_available(&self) -> bool {
        Command::new(&self.bin)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    fn invoke(&self, args: &[String]) -> Result<(), TranscodeFailure> {
        let status = Command::new(&self.bin)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|err| TranscodeFailure::Launch {
                tool: self.bin.clone(),
                reason: err.to_string(),
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(TranscodeFailure::NonZero {
                tool: self.bin.clone(),
                code: status.code().unwrap_or(-1),
            })
        }
    }

    fn name(&self) -> &str {
        &self.bin
    }
}

/// Log the transcoder version at startup, or an error if it cannot be found.
pub fn log_transcoder_version(bin: &str) {
    match Command::new(bin).arg("-version").output() {
        Ok(output) if output.status.success() => {
            let version_info = String::from_utf8_lossy(&output.stdout);
            let version_number = version_info
                .lines()
                .next()
                .unwrap_or("unknown version")
                .split_whitespace()
                .nth(2)
                .unwrap_or("unknown");
            info!("{} version: {}", bin, version_number);
        }
        Ok(_) => {
            error!(
                "`{}` command was found, but it returned an error. Please ensure it's correctly installed.",
                bin
            );
        }
        Err(_) => {
            error!(
                "`{}` is not installed or not available in PATH. Please install it before running the application.",
                bin
            );
        }
    }
}

// ────────────────────────────────────────────────────────────────
// Argument vectors
// ────────────────────────────────────────────────────────────────

/// Demux the audio track to a 16-bit PCM waveform, overwriting any existing
/// output.
pub fn demux_audio_args(video: &Path, audio_out: &Path) -> Vec<String> {
    vec![
        "-i".into(),
        video.to_string_lossy().into_owned(),
        "-vn".into(),
        "-y".into(),
        "-acodec".into(),
        AUDIO_CODEC.into(),
        "-ar".into(),
        AUDIO_SAMPLE_RATE.into(),
        audio_out.to_string_lossy().into_owned(),
    ]
}

/// Emit every `stride`-th frame as sequentially numbered images, remapping
/// output timestamps to the sampled cadence.
pub fn sample_frames_args(video: &Path, stride: u32, out_pattern: &Path) -> Vec<String> {
    vec![
        "-i".into(),
        video.to_string_lossy().into_owned(),
        "-vf".into(),
        format!("select=not(mod(n\\,{})),setpts=N/FRAME_RATE/TB", stride),
        "-vsync".into(),
        "vfr".into(),
        "-y".into(),
        out_pattern.to_string_lossy().into_owned(),
    ]
}
