//! Error taxonomy and the persistent per-item error log.
//!
//! Every failure the pipelines can produce is one of the variants below.
//! Fatal variants abort the whole run; everything else is caught at the
//! pipeline-step boundary, logged with the item's source path, and the run
//! continues with the next item.

use anyhow::{Context, Result};
use chrono::Local;
use log::error;
use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required external tool cannot be invoked at all. Aborts the run.
    #[error("required external dependency `{tool}` is not available")]
    MissingDependency { tool: String },

    /// An external tool exited non-zero. That step of that item is skipped.
    #[error("`{tool}` exited with status {code} while processing {path:?}")]
    ToolInvocation {
        tool: String,
        code: i32,
        path: PathBuf,
    },

    /// Source media could not be read or decoded. The item is skipped.
    #[error("failed to read source media {path:?}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// Output could not be encoded or persisted. The item is skipped.
    #[error("failed to write output {path:?}: {reason}")]
    Write { path: PathBuf, reason: String },

    /// The frames-kept ratio is out of range. Rejected before any tool runs.
    #[error("percent of frames kept must be greater than zero, got {0}")]
    InvalidRatio(f64),

    /// The segmentation model failed on one image. The item is skipped.
    #[error("foreground segmentation failed for {path:?}: {reason}")]
    Segmentation { path: PathBuf, reason: String },

    /// The face detector failed on one image. The item is skipped.
    #[error("face detection failed for {path:?}: {reason}")]
    Detection { path: PathBuf, reason: String },
}

impl PipelineError {
    /// Fatal errors surface to the top level and abort the run; everything
    /// else is confined to the item that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingDependency { .. } | PipelineError::InvalidRatio(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MissingDependency { .. } => "missing-dependency",
            PipelineError::ToolInvocation { .. } => "tool-invocation",
            PipelineError::Read { .. } => "read",
            PipelineError::Write { .. } => "write",
            PipelineError::InvalidRatio(_) => "invalid-ratio",
            PipelineError::Segmentation { .. } => "segmentation",
            PipelineError::Detection { .. } => "detection",
        }
    }
}

// ────────────────────────────────────────────────────────────────
// Persistent error log
// ────────────────────────────────────────────────────────────────

/// Append-only log of per-item failures, shared by all workers of a run.
///
/// Recoverable errors are recorded here with a timestamp and the item's
/// source path so a long batch can be audited after the fact; they are also
/// emitted through the normal logger.
pub struct ErrorLog {
    file: Mutex<File>,
    path: PathBuf,
}

impl ErrorLog {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context(format!("failed to open error log {:?}", path))?;
        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Record one per-item failure. Never fails: a broken error log must not
    /// take down the run it is supposed to document.
    pub fn record(&self, source: &Path, err: &PipelineError) {
        error!("{:?}: {}", source, err);
        if let Ok(mut file) = self.file.lock() {
            let line = format!(
                "{} [{}] {:?}: {}\n",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                err.kind(),
                source,
                err
            );
            let _ = file.write_all(line.as_bytes());
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_split_matches_taxonomy() {
        let fatal = PipelineError::MissingDependency {
            tool: "ffmpeg".into(),
        };
        let invalid = PipelineError::InvalidRatio(-0.5);
        let recoverable = PipelineError::ToolInvocation {
            tool: "ffmpeg".into(),
            code: 1,
            path: PathBuf::from("a.mp4"),
        };
        assert!(fatal.is_fatal());
        assert!(invalid.is_fatal());
        assert!(!recoverable.is_fatal());
        assert!(
            !PipelineError::Read {
                path: PathBuf::from("x.png"),
                reason: "corrupt".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn record_appends_one_line_per_failure() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("errors.log");
        let log = ErrorLog::open(&log_path).unwrap();

        log.record(
            Path::new("a.mp4"),
            &PipelineError::ToolInvocation {
                tool: "ffmpeg".into(),
                code: 1,
                path: PathBuf::from("a.mp4"),
            },
        );
        log.record(
            Path::new("b.png"),
            &PipelineError::Read {
                path: PathBuf::from("b.png"),
                reason: "truncated".into(),
            },
        );

        let contents = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[tool-invocation]"));
        assert!(lines[1].contains("[read]"));
    }
}
