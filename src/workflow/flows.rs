//! Phase orchestration.
//!
//! A run is at most two phases, always in the same order: videos to frames,
//! then images to faces. Each phase scans, partitions, builds its own worker
//! pool, and blocks until every chunk has returned; the pool handle is
//! released before the next phase starts.

use crate::cli::{Cli, Phase};
use crate::common::errors::{ErrorLog, PipelineError};
use crate::config::AppConfig;
use crate::transcode::{FfmpegTranscoder, Transcoder};
use crate::vision::onnx::{OnnxFaceDetector, OnnxSegmenter};
use crate::vision::{FaceDetector, Segmenter};
use crate::workflow::partition::partition;
use crate::workflow::pool::WorkerPool;
use crate::workflow::processors::face::{SelectionPolicy, process_image_dir};
use crate::workflow::processors::video::{VideoContext, compute_stride};
use crate::workflow::scanner::{scan_image_dirs, scan_videos};
use anyhow::{Context, Result, ensure};
use log::info;
use std::path::Path;

pub fn run(cli: &Cli, config: &AppConfig) -> Result<()> {
    let dataset_dir = cli.dataset_dir();
    ensure!(
        dataset_dir.is_dir(),
        "dataset directory {:?} does not exist or is not a directory",
        dataset_dir
    );
    let errors = ErrorLog::open(&config.error_log)?;

    match cli.command {
        None => {
            video_phase(cli, config, &errors)?;
            image_phase(cli, config, &errors)?;
        }
        Some(Phase::Split) => video_phase(cli, config, &errors)?,
        Some(Phase::Extract) => image_phase(cli, config, &errors)?,
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────
// Video phase
// ────────────────────────────────────────────────────────────────

pub fn video_phase(cli: &Cli, config: &AppConfig, errors: &ErrorLog) -> Result<()> {
    // Validate and clamp the ratio once, before any scanning or dispatch.
    compute_stride(cli.percent_of_frames_kept)?;
    let percent_kept = cli.percent_of_frames_kept.min(1.0);

    let transcoder = FfmpegTranscoder::new(&config.ffmpeg_bin);
    if !transcoder.is_available() {
        return Err(PipelineError::MissingDependency {
            tool: config.ffmpeg_bin.clone(),
        }
        .into());
    }

    let frame_root = cli.frame_output_dir();
    let items = scan_videos(&cli.dataset_dir(), &frame_root, percent_kept);
    info!(
        "video phase: {} video(s) found under {:?}",
        items.len(),
        cli.dataset_dir()
    );
    if items.is_empty() {
        return Ok(());
    }

    let pool = WorkerPool::new(config.workers())?;
    let chunks = partition(items, pool.workers());
    let report = pool.run_phase(chunks, errors, |item| {
        let mut ctx = VideoContext::new(item, &transcoder, &config.frame_format);
        ctx.run(errors)
    })?;
    info!(
        "video phase finished: {} completed, {} failed",
        report.completed, report.failed
    );
    Ok(())
}

// ────────────────────────────────────────────────────────────────
// Image phase
// ────────────────────────────────────────────────────────────────

pub fn image_phase(cli: &Cli, config: &AppConfig, errors: &ErrorLog) -> Result<()> {
    let segmenter = load_segmenter(cli)?;
    let detector = load_detector(cli)?;

    let items = scan_image_dirs(&cli.dataset_dir(), &cli.face_output_dir())?;
    info!(
        "image phase: {} image directorie(s) found under {:?}",
        items.len(),
        cli.dataset_dir()
    );
    if items.is_empty() {
        return Ok(());
    }

    let pool = WorkerPool::new(config.workers())?;
    let chunks = partition(items, pool.workers());
    let report = pool.run_phase(chunks, errors, |item| {
        process_image_dir(
            item,
            segmenter.as_ref(),
            detector.as_ref(),
            SelectionPolicy::LastDetected,
            errors,
        )
    })?;
    info!(
        "image phase finished: {} completed, {} failed",
        report.completed, report.failed
    );
    Ok(())
}

fn load_segmenter(cli: &Cli) -> Result<Box<dyn Segmenter>> {
    let path = require_model(&cli.segmentation_model, "segmentation model (--segmentation-model)")?;
    let segmenter = OnnxSegmenter::load(path)
        .context(format!("failed to load segmentation model {:?}", path))?;
    Ok(Box::new(segmenter))
}

fn load_detector(cli: &Cli) -> Result<Box<dyn FaceDetector>> {
    let path = require_model(&cli.face_model, "face detection model (--face-model)")?;
    let detector = OnnxFaceDetector::load(path)
        .context(format!("failed to load face detection model {:?}", path))?;
    Ok(Box::new(detector))
}

fn require_model<'a>(
    path: &'a Option<std::path::PathBuf>,
    tool: &str,
) -> Result<&'a Path, PipelineError> {
    path.as_deref().ok_or_else(|| PipelineError::MissingDependency {
        tool: tool.to_string(),
    })
}
