//! Video-to-frames pipeline.
//!
//! Includes:
//! - per-video output path resolution (one subdirectory per video stem)
//! - audio demux to a 16-bit PCM waveform
//! - temporal frame sampling at a stride derived from the kept-frames ratio
//!
//! Audio extraction and frame extraction are independent steps: a failed
//! demux leaves the item partially complete and frame sampling still runs.

use crate::common::errors::{ErrorLog, PipelineError};
use crate::transcode::{TranscodeFailure, Transcoder, demux_audio_args, sample_frames_args};
use crate::utils::PathExt;
use crate::workflow::scanner::VideoItem;
use log::{debug, warn};
use std::{fs, path::Path, path::PathBuf};

/// Progress of one video through the pipeline. Operations check the current
/// stage before advancing, so re-invoking a completed step is a no-op rather
/// than a second tool run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStage {
    Init,
    AudioAttempted,
    FramesAttempted,
    Done,
}

/// Per-video extraction context. Output paths are resolved once at
/// construction and reused by every step.
pub struct VideoContext<'a> {
    item: &'a VideoItem,
    transcoder: &'a dyn Transcoder,
    frame_format: &'a str,
    stem: String,
    frame_dir: PathBuf,
    audio_path: PathBuf,
    stage: VideoStage,
}

/// Sampling stride for a kept-frames ratio: `round(1 / ratio)`.
///
/// A ratio above 1 cannot keep more frames than exist and is clamped with a
/// warning; zero or negative ratios are rejected outright.
pub fn compute_stride(percent_kept: f64) -> Result<u32, PipelineError> {
    if percent_kept <= 0.0 {
        return Err(PipelineError::InvalidRatio(percent_kept));
    }
    let ratio = if percent_kept > 1.0 {
        warn!("percentage of kept frames cannot exceed 1.0, clamping {percent_kept} down");
        1.0
    } else {
        percent_kept
    };
    Ok((1.0 / ratio).round() as u32)
}

impl<'a> VideoContext<'a> {
    pub fn new(item: &'a VideoItem, transcoder: &'a dyn Transcoder, frame_format: &'a str) -> Self {
        let stem = item.video_path.stem_str();
        let frame_dir = item.frame_output_root.join(&stem);
        let audio_path = frame_dir.join(format!("{stem}.wav"));
        Self {
            item,
            transcoder,
            frame_format,
            stem,
            frame_dir,
            audio_path,
            stage: VideoStage::Init,
        }
    }

    pub fn stage(&self) -> VideoStage {
        self.stage
    }

    pub fn frame_dir(&self) -> &Path {
        &self.frame_dir
    }

    pub fn audio_path(&self) -> &Path {
        &self.audio_path
    }

    /// Run the whole pipeline for this video. Only fatal errors are returned;
    /// step failures are recorded against the item and the remaining steps
    /// still run.
    pub fn run(&mut self, errors: &ErrorLog) -> Result<(), PipelineError> {
        // Reject a bad ratio and verify the transcoder before anything
        // touches the filesystem.
        let stride = compute_stride(self.item.percent_kept)?;
        if !self.transcoder.is_available() {
            return Err(PipelineError::MissingDependency {
                tool: self.transcoder.name().to_string(),
            });
        }
        self.prepare_output_dir()?;

        match self.demux_audio() {
            Ok(()) => {}
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => errors.record(&self.item.video_path, &err),
        }
        match self.sample_frames(stride) {
            Ok(()) => {}
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => errors.record(&self.item.video_path, &err),
        }

        self.stage = VideoStage::Done;
        debug!("finished video {:?}", self.item.video_path);
        Ok(())
    }

    /// Create the per-video output subdirectory; idempotent.
    fn prepare_output_dir(&self) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.frame_dir).map_err(|err| PipelineError::Write {
            path: self.frame_dir.clone(),
            reason: err.to_string(),
        })
    }

    /// Demux the audio track to `<stem>.wav`, overwriting existing output.
    pub fn demux_audio(&mut self) -> Result<(), PipelineError> {
        if self.stage != VideoStage::Init {
            return Ok(());
        }
        self.stage = VideoStage::AudioAttempted;
        let args = demux_audio_args(&self.item.video_path, &self.audio_path);
        self.invoke(&args)
    }

    /// Emit every `stride`-th frame as `<stem>_frame_<n>.<format>`.
    pub fn sample_frames(&mut self, stride: u32) -> Result<(), PipelineError> {
        if !matches!(self.stage, VideoStage::Init | VideoStage::AudioAttempted) {
            return Ok(());
        }
        self.stage = VideoStage::FramesAttempted;
        let pattern = self
            .frame_dir
            .join(format!("{}_frame_%d.{}", self.stem, self.frame_format));
        let args = sample_frames_args(&self.item.video_path, stride, &pattern);
        self.invoke(&args)
    }

    fn invoke(&self, args: &[String]) -> Result<(), PipelineError> {
        self.transcoder.invoke(args).map_err(|failure| match failure {
            // The tool disappeared after the availability check passed;
            // treat it the same as never having been installed.
            TranscodeFailure::Launch { tool, .. } => PipelineError::MissingDependency { tool },
            TranscodeFailure::NonZero { tool, code } => PipelineError::ToolInvocation {
                tool,
                code,
                path: self.item.video_path.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StubTranscoder {
        available: bool,
        fail_audio: bool,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl StubTranscoder {
        fn new() -> Self {
            Self {
                available: true,
                fail_audio: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Transcoder for StubTranscoder {
        fn is_available(&self) -> bool {
            self.available
        }

        fn invoke(&self, args: &[String]) -> Result<(), TranscodeFailure> {
            self.calls.lock().unwrap().push(args.to_vec());
            let is_audio_demux = args.iter().any(|a| a == "-vn");
            if is_audio_demux && self.fail_audio {
                return Err(TranscodeFailure::NonZero {
                    tool: "stub".into(),
                    code: 1,
                });
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn scratch() -> (tempfile::TempDir, ErrorLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::open(&dir.path().join("errors.log")).unwrap();
        (dir, log)
    }

    fn item(root: &Path, percent_kept: f64) -> VideoItem {
        VideoItem {
            video_path: PathBuf::from("/videos/clip.mp4"),
            frame_output_root: root.join("frames"),
            percent_kept,
        }
    }

    /// Stride encoded in a recorded `select=not(mod(n\,STRIDE))` filter.
    fn stride_of(filter: &str) -> u32 {
        let start = filter.find("mod(n\\,").unwrap() + "mod(n\\,".len();
        let end = filter[start..].find(')').unwrap() + start;
        filter[start..end].parse().unwrap()
    }

    #[test]
    fn stride_follows_the_kept_ratio() {
        assert_eq!(compute_stride(0.5).unwrap(), 2);
        assert_eq!(compute_stride(0.3).unwrap(), 3);
        assert_eq!(compute_stride(1.0).unwrap(), 1);
        // Over-unity ratios clamp to keeping every frame.
        assert_eq!(compute_stride(1.5).unwrap(), 1);
        assert!(matches!(
            compute_stride(0.0),
            Err(PipelineError::InvalidRatio(_))
        ));
        assert!(matches!(
            compute_stride(-0.2),
            Err(PipelineError::InvalidRatio(_))
        ));
    }

    #[test]
    fn half_ratio_keeps_even_numbered_frames() {
        let (dir, log) = scratch();
        let stub = StubTranscoder::new();
        let item = item(dir.path(), 0.5);
        let mut ctx = VideoContext::new(&item, &stub, "png");
        ctx.run(&log).unwrap();

        let calls = stub.calls();
        assert_eq!(calls.len(), 2);
        let filter = calls[1]
            .iter()
            .find(|a| a.starts_with("select="))
            .expect("frame sampling call carries a select filter");
        let stride = stride_of(filter) as usize;
        assert_eq!(stride, 2);

        // A source reporting 9 frames keeps exactly the even positions.
        let source_frames = 9usize;
        let kept: Vec<usize> = (0..source_frames).filter(|n| n % stride == 0).collect();
        assert_eq!(kept, vec![0, 2, 4, 6, 8]);
        assert_eq!(kept.len(), 5);
    }

    #[test]
    fn output_paths_are_keyed_by_video_stem() {
        let (dir, log) = scratch();
        let stub = StubTranscoder::new();
        let item = item(dir.path(), 0.5);
        let mut ctx = VideoContext::new(&item, &stub, "png");

        let expected_dir = dir.path().join("frames").join("clip");
        assert_eq!(ctx.frame_dir(), expected_dir);
        assert_eq!(ctx.audio_path(), expected_dir.join("clip.wav"));

        ctx.run(&log).unwrap();
        assert!(expected_dir.is_dir());
        assert_eq!(ctx.stage(), VideoStage::Done);

        let calls = stub.calls();
        assert_eq!(
            calls[1].last().unwrap(),
            &expected_dir.join("clip_frame_%d.png").to_string_lossy()
        );
    }

    #[test]
    fn unavailable_transcoder_is_fatal_and_writes_nothing() {
        let (dir, log) = scratch();
        let stub = StubTranscoder {
            available: false,
            ..StubTranscoder::new()
        };
        let item = item(dir.path(), 0.5);
        let mut ctx = VideoContext::new(&item, &stub, "png");

        let err = ctx.run(&log).unwrap_err();
        assert!(matches!(err, PipelineError::MissingDependency { .. }));
        assert!(stub.calls().is_empty());
        assert!(!dir.path().join("frames").exists());
    }

    #[test]
    fn non_positive_ratio_is_rejected_before_any_invocation() {
        let (dir, log) = scratch();
        let stub = StubTranscoder::new();
        let item = item(dir.path(), 0.0);
        let mut ctx = VideoContext::new(&item, &stub, "png");

        let err = ctx.run(&log).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRatio(_)));
        assert!(stub.calls().is_empty());
        assert!(!dir.path().join("frames").exists());
    }

    #[test]
    fn audio_failure_does_not_block_frame_extraction() {
        let (dir, log) = scratch();
        let stub = StubTranscoder {
            fail_audio: true,
            ..StubTranscoder::new()
        };
        let item = item(dir.path(), 0.5);
        let mut ctx = VideoContext::new(&item, &stub, "png");

        ctx.run(&log).unwrap();
        // Both steps were attempted despite the demux failure.
        assert_eq!(stub.calls().len(), 2);
        assert_eq!(ctx.stage(), VideoStage::Done);

        let logged = std::fs::read_to_string(log.path()).unwrap();
        assert!(logged.contains("[tool-invocation]"));
    }

    #[test]
    fn completed_steps_are_not_rerun() {
        let (dir, _log) = scratch();
        let stub = StubTranscoder::new();
        let item = item(dir.path(), 0.5);
        let mut ctx = VideoContext::new(&item, &stub, "png");

        ctx.prepare_output_dir().unwrap();
        ctx.demux_audio().unwrap();
        ctx.demux_audio().unwrap();
        assert_eq!(stub.calls().len(), 1);

        ctx.sample_frames(2).unwrap();
        ctx.sample_frames(2).unwrap();
        assert_eq!(stub.calls().len(), 2);
    }
}
