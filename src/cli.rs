//! Command-line surface.

use crate::common::DEFAULT_PERCENT_KEPT;
use clap::{Parser, Subcommand};
use path_clean::PathClean;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "faceharvest",
    about = "Turn a dataset of videos and images into a dataset of cropped faces",
    after_help = "NOTE: designed to work on whole datasets; pass the path to a \
                  directory, not an individual file."
)]
pub struct Cli {
    /// Path to the dataset directory
    pub dataset_dir: PathBuf,

    /// Frame output directory (defaults to <dataset>/frames)
    pub frame_output_dir: Option<PathBuf>,

    /// Base face output directory (defaults to <dataset>/faces)
    pub face_output_dir: Option<PathBuf>,

    /// Fraction of each video's frames to keep, between 0 and 1
    #[arg(long, default_value_t = DEFAULT_PERCENT_KEPT)]
    pub percent_of_frames_kept: f64,

    /// Path to the ONNX foreground segmentation model (required for face extraction)
    #[arg(long)]
    pub segmentation_model: Option<PathBuf>,

    /// Path to the ONNX face detection model (required for face extraction)
    #[arg(long)]
    pub face_model: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Phase>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Split videos into sampled frames and a demuxed audio track
    Split,
    /// Extract faces from the dataset's image directories
    Extract,
}

impl Cli {
    pub fn dataset_dir(&self) -> PathBuf {
        self.dataset_dir.clean()
    }

    pub fn frame_output_dir(&self) -> PathBuf {
        self.frame_output_dir
            .as_ref()
            .map(|p| p.clean())
            .unwrap_or_else(|| self.dataset_dir().join("frames"))
    }

    pub fn face_output_dir(&self) -> PathBuf {
        self.face_output_dir
            .as_ref()
            .map(|p| p.clean())
            .unwrap_or_else(|| self.dataset_dir().join("faces"))
    }
}
