//! Pluggable vision collaborators.
//!
//! The face pipeline only ever talks to the two traits below; the ONNX-backed
//! implementations live in [`onnx`] and any other backend (a different model
//! family, a remote service, a test stub) can be swapped in.

pub mod onnx;

use image::RgbImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("failed to load model {path}: {reason}")]
    ModelLoad { path: String, reason: String },
    #[error("model inference failed: {0}")]
    Inference(String),
    #[error("model produced malformed output: {0}")]
    MalformedOutput(String),
}

// ────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────

/// Axis-aligned face bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl FaceBox {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Map a box detected on an upsampled copy back to the original scale.
    pub fn downscale(self, factor: u32) -> FaceBox {
        let factor = factor.max(1);
        FaceBox {
            left: self.left / factor,
            top: self.top / factor,
            right: self.right / factor,
            bottom: self.bottom / factor,
        }
    }

    /// Constrain the box to an image of the given dimensions.
    pub fn clamp_to(self, width: u32, height: u32) -> FaceBox {
        let right = self.right.min(width);
        let bottom = self.bottom.min(height);
        FaceBox {
            left: self.left.min(right),
            top: self.top.min(bottom),
            right,
            bottom,
        }
    }
}

// ────────────────────────────────────────────────────────────────
// Segmentation
// ────────────────────────────────────────────────────────────────

/// Per-pixel foreground confidence, same dimensions as the source image.
pub struct SegmentationMask {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl SegmentationMask {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn confidence(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }

    pub fn is_foreground(&self, x: u32, y: u32, threshold: f32) -> bool {
        self.confidence(x, y) > threshold
    }
}

/// Foreground/background separation backend.
pub trait Segmenter: Send + Sync {
    /// Per-pixel foreground confidence mask for `image`, with the same
    /// dimensions as `image`.
    fn segment(&self, image: &RgbImage) -> Result<SegmentationMask, VisionError>;
}

/// Face detection backend.
///
/// Implement this trait to plug in a custom detector. The order of returned
/// boxes is implementation-defined; callers must not assume any particular
/// ordering.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<FaceBox>, VisionError>;
}
