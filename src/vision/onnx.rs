//! ONNX-backed vision collaborators.
//!
//! Both backends run their model with `tract-onnx` at a fixed input
//! resolution and map the result back to the source image's pixel grid.
//! Model files are supplied by path at startup; nothing is downloaded.

use crate::vision::{FaceBox, FaceDetector, SegmentationMask, Segmenter, VisionError};
use image::{RgbImage, imageops, imageops::FilterType};
use std::path::Path;
use tract_onnx::prelude::*;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

fn load_plan(path: &Path, width: u32, height: u32) -> Result<OnnxPlan, VisionError> {
    let build = || -> TractResult<OnnxPlan> {
        tract_onnx::onnx()
            .model_for_path(path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )?
            .into_optimized()?
            .into_runnable()
    };
    build().map_err(|err| VisionError::ModelLoad {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

/// Resize to the model's input resolution and pack as a normalized NCHW
/// tensor: `(value - mean) / scale` per channel byte.
fn image_to_tensor(image: &RgbImage, width: u32, height: u32, mean: f32, scale: f32) -> Tensor {
    let resized = imageops::resize(image, width, height, FilterType::Triangle);
    let array = tract_ndarray::Array4::from_shape_fn(
        (1, 3, height as usize, width as usize),
        |(_, channel, y, x)| {
            let pixel = resized.get_pixel(x as u32, y as u32);
            (pixel.0[channel] as f32 - mean) / scale
        },
    );
    Tensor::from(array)
}

// ────────────────────────────────────────────────────────────────
// Segmentation
// ────────────────────────────────────────────────────────────────

const SEGMENT_INPUT_SIZE: u32 = 512;

/// Portrait-matting segmenter (MODNet-style models: one input `1x3xHxW`
/// normalized to [-1, 1], one output alpha matte `1x1xHxW` in [0, 1]).
pub struct OnnxSegmenter {
    plan: OnnxPlan,
}

impl OnnxSegmenter {
    pub fn load(path: &Path) -> Result<Self, VisionError> {
        let plan = load_plan(path, SEGMENT_INPUT_SIZE, SEGMENT_INPUT_SIZE)?;
        Ok(Self { plan })
    }
}

impl Segmenter for OnnxSegmenter {
    fn segment(&self, image: &RgbImage) -> Result<SegmentationMask, VisionError> {
        let (width, height) = image.dimensions();
        let input = image_to_tensor(image, SEGMENT_INPUT_SIZE, SEGMENT_INPUT_SIZE, 127.5, 127.5);
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|err| VisionError::Inference(err.to_string()))?;
        let matte = outputs[0]
            .to_array_view::<f32>()
            .map_err(|err| VisionError::MalformedOutput(err.to_string()))?;
        let expected = (SEGMENT_INPUT_SIZE * SEGMENT_INPUT_SIZE) as usize;
        if matte.len() != expected {
            return Err(VisionError::MalformedOutput(format!(
                "expected {} matte values, got {}",
                expected,
                matte.len()
            )));
        }
        let flat: Vec<f32> = matte.iter().copied().collect();

        // Nearest-neighbour upsample of the matte back to the source grid.
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            let src_y = (y as usize * SEGMENT_INPUT_SIZE as usize) / height as usize;
            for x in 0..width {
                let src_x = (x as usize * SEGMENT_INPUT_SIZE as usize) / width as usize;
                data.push(flat[src_y * SEGMENT_INPUT_SIZE as usize + src_x]);
            }
        }
        Ok(SegmentationMask::new(width, height, data))
    }
}

// ────────────────────────────────────────────────────────────────
// Face detection
// ────────────────────────────────────────────────────────────────

const DETECT_INPUT_WIDTH: u32 = 320;
const DETECT_INPUT_HEIGHT: u32 = 240;
const DETECT_SCORE_THRESHOLD: f32 = 0.7;
const DETECT_NMS_IOU: f32 = 0.3;

/// Face detector for RFB-320-style models: input `1x3x240x320` normalized
/// with mean 127 / scale 128, outputs a `1xNx2` score tensor and a `1xNx4`
/// tensor of normalized corner boxes.
pub struct OnnxFaceDetector {
    plan: OnnxPlan,
}

impl OnnxFaceDetector {
    pub fn load(path: &Path) -> Result<Self, VisionError> {
        let plan = load_plan(path, DETECT_INPUT_WIDTH, DETECT_INPUT_HEIGHT)?;
        Ok(Self { plan })
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<FaceBox>, VisionError> {
        let (width, height) = image.dimensions();
        let input = image_to_tensor(image, DETECT_INPUT_WIDTH, DETECT_INPUT_HEIGHT, 127.0, 128.0);
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|err| VisionError::Inference(err.to_string()))?;

        // Identify the two outputs by their trailing dimension.
        let mut scores = None;
        let mut boxes = None;
        for output in outputs.iter() {
            let view = output
                .to_array_view::<f32>()
                .map_err(|err| VisionError::MalformedOutput(err.to_string()))?;
            match view.shape().last() {
                Some(2) => scores = Some(view),
                Some(4) => boxes = Some(view),
                _ => {}
            }
        }
        let (scores, boxes) = match (scores, boxes) {
            (Some(s), Some(b)) => (s, b),
            _ => {
                return Err(VisionError::MalformedOutput(
                    "model did not produce score and box tensors".to_string(),
                ));
            }
        };

        let count = scores.shape()[1].min(boxes.shape()[1]);
        let mut candidates = Vec::new();
        for i in 0..count {
            let score = scores[[0, i, 1]];
            if score < DETECT_SCORE_THRESHOLD {
                continue;
            }
            let x1 = (boxes[[0, i, 0]].clamp(0.0, 1.0) * width as f32) as u32;
            let y1 = (boxes[[0, i, 1]].clamp(0.0, 1.0) * height as f32) as u32;
            let x2 = (boxes[[0, i, 2]].clamp(0.0, 1.0) * width as f32) as u32;
            let y2 = (boxes[[0, i, 3]].clamp(0.0, 1.0) * height as f32) as u32;
            if x2 > x1 && y2 > y1 {
                candidates.push((
                    score,
                    FaceBox {
                        left: x1,
                        top: y1,
                        right: x2,
                        bottom: y2,
                    },
                ));
            }
        }
        Ok(non_maximum_suppression(candidates))
    }
}

fn intersection_over_union(a: &FaceBox, b: &FaceBox) -> f32 {
    let left = a.left.max(b.left);
    let top = a.top.max(b.top);
    let right = a.right.min(b.right);
    let bottom = a.bottom.min(b.bottom);
    if right <= left || bottom <= top {
        return 0.0;
    }
    let inter = ((right - left) * (bottom - top)) as f32;
    let area_a = (a.width() * a.height()) as f32;
    let area_b = (b.width() * b.height()) as f32;
    inter / (area_a + area_b - inter)
}

fn non_maximum_suppression(mut candidates: Vec<(f32, FaceBox)>) -> Vec<FaceBox> {
    candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    let mut kept: Vec<FaceBox> = Vec::new();
    for (_, candidate) in candidates {
        if kept
            .iter()
            .all(|k| intersection_over_union(k, &candidate) <= DETECT_NMS_IOU)
        {
            kept.push(candidate);
        }
    }
    kept
}
