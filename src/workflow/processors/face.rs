//! Image-to-face pipeline.
//!
//! Includes:
//! - foreground/background composite (sharp subject, blurred backdrop)
//! - face detection on the composite with one octave of upsampling
//! - box selection through an explicit, named policy
//! - crop and PNG persistence
//!
//! Each image gets one `FaceContext` whose stages are computed at most once;
//! re-invoking a stage returns the cached result instead of re-running a
//! model.

use crate::common::errors::{ErrorLog, PipelineError};
use crate::common::{
    BACKGROUND_BLUR_SIGMA, DETECT_UPSAMPLE_OCTAVES, FOREGROUND_THRESHOLD, VALID_IMAGE_EXTENSIONS,
};
use crate::utils::PathExt;
use crate::vision::{FaceBox, FaceDetector, Segmenter};
use crate::workflow::scanner::ImageDirItem;
use image::{RgbImage, imageops, imageops::FilterType};
use log::{debug, info};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Which detection to keep when the detector returns several boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Keep the last box in detector order, discarding all earlier ones.
    /// Detector order carries no meaning, so which face survives is
    /// effectively arbitrary; kept as the shipped behavior until a
    /// deliberate choice (largest box, highest confidence) is made.
    #[default]
    LastDetected,
}

/// Apply `policy` to the detector's output.
pub fn select_box(boxes: &[FaceBox], policy: SelectionPolicy) -> Option<FaceBox> {
    match policy {
        SelectionPolicy::LastDetected => {
            let mut selected = None;
            for face in boxes {
                selected = Some(*face);
            }
            selected
        }
    }
}

/// Tagged pipeline state; distinguishes "not yet computed" from "computed
/// empty" without sentinel checks.
enum FaceStage {
    Unprocessed,
    Composited {
        composite: RgbImage,
    },
    Detected {
        composite: RgbImage,
        selected: Option<FaceBox>,
    },
    Saved {
        output: Option<PathBuf>,
    },
}

pub struct FaceContext<'a> {
    image_path: PathBuf,
    output_dir: &'a Path,
    image: RgbImage,
    policy: SelectionPolicy,
    stage: FaceStage,
}

impl<'a> FaceContext<'a> {
    /// Read and decode the source image.
    pub fn new(
        image_path: impl Into<PathBuf>,
        output_dir: &'a Path,
        policy: SelectionPolicy,
    ) -> Result<Self, PipelineError> {
        let image_path = image_path.into();
        let image = image::open(&image_path)
            .map_err(|err| PipelineError::Read {
                path: image_path.clone(),
                reason: err.to_string(),
            })?
            .to_rgb8();
        Ok(Self {
            image_path,
            output_dir,
            image,
            policy,
            stage: FaceStage::Unprocessed,
        })
    }

    /// Build the composite: original pixels where the mask marks foreground,
    /// Gaussian-blurred pixels everywhere else. Idempotent.
    pub fn composite(&mut self, segmenter: &dyn Segmenter) -> Result<(), PipelineError> {
        if !matches!(self.stage, FaceStage::Unprocessed) {
            return Ok(());
        }
        let mask = segmenter
            .segment(&self.image)
            .map_err(|err| PipelineError::Segmentation {
                path: self.image_path.clone(),
                reason: err.to_string(),
            })?;

        let blurred = imageops::blur(&self.image, BACKGROUND_BLUR_SIGMA);
        let (width, height) = self.image.dimensions();
        let mut composite = RgbImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let pixel = if mask.is_foreground(x, y, FOREGROUND_THRESHOLD) {
                    *self.image.get_pixel(x, y)
                } else {
                    *blurred.get_pixel(x, y)
                };
                composite.put_pixel(x, y, pixel);
            }
        }
        self.stage = FaceStage::Composited { composite };
        Ok(())
    }

    /// Detect faces on the composite and apply the selection policy.
    /// The detector runs at most once per context.
    pub fn detect(
        &mut self,
        segmenter: &dyn Segmenter,
        detector: &dyn FaceDetector,
    ) -> Result<Option<FaceBox>, PipelineError> {
        self.composite(segmenter)?;
        match &self.stage {
            FaceStage::Detected { selected, .. } => return Ok(*selected),
            FaceStage::Saved { .. } => return Ok(None),
            _ => {}
        }
        let composite = match std::mem::replace(&mut self.stage, FaceStage::Unprocessed) {
            FaceStage::Composited { composite } => composite,
            // Guarded above.
            other => {
                self.stage = other;
                return Ok(None);
            }
        };

        // One octave of upsampling helps with small faces; boxes come back in
        // the upsampled grid and are mapped down again.
        let factor = 1u32 << DETECT_UPSAMPLE_OCTAVES;
        let (width, height) = composite.dimensions();
        let upsampled = imageops::resize(
            &composite,
            width * factor,
            height * factor,
            FilterType::Triangle,
        );
        let boxes = detector
            .detect(&upsampled)
            .map_err(|err| PipelineError::Detection {
                path: self.image_path.clone(),
                reason: err.to_string(),
            });
        let boxes = match boxes {
            Ok(boxes) => boxes,
            Err(err) => {
                self.stage = FaceStage::Composited { composite };
                return Err(err);
            }
        };
        let mapped: Vec<FaceBox> = boxes
            .into_iter()
            .map(|b| b.downscale(factor).clamp_to(width, height))
            .collect();
        let selected = select_box(&mapped, self.policy);
        self.stage = FaceStage::Detected {
            composite,
            selected,
        };
        Ok(selected)
    }

    /// Crop the selected box from the composite and persist it as
    /// `<image_stem>_face.png`. With no selected box, nothing is written and
    /// the skip is logged at item granularity.
    pub fn save(&mut self) -> Result<Option<PathBuf>, PipelineError> {
        match std::mem::replace(&mut self.stage, FaceStage::Unprocessed) {
            FaceStage::Saved { output } => {
                self.stage = FaceStage::Saved {
                    output: output.clone(),
                };
                Ok(output)
            }
            FaceStage::Detected {
                composite,
                selected: Some(face),
            } => {
                let output_path = self
                    .output_dir
                    .join(format!("{}_face.png", self.image_path.stem_str()));
                let crop = imageops::crop_imm(
                    &composite,
                    face.left,
                    face.top,
                    face.width(),
                    face.height(),
                )
                .to_image();
                match crop.save(&output_path) {
                    Ok(()) => {
                        self.stage = FaceStage::Saved {
                            output: Some(output_path.clone()),
                        };
                        Ok(Some(output_path))
                    }
                    Err(err) => {
                        self.stage = FaceStage::Detected {
                            composite,
                            selected: Some(face),
                        };
                        Err(PipelineError::Write {
                            path: output_path,
                            reason: err.to_string(),
                        })
                    }
                }
            }
            FaceStage::Detected {
                selected: None, ..
            } => {
                info!("no face detected in {:?}, skipping", self.image_path);
                self.stage = FaceStage::Saved { output: None };
                Ok(None)
            }
            other => {
                // Detection has not run yet; leave the stage untouched.
                self.stage = other;
                Ok(None)
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────
// Directory-level driver
// ────────────────────────────────────────────────────────────────

/// Run the face pipeline over every image directly inside `item.source_dir`.
/// Per-image failures are recorded and the remaining images still run.
pub fn process_image_dir(
    item: &ImageDirItem,
    segmenter: &dyn Segmenter,
    detector: &dyn FaceDetector,
    policy: SelectionPolicy,
    errors: &ErrorLog,
) -> Result<(), PipelineError> {
    let entries = fs::read_dir(&item.source_dir).map_err(|err| PipelineError::Read {
        path: item.source_dir.clone(),
        reason: err.to_string(),
    })?;
    let mut images: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && VALID_IMAGE_EXTENSIONS.contains(&path.ext_lower().as_str()))
        .collect();
    images.sort();

    for image_path in images {
        if let Err(err) = process_image(&image_path, item, segmenter, detector, policy) {
            if err.is_fatal() {
                return Err(err);
            }
            errors.record(&image_path, &err);
        }
    }
    Ok(())
}

fn process_image(
    image_path: &Path,
    item: &ImageDirItem,
    segmenter: &dyn Segmenter,
    detector: &dyn FaceDetector,
    policy: SelectionPolicy,
) -> Result<(), PipelineError> {
    let mut ctx = FaceContext::new(image_path, &item.face_output_dir, policy)?;
    ctx.composite(segmenter)?;
    ctx.detect(segmenter, detector)?;
    if let Some(output) = ctx.save()? {
        debug!("wrote face crop {:?}", output);
    }
    Ok(())
}
