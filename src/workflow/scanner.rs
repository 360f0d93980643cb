//! Dataset scanner.
//!
//! Walks the source tree once per phase and turns it into work items:
//! - videos: every file whose extension is in the video table
//! - image directories: every directory that directly contains at least one
//!   image file, paired with its mirrored face-output directory
//!
//! Walk order is the directory order `walkdir` yields; it is stable for an
//! unchanged tree, which keeps partitioning deterministic within one run.

use crate::common::{VALID_IMAGE_EXTENSIONS, VALID_VIDEO_EXTENSIONS};
use crate::utils::PathExt;
use anyhow::{Context, Result};
use log::warn;
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// One pending video: consumed exactly once by one worker.
#[derive(Debug, Clone)]
pub struct VideoItem {
    pub video_path: PathBuf,
    pub frame_output_root: PathBuf,
    pub percent_kept: f64,
}

/// One pending image directory with its pre-created face-output directory.
#[derive(Debug, Clone)]
pub struct ImageDirItem {
    pub source_dir: PathBuf,
    pub face_output_dir: PathBuf,
}

impl crate::workflow::pool::WorkUnit for VideoItem {
    fn source(&self) -> &Path {
        &self.video_path
    }
}

impl crate::workflow::pool::WorkUnit for ImageDirItem {
    fn source(&self) -> &Path {
        &self.source_dir
    }
}

/// Collect every video file under `dataset_dir`, recursively.
pub fn scan_videos(
    dataset_dir: &Path,
    frame_output_root: &Path,
    percent_kept: f64,
) -> Vec<VideoItem> {
    WalkDir::new(dataset_dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("skipping unreadable entry during scan: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| VALID_VIDEO_EXTENSIONS.contains(&entry.path().ext_lower().as_str()))
        .map(|entry| VideoItem {
            video_path: entry.into_path(),
            frame_output_root: frame_output_root.to_path_buf(),
            percent_kept,
        })
        .collect()
}

/// Collect every directory under `dataset_dir` that directly contains at
/// least one image file. The face-output directory is
/// `<face_output_root>/<basename(source_dir)>`, created here, before any
/// pipeline work runs, so workers never race on directory creation.
pub fn scan_image_dirs(dataset_dir: &Path, face_output_root: &Path) -> Result<Vec<ImageDirItem>> {
    let mut items = Vec::new();
    for entry in WalkDir::new(dataset_dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable entry during scan: {err}");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.path();
        if !contains_image_file(dir) {
            continue;
        }
        let basename = dir.file_name().unwrap_or_else(|| dir.as_os_str());
        let face_output_dir = face_output_root.join(basename);
        fs::create_dir_all(&face_output_dir).context(format!(
            "failed to create face output directory {:?}",
            face_output_dir
        ))?;
        items.push(ImageDirItem {
            source_dir: dir.to_path_buf(),
            face_output_dir,
        });
    }
    Ok(items)
}

/// Non-recursive qualification check: only direct children count.
fn contains_image_file(dir: &Path) -> bool {
    match fs::read_dir(dir) {
        Ok(entries) => entries.flatten().any(|child| {
            let path = child.path();
            path.is_file() && VALID_IMAGE_EXTENSIONS.contains(&path.ext_lower().as_str())
        }),
        Err(err) => {
            warn!("failed to list directory {:?}: {err}", dir);
            false
        }
    }
}
