//! End-to-end pipeline tests over real temporary trees, with stub
//! collaborators standing in for ffmpeg and the vision models.

use faceharvest::common::errors::ErrorLog;
use faceharvest::transcode::{TranscodeFailure, Transcoder};
use faceharvest::vision::{FaceBox, FaceDetector, SegmentationMask, Segmenter, VisionError};
use faceharvest::workflow::partition::partition;
use faceharvest::workflow::pool::WorkerPool;
use faceharvest::workflow::processors::face::{SelectionPolicy, process_image_dir};
use faceharvest::workflow::processors::video::VideoContext;
use faceharvest::workflow::scanner::{scan_image_dirs, scan_videos};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

struct RecordingTranscoder {
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingTranscoder {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl Transcoder for RecordingTranscoder {
    fn is_available(&self) -> bool {
        true
    }

    fn invoke(&self, args: &[String]) -> Result<(), TranscodeFailure> {
        self.calls.lock().unwrap().push(args.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

struct AllForeground;

impl Segmenter for AllForeground {
    fn segment(&self, image: &RgbImage) -> Result<SegmentationMask, VisionError> {
        let (width, height) = image.dimensions();
        Ok(SegmentationMask::new(
            width,
            height,
            vec![1.0; (width * height) as usize],
        ))
    }
}

struct OneBox;

impl FaceDetector for OneBox {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<FaceBox>, VisionError> {
        // Coordinates in the upsampled grid; the pipeline halves them.
        Ok(vec![FaceBox {
            left: 8,
            top: 8,
            right: 40,
            bottom: 48,
        }])
    }
}

fn write_image(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let image = RgbImage::from_fn(48, 48, |x, y| Rgb([x as u8 * 4, y as u8 * 4, 90]));
    image.save(path).unwrap();
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::File::create(path).unwrap();
}

#[test]
fn face_phase_writes_crops_under_basename_directories() {
    let dataset = tempfile::tempdir().unwrap();
    let face_root = tempfile::tempdir().unwrap();
    // Images live under X/images; the output directory must be keyed by the
    // basename `images` only, not the relative path.
    write_image(&dataset.path().join("X/images/portrait.png"));
    write_image(&dataset.path().join("X/images/closeup.jpg"));

    let items = scan_image_dirs(dataset.path(), face_root.path()).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].face_output_dir, face_root.path().join("images"));

    let log_dir = tempfile::tempdir().unwrap();
    let errors = ErrorLog::open(&log_dir.path().join("errors.log")).unwrap();
    let pool = WorkerPool::new(2).unwrap();
    let chunks = partition(items, pool.workers());
    let segmenter = AllForeground;
    let detector = OneBox;
    let report = pool
        .run_phase(chunks, &errors, |item| {
            process_image_dir(
                item,
                &segmenter,
                &detector,
                SelectionPolicy::LastDetected,
                &errors,
            )
        })
        .unwrap();

    assert_eq!(report.failed, 0);
    let out_dir = face_root.path().join("images");
    assert!(out_dir.join("portrait_face.png").is_file());
    assert!(out_dir.join("closeup_face.png").is_file());

    // The crop is the detected box mapped back from the upsampled grid.
    let crop = image::open(out_dir.join("portrait_face.png")).unwrap();
    assert_eq!((crop.width(), crop.height()), (16, 20));
}

#[test]
fn video_phase_processes_every_scanned_video() {
    let dataset = tempfile::tempdir().unwrap();
    touch(&dataset.path().join("a.mp4"));
    touch(&dataset.path().join("b.txt"));
    touch(&dataset.path().join("sub/c.MKV"));

    let frame_root = dataset.path().join("frames");
    let items = scan_videos(dataset.path(), &frame_root, 0.5);
    assert_eq!(items.len(), 2);

    let log_dir = tempfile::tempdir().unwrap();
    let errors = ErrorLog::open(&log_dir.path().join("errors.log")).unwrap();
    let transcoder = RecordingTranscoder::new();
    let pool = WorkerPool::new(2).unwrap();
    let chunks = partition(items, pool.workers());
    let report = pool
        .run_phase(chunks, &errors, |item| {
            let mut ctx = VideoContext::new(item, &transcoder, "png");
            ctx.run(&errors)
        })
        .unwrap();

    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 0);

    // One demux and one sampling invocation per video.
    let calls = transcoder.calls.lock().unwrap();
    assert_eq!(calls.len(), 4);
    let demux_calls = calls
        .iter()
        .filter(|args| args.iter().any(|a| a == "-vn"))
        .count();
    assert_eq!(demux_calls, 2);

    // Per-video output subdirectories keyed by stem.
    assert!(frame_root.join("a").is_dir());
    assert!(frame_root.join("c").is_dir());
    let wavs: Vec<PathBuf> = calls
        .iter()
        .filter(|args| args.iter().any(|a| a == "-vn"))
        .map(|args| PathBuf::from(args.last().unwrap()))
        .collect();
    assert!(wavs.contains(&frame_root.join("a").join("a.wav")));
    assert!(wavs.contains(&frame_root.join("c").join("c.wav")));
}

#[test]
fn chunk_concatenation_reproduces_scan_order() {
    let dataset = tempfile::tempdir().unwrap();
    for i in 0..7 {
        touch(&dataset.path().join(format!("v{i}.mp4")));
    }
    let frame_root = dataset.path().join("frames");
    let items = scan_videos(dataset.path(), &frame_root, 0.5);
    let original: Vec<PathBuf> = items.iter().map(|i| i.video_path.clone()).collect();

    let chunks = partition(items, 3);
    let rejoined: Vec<PathBuf> = chunks
        .into_iter()
        .flatten()
        .map(|i| i.video_path)
        .collect();
    assert_eq!(rejoined, original);
}
