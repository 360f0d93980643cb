pub mod errors;

/// File extensions accepted as video sources, matched case-insensitively.
pub const VALID_VIDEO_EXTENSIONS: &'static [&'static str] = &[
    "mp4", "avi", "mkv", "flv", "mov", "wmv", "webm", "vob", "ogv", "ogg", "drc", "gif", "gifv",
    "mng", "qt", "mpg", "mpeg", "3gp", "3g2", "mxf", "roq", "nsv", "f4v", "f4p", "f4a", "f4b",
];

/// File extensions accepted as image sources, matched case-insensitively.
pub const VALID_IMAGE_EXTENSIONS: &'static [&'static str] = &[
    "jpg", "jpeg", "png", "bmp", "tif", "tiff", "gif", "webp", "bpg", "jp2", "j2k", "jpf", "jpx",
    "jpm", "mj2",
];

/// Fraction of frames retained when the user does not override it.
pub const DEFAULT_PERCENT_KEPT: f64 = 0.5;

/// Demuxed audio is always written as 16-bit PCM at 44.1 kHz.
pub const AUDIO_CODEC: &'static str = "pcm_s16le";
pub const AUDIO_SAMPLE_RATE: &'static str = "44100";

/// Segmentation confidence above which a pixel counts as foreground.
pub const FOREGROUND_THRESHOLD: f32 = 0.1;

/// Gaussian sigma for the background blur, matching a 55x55 spatial kernel.
pub const BACKGROUND_BLUR_SIGMA: f32 = 8.6;

/// Octaves of upsampling applied to the composite before face detection.
pub const DETECT_UPSAMPLE_OCTAVES: u32 = 1;
