//! Video encoding and canvas configuration.

use serde::{Deserialize, Serialize};

/// Default hardware video codec.
pub const DEFAULT_HW_CODEC: &str = "h264_videotoolbox";
/// Default software video codec.
pub const DEFAULT_SW_CODEC: &str = "libx264";
/// Default video bitrate for hardware encodes.
pub const DEFAULT_BITRATE: &str = "9000k";
/// Default CRF for software encodes.
pub const DEFAULT_CRF: u8 = 22;
/// Default software encoding preset.
pub const DEFAULT_PRESET: &str = "veryfast";
/// Default audio bitrate.
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";
/// Default audio sample rate.
pub const DEFAULT_AUDIO_SAMPLE_RATE: u32 = 48000;

/// Whether to encode with the hardware or software codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EncodeMode {
    Hardware,
    #[default]
    Software,
}

impl EncodeMode {
    /// Short tag used in cache keys.
    pub fn tag(&self) -> &'static str {
        match self {
            EncodeMode::Hardware => "hw",
            EncodeMode::Software => "sw",
        }
    }
}

/// Normalization target: canvas geometry plus output frame rate.
///
/// Every segment and the trailer are conformed to this before concatenation,
/// so the concat demuxer can stream-copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl CanvasSpec {
    /// Build a spec, forcing both dimensions even (codec requirement).
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width: even(width),
            height: even(height),
            fps,
        }
    }
}

impl std::fmt::Display for CanvasSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}@{}", self.width, self.height, self.fps)
    }
}

/// Force an even dimension for video encoding.
pub fn even(x: u32) -> u32 {
    x - (x % 2)
}

/// Video/audio encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Hardware video codec (e.g. "h264_videotoolbox", "h264_nvenc").
    pub hw_codec: String,
    /// Software video codec.
    pub sw_codec: String,
    /// Target bitrate for hardware encodes.
    pub bitrate: String,
    /// Max rate for hardware encodes.
    pub max_rate: String,
    /// Buffer size for hardware encodes.
    pub buffer_size: String,
    /// CRF for software encodes.
    pub crf: u8,
    /// Software encoding preset.
    pub preset: String,
    /// H.264 profile.
    pub profile: String,
    /// H.264 level for hardware encodes.
    pub hw_level: String,
    /// H.264 level for software encodes.
    pub sw_level: String,
    /// Pixel format for software encodes.
    pub pixel_format: String,
    /// Audio codec.
    pub audio_codec: String,
    /// Audio bitrate.
    pub audio_bitrate: String,
    /// Audio sample rate.
    pub audio_sample_rate: u32,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            hw_codec: DEFAULT_HW_CODEC.to_string(),
            sw_codec: DEFAULT_SW_CODEC.to_string(),
            bitrate: DEFAULT_BITRATE.to_string(),
            max_rate: DEFAULT_BITRATE.to_string(),
            buffer_size: "14000k".to_string(),
            crf: DEFAULT_CRF,
            preset: DEFAULT_PRESET.to_string(),
            profile: "high".to_string(),
            hw_level: "4.2".to_string(),
            sw_level: "4.1".to_string(),
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            audio_sample_rate: DEFAULT_AUDIO_SAMPLE_RATE,
        }
    }
}

impl EncodingConfig {
    /// Video codec arguments for the given encode mode.
    pub fn to_video_args(&self, mode: EncodeMode) -> Vec<String> {
        match mode {
            EncodeMode::Hardware => vec![
                "-c:v".to_string(),
                self.hw_codec.clone(),
                "-profile:v".to_string(),
                self.profile.clone(),
                "-level".to_string(),
                self.hw_level.clone(),
                "-tag:v".to_string(),
                "avc1".to_string(),
                "-b:v".to_string(),
                self.bitrate.clone(),
                "-maxrate".to_string(),
                self.max_rate.clone(),
                "-bufsize".to_string(),
                self.buffer_size.clone(),
            ],
            EncodeMode::Software => vec![
                "-c:v".to_string(),
                self.sw_codec.clone(),
                "-profile:v".to_string(),
                self.profile.clone(),
                "-level".to_string(),
                self.sw_level.clone(),
                "-preset".to_string(),
                self.preset.clone(),
                "-crf".to_string(),
                self.crf.to_string(),
                "-pix_fmt".to_string(),
                self.pixel_format.clone(),
            ],
        }
    }

    /// Audio codec arguments (identical for both modes).
    pub fn to_audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
            "-ar".to_string(),
            self.audio_sample_rate.to_string(),
        ]
    }
}
