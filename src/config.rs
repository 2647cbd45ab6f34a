//! conversion configuration
use crate::{
    filter::{AudioFilters, Downscale, FilterClause, Upscale, VideoFilters},
    hwaccel::HwAccel,
    input::Input,
};
use std::{fmt, path::PathBuf};

/// A point in time or span, rendered as an executable-compatible token.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeSpec {
    Seconds(f64),
    /// Already formatted, e.g. `00:01:30`.
    Timestamp(String),
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timestamp(ts) => ts.fmt(f),
            Self::Seconds(secs) => {
                let h = (secs / 3600.0).floor() as u64;
                let m = ((secs % 3600.0) / 60.0).floor() as u64;
                let s = secs % 60.0;
                if s.fract() == 0.0 {
                    write!(f, "{h:02}:{m:02}:{:02}", s as u64)
                } else {
                    write!(f, "{h:02}:{m:02}:{s:05.2}")
                }
            }
        }
    }
}

impl From<f64> for TimeSpec {
    fn from(secs: f64) -> Self {
        Self::Seconds(secs)
    }
}

impl From<u64> for TimeSpec {
    fn from(secs: u64) -> Self {
        Self::Seconds(secs as f64)
    }
}

impl From<&str> for TimeSpec {
    fn from(ts: &str) -> Self {
        Self::Timestamp(ts.into())
    }
}

/// Output resolution. Auto dimensions serialize as `-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeSpec {
    /// A raw size token, e.g. `1920x1080` or `hd720`.
    Named(String),
    Exact { width: u32, height: u32 },
    /// Height derived from the aspect ratio.
    AutoHeight { width: u32 },
    /// Width derived from the aspect ratio.
    AutoWidth { height: u32 },
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(s) => s.fmt(f),
            Self::Exact { width, height } => write!(f, "{width}x{height}"),
            Self::AutoHeight { width } => write!(f, "{width}x-1"),
            Self::AutoWidth { height } => write!(f, "-1x{height}"),
        }
    }
}

impl From<(u32, u32)> for SizeSpec {
    fn from((width, height): (u32, u32)) -> Self {
        Self::Exact { width, height }
    }
}

impl From<&str> for SizeSpec {
    fn from(s: &str) -> Self {
        Self::Named(s.into())
    }
}

/// Video stream configuration. The codec is an open string type since the
/// executable's codec set is not statically enumerable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoConfig {
    pub codec: Option<String>,
    /// E.g. `1M` or `2500k`.
    pub bitrate: Option<String>,
    /// Maps to `-crf` for the H.26x families, `-q:v` otherwise.
    pub quality: Option<u32>,
    pub fps: Option<f32>,
    pub size: Option<SizeSpec>,
    pub aspect_ratio: Option<String>,
    pub preset: Option<String>,
    pub profile: Option<String>,
    pub level: Option<String>,
    pub pixel_format: Option<String>,
    /// GOP size.
    pub keyframe_interval: Option<u32>,
    pub bframes: Option<u32>,
    pub refs: Option<u32>,
    /// Limit output frame count.
    pub frames: Option<u64>,
    /// Loop count, mainly for gif output.
    pub loop_count: Option<u32>,
    /// Drop the video stream entirely (`-vn`).
    pub disabled: bool,
    pub filters: Option<VideoFilters>,
    pub upscale: Option<Upscale>,
    pub downscale: Option<Downscale>,
}

/// Audio stream configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioConfig {
    pub codec: Option<String>,
    pub bitrate: Option<String>,
    pub quality: Option<u32>,
    pub channels: Option<u32>,
    pub sample_rate: Option<u32>,
    pub profile: Option<String>,
    /// Prepends `loudnorm` to the audio filter chain.
    pub volume_normalization: bool,
    /// Drop the audio stream entirely (`-an`).
    pub disabled: bool,
    pub filters: Option<AudioFilters>,
}

/// Seek/trim window. `duration` and `to` are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingConfig {
    pub seek: Option<TimeSpec>,
    pub duration: Option<TimeSpec>,
    /// Absolute end time.
    pub to: Option<TimeSpec>,
    /// Seek before the input token: faster, but not frame-accurate.
    pub fast_seek: bool,
}

/// Hardware acceleration directive.
#[derive(Debug, Clone, PartialEq)]
pub struct HwAccelConfig {
    /// Acceleration class; auto-detected when unset.
    pub class: Option<HwAccel>,
    /// Substitute the matching hardware encoder for the configured codec.
    pub prefer_hardware: bool,
    /// Degrade silently to the software codec when no mapping exists.
    /// When false, a missing mapping is a hard error.
    pub fallback_to_software: bool,
}

impl Default for HwAccelConfig {
    fn default() -> Self {
        Self {
            class: None,
            prefer_hardware: true,
            fallback_to_software: true,
        }
    }
}

impl HwAccelConfig {
    pub fn auto() -> Self {
        Self::default()
    }

    pub fn class(class: HwAccel) -> Self {
        Self {
            class: Some(class),
            ..Self::default()
        }
    }
}

impl From<HwAccel> for HwAccelConfig {
    fn from(class: HwAccel) -> Self {
        Self::class(class)
    }
}

/// Options outside the per-stream configs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvancedOptions {
    /// Raw args emitted before the input token.
    pub input_options: Vec<String>,
    /// Raw args emitted just before the output token.
    pub output_options: Vec<String>,
    /// 0 lets the executable decide.
    pub threads: Option<u32>,
    pub two_pass: bool,
    pub pass_log_file: Option<String>,
    /// `-metadata key=value` pairs, emitted in declaration order.
    pub metadata: Vec<(String, String)>,
    pub subtitles: Option<PathBuf>,
    /// Burn the subtitle file into the video instead of soft-muxing it.
    pub burn_subtitles: bool,
}

/// Conversion output sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Path(PathBuf),
    /// Capture encoded bytes from stdout instead of writing a file.
    Pipe,
}

impl Output {
    pub(crate) fn token(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Pipe => "pipe:1".to_owned(),
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::Path(PathBuf::new())
    }
}

impl From<PathBuf> for Output {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&str> for Output {
    fn from(path: &str) -> Self {
        Self::Path(path.into())
    }
}

/// Full declarative description of one conversion.
#[derive(Debug, Default)]
pub struct ConversionConfig {
    pub input: Input,
    pub output: Output,
    /// Container format (`-f`).
    pub format: Option<String>,
    pub video: Option<VideoConfig>,
    pub audio: Option<AudioConfig>,
    pub timing: Option<TimingConfig>,
    pub hwaccel: Option<HwAccelConfig>,
    /// Multi-input filter graph clauses.
    pub complex_filters: Vec<FilterClause>,
    pub options: Option<AdvancedOptions>,
}

impl ConversionConfig {
    pub fn new(input: impl Into<Input>, output: impl Into<Output>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn time_spec_formats_whole_seconds() {
        assert_eq!(TimeSpec::from(90u64).to_string(), "00:01:30");
        assert_eq!(TimeSpec::from(3661u64).to_string(), "01:01:01");
        assert_eq!(TimeSpec::from("00:02:00").to_string(), "00:02:00");
    }

    #[test]
    fn time_spec_keeps_fractions() {
        assert_eq!(TimeSpec::Seconds(2.5).to_string(), "00:00:02.50");
    }

    #[test]
    fn size_spec_auto_dimension_is_minus_one() {
        assert_eq!(SizeSpec::from((1920, 1080)).to_string(), "1920x1080");
        assert_eq!(SizeSpec::AutoHeight { width: 1280 }.to_string(), "1280x-1");
        assert_eq!(SizeSpec::AutoWidth { height: 720 }.to_string(), "-1x720");
        assert_eq!(SizeSpec::from("hd1080").to_string(), "hd1080");
    }
}
