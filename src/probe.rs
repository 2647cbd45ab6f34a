//! ffprobe json parsing & metadata records
//!
//! The probe schema is parsed defensively: apart from the block structure
//! itself, every field is genuinely optional.
use crate::error::Error;
use serde::Deserialize;
use std::{collections::BTreeMap, time::Duration};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatBlock {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub format_name: String,
    #[serde(default)]
    pub format_long_name: String,
    pub start_time: Option<String>,
    pub duration: Option<String>,
    pub size: Option<String>,
    pub bit_rate: Option<String>,
    pub probe_score: Option<i64>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamBlock {
    #[serde(default)]
    pub index: i64,
    pub codec_name: Option<String>,
    pub codec_long_name: Option<String>,
    pub codec_type: Option<String>,
    pub codec_tag_string: Option<String>,

    // video
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub coded_width: Option<i64>,
    pub coded_height: Option<i64>,
    pub display_aspect_ratio: Option<String>,
    pub pix_fmt: Option<String>,
    pub r_frame_rate: Option<String>,
    pub avg_frame_rate: Option<String>,

    // audio
    pub sample_rate: Option<String>,
    pub channels: Option<i64>,
    pub channel_layout: Option<String>,
    pub bits_per_sample: Option<i64>,

    // common
    pub duration: Option<String>,
    pub start_time: Option<String>,
    pub bit_rate: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub side_data_list: Vec<SideData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SideData {
    #[serde(default)]
    pub side_data_type: String,
    pub rotation: Option<f64>,
}

impl StreamBlock {
    pub fn is_video(&self) -> bool {
        self.codec_type.as_deref() == Some("video")
    }

    pub fn is_audio(&self) -> bool {
        self.codec_type.as_deref() == Some("audio")
    }

    pub fn is_subtitle(&self) -> bool {
        self.codec_type.as_deref() == Some("subtitle")
    }

    /// Average frame rate, falling back to the raw rate.
    pub fn frame_rate(&self) -> Option<f64> {
        self.avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| self.r_frame_rate.as_deref().and_then(parse_frame_rate))
    }

    /// Rotation in degrees; the display-matrix side data wins over the
    /// legacy `rotate` tag when both are present.
    pub fn rotation(&self) -> Option<i32> {
        let side_data = self
            .side_data_list
            .iter()
            .find(|sd| sd.side_data_type == "Display Matrix")
            .and_then(|sd| sd.rotation)
            .map(|r| r.round() as i32);
        side_data.or_else(|| self.tags.get("rotate").and_then(|r| r.parse().ok()))
    }
}

/// Full probe result: one format block plus all stream blocks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaMetadata {
    #[serde(default)]
    pub format: FormatBlock,
    #[serde(default)]
    pub streams: Vec<StreamBlock>,
}

impl MediaMetadata {
    pub fn video_streams(&self) -> impl Iterator<Item = &StreamBlock> {
        self.streams.iter().filter(|s| s.is_video())
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &StreamBlock> {
        self.streams.iter().filter(|s| s.is_audio())
    }

    /// A still image is a video-typed stream with no frame rate: the
    /// distinction is derived, never stored.
    pub fn is_still_image(&self) -> bool {
        match self.video_streams().next() {
            Some(stream) => stream.frame_rate().is_none(),
            None => false,
        }
    }
}

/// Parse one captured probe invocation's JSON output.
pub fn parse_media(json: &str) -> Result<MediaMetadata, Error> {
    serde_json::from_str(json).map_err(|err| Error::InvalidInput {
        reason: format!("unparseable ffprobe output: {err}"),
    })
}

/// Parse "x/y" rational or plain float frame rates.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((x, y)) = rate.split_once('/') {
        let x: f64 = x.parse().ok()?;
        let y: f64 = y.parse().ok()?;
        if x <= 0.0 || y <= 0.0 {
            return None;
        }
        Some(x / y)
    } else {
        rate.parse()
            .ok()
            .filter(|f: &f64| f.is_finite() && *f > 0.0)
    }
}

/// Summary view over a probe result with at least one video stream.
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub format: FormatBlock,
    pub duration: Duration,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub video_codec: String,
    pub audio_codec: Option<String>,
    /// Container bitrate in kbit/s.
    pub bitrate_kbps: f64,
    /// Container size in bytes.
    pub size: u64,
    /// Rotation in degrees, when the container declares one.
    pub rotation: Option<i32>,
}

impl VideoMetadata {
    pub fn from_media(media: &MediaMetadata) -> Result<Self, Error> {
        let Some(video) = media.video_streams().next() else {
            return Err(Error::InvalidInput {
                reason: "no video stream found".to_owned(),
            });
        };
        let audio = media.audio_streams().next();

        let duration = media
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or_default();
        let bitrate_kbps = media
            .format
            .bit_rate
            .as_deref()
            .and_then(|b| b.parse::<f64>().ok())
            .unwrap_or_default()
            / 1000.0;
        let size = media
            .format
            .size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Ok(Self {
            format: media.format.clone(),
            duration,
            width: video.width.and_then(|w| u32::try_from(w).ok()).unwrap_or(0),
            height: video.height.and_then(|h| u32::try_from(h).ok()).unwrap_or(0),
            frame_rate: video.frame_rate().unwrap_or(0.0),
            video_codec: video.codec_name.clone().unwrap_or_default(),
            audio_codec: audio.and_then(|a| a.codec_name.clone()),
            bitrate_kbps,
            size,
            rotation: video.rotation(),
        })
    }
}

/// Summary view over a probe result of a still image.
#[derive(Debug, Clone)]
pub struct ImageMetadata {
    pub format: FormatBlock,
    pub width: u32,
    pub height: u32,
    pub pixel_format: String,
    pub codec: String,
    /// File size in bytes.
    pub size: u64,
}

impl ImageMetadata {
    pub fn from_media(media: &MediaMetadata) -> Result<Self, Error> {
        let Some(stream) = media.video_streams().next() else {
            return Err(Error::InvalidInput {
                reason: "no image stream found".to_owned(),
            });
        };
        Ok(Self {
            format: media.format.clone(),
            width: stream.width.and_then(|w| u32::try_from(w).ok()).unwrap_or(0),
            height: stream.height.and_then(|h| u32::try_from(h).ok()).unwrap_or(0),
            pixel_format: stream.pix_fmt.clone().unwrap_or_else(|| "unknown".to_owned()),
            codec: stream.codec_name.clone().unwrap_or_default(),
            size: media
                .format
                .size
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "h264",
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "pix_fmt": "yuv420p",
                "r_frame_rate": "30000/1001",
                "avg_frame_rate": "30000/1001",
                "tags": { "rotate": "90" },
                "side_data_list": [
                    { "side_data_type": "Display Matrix", "rotation": -90.0 }
                ]
            },
            {
                "index": 1,
                "codec_name": "aac",
                "codec_type": "audio",
                "sample_rate": "48000",
                "channels": 2,
                "channel_layout": "stereo"
            }
        ],
        "format": {
            "filename": "a.mp4",
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "100.500000",
            "size": "12582912",
            "bit_rate": "1000000",
            "tags": { "major_brand": "isom" }
        }
    }"#;

    #[test]
    fn media_metadata_round_trip() {
        let media = parse_media(PROBE_JSON).unwrap();
        assert_eq!(media.streams.len(), 2);
        assert_eq!(media.format.filename, "a.mp4");
        assert_eq!(media.video_streams().count(), 1);
        assert_eq!(media.audio_streams().count(), 1);
        assert!(!media.is_still_image());
    }

    #[test]
    fn video_metadata_summary() {
        let media = parse_media(PROBE_JSON).unwrap();
        let video = VideoMetadata::from_media(&media).unwrap();
        assert_eq!(video.width, 1920);
        assert_eq!(video.height, 1080);
        assert_eq!(video.video_codec, "h264");
        assert_eq!(video.audio_codec.as_deref(), Some("aac"));
        assert_eq!(video.duration, Duration::from_secs_f64(100.5));
        assert_eq!(video.bitrate_kbps, 1000.0);
        assert_eq!(video.size, 12582912);
        assert!((video.frame_rate - 29.97).abs() < 0.01);
    }

    /// Side-data rotation wins over the legacy tag when both are present.
    #[test]
    fn display_matrix_rotation_wins() {
        let media = parse_media(PROBE_JSON).unwrap();
        let video = VideoMetadata::from_media(&media).unwrap();
        assert_eq!(video.rotation, Some(-90));
    }

    #[test]
    fn legacy_rotate_tag_is_the_fallback() {
        let json = r#"{
            "streams": [{
                "codec_type": "video",
                "tags": { "rotate": "180" }
            }],
            "format": {}
        }"#;
        let media = parse_media(json).unwrap();
        assert_eq!(media.streams[0].rotation(), Some(180));
    }

    #[test]
    fn video_metadata_requires_a_video_stream() {
        let media = parse_media(r#"{ "streams": [], "format": {} }"#).unwrap();
        assert!(matches!(
            VideoMetadata::from_media(&media),
            Err(Error::InvalidInput { .. })
        ));
    }

    /// A video-typed stream with no usable frame rate is a still image.
    #[test]
    fn still_image_detection() {
        let json = r#"{
            "streams": [{
                "codec_name": "png",
                "codec_type": "video",
                "width": 800,
                "height": 600,
                "pix_fmt": "rgba",
                "avg_frame_rate": "0/0"
            }],
            "format": { "size": "2048" }
        }"#;
        let media = parse_media(json).unwrap();
        assert!(media.is_still_image());

        let image = ImageMetadata::from_media(&media).unwrap();
        assert_eq!((image.width, image.height), (800, 600));
        assert_eq!(image.pixel_format, "rgba");
        assert_eq!(image.codec, "png");
        assert_eq!(image.size, 2048);
    }

    #[test]
    fn defensive_parse_tolerates_missing_fields() {
        let media = parse_media(r#"{}"#).unwrap();
        assert!(media.streams.is_empty());
        assert_eq!(media.format.filename, "");
        assert!(!media.is_still_image());

        assert!(parse_media("not json").is_err());
    }

    #[test]
    fn frame_rate_rational_and_float() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("23.976"), Some(23.976));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("nonsense"), None);
    }
}
