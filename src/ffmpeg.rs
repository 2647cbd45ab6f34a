//! public facade over the converter and probe executables
use crate::{
    batch::{self, BatchEvent, BatchReport},
    capabilities::{self, Codecs, Formats, Version},
    command,
    config::{ConversionConfig, Output},
    engine::{self, Conversion, ExecPlan},
    error::{CodecKind, CodecOp, Error, FormatOp},
    hwaccel::{self, HwAccel},
    input,
    probe::{self, ImageMetadata, MediaMetadata, VideoMetadata},
    process::{CommandExt, display_command},
};
use log::debug;
use std::{
    env,
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::process::Command;

/// Detected acceleration classes plus what they can reach.
#[derive(Debug, Clone)]
pub struct HwAccelInfo {
    pub available: Vec<HwAccel>,
    /// Highest-priority detected class.
    pub best: Option<HwAccel>,
    /// Hardware encoders reachable per detected class.
    pub encoders: Vec<(HwAccel, Vec<&'static str>)>,
}

/// Entry point: locates the two executables and exposes conversions,
/// probes and capability queries.
///
/// Paths resolve in order: explicit [`Ffmpeg::with_paths`], the
/// `FFMPEG_PATH` / `FFPROBE_PATH` environment variables, then the bare
/// names via the ambient search path. No global mutable state: each value
/// carries its own paths.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new()
    }
}

impl Ffmpeg {
    pub fn new() -> Self {
        Self {
            ffmpeg: env::var_os("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| "ffmpeg".into()),
            ffprobe: env::var_os("FFPROBE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| "ffprobe".into()),
        }
    }

    pub fn with_paths(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe
    }

    /// Check that both executables answer a `-version` invocation.
    pub async fn ensure_available(&self) -> Result<(), Error> {
        version_check(&self.ffmpeg, "ffmpeg").await?;
        version_check(&self.ffprobe, "ffprobe").await?;
        Ok(())
    }

    pub async fn version(&self) -> Result<Version, Error> {
        let out = version_check(&self.ffmpeg, "ffmpeg").await?;
        Ok(capabilities::parse_version(&out))
    }

    pub async fn formats(&self) -> Result<Formats, Error> {
        let out = self.converter_capture(&["-hide_banner", "-formats"]).await?;
        Ok(capabilities::parse_formats(&out))
    }

    pub async fn encoders(&self) -> Result<Codecs, Error> {
        let out = self.converter_capture(&["-hide_banner", "-encoders"]).await?;
        Ok(capabilities::parse_coders(&out))
    }

    pub async fn decoders(&self) -> Result<Codecs, Error> {
        let out = self.converter_capture(&["-hide_banner", "-decoders"]).await?;
        Ok(capabilities::parse_coders(&out))
    }

    /// Probe the executable's acceleration capability list. Idempotent and
    /// side-effect-free; callers may invoke it as often as they like.
    pub async fn hwaccels(&self) -> Result<Vec<HwAccel>, Error> {
        let out = self.converter_capture(&["-hide_banner", "-hwaccels"]).await?;
        Ok(hwaccel::parse_hwaccels(&out))
    }

    pub async fn hwaccel_info(&self) -> Result<HwAccelInfo, Error> {
        let available = self.hwaccels().await?;
        let best = hwaccel::preferred(&available).cloned();
        let encoders = available
            .iter()
            .map(|class| (class.clone(), hwaccel::class_encoders(class)))
            .collect();
        Ok(HwAccelInfo {
            available,
            best,
            encoders,
        })
    }

    /// Non-throwing capability check: is `codec` in the encoder list?
    pub async fn can_encode(&self, codec: &str, kind: CodecKind) -> Result<bool, Error> {
        Ok(kind_list(&self.encoders().await?, kind).iter().any(|c| c == codec))
    }

    pub async fn can_decode(&self, codec: &str, kind: CodecKind) -> Result<bool, Error> {
        Ok(kind_list(&self.decoders().await?, kind).iter().any(|c| c == codec))
    }

    pub async fn require_encoder(&self, codec: &str, kind: CodecKind) -> Result<(), Error> {
        match self.can_encode(codec, kind).await? {
            true => Ok(()),
            false => Err(Error::CodecUnsupported {
                codec: codec.to_owned(),
                kind,
                op: CodecOp::Encode,
            }),
        }
    }

    pub async fn require_decoder(&self, codec: &str, kind: CodecKind) -> Result<(), Error> {
        match self.can_decode(codec, kind).await? {
            true => Ok(()),
            false => Err(Error::CodecUnsupported {
                codec: codec.to_owned(),
                kind,
                op: CodecOp::Decode,
            }),
        }
    }

    pub async fn can_mux(&self, format: &str) -> Result<bool, Error> {
        Ok(self.formats().await?.can_mux(format))
    }

    pub async fn can_demux(&self, format: &str) -> Result<bool, Error> {
        Ok(self.formats().await?.can_demux(format))
    }

    pub async fn require_muxer(&self, format: &str) -> Result<(), Error> {
        match self.can_mux(format).await? {
            true => Ok(()),
            false => Err(Error::FormatUnsupported {
                format: format.to_owned(),
                op: FormatOp::Mux,
            }),
        }
    }

    pub async fn require_demuxer(&self, format: &str) -> Result<(), Error> {
        match self.can_demux(format).await? {
            true => Ok(()),
            false => Err(Error::FormatUnsupported {
                format: format.to_owned(),
                op: FormatOp::Demux,
            }),
        }
    }

    /// Probe a file into the full format/stream metadata record.
    pub async fn metadata(&self, input: &Path) -> Result<MediaMetadata, Error> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.arg2("-v", "quiet")
            .arg2("-print_format", "json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(input)
            .stdin(Stdio::null());
        let out = cmd.output().await.map_err(|_| Error::ToolNotFound {
            tool: "ffprobe",
            path: self.ffprobe.clone(),
        })?;
        if !out.status.success() {
            return Err(Error::InvalidInput {
                reason: format!(
                    "ffprobe exit code {:?} for {}",
                    out.status.code(),
                    input.display()
                ),
            });
        }
        probe::parse_media(&String::from_utf8_lossy(&out.stdout))
    }

    pub async fn video_metadata(&self, input: &Path) -> Result<VideoMetadata, Error> {
        VideoMetadata::from_media(&self.metadata(input).await?)
    }

    pub async fn image_metadata(&self, input: &Path) -> Result<ImageMetadata, Error> {
        ImageMetadata::from_media(&self.metadata(input).await?)
    }

    /// Pre-flight validation as an error, with every violation listed.
    pub fn validate(&self, config: &ConversionConfig) -> Result<(), Error> {
        let errors = command::validate(config);
        match errors.is_empty() {
            true => Ok(()),
            false => Err(Error::InvalidConfiguration { errors }),
        }
    }

    /// Start a conversion, returning its event stream.
    ///
    /// Validates, materializes the input source, resolves hardware
    /// acceleration if requested, renders the argument vector and spawns.
    pub async fn convert(&self, mut config: ConversionConfig) -> Result<Conversion, Error> {
        self.validate(&config)?;

        // hardware detection only matters for automatic class selection
        let detected = match wants_hw_detection(&config) {
            true => self.hwaccels().await.unwrap_or_default(),
            false => Vec::new(),
        };

        let prepared = input::prepare(std::mem::take(&mut config.input)).await?;
        let input_token = prepared.path.display().to_string();
        let output_token = config.output.token();
        let capture = config.output == Output::Pipe;

        let args =
            match command::generate_with_io(&config, &input_token, &output_token, &detected) {
                Ok(args) => args,
                Err(err) => {
                    input::cleanup(&prepared.temp_path()).await;
                    return Err(err);
                }
            };

        let command = display_command(&self.ffmpeg, &args);
        debug!("convert: {command}");
        Ok(engine::spawn(ExecPlan {
            program: self.ffmpeg.clone(),
            args,
            command,
            temp_input: prepared.temp_path(),
            capture,
        }))
    }

    /// [`convert`](Self::convert) with the output forced to captured
    /// stdout; the terminal event carries the encoded bytes.
    pub async fn convert_captured(&self, mut config: ConversionConfig) -> Result<Conversion, Error> {
        config.output = Output::Pipe;
        self.convert(config).await
    }

    /// Run a capture-mode conversion to completion and return the bytes.
    pub async fn convert_to_vec(&self, config: ConversionConfig) -> Result<Vec<u8>, Error> {
        Ok(self
            .convert_captured(config)
            .await?
            .wait()
            .await?
            .into_captured())
    }

    /// Run a conversion to completion, discarding progress events.
    pub async fn run(&self, config: ConversionConfig) -> Result<(), Error> {
        self.convert(config).await?.wait().await?;
        Ok(())
    }

    /// Run configs one at a time; per-item failures don't abort the queue.
    pub async fn run_batch(
        &self,
        configs: Vec<ConversionConfig>,
        on_event: impl FnMut(usize, BatchEvent<'_>),
    ) -> BatchReport {
        batch::run_sequential(self, configs, on_event).await
    }

    /// Run configs with at most `max_concurrent` engines in flight.
    pub async fn run_batch_parallel(
        &self,
        configs: Vec<ConversionConfig>,
        max_concurrent: usize,
        on_event: impl FnMut(usize, BatchEvent<'_>),
    ) -> BatchReport {
        batch::run_parallel(self, configs, max_concurrent, on_event).await
    }

    async fn converter_capture(&self, args: &[&str]) -> Result<String, Error> {
        let out = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|_| Error::ToolNotFound {
                tool: "ffmpeg",
                path: self.ffmpeg.clone(),
            })?;
        if !out.status.success() {
            return Err(Error::ExecutionFailed {
                command: display_command(&self.ffmpeg, args.iter().copied()),
                detail: format!("exit code {:?}", out.status.code()),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

fn kind_list(codecs: &Codecs, kind: CodecKind) -> &[String] {
    match kind {
        CodecKind::Video => &codecs.video,
        CodecKind::Audio => &codecs.audio,
        CodecKind::Subtitle => &codecs.subtitle,
    }
}

fn wants_hw_detection(config: &ConversionConfig) -> bool {
    config
        .hwaccel
        .as_ref()
        .is_some_and(|hw| hw.prefer_hardware && hw.class.is_none())
        && config
            .video
            .as_ref()
            .is_some_and(|v| v.codec.is_some() && !v.disabled)
}

async fn version_check(program: &Path, tool: &'static str) -> Result<String, Error> {
    let not_found = || Error::ToolNotFound {
        tool,
        path: program.to_owned(),
    };
    let out = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|_| not_found())?;
    if !out.status.success() {
        return Err(not_found());
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}
