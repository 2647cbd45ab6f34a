//! configuration → argument-vector compiler
//!
//! Emission order is fixed and codec-significant; reordering changes how
//! the executable parses the vector. See `generate` for the exact order.
use crate::{
    config::{AdvancedOptions, AudioConfig, ConversionConfig, VideoConfig},
    error::Error,
    filter,
    hwaccel::{self, HwAccel},
    process::display_command,
};
use std::path::Path;

/// Pre-flight validation. All violations are collected, not short-circuited,
/// so every problem surfaces in one pass. An empty list means valid.
pub fn validate(config: &ConversionConfig) -> Vec<String> {
    let mut errors = Vec::new();
    if config.input.token().is_empty() {
        errors.push("input is required".to_owned());
    }
    if config.output.token().is_empty() {
        errors.push("output is required".to_owned());
    }
    if let Some(video) = &config.video {
        if video.upscale.is_some() && video.downscale.is_some() {
            errors.push("cannot use both upscale and downscale".to_owned());
        }
        if video.upscale.is_some() && video.size.is_some() {
            errors.push("cannot use both upscale and an explicit size".to_owned());
        }
    }
    if let Some(timing) = &config.timing {
        if timing.duration.is_some() && timing.to.is_some() {
            errors.push("cannot use both duration and an end time".to_owned());
        }
    }
    errors
}

/// Render the full argument vector.
///
/// `detected` is the executable's reported acceleration class list, used
/// only when the config asks for automatic hardware selection; pass an
/// empty slice otherwise.
///
/// Emission order: diagnostic suppression, hardware context flag, threads,
/// raw input options, fast-seek, input, accurate-seek + duration/end,
/// video args, audio args, container format, complex filter graph,
/// advanced options, raw output options, overwrite flag, output.
pub fn generate(config: &ConversionConfig, detected: &[HwAccel]) -> Result<Vec<String>, Error> {
    generate_with_io(
        config,
        &config.input.token(),
        &config.output.token(),
        detected,
    )
}

/// Display form of the generated command, for logging and start events.
pub fn generate_string(
    config: &ConversionConfig,
    detected: &[HwAccel],
    program: &Path,
) -> Result<String, Error> {
    let args = generate(config, detected)?;
    Ok(display_command(program, args.iter().map(String::as_str)))
}

/// `generate` with the input/output tokens swapped out, so the engine can
/// point the vector at a materialized temp file.
pub(crate) fn generate_with_io(
    config: &ConversionConfig,
    input_token: &str,
    output_token: &str,
    detected: &[HwAccel],
) -> Result<Vec<String>, Error> {
    let mut args = vec!["-hide_banner".to_owned()];

    // Hardware acceleration: an explicit class always gets its context flag
    // here, right after the banner suppression. Auto-resolution may inject
    // the flag at the same fixed position below.
    let mut hw_codec = None;
    if let Some(hw) = &config.hwaccel {
        if let Some(class) = &hw.class {
            args.push("-hwaccel".to_owned());
            args.push(class.context_flag().to_owned());
        }
        let desired = config
            .video
            .as_ref()
            .filter(|v| !v.disabled)
            .and_then(|v| v.codec.as_deref());
        if let (true, Some(desired)) = (hw.prefer_hardware, desired) {
            let resolved = hwaccel::resolve(desired, hw.class.as_ref(), detected);
            if resolved.is_hardware {
                if hw.class.is_none() {
                    if let Some(flag) = &resolved.context_flag {
                        args.insert(1, "-hwaccel".to_owned());
                        args.insert(2, flag.clone());
                    }
                }
                hw_codec = Some(resolved.codec);
            } else if !hw.fallback_to_software {
                let accel = hw
                    .class
                    .as_ref()
                    .or_else(|| hwaccel::preferred(detected))
                    .map(|class| class.to_string())
                    .unwrap_or_else(|| "auto".to_owned());
                return Err(Error::HardwareAccelerationUnavailable {
                    codec: desired.to_owned(),
                    accel,
                });
            }
        }
    }

    if let Some(options) = &config.options {
        if let Some(threads) = options.threads {
            args.push("-threads".to_owned());
            args.push(threads.to_string());
        }
        args.extend(options.input_options.iter().cloned());
    }

    // pre-input seek: fast but keyframe-coarse
    if let Some(timing) = &config.timing {
        if timing.fast_seek {
            if let Some(seek) = &timing.seek {
                args.push("-ss".to_owned());
                args.push(seek.to_string());
            }
        }
    }

    args.push("-i".to_owned());
    args.push(input_token.to_owned());

    // post-input seek: exact, decodes from the start
    if let Some(timing) = &config.timing {
        if !timing.fast_seek {
            if let Some(seek) = &timing.seek {
                args.push("-ss".to_owned());
                args.push(seek.to_string());
            }
        }
        if let Some(duration) = &timing.duration {
            args.push("-t".to_owned());
            args.push(duration.to_string());
        } else if let Some(to) = &timing.to {
            args.push("-to".to_owned());
            args.push(to.to_string());
        }
    }

    if let Some(video) = &config.video {
        video_args(&mut args, video, hw_codec.as_deref());
    }
    if let Some(audio) = &config.audio {
        audio_args(&mut args, audio);
    }

    if let Some(format) = &config.format {
        args.push("-f".to_owned());
        args.push(format.clone());
    }

    if !config.complex_filters.is_empty() {
        args.push("-filter_complex".to_owned());
        args.push(filter::complex_graph(&config.complex_filters));
    }

    if let Some(options) = &config.options {
        advanced_args(&mut args, options);
        args.extend(options.output_options.iter().cloned());
    }

    args.push("-y".to_owned());
    args.push(output_token.to_owned());
    Ok(args)
}

fn video_args(args: &mut Vec<String>, video: &VideoConfig, hw_codec: Option<&str>) {
    if video.disabled {
        args.push("-vn".to_owned());
        return;
    }

    let codec = hw_codec.or(video.codec.as_deref());
    if let Some(codec) = codec {
        args.push("-c:v".to_owned());
        args.push(codec.to_owned());
    }
    if let Some(bitrate) = &video.bitrate {
        args.push("-b:v".to_owned());
        args.push(bitrate.clone());
    }
    if let Some(quality) = video.quality {
        args.push(quality_flag(codec).to_owned());
        args.push(quality.to_string());
    }
    if let Some(fps) = video.fps {
        args.push("-r".to_owned());
        args.push(fps.to_string());
    }
    if let Some(size) = &video.size {
        args.push("-s".to_owned());
        args.push(size.to_string());
    }
    if let Some(aspect) = &video.aspect_ratio {
        args.push("-aspect".to_owned());
        args.push(aspect.clone());
    }
    if let Some(preset) = &video.preset {
        args.push("-preset".to_owned());
        args.push(preset.clone());
    }
    if let Some(profile) = &video.profile {
        args.push("-profile:v".to_owned());
        args.push(profile.clone());
    }
    if let Some(level) = &video.level {
        args.push("-level".to_owned());
        args.push(level.clone());
    }
    if let Some(pix_fmt) = &video.pixel_format {
        args.push("-pix_fmt".to_owned());
        args.push(pix_fmt.clone());
    }
    if let Some(keyint) = video.keyframe_interval {
        args.push("-g".to_owned());
        args.push(keyint.to_string());
    }
    if let Some(bframes) = video.bframes {
        args.push("-bf".to_owned());
        args.push(bframes.to_string());
    }
    if let Some(refs) = video.refs {
        args.push("-refs".to_owned());
        args.push(refs.to_string());
    }
    if let Some(frames) = video.frames {
        args.push("-frames:v".to_owned());
        args.push(frames.to_string());
    }
    if let Some(loop_count) = video.loop_count {
        args.push("-loop".to_owned());
        args.push(loop_count.to_string());
    }

    // upscale/downscale sub-chains precede the standard filter chain
    let mut chain = Vec::new();
    if let Some(up) = &video.upscale {
        chain.extend(filter::upscale_chain(up));
    }
    if let Some(down) = &video.downscale {
        chain.extend(filter::downscale_chain(down));
    }
    if let Some(filters) = &video.filters {
        chain.extend(filter::video_chain(filters));
    }
    if !chain.is_empty() {
        args.push("-vf".to_owned());
        args.push(chain.join(","));
    }
}

/// Quality flag dispatch: the H.26x families take a constant-rate-factor
/// flag, everything else the generic per-stream quality flag. This is a
/// plain substring match on the codec string, false positives included.
fn quality_flag(codec: Option<&str>) -> &'static str {
    match codec {
        Some(codec) if codec.contains("264") || codec.contains("265") => "-crf",
        _ => "-q:v",
    }
}

fn audio_args(args: &mut Vec<String>, audio: &AudioConfig) {
    if audio.disabled {
        args.push("-an".to_owned());
        return;
    }

    if let Some(codec) = &audio.codec {
        args.push("-c:a".to_owned());
        args.push(codec.clone());
    }
    if let Some(bitrate) = &audio.bitrate {
        args.push("-b:a".to_owned());
        args.push(bitrate.clone());
    }
    if let Some(quality) = audio.quality {
        args.push("-q:a".to_owned());
        args.push(quality.to_string());
    }
    if let Some(channels) = audio.channels {
        args.push("-ac".to_owned());
        args.push(channels.to_string());
    }
    if let Some(rate) = audio.sample_rate {
        args.push("-ar".to_owned());
        args.push(rate.to_string());
    }
    if let Some(profile) = &audio.profile {
        args.push("-profile:a".to_owned());
        args.push(profile.clone());
    }

    // loudness normalization and the filter chain share one -af flag
    let mut chain = Vec::new();
    if audio.volume_normalization {
        chain.push("loudnorm".to_owned());
    }
    if let Some(filters) = &audio.filters {
        chain.extend(filter::audio_chain(filters));
    }
    if !chain.is_empty() {
        args.push("-af".to_owned());
        args.push(chain.join(","));
    }
}

fn advanced_args(args: &mut Vec<String>, options: &AdvancedOptions) {
    if options.two_pass {
        let log_file = options.pass_log_file.as_deref().unwrap_or("ffmpeg2pass");
        args.push("-pass".to_owned());
        args.push("1".to_owned());
        args.push("-passlogfile".to_owned());
        args.push(log_file.to_owned());
    }
    for (key, value) in &options.metadata {
        args.push("-metadata".to_owned());
        args.push(format!("{key}={value}"));
    }
    if let Some(subtitles) = &options.subtitles {
        if options.burn_subtitles {
            args.push("-vf".to_owned());
            args.push(format!("subtitles={}", subtitles.display()));
        } else {
            args.push("-i".to_owned());
            args.push(subtitles.display().to_string());
            args.push("-c:s".to_owned());
            args.push("mov_text".to_owned());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::{
            AudioConfig, HwAccelConfig, Output, SizeSpec, TimeSpec, TimingConfig, VideoConfig,
        },
        filter::{Downscale, Upscale},
    };

    fn base_config() -> ConversionConfig {
        ConversionConfig::new("a.mp4", Output::from("b.mp4"))
    }

    fn upscale() -> Upscale {
        Upscale {
            algorithm: "lanczos".into(),
            width: 3840,
            height: 2160,
            denoise_before_scale: false,
            enhance_sharpness: false,
            sharpness_amount: None,
        }
    }

    fn position(args: &[String], token: &str) -> usize {
        args.iter()
            .position(|a| a == token)
            .unwrap_or_else(|| panic!("`{token}` not in {args:?}"))
    }

    #[test]
    fn validate_ok_for_minimal_config() {
        assert!(validate(&base_config()).is_empty());
    }

    #[test]
    fn validate_collects_all_violations() {
        let config = ConversionConfig {
            video: Some(VideoConfig {
                upscale: Some(upscale()),
                downscale: Some(Downscale {
                    algorithm: "bilinear".into(),
                    width: 640,
                    height: 360,
                    deinterlace: false,
                    preserve_details: false,
                }),
                size: Some(SizeSpec::from((1280, 720))),
                ..<_>::default()
            }),
            timing: Some(TimingConfig {
                duration: Some(10u64.into()),
                to: Some(20u64.into()),
                ..<_>::default()
            }),
            ..<_>::default()
        };
        let errors = validate(&config);
        assert_eq!(
            errors,
            [
                "input is required",
                "output is required",
                "cannot use both upscale and downscale",
                "cannot use both upscale and an explicit size",
                "cannot use both duration and an end time",
            ]
        );
    }

    #[test]
    fn end_to_end_order() {
        let mut config = base_config();
        config.video = Some(VideoConfig {
            codec: Some("libx264".into()),
            bitrate: Some("1M".into()),
            ..<_>::default()
        });
        config.audio = Some(AudioConfig {
            codec: Some("aac".into()),
            bitrate: Some("128k".into()),
            ..<_>::default()
        });
        let args = generate(&config, &[]).unwrap();

        assert_eq!(args[0], "-hide_banner");
        let input = position(&args, "a.mp4");
        assert_eq!(args[input - 1], "-i");
        let cv = position(&args, "-c:v");
        let bv = position(&args, "-b:v");
        let ca = position(&args, "-c:a");
        let ba = position(&args, "-b:a");
        assert!(input < cv && cv < bv && bv < ca && ca < ba);
        assert_eq!(args[cv + 1], "libx264");
        assert_eq!(args[bv + 1], "1M");
        assert_eq!(args[ca + 1], "aac");
        assert_eq!(args[ba + 1], "128k");
        assert_eq!(&args[args.len() - 2..], ["-y", "b.mp4"]);
    }

    #[test]
    fn generate_is_idempotent() {
        let mut config = base_config();
        config.video = Some(VideoConfig {
            codec: Some("libx265".into()),
            quality: Some(28),
            ..<_>::default()
        });
        config.options = Some(AdvancedOptions {
            metadata: vec![
                ("title".into(), "demo".into()),
                ("artist".into(), "nobody".into()),
            ],
            ..<_>::default()
        });
        assert_eq!(
            generate(&config, &[]).unwrap(),
            generate(&config, &[]).unwrap()
        );
    }

    #[test]
    fn fast_seek_precedes_input_token() {
        let mut config = base_config();
        config.timing = Some(TimingConfig {
            seek: Some(TimeSpec::from(90u64)),
            fast_seek: true,
            ..<_>::default()
        });
        let args = generate(&config, &[]).unwrap();
        assert!(position(&args, "-ss") < position(&args, "-i"));
        assert_eq!(args[position(&args, "-ss") + 1], "00:01:30");
    }

    #[test]
    fn accurate_seek_follows_input_token() {
        let mut config = base_config();
        config.timing = Some(TimingConfig {
            seek: Some(TimeSpec::from(90u64)),
            duration: Some(TimeSpec::from(10u64)),
            fast_seek: false,
            ..<_>::default()
        });
        let args = generate(&config, &[]).unwrap();
        let input = position(&args, "-i");
        let seek = position(&args, "-ss");
        let duration = position(&args, "-t");
        assert!(input < seek && seek < duration);
    }

    #[test]
    fn quality_maps_to_crf_for_h26x_substrings() {
        for codec in ["libx264", "libx265", "h264_nvenc", "my265encoder"] {
            let mut config = base_config();
            config.video = Some(VideoConfig {
                codec: Some(codec.into()),
                quality: Some(23),
                ..<_>::default()
            });
            let args = generate(&config, &[]).unwrap();
            let crf = position(&args, "-crf");
            assert_eq!(args[crf + 1], "23", "{codec}");
        }
    }

    #[test]
    fn quality_maps_to_qscale_for_other_codecs() {
        let mut config = base_config();
        config.video = Some(VideoConfig {
            codec: Some("libvpx-vp9".into()),
            quality: Some(31),
            ..<_>::default()
        });
        let args = generate(&config, &[]).unwrap();
        assert_eq!(args[position(&args, "-q:v") + 1], "31");
        assert!(!args.contains(&"-crf".to_owned()));
    }

    #[test]
    fn disabled_streams_emit_only_suppression_flags() {
        let mut config = base_config();
        config.video = Some(VideoConfig {
            codec: Some("libx264".into()),
            disabled: true,
            ..<_>::default()
        });
        config.audio = Some(AudioConfig {
            codec: Some("aac".into()),
            disabled: true,
            ..<_>::default()
        });
        let args = generate(&config, &[]).unwrap();
        assert!(args.contains(&"-vn".to_owned()));
        assert!(args.contains(&"-an".to_owned()));
        assert!(!args.contains(&"-c:v".to_owned()));
        assert!(!args.contains(&"-c:a".to_owned()));
    }

    #[test]
    fn auto_hardware_injects_context_flag_after_banner() {
        let mut config = base_config();
        config.video = Some(VideoConfig {
            codec: Some("h264".into()),
            ..<_>::default()
        });
        config.hwaccel = Some(HwAccelConfig::auto());
        let args = generate(&config, &[HwAccel::Intel]).unwrap();
        assert_eq!(&args[..3], ["-hide_banner", "-hwaccel", "qsv"]);
        assert_eq!(args[position(&args, "-c:v") + 1], "h264_qsv");
    }

    #[test]
    fn hardware_miss_degrades_to_software() {
        let mut config = base_config();
        config.video = Some(VideoConfig {
            codec: Some("h264".into()),
            ..<_>::default()
        });
        config.hwaccel = Some(HwAccelConfig::auto());
        let args = generate(&config, &[]).unwrap();
        assert_eq!(args[position(&args, "-c:v") + 1], "h264");
        assert!(!args.contains(&"-hwaccel".to_owned()));
    }

    #[test]
    fn hardware_miss_errors_when_fallback_disallowed() {
        let mut config = base_config();
        config.video = Some(VideoConfig {
            codec: Some("h264".into()),
            ..<_>::default()
        });
        config.hwaccel = Some(HwAccelConfig {
            fallback_to_software: false,
            ..HwAccelConfig::auto()
        });
        match generate(&config, &[]) {
            Err(Error::HardwareAccelerationUnavailable { codec, .. }) => {
                assert_eq!(codec, "h264");
            }
            other => panic!("expected hardware error, got {other:?}"),
        }
    }

    #[test]
    fn explicit_class_keeps_flag_position() {
        let mut config = base_config();
        config.video = Some(VideoConfig {
            codec: Some("h264".into()),
            ..<_>::default()
        });
        config.hwaccel = Some(HwAccelConfig::class(HwAccel::Vaapi));
        let args = generate(&config, &[]).unwrap();
        assert_eq!(&args[..3], ["-hide_banner", "-hwaccel", "vaapi"]);
        assert_eq!(args[position(&args, "-c:v") + 1], "h264_vaapi");
    }

    #[test]
    fn upscale_chain_merges_into_vf() {
        let mut config = base_config();
        config.video = Some(VideoConfig {
            upscale: Some(Upscale {
                enhance_sharpness: true,
                ..upscale()
            }),
            ..<_>::default()
        });
        let args = generate(&config, &[]).unwrap();
        assert_eq!(
            args[position(&args, "-vf") + 1],
            "scale=3840:2160:flags=lanczos,unsharp=5:5:1:5:5:0.0"
        );
    }

    #[test]
    fn advanced_options_two_pass_metadata_subtitles() {
        let mut config = base_config();
        config.options = Some(AdvancedOptions {
            two_pass: true,
            metadata: vec![("title".into(), "demo".into())],
            subtitles: Some("subs.srt".into()),
            burn_subtitles: false,
            output_options: vec!["-movflags".into(), "+faststart".into()],
            ..<_>::default()
        });
        let args = generate(&config, &[]).unwrap();
        let pass = position(&args, "-pass");
        assert_eq!(&args[pass..pass + 4], ["-pass", "1", "-passlogfile", "ffmpeg2pass"]);
        let meta = position(&args, "-metadata");
        assert_eq!(args[meta + 1], "title=demo");
        let subs = position(&args, "subs.srt");
        assert_eq!(args[subs - 1], "-i");
        assert_eq!(&args[subs + 1..subs + 3], ["-c:s", "mov_text"]);
        // raw output options come after advanced options, before -y
        assert!(position(&args, "-movflags") > subs);
        assert!(position(&args, "-movflags") < position(&args, "-y"));
    }

    #[test]
    fn burned_subtitles_emit_their_own_vf() {
        let mut config = base_config();
        config.options = Some(AdvancedOptions {
            subtitles: Some("subs.srt".into()),
            burn_subtitles: true,
            ..<_>::default()
        });
        let args = generate(&config, &[]).unwrap();
        assert_eq!(args[position(&args, "-vf") + 1], "subtitles=subs.srt");
    }

    #[test]
    fn generate_string_is_shell_escaped() {
        let config = ConversionConfig::new("my file.mp4", Output::from("b.mp4"));
        let command = generate_string(&config, &[], Path::new("ffmpeg")).unwrap();
        assert!(command.starts_with("ffmpeg -hide_banner -i 'my file.mp4'"));
        assert!(command.ends_with("-y b.mp4"));
    }
}
