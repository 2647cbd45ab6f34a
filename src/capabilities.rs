//! capability-output parsing (version / formats / encoders / decoders)
//!
//! One-shot, stateless parsers over full captured output blocks.
use std::collections::BTreeMap;

/// Parsed `-version` output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Version {
    pub version: String,
    pub copyright: String,
    /// Build configuration flags (lines starting with `--`).
    pub configuration: Vec<String>,
    /// `libavcodec` → `61.3.100` style mapping.
    pub libraries: BTreeMap<String, String>,
}

pub fn parse_version(out: &str) -> Version {
    let mut parsed = Version::default();
    let first = out.lines().next().unwrap_or_default();
    parsed.version = first
        .split_once("version ")
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .unwrap_or("unknown")
        .to_owned();
    parsed.copyright = first
        .split_once("Copyright (c) ")
        .map(|(_, rest)| rest.trim().to_owned())
        .unwrap_or_default();

    for line in out.lines().skip(1) {
        let line = line.trim();
        if line.starts_with("--") {
            parsed.configuration.push(line.to_owned());
            continue;
        }
        // "libavutil      59.  8.100 / 59.  8.100"
        if line.starts_with("lib") {
            let line = line.split('/').next().unwrap_or_default();
            let mut tokens = line.split_whitespace();
            let Some(name) = tokens.next() else { continue };
            let version: String = tokens.collect();
            if !version.is_empty() && version.chars().all(|c| c.is_ascii_digit() || c == '.') {
                parsed.libraries.insert(name.to_owned(), version);
            }
        }
    }
    parsed
}

/// Container support reported by `-formats`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Formats {
    pub demuxing: Vec<String>,
    pub muxing: Vec<String>,
}

impl Formats {
    pub fn can_demux(&self, format: &str) -> bool {
        self.demuxing.iter().any(|f| f == format)
    }

    pub fn can_mux(&self, format: &str) -> bool {
        self.muxing.iter().any(|f| f == format)
    }
}

/// Lines are only considered after the `--` separator; the two-character
/// flag field marks demux (`D`) and/or mux (`E`) support.
pub fn parse_formats(out: &str) -> Formats {
    let mut formats = Formats::default();
    let mut in_body = false;
    for line in out.lines() {
        if !in_body {
            in_body = line.contains("--");
            continue;
        }
        if line.len() < 4 {
            continue;
        }
        let (flags, rest) = line.split_at(3);
        let Some(name) = rest.split_whitespace().next() else {
            continue;
        };
        if flags.contains('D') {
            formats.demuxing.push(name.to_owned());
        }
        if flags.contains('E') {
            formats.muxing.push(name.to_owned());
        }
    }
    formats
}

/// Codec identifiers reported by `-encoders` or `-decoders`, grouped by
/// the stream kind in the flag field's first character.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codecs {
    pub video: Vec<String>,
    pub audio: Vec<String>,
    pub subtitle: Vec<String>,
}

impl Codecs {
    pub fn contains(&self, codec: &str) -> bool {
        self.video.iter().chain(&self.audio).chain(&self.subtitle).any(|c| c == codec)
    }
}

/// Shared routine for `-encoders` and `-decoders`: both blocks carry the
/// same `V.....`/`A.....`/`S.....` flag field after a `------` separator.
pub fn parse_coders(out: &str) -> Codecs {
    let mut codecs = Codecs::default();
    let mut in_body = false;
    for line in out.lines() {
        if !in_body {
            in_body = line.contains("------");
            continue;
        }
        let mut tokens = line.split_whitespace();
        let (Some(flags), Some(name)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        if flags.len() != 6 {
            continue;
        }
        match flags.chars().next() {
            Some('V') => codecs.video.push(name.to_owned()),
            Some('A') => codecs.audio.push(name.to_owned()),
            Some('S') => codecs.subtitle.push(name.to_owned()),
            _ => {}
        }
    }
    codecs
}

#[cfg(test)]
mod test {
    use super::*;

    const VERSION_OUT: &str = "\
ffmpeg version n7.0.1 Copyright (c) 2000-2024 the FFmpeg developers
built with gcc 14.1.1 (GCC) 20240522
--prefix=/usr
--enable-gpl
libavutil      59.  8.100 / 59.  8.100
libavcodec     61.  3.100 / 61.  3.100
libavformat    61.  1.100 / 61.  1.100
";

    #[test]
    fn version_block() {
        let version = parse_version(VERSION_OUT);
        assert_eq!(version.version, "n7.0.1");
        assert_eq!(version.copyright, "2000-2024 the FFmpeg developers");
        assert_eq!(version.configuration, ["--prefix=/usr", "--enable-gpl"]);
        assert_eq!(
            version.libraries.get("libavcodec").map(String::as_str),
            Some("61.3.100")
        );
        assert_eq!(version.libraries.len(), 3);
    }

    #[test]
    fn version_unknown_when_header_is_garbage() {
        let version = parse_version("gibberish\n");
        assert_eq!(version.version, "unknown");
        assert_eq!(version.copyright, "");
    }

    const FORMATS_OUT: &str = "\
File formats:
 D. = Demuxing supported
 .E = Muxing supported
 --
 D  3dostr          3DO STR
  E 3g2             3GP2 (3GPP2 file format)
 DE 3gp             3GP (3GPP file format)
 D  4xm             4X Technologies
";

    #[test]
    fn formats_flags_route_to_demux_and_mux() {
        let formats = parse_formats(FORMATS_OUT);
        assert_eq!(formats.demuxing, ["3dostr", "3gp", "4xm"]);
        assert_eq!(formats.muxing, ["3g2", "3gp"]);
        assert!(formats.can_demux("3dostr"));
        assert!(formats.can_mux("3gp"));
        assert!(!formats.can_mux("4xm"));
    }

    #[test]
    fn formats_header_lines_are_ignored() {
        // nothing before the separator counts, even if it looks like data
        let formats = parse_formats("File formats:\n D  fake\n");
        assert_eq!(formats, Formats::default());
    }

    const ENCODERS_OUT: &str = "\
Encoders:
 V..... = Video
 A..... = Audio
 S..... = Subtitle
 .F.... = Frame-level multithreading
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC
 V....D libx265              libx265 H.265 / HEVC
 A....D aac                  AAC (Advanced Audio Coding)
 A....D libopus              libopus Opus
 S..... mov_text             3GPP Timed Text subtitle
";

    #[test]
    fn coders_grouped_by_stream_kind() {
        let codecs = parse_coders(ENCODERS_OUT);
        assert_eq!(codecs.video, ["libx264", "libx265"]);
        assert_eq!(codecs.audio, ["aac", "libopus"]);
        assert_eq!(codecs.subtitle, ["mov_text"]);
        assert!(codecs.contains("libopus"));
        assert!(!codecs.contains("flac"));
    }
}
