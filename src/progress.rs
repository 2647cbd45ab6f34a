//! diagnostic-stream progress parsing
use std::time::Duration;
use time::macros::format_description;

/// One parsed progress line.
///
/// Emitted only for lines carrying both a `time=` and a `bitrate=` marker;
/// frame count and fps are optional within a recognized line.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub frames: Option<u64>,
    pub fps: Option<f32>,
    /// Instantaneous bitrate in kbit/s.
    pub bitrate_kbps: Option<f32>,
    /// Output written so far, in kB.
    pub size_kb: Option<u64>,
    /// Position in the output timeline.
    pub timemark: Option<Duration>,
    /// 0 until a total duration has been observed; clamped to 100,
    /// two decimal places.
    pub percent: f64,
}

/// Incremental parser over the diagnostic stream.
///
/// The only state is the most recently observed total duration, needed to
/// turn later timemarks into percentages. Lines must be fed in arrival
/// order.
#[derive(Debug, Default)]
pub struct ProgressParser {
    duration: Option<Duration>,
}

impl ProgressParser {
    /// Capture a `Duration: HH:MM:SS.ss` declaration if the line has one.
    pub fn observe(&mut self, line: &str) {
        if let Some(token) = label_value("Duration:", line) {
            if let Some(total) = parse_timemark(token.trim_end_matches(',')) {
                self.duration = Some(total);
            }
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Classify and parse one line. `None` means the line is not a progress
    /// record (missing time or bitrate marker, or no usable fields).
    pub fn parse_progress(&self, line: &str) -> Option<Progress> {
        if !line.contains("time=") || !line.contains("bitrate=") {
            return None;
        }

        let frames = label_value("frame=", line).and_then(|v| v.parse().ok());
        let fps = label_value("fps=", line).and_then(|v| v.parse().ok());
        let bitrate_kbps = label_value("bitrate=", line)
            .and_then(|v| v.strip_suffix("kbits/s"))
            .and_then(|v| v.parse().ok());
        let size_kb = label_value("size=", line)
            .or_else(|| label_value("Lsize=", line))
            .and_then(|v| v.strip_suffix("KiB").or_else(|| v.strip_suffix("kB")))
            .and_then(|v| v.parse().ok());
        let timemark = label_value("time=", line).and_then(parse_timemark);

        if frames.is_none() && timemark.is_none() {
            return None;
        }

        let percent = match (self.duration, timemark) {
            (Some(total), Some(mark)) if !total.is_zero() => {
                let pct = (mark.as_secs_f64() / total.as_secs_f64() * 100.0).min(100.0);
                (pct * 100.0).round() / 100.0
            }
            _ => 0.0,
        };

        Some(Progress {
            frames,
            fps,
            bitrate_kbps,
            size_kb,
            timemark,
            percent,
        })
    }
}

/// Parse an `HH:MM:SS.ss` timemark.
pub(crate) fn parse_timemark(token: &str) -> Option<Duration> {
    let (h, m, s, ns) = time::Time::parse(
        token,
        &format_description!("[hour]:[minute]:[second].[subsecond]"),
    )
    .ok()?
    .as_hms_nano();
    Some(Duration::new(
        h as u64 * 60 * 60 + m as u64 * 60 + s as u64,
        ns,
    ))
}

/// Parse a `label=  value ` type substring.
fn label_value<'a>(label: &str, line: &'a str) -> Option<&'a str> {
    let line = &line[line.find(label)? + label.len()..];
    let val_start = line.char_indices().find(|(_, c)| !c.is_whitespace())?.0;
    let val_end = val_start
        + line[val_start..]
            .char_indices()
            .find(|(_, c)| c.is_whitespace())
            .map(|(idx, _)| idx)
            .unwrap_or(line[val_start..].len());
    Some(&line[val_start..val_end])
}

/// Advisory scan for failure-indicating phrases. Many of these appear in
/// non-fatal warnings too, so this never drives control flow.
pub fn looks_like_error(line: &str) -> bool {
    const PHRASES: [&str; 8] = [
        "error",
        "invalid",
        "failed",
        "cannot",
        "unable to",
        "does not contain",
        "no such file",
        "permission denied",
    ];
    let line = line.to_ascii_lowercase();
    PHRASES.iter().any(|phrase| line.contains(phrase))
}

#[cfg(test)]
mod test {
    use super::*;

    const PROGRESS_LINE: &str =
        "frame= 1234 fps= 30 q=28.0 size=    1024kB time=00:00:50.00 bitrate= 203.5kbits/s speed=1.5x";

    #[test]
    fn percent_against_observed_duration() {
        let mut parser = ProgressParser::default();
        parser.observe("  Duration: 00:01:40.00, start: 0.000000, bitrate: 1234 kb/s");
        assert_eq!(parser.duration(), Some(Duration::from_secs(100)));

        let progress = parser.parse_progress(PROGRESS_LINE).unwrap();
        assert_eq!(
            progress,
            Progress {
                frames: Some(1234),
                fps: Some(30.0),
                bitrate_kbps: Some(203.5),
                size_kb: Some(1024),
                timemark: Some(Duration::from_secs(50)),
                percent: 50.0,
            }
        );
    }

    #[test]
    fn percent_is_zero_before_duration_is_known() {
        let parser = ProgressParser::default();
        assert_eq!(parser.parse_progress(PROGRESS_LINE).unwrap().percent, 0.0);
    }

    #[test]
    fn percent_clamps_to_100() {
        let mut parser = ProgressParser::default();
        parser.observe("Duration: 00:00:40.00, start: 0.000000");
        let progress = parser
            .parse_progress("frame=  10 time=00:00:50.00 bitrate=1.0kbits/s")
            .unwrap();
        assert_eq!(progress.percent, 100.0);
    }

    #[test]
    fn percent_rounds_to_two_decimals() {
        let mut parser = ProgressParser::default();
        parser.observe("Duration: 00:00:03.00, start: 0.000000");
        let progress = parser
            .parse_progress("frame=  10 time=00:00:01.00 bitrate=1.0kbits/s")
            .unwrap();
        assert_eq!(progress.percent, 33.33);
    }

    #[test]
    fn no_bitrate_marker_is_not_progress() {
        let parser = ProgressParser::default();
        assert_eq!(
            parser.parse_progress("frame=  288 fps= 94 time=01:23:12.34 speed=3.94x"),
            None
        );
    }

    #[test]
    fn frame_and_fps_are_optional() {
        let parser = ProgressParser::default();
        let progress = parser
            .parse_progress("size=     512KiB time=00:00:10.00 bitrate= 419.4kbits/s speed=2x")
            .unwrap();
        assert_eq!(progress.frames, None);
        assert_eq!(progress.size_kb, Some(512));
        assert_eq!(progress.timemark, Some(Duration::from_secs(10)));
    }

    #[test]
    fn na_fields_parse_as_absent() {
        let parser = ProgressParser::default();
        let progress = parser
            .parse_progress("frame=  288 fps= 94 size=N/A time=01:23:12.34 bitrate=N/A speed=4x")
            .unwrap();
        assert_eq!(progress.frames, Some(288));
        assert_eq!(progress.bitrate_kbps, None);
        assert_eq!(progress.size_kb, None);
        assert_eq!(
            progress.timemark,
            Some(Duration::new(60 * 60 + 23 * 60 + 12, 340_000_000))
        );
    }

    #[test]
    fn latest_duration_wins() {
        let mut parser = ProgressParser::default();
        parser.observe("  Duration: 00:01:40.00, start: 0.000000");
        parser.observe("  Duration: 00:00:20.00, start: 0.000000");
        assert_eq!(parser.duration(), Some(Duration::from_secs(20)));
    }

    #[test]
    fn error_phrase_scan_is_case_insensitive() {
        assert!(looks_like_error("a.mp4: No such file or directory"));
        assert!(looks_like_error("Error while decoding stream"));
        assert!(looks_like_error("Unable to find a suitable output format"));
        assert!(!looks_like_error("Press [q] to stop, [?] for help"));
    }
}
