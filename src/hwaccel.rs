//! hardware acceleration detection & codec substitution
use std::fmt;

/// Normalized acceleration class. Detection collapses synonyms (`cuda`,
/// `nvdec`, `nvenc` all mean Nvidia) into one entry per vendor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HwAccel {
    Nvidia,
    Intel,
    Amd,
    Vaapi,
    VideoToolbox,
    /// A class the executable reported that has no substitution table,
    /// e.g. `dxva2`.
    Other(String),
}

impl HwAccel {
    /// Value for the `-hwaccel` context flag.
    pub fn context_flag(&self) -> &str {
        match self {
            Self::Nvidia => "cuda",
            Self::Intel => "qsv",
            Self::Amd => "amf",
            Self::Vaapi => "vaapi",
            Self::VideoToolbox => "videotoolbox",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for HwAccel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nvidia => "nvidia".fmt(f),
            Self::Intel => "intel".fmt(f),
            Self::Amd => "amd".fmt(f),
            Self::Vaapi => "vaapi".fmt(f),
            Self::VideoToolbox => "videotoolbox".fmt(f),
            Self::Other(name) => name.fmt(f),
        }
    }
}

/// Parse `-hwaccels` output into normalized classes, first-seen order,
/// one entry per class.
pub fn parse_hwaccels(out: &str) -> Vec<HwAccel> {
    let mut detected = Vec::new();
    for line in out.lines() {
        let entry = line.trim().to_ascii_lowercase();
        if entry.is_empty() || entry.ends_with(':') {
            continue;
        }
        let class = if entry == "cuda" || entry == "nvdec" || entry.contains("nvenc") {
            HwAccel::Nvidia
        } else if entry == "qsv" {
            HwAccel::Intel
        } else if entry == "amf" || entry == "d3d11va" {
            HwAccel::Amd
        } else if entry == "vaapi" {
            HwAccel::Vaapi
        } else if entry == "videotoolbox" {
            HwAccel::VideoToolbox
        } else {
            HwAccel::Other(entry)
        };
        if !detected.contains(&class) {
            detected.push(class);
        }
    }
    detected
}

/// Pick the preferred class from a detected list:
/// Nvidia, Intel, Amd, Vaapi, VideoToolbox, then anything else.
pub fn preferred(detected: &[HwAccel]) -> Option<&HwAccel> {
    const PRIORITY: [HwAccel; 5] = [
        HwAccel::Nvidia,
        HwAccel::Intel,
        HwAccel::Amd,
        HwAccel::Vaapi,
        HwAccel::VideoToolbox,
    ];
    PRIORITY
        .iter()
        .find_map(|class| detected.iter().find(|d| *d == class))
        .or_else(|| detected.first())
}

/// Outcome of hardware codec resolution. Never an error: a missing mapping
/// degrades to the original codec with `is_hardware: false`, and the caller
/// decides whether that degrade is acceptable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub codec: String,
    /// `-hwaccel` context flag value when a hardware encoder was selected.
    pub context_flag: Option<String>,
    pub is_hardware: bool,
}

/// Map a software codec to the class's hardware encoder.
///
/// `preference` wins over detection; with no preference the highest-priority
/// detected class is used.
pub fn resolve(desired: &str, preference: Option<&HwAccel>, detected: &[HwAccel]) -> Resolved {
    let software = Resolved {
        codec: desired.to_owned(),
        context_flag: None,
        is_hardware: false,
    };
    let Some(class) = preference.or_else(|| preferred(detected)) else {
        return software;
    };
    match hardware_encoder(desired, class) {
        Some(codec) => Resolved {
            codec: codec.to_owned(),
            context_flag: Some(class.context_flag().to_owned()),
            is_hardware: true,
        },
        None => software,
    }
}

/// Per-vendor substitution table, keyed on the codec name with any `lib`
/// prefix stripped.
fn hardware_encoder(desired: &str, class: &HwAccel) -> Option<&'static str> {
    let name = desired.to_ascii_lowercase();
    let name = name.strip_prefix("lib").filter(|s| !s.is_empty()).unwrap_or(&name);
    match class {
        HwAccel::Nvidia => match name {
            "h264" | "x264" => Some("h264_nvenc"),
            "h265" | "x265" | "hevc" => Some("hevc_nvenc"),
            "av1" | "svtav1" | "aom-av1" => Some("av1_nvenc"),
            _ => None,
        },
        HwAccel::Intel => match name {
            "h264" | "x264" => Some("h264_qsv"),
            "h265" | "x265" | "hevc" => Some("hevc_qsv"),
            "av1" | "svtav1" | "aom-av1" => Some("av1_qsv"),
            "vp9" | "vpx-vp9" => Some("vp9_qsv"),
            _ => None,
        },
        HwAccel::Amd => match name {
            "h264" | "x264" => Some("h264_amf"),
            "h265" | "x265" | "hevc" => Some("hevc_amf"),
            _ => None,
        },
        HwAccel::Vaapi => match name {
            "h264" | "x264" => Some("h264_vaapi"),
            "h265" | "x265" | "hevc" => Some("hevc_vaapi"),
            "vp8" | "vpx" => Some("vp8_vaapi"),
            "vp9" | "vpx-vp9" => Some("vp9_vaapi"),
            "av1" | "svtav1" | "aom-av1" => Some("av1_vaapi"),
            _ => None,
        },
        HwAccel::VideoToolbox => match name {
            "h264" | "x264" => Some("h264_videotoolbox"),
            "h265" | "x265" | "hevc" => Some("hevc_videotoolbox"),
            _ => None,
        },
        HwAccel::Other(_) => None,
    }
}

/// Hardware encoders reachable under a class, for capability reporting.
pub fn class_encoders(class: &HwAccel) -> Vec<&'static str> {
    ["h264", "hevc", "av1", "vp8", "vp9"]
        .iter()
        .filter_map(|codec| hardware_encoder(codec, class))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    const HWACCELS_OUT: &str = "\
Hardware acceleration methods:
vdpau
cuda
vaapi
qsv
drm
";

    #[test]
    fn parse_collapses_synonyms_in_order() {
        assert_eq!(
            parse_hwaccels(HWACCELS_OUT),
            [
                HwAccel::Other("vdpau".into()),
                HwAccel::Nvidia,
                HwAccel::Vaapi,
                HwAccel::Intel,
                HwAccel::Other("drm".into()),
            ]
        );
        assert_eq!(parse_hwaccels("Hardware acceleration methods:\n"), []);
    }

    #[test]
    fn preferred_follows_vendor_priority() {
        let detected = parse_hwaccels(HWACCELS_OUT);
        assert_eq!(preferred(&detected), Some(&HwAccel::Nvidia));

        let others = [HwAccel::Other("dxva2".into())];
        assert_eq!(preferred(&others), Some(&others[0]));
        assert_eq!(preferred(&[]), None);
    }

    #[test]
    fn resolve_intel_only() {
        let resolved = resolve("h264", None, &[HwAccel::Intel]);
        assert_eq!(
            resolved,
            Resolved {
                codec: "h264_qsv".into(),
                context_flag: Some("qsv".into()),
                is_hardware: true,
            }
        );
    }

    #[test]
    fn resolve_nothing_detected_returns_software() {
        let resolved = resolve("h264", None, &[]);
        assert_eq!(
            resolved,
            Resolved {
                codec: "h264".into(),
                context_flag: None,
                is_hardware: false,
            }
        );
    }

    #[test]
    fn resolve_strips_lib_prefix() {
        let resolved = resolve("libx265", Some(&HwAccel::Nvidia), &[]);
        assert_eq!(resolved.codec, "hevc_nvenc");
        assert!(resolved.is_hardware);
    }

    #[test]
    fn resolve_unmapped_pair_degrades() {
        // videotoolbox has no vp9 encoder mapping
        let resolved = resolve("libvpx-vp9", Some(&HwAccel::VideoToolbox), &[]);
        assert_eq!(resolved.codec, "libvpx-vp9");
        assert!(!resolved.is_hardware);
    }
}
