//! filter-chain assembly
//!
//! Filters are unordered in the config; the chain builders impose the
//! canonical application order the external filter graph needs for
//! correctness (crop before scale, denoise before scale/eq, gain last).
use std::fmt::{self, Write};

/// A filter dimension or position: a pixel count, a raw expression such as
/// `iw*2` or `(iw-w)/2`, or the auto sentinel (serialized as `-1`).
#[derive(Debug, Clone, PartialEq)]
pub enum Dim {
    Px(i32),
    Expr(String),
    Auto,
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Px(n) => n.fmt(f),
            Self::Expr(e) => e.fmt(f),
            Self::Auto => "-1".fmt(f),
        }
    }
}

impl From<i32> for Dim {
    fn from(px: i32) -> Self {
        Self::Px(px)
    }
}

impl From<&str> for Dim {
    fn from(expr: &str) -> Self {
        Self::Expr(expr.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scale {
    pub width: Option<Dim>,
    pub height: Option<Dim>,
    pub algorithm: Option<String>,
    pub force_original_aspect_ratio: Option<AspectMode>,
    pub force_divisible_by: Option<u32>,
}

/// `force_original_aspect_ratio` handling modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectMode {
    Disable,
    Decrease,
    Increase,
}

impl AspectMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Decrease => "decrease",
            Self::Increase => "increase",
        }
    }
}

impl Scale {
    fn render(&self) -> String {
        let w = self.width.clone().unwrap_or(Dim::Auto);
        let h = self.height.clone().unwrap_or(Dim::Auto);
        let mut out = format!("scale={w}:{h}");
        if let Some(algorithm) = &self.algorithm {
            write!(out, ":flags={algorithm}").unwrap();
        }
        if let Some(mode) = self.force_original_aspect_ratio {
            write!(out, ":force_original_aspect_ratio={}", mode.as_str()).unwrap();
        }
        if let Some(div) = self.force_divisible_by {
            write!(out, ":force_divisible_by={div}").unwrap();
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Crop {
    pub width: Dim,
    pub height: Dim,
    /// Defaults to horizontally centered.
    pub x: Option<Dim>,
    /// Defaults to vertically centered.
    pub y: Option<Dim>,
}

impl Crop {
    fn render(&self) -> String {
        let x = self.x.clone().unwrap_or_else(|| "(iw-w)/2".into());
        let y = self.y.clone().unwrap_or_else(|| "(ih-h)/2".into());
        format!("crop={}:{}:{x}:{y}", self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pad {
    pub width: Dim,
    pub height: Dim,
    pub x: Option<Dim>,
    pub y: Option<Dim>,
    pub color: Option<String>,
}

impl Pad {
    fn render(&self) -> String {
        let mut out = format!("pad={}:{}", self.width, self.height);
        if let Some(x) = &self.x {
            write!(out, ":{x}").unwrap();
        }
        if let Some(y) = &self.y {
            write!(out, ":{y}").unwrap();
        }
        if let Some(color) = &self.color {
            write!(out, ":{color}").unwrap();
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    TopFieldFirst,
    BottomFieldFirst,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deint {
    All,
    Interlaced,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deinterlace {
    /// Filter name, `yadif` when unset.
    pub mode: Option<String>,
    pub parity: Option<Parity>,
    pub deint: Option<Deint>,
}

impl Deinterlace {
    fn render(&self) -> String {
        let mode = self.mode.as_deref().unwrap_or("yadif");
        let mut parts = Vec::new();
        if let Some(parity) = self.parity {
            parts.push(match parity {
                Parity::TopFieldFirst => "0",
                Parity::BottomFieldFirst => "1",
                Parity::Auto => "-1",
            });
        }
        if let Some(deint) = self.deint {
            parts.push(match deint {
                Deint::All => "0",
                Deint::Interlaced => "1",
            });
        }
        match parts.is_empty() {
            true => mode.to_owned(),
            false => format!("{mode}={}", parts.join(":")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoDenoise {
    /// Filter name, `hqdn3d` when unset.
    pub filter: Option<String>,
    pub luma_spatial: Option<f32>,
    pub chroma_spatial: Option<f32>,
    pub luma_tmp: Option<f32>,
    pub chroma_tmp: Option<f32>,
}

impl VideoDenoise {
    fn render(&self) -> String {
        let filter = self.filter.as_deref().unwrap_or("hqdn3d");
        let mut parts = Vec::new();
        for v in [
            self.luma_spatial,
            self.chroma_spatial,
            self.luma_tmp,
            self.chroma_tmp,
        ]
        .into_iter()
        .flatten()
        {
            parts.push(v.to_string());
        }
        match parts.is_empty() {
            true => filter.to_owned(),
            false => format!("{filter}={}", parts.join(":")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sharpen {
    pub luma_msize_x: Option<u32>,
    pub luma_msize_y: Option<u32>,
    pub luma_amount: Option<f32>,
    pub chroma_msize_x: Option<u32>,
    pub chroma_msize_y: Option<u32>,
    pub chroma_amount: Option<f32>,
}

impl Sharpen {
    fn render(&self) -> String {
        let mut parts = Vec::new();
        if let Some(v) = self.luma_msize_x {
            parts.push(format!("luma_msize_x={v}"));
        }
        if let Some(v) = self.luma_msize_y {
            parts.push(format!("luma_msize_y={v}"));
        }
        if let Some(v) = self.luma_amount {
            parts.push(format!("luma_amount={v}"));
        }
        if let Some(v) = self.chroma_msize_x {
            parts.push(format!("chroma_msize_x={v}"));
        }
        if let Some(v) = self.chroma_msize_y {
            parts.push(format!("chroma_msize_y={v}"));
        }
        if let Some(v) = self.chroma_amount {
            parts.push(format!("chroma_amount={v}"));
        }
        match parts.is_empty() {
            true => "unsharp".to_owned(),
            false => format!("unsharp={}", parts.join(":")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorAdjust {
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    pub gamma: Option<f32>,
    pub gamma_r: Option<f32>,
    pub gamma_g: Option<f32>,
    pub gamma_b: Option<f32>,
}

impl ColorAdjust {
    fn render(&self) -> String {
        let mut parts = Vec::new();
        for (key, v) in [
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
            ("gamma", self.gamma),
            ("gamma_r", self.gamma_r),
            ("gamma_g", self.gamma_g),
            ("gamma_b", self.gamma_b),
        ] {
            if let Some(v) = v {
                parts.push(format!("{key}={v}"));
            }
        }
        format!("eq={}", parts.join(":"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rotate {
    /// Angle in radians; expressions such as `PI/4` work too.
    pub angle: String,
    pub fill_color: Option<String>,
    pub bilinear: Option<bool>,
}

impl Rotate {
    pub fn degrees(deg: f32) -> Self {
        Self {
            angle: format!("{deg}*PI/180"),
            fill_color: None,
            bilinear: None,
        }
    }

    fn render(&self) -> String {
        let mut out = format!("rotate=a={}", self.angle);
        if let Some(color) = &self.fill_color {
            write!(out, ":fillcolor={color}").unwrap();
        }
        if let Some(bilinear) = self.bilinear {
            write!(out, ":bilinear={}", if bilinear { "1" } else { "0" }).unwrap();
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flip {
    pub horizontal: bool,
    pub vertical: bool,
}

impl Flip {
    fn render(&self) -> String {
        let mut parts = Vec::new();
        if self.horizontal {
            parts.push("hflip");
        }
        if self.vertical {
            parts.push("vflip");
        }
        parts.join(",")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Watermark {
    pub x: Option<Dim>,
    pub y: Option<Dim>,
    /// 0.0 to 1.0; routes through the overlay-with-alpha variant.
    pub opacity: Option<f32>,
    /// Time enable expression, e.g. `between(t,10,20)`.
    pub enable: Option<String>,
}

impl Watermark {
    fn render(&self) -> String {
        let mut parts = Vec::new();
        if let Some(x) = &self.x {
            parts.push(format!("x={x}"));
        }
        if let Some(y) = &self.y {
            parts.push(format!("y={y}"));
        }
        if let Some(opacity) = self.opacity {
            return format!("overlay={}:format=auto:alpha={opacity}", parts.join(":"));
        }
        if let Some(enable) = &self.enable {
            parts.push(format!("enable='{enable}'"));
        }
        format!("overlay={}", parts.join(":"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextOverlay {
    pub text: String,
    pub font_file: Option<String>,
    pub font_size: Option<u32>,
    pub font_color: Option<String>,
    pub x: Option<Dim>,
    pub y: Option<Dim>,
    pub shadow_color: Option<String>,
    pub shadow_x: Option<i32>,
    pub shadow_y: Option<i32>,
    pub border_width: Option<u32>,
    pub border_color: Option<String>,
}

impl TextOverlay {
    fn render(&self) -> String {
        // single quotes would terminate the drawtext literal
        let mut out = format!("drawtext=text='{}'", self.text.replace('\'', "\\'"));
        if let Some(v) = &self.font_file {
            write!(out, ":fontfile={v}").unwrap();
        }
        if let Some(v) = self.font_size {
            write!(out, ":fontsize={v}").unwrap();
        }
        if let Some(v) = &self.font_color {
            write!(out, ":fontcolor={v}").unwrap();
        }
        if let Some(v) = &self.x {
            write!(out, ":x={v}").unwrap();
        }
        if let Some(v) = &self.y {
            write!(out, ":y={v}").unwrap();
        }
        if let Some(v) = &self.shadow_color {
            write!(out, ":shadowcolor={v}").unwrap();
        }
        if let Some(v) = self.shadow_x {
            write!(out, ":shadowx={v}").unwrap();
        }
        if let Some(v) = self.shadow_y {
            write!(out, ":shadowy={v}").unwrap();
        }
        if let Some(v) = self.border_width {
            write!(out, ":borderw={v}").unwrap();
        }
        if let Some(v) = &self.border_color {
            write!(out, ":bordercolor={v}").unwrap();
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fade {
    pub direction: FadeDirection,
    pub start_frame: Option<u64>,
    pub nb_frames: Option<u64>,
    pub start_time: Option<f64>,
    pub duration: Option<f64>,
    pub color: Option<String>,
}

impl Fade {
    pub fn new(direction: FadeDirection) -> Self {
        Self {
            direction,
            start_frame: None,
            nb_frames: None,
            start_time: None,
            duration: None,
            color: None,
        }
    }

    fn render(&self) -> String {
        let kind = match self.direction {
            FadeDirection::In => "in",
            FadeDirection::Out => "out",
        };
        let mut out = format!("fade=type={kind}");
        if let Some(v) = self.start_frame {
            write!(out, ":start_frame={v}").unwrap();
        }
        if let Some(v) = self.nb_frames {
            write!(out, ":nb_frames={v}").unwrap();
        }
        if let Some(v) = self.start_time {
            write!(out, ":start_time={v}").unwrap();
        }
        if let Some(v) = self.duration {
            write!(out, ":duration={v}").unwrap();
        }
        if let Some(v) = &self.color {
            write!(out, ":color={v}").unwrap();
        }
        out
    }
}

/// Video filter bag. Declaration order is irrelevant; [`video_chain`]
/// serializes in canonical order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoFilters {
    pub deinterlace: Option<Deinterlace>,
    pub crop: Option<Crop>,
    pub denoise: Option<VideoDenoise>,
    pub scale: Option<Scale>,
    pub pad: Option<Pad>,
    pub color: Option<ColorAdjust>,
    pub sharpen: Option<Sharpen>,
    pub rotate: Option<Rotate>,
    pub flip: Option<Flip>,
    pub watermark: Option<Watermark>,
    pub text: Option<TextOverlay>,
    pub fade: Option<Fade>,
    /// Raw filter expressions appended last.
    pub custom: Vec<String>,
}

impl VideoFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Serialize the canonical video chain: deinterlace, crop, denoise, scale,
/// pad, color, sharpen, rotate, flip, watermark, text, fade, custom.
/// Crop precedes scale so crop coordinates refer to the source; denoise
/// precedes scale to work on unresampled detail.
pub fn video_chain(filters: &VideoFilters) -> Option<String> {
    let mut chain = Vec::new();
    if let Some(f) = &filters.deinterlace {
        chain.push(f.render());
    }
    if let Some(f) = &filters.crop {
        chain.push(f.render());
    }
    if let Some(f) = &filters.denoise {
        chain.push(f.render());
    }
    if let Some(f) = &filters.scale {
        chain.push(f.render());
    }
    if let Some(f) = &filters.pad {
        chain.push(f.render());
    }
    if let Some(f) = &filters.color {
        chain.push(f.render());
    }
    if let Some(f) = &filters.sharpen {
        chain.push(f.render());
    }
    if let Some(f) = &filters.rotate {
        chain.push(f.render());
    }
    if let Some(f) = &filters.flip {
        let flip = f.render();
        if !flip.is_empty() {
            chain.push(flip);
        }
    }
    if let Some(f) = &filters.watermark {
        chain.push(f.render());
    }
    if let Some(f) = &filters.text {
        chain.push(f.render());
    }
    if let Some(f) = &filters.fade {
        chain.push(f.render());
    }
    chain.extend(filters.custom.iter().cloned());
    match chain.is_empty() {
        true => None,
        false => Some(chain.join(",")),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// Gain factor or expression, e.g. `0.5` or `10dB`.
    pub volume: String,
    pub precision: Option<VolumePrecision>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumePrecision {
    Fixed,
    Float,
    Double,
}

impl Volume {
    fn render(&self) -> String {
        let mut out = format!("volume={}", self.volume);
        if let Some(precision) = self.precision {
            let p = match precision {
                VolumePrecision::Fixed => "fixed",
                VolumePrecision::Float => "float",
                VolumePrecision::Double => "double",
            };
            write!(out, ":precision={p}").unwrap();
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioDenoise {
    /// 0.01 to 1.
    pub noise_reduction: Option<f32>,
    pub noise_type: Option<NoiseType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseType {
    White,
    Vinyl,
    Shellac,
    Hiss,
}

impl AudioDenoise {
    fn render(&self) -> String {
        let mut parts = Vec::new();
        if let Some(nr) = self.noise_reduction {
            parts.push(format!("nr={nr}"));
        }
        if let Some(nt) = self.noise_type {
            let nf = match nt {
                NoiseType::White => "white",
                NoiseType::Vinyl => "vinyl",
                NoiseType::Shellac => "shellac",
                NoiseType::Hiss => "hiss",
            };
            parts.push(format!("nf={nf}"));
        }
        match parts.is_empty() {
            true => "afftdn".to_owned(),
            false => format!("afftdn={}", parts.join(":")),
        }
    }
}

/// One parametric equalizer band; serialized as its own chain clause.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualizerBand {
    /// Center frequency in Hz.
    pub frequency: u32,
    pub width_type: Option<char>,
    pub width: Option<f32>,
    /// Gain in dB.
    pub gain: Option<f32>,
}

impl EqualizerBand {
    fn render(&self) -> String {
        let mut out = format!("equalizer=f={}", self.frequency);
        if let Some(t) = self.width_type {
            write!(out, ":t={t}").unwrap();
        }
        if let Some(w) = self.width {
            write!(out, ":w={w}").unwrap();
        }
        if let Some(g) = self.gain {
            write!(out, ":g={g}").unwrap();
        }
        out
    }
}

/// Audio filter bag; [`audio_chain`] serializes in canonical order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioFilters {
    pub denoise: Option<AudioDenoise>,
    pub equalizer: Vec<EqualizerBand>,
    /// Playback speed factor, 0.5 to 2.0.
    pub tempo: Option<f32>,
    /// Pitch shift in semitones, -12 to 12.
    pub pitch: Option<f32>,
    pub volume: Option<Volume>,
    /// Raw filter expressions appended last.
    pub custom: Vec<String>,
}

impl AudioFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Serialize the canonical audio chain: denoise, equalizer bands, tempo,
/// pitch, volume, custom. Denoise precedes eq so bands don't amplify noise;
/// volume stays last so gain staging reflects all prior processing.
pub fn audio_chain(filters: &AudioFilters) -> Option<String> {
    let mut chain = Vec::new();
    if let Some(f) = &filters.denoise {
        chain.push(f.render());
    }
    for band in &filters.equalizer {
        chain.push(band.render());
    }
    if let Some(tempo) = filters.tempo {
        chain.push(format!("atempo={tempo}"));
    }
    if let Some(semitones) = filters.pitch {
        // no native pitch filter: resample-compose the shift
        chain.push(format!(
            "asetrate=44100*2^({semitones}/12),aresample=44100"
        ));
    }
    if let Some(f) = &filters.volume {
        chain.push(f.render());
    }
    chain.extend(filters.custom.iter().cloned());
    match chain.is_empty() {
        true => None,
        false => Some(chain.join(",")),
    }
}

/// Quality-oriented upscaling descriptor, expanded into its own sub-chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Upscale {
    pub algorithm: String,
    pub width: u32,
    pub height: u32,
    pub denoise_before_scale: bool,
    pub enhance_sharpness: bool,
    pub sharpness_amount: Option<f32>,
}

pub fn upscale_chain(up: &Upscale) -> Vec<String> {
    let mut chain = Vec::new();
    if up.denoise_before_scale {
        chain.push("hqdn3d=4:3:6:4.5".to_owned());
    }
    chain.push(format!(
        "scale={}:{}:flags={}",
        up.width, up.height, up.algorithm
    ));
    if up.enhance_sharpness {
        let amount = up.sharpness_amount.unwrap_or(1.0);
        chain.push(format!("unsharp=5:5:{amount}:5:5:0.0"));
    }
    chain
}

/// Quality-oriented downscaling descriptor, expanded into its own sub-chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Downscale {
    pub algorithm: String,
    pub width: u32,
    pub height: u32,
    pub deinterlace: bool,
    /// Overrides the algorithm with lanczos.
    pub preserve_details: bool,
}

pub fn downscale_chain(down: &Downscale) -> Vec<String> {
    let mut chain = Vec::new();
    if down.deinterlace {
        chain.push("yadif=0:-1:0".to_owned());
    }
    let algorithm = match down.preserve_details {
        true => "lanczos",
        false => down.algorithm.as_str(),
    };
    chain.push(format!(
        "scale={}:{}:flags={algorithm}",
        down.width, down.height
    ));
    chain
}

/// One clause of a multi-input filter graph:
/// `{labeled inputs}{filter}={options}{labeled outputs}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterClause {
    pub inputs: Vec<String>,
    pub filter: String,
    /// `key=value` pairs joined by colons, in declaration order.
    pub options: Vec<(String, String)>,
    pub outputs: Vec<String>,
}

impl FilterClause {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Self::default()
        }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for input in &self.inputs {
            write!(out, "[{input}]").unwrap();
        }
        out.push_str(&self.filter);
        if !self.options.is_empty() {
            let opts: Vec<String> = self
                .options
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(out, "={}", opts.join(":")).unwrap();
        }
        for output in &self.outputs {
            write!(out, "[{output}]").unwrap();
        }
        out
    }
}

/// Serialize a complex filter graph as semicolon-joined clauses.
pub fn complex_graph(clauses: &[FilterClause]) -> String {
    let rendered: Vec<String> = clauses.iter().map(FilterClause::render).collect();
    rendered.join(";")
}
