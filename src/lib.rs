//! Typed configuration layer over the `ffmpeg` & `ffprobe` executables:
//! compiles declarative conversion configs into argument vectors, supervises
//! the spawned process and parses its diagnostic output into progress
//! events and structured metadata.
pub mod batch;
pub mod capabilities;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
mod ffmpeg;
pub mod filter;
pub mod hwaccel;
mod input;
mod process;
pub mod probe;
pub mod progress;

pub use crate::{
    batch::{BatchEvent, BatchReport},
    config::{
        AdvancedOptions, AudioConfig, ConversionConfig, HwAccelConfig, Output, SizeSpec, TimeSpec,
        TimingConfig, VideoConfig,
    },
    engine::{CancelHandle, Conversion, ConvertOut, ConvertOutput},
    error::{CodecKind, CodecOp, Error, FormatOp},
    ffmpeg::{Ffmpeg, HwAccelInfo},
    hwaccel::HwAccel,
    input::Input,
    probe::{ImageMetadata, MediaMetadata, VideoMetadata},
    progress::Progress,
};
