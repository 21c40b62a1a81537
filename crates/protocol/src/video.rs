//! Video geometry, audio format, and output destinations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use stagecast_common::SessionDefaults;

/// The three resolutions a session juggles, as they appear on the wire.
///
/// `input` is the canvas sources composite onto, `output` is what
/// encoders consume, and `scaled` is the raw-frame tap used for slice
/// export. All six fields are required whenever a command carries a
/// layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoLayout {
    pub input_width: u32,
    pub input_height: u32,
    pub output_width: u32,
    pub output_height: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
}

impl VideoLayout {
    pub fn from_defaults(defaults: &SessionDefaults) -> Self {
        VideoLayout {
            input_width: defaults.input_width,
            input_height: defaults.input_height,
            output_width: defaults.output_width,
            output_height: defaults.output_height,
            scaled_width: defaults.scaled_width,
            scaled_height: defaults.scaled_height,
        }
    }
}

/// Full video mode an engine is reset into: layout plus frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoConfig {
    pub layout: VideoLayout,
    pub fps: u32,
}

impl VideoConfig {
    pub fn new(layout: VideoLayout, fps: u32) -> Self {
        VideoConfig { layout, fps }
    }

    pub fn from_defaults(defaults: &SessionDefaults) -> Self {
        VideoConfig {
            layout: VideoLayout::from_defaults(defaults),
            fps: defaults.fps,
        }
    }
}

/// Audio format an engine is reset into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u32,
}

impl AudioConfig {
    pub fn from_defaults(defaults: &SessionDefaults) -> Self {
        AudioConfig {
            sample_rate: defaults.audio_sample_rate,
            channels: defaults.audio_channels,
        }
    }
}

/// Where an output delivers its encoded media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OutputTarget {
    /// Muxed recording written to a local file.
    File { path: PathBuf },
    /// RTMP-style stream addressed by URL plus key.
    Stream { url: String, key: String },
}

impl OutputTarget {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        OutputTarget::File { path: path.into() }
    }

    pub fn stream(url: impl Into<String>, key: impl Into<String>) -> Self {
        OutputTarget::Stream {
            url: url.into(),
            key: key.into(),
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, OutputTarget::Stream { .. })
    }
}
