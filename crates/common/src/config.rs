//! Session defaults and logging configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Video and audio parameters applied when a session initializes, before any
/// command has supplied explicit dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDefaults {
    /// Base (canvas) resolution in pixels.
    pub input_width: u32,
    pub input_height: u32,

    /// Encoded output resolution in pixels.
    pub output_width: u32,
    pub output_height: u32,

    /// Resolution of raw frames delivered to a frame callback.
    pub scaled_width: u32,
    pub scaled_height: u32,

    /// Fixed session frame rate.
    pub fps: u32,

    /// Audio sample rate in Hz.
    pub audio_sample_rate: u32,

    /// Audio channel count.
    pub audio_channels: u32,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        // The canvas covers a 5K display at 2x scale; encode and raw export
        // default to 720p at 30 fps, mono 44.1 kHz audio.
        Self {
            input_width: 5120,
            input_height: 2880,
            output_width: 1280,
            output_height: 720,
            scaled_width: 1280,
            scaled_height: 720,
            fps: 30,
            audio_sample_rate: 44_100,
            audio_channels: 1,
        }
    }
}

impl SessionDefaults {
    /// Load defaults from a JSON file, falling back to the builtin values
    /// when the file is absent or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(defaults) => defaults,
                Err(e) => {
                    tracing::warn!("Failed to parse defaults at {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read defaults at {:?}: {}", path, e);
                Self::default()
            }
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "stagecast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path; stderr when absent.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults_match_session_startup_values() {
        let d = SessionDefaults::default();
        assert_eq!((d.input_width, d.input_height), (5120, 2880));
        assert_eq!((d.output_width, d.output_height), (1280, 720));
        assert_eq!((d.scaled_width, d.scaled_height), (1280, 720));
        assert_eq!(d.fps, 30);
        assert_eq!(d.audio_sample_rate, 44_100);
        assert_eq!(d.audio_channels, 1);
    }

    #[test]
    fn missing_defaults_file_falls_back_to_builtin() {
        let d = SessionDefaults::load_or_default(Path::new("/nonexistent/defaults.json"));
        assert_eq!(d.fps, SessionDefaults::default().fps);
    }
}
