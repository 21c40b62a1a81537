//! Source kinds and their engine-facing settings.
//!
//! A session owns at most one source per kind. The wire names kinds
//! with camelCase strings; unknown strings are tolerated in scene
//! plans (the item is skipped) rather than failing the whole command.

use serde::{Deserialize, Serialize};

/// The four capture sources a session can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    /// Full-display or single-window video capture.
    Display,
    /// Camera video capture.
    Webcam,
    /// Microphone audio capture.
    Microphone,
    /// System audio loopback capture.
    DesktopAudio,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Display,
        SourceKind::Webcam,
        SourceKind::Microphone,
        SourceKind::DesktopAudio,
    ];

    /// Parse a wire `type` string, `None` for unrecognized kinds.
    pub fn parse(kind: &str) -> Option<SourceKind> {
        match kind {
            "display" => Some(SourceKind::Display),
            "webcam" => Some(SourceKind::Webcam),
            "microphone" => Some(SourceKind::Microphone),
            "desktopAudio" => Some(SourceKind::DesktopAudio),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Display => "display",
            SourceKind::Webcam => "webcam",
            SourceKind::Microphone => "microphone",
            SourceKind::DesktopAudio => "desktopAudio",
        }
    }

    /// Audio sources never take a canvas transform.
    pub fn is_audio(&self) -> bool {
        matches!(self, SourceKind::Microphone | SourceKind::DesktopAudio)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine-facing settings for one source, updated in place as
/// configuration commands arrive.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSettings {
    Display {
        /// Zero-based display index, `None` for the primary display.
        display_num: Option<u32>,
        /// Window title to capture instead of a whole display.
        window: Option<String>,
    },
    Webcam {
        device_id: String,
        input_width: u32,
        input_height: u32,
    },
    Microphone {
        device_id: String,
        /// Audio/video sync offset in nanoseconds, positive delays audio.
        sync_offset_ns: i64,
    },
    DesktopAudio {
        /// Loopback device, `None` for the system default.
        device_id: Option<String>,
    },
}

impl SourceSettings {
    /// Settings a source starts with before any configure command.
    pub fn default_for(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Display => SourceSettings::Display {
                display_num: None,
                window: None,
            },
            SourceKind::Webcam => SourceSettings::Webcam {
                device_id: "default".to_string(),
                input_width: 1280,
                input_height: 720,
            },
            SourceKind::Microphone => SourceSettings::Microphone {
                device_id: "default".to_string(),
                sync_offset_ns: 0,
            },
            SourceKind::DesktopAudio => SourceSettings::DesktopAudio { device_id: None },
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceSettings::Display { .. } => SourceKind::Display,
            SourceSettings::Webcam { .. } => SourceKind::Webcam,
            SourceSettings::Microphone { .. } => SourceKind::Microphone,
            SourceSettings::DesktopAudio { .. } => SourceKind::DesktopAudio,
        }
    }
}

/// One entry of an `initializeStreaming` `sources` array: which source
/// to create and, optionally, how to configure it in the same breath.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePlan {
    #[serde(rename = "type")]
    pub kind: String,
    pub device_id: Option<String>,
    pub input_width: Option<u32>,
    pub input_height: Option<u32>,
    pub display_num: Option<u32>,
    pub window: Option<String>,
    pub sync_offset_ms: Option<i64>,
}

impl SourcePlan {
    /// Apply this plan on top of the kind's default settings.
    pub fn settings(&self, kind: SourceKind) -> SourceSettings {
        let mut settings = SourceSettings::default_for(kind);
        match &mut settings {
            SourceSettings::Display {
                display_num,
                window,
            } => {
                *display_num = self.display_num;
                window.clone_from(&self.window);
            }
            SourceSettings::Webcam {
                device_id,
                input_width,
                input_height,
            } => {
                if let Some(id) = &self.device_id {
                    device_id.clone_from(id);
                }
                if let Some(w) = self.input_width {
                    *input_width = w;
                }
                if let Some(h) = self.input_height {
                    *input_height = h;
                }
            }
            SourceSettings::Microphone {
                device_id,
                sync_offset_ns,
            } => {
                if let Some(id) = &self.device_id {
                    device_id.clone_from(id);
                }
                if let Some(ms) = self.sync_offset_ms {
                    *sync_offset_ns = stagecast_common::SessionClock::ms_to_ns(ms);
                }
            }
            SourceSettings::DesktopAudio { device_id } => {
                device_id.clone_from(&self.device_id);
            }
        }
        settings
    }
}
