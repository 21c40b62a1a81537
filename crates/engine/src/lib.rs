//! Stagecast Media Engine Boundary
//!
//! The session core drives capture, composition, and encoding through
//! one object-safe trait, [`MediaEngine`]. Engines hand out opaque
//! integer handles for the objects they own; the session never touches
//! engine internals, so swapping the deterministic [`SimEngine`] for
//! the GStreamer-backed `GstEngine` (feature `gst`) changes nothing
//! above this boundary.
//!
//! Two calls are asynchronous by contract: `stop_output` returns once
//! the stop is underway, and the engine reports completion later
//! through the handler installed with `set_stopped_handler`. Raw
//! composed frames likewise arrive on an engine thread through the
//! callback installed with `add_frame_callback`.

use std::path::PathBuf;

use stagecast_common::Result;
use stagecast_protocol::{
    AudioConfig, DeviceInfo, OutputTarget, SourceKind, SourceSettings, Transform, VideoConfig,
};

pub mod devices;
pub mod displays;
pub mod launch;
pub mod sim;

#[cfg(feature = "gst")]
pub mod gst;

pub use sim::SimEngine;

#[cfg(feature = "gst")]
pub use gst::GstEngine;

/// Handle to an engine-owned capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u64);

/// Handle to an engine-owned scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneId(pub u64);

/// Handle to one item within a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneItemId(pub u64);

/// Handle to an engine-owned output sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId(pub u64);

/// Handle to a video+audio encoder pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncoderPairId(pub u64);

/// Slot carrying the program video channel.
pub const VIDEO_SLOT: u32 = 0;

/// Slot carrying the primary audio channel.
pub const AUDIO_SLOT: u32 = 1;

/// What a mixer output slot is bound to.
///
/// Video slots bind composed scenes; audio slots bind a bare source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotBinding {
    Scene(SceneId),
    Source(SourceId),
}

/// Module and data directories handed to the engine at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePaths {
    pub plugin_dir: PathBuf,
    pub exe_dir: PathBuf,
    pub data_dir: PathBuf,
}

/// One composed raw video frame, tightly packed RGBA.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Presentation timestamp on the engine's clock.
    pub timestamp_ns: u64,
    pub data: Vec<u8>,
}

/// Completion notice for an output that has finished stopping.
///
/// Fired for every stop, whether requested or spontaneous. `code` is
/// zero for a clean stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopEvent {
    pub output: OutputId,
    pub code: i32,
}

/// Receives composed frames on an engine thread.
pub type FrameCallback = Box<dyn FnMut(&RawFrame) + Send>;

/// Receives stop completions on an engine thread.
pub type StopHandler = Box<dyn Fn(StopEvent) + Send + Sync>;

/// Abstract interface over the media stack a session drives.
///
/// Implementations use interior mutability; every method takes `&self`
/// so one engine can be shared between the command loop and the engine
/// threads that deliver frames and stop events.
pub trait MediaEngine: Send + Sync {
    /// Bring the engine up: load modules, apply the initial video and
    /// audio configuration.
    fn startup(&self, paths: &EnginePaths, video: &VideoConfig, audio: &AudioConfig)
        -> Result<()>;

    /// Tear the engine down. All handles become invalid.
    fn shutdown(&self) -> Result<()>;

    /// Reconfigure video geometry and frame rate.
    ///
    /// Callers must unregister any frame callback first; a reset while
    /// a callback is live is an engine error.
    fn reset_video(&self, config: &VideoConfig) -> Result<()>;

    /// Reconfigure the audio format.
    fn reset_audio(&self, config: &AudioConfig) -> Result<()>;

    /// Create a capture source of the given kind.
    fn create_source(&self, kind: SourceKind, settings: &SourceSettings) -> Result<SourceId>;

    /// Replace a source's settings in place.
    fn update_source(&self, id: SourceId, settings: &SourceSettings) -> Result<()>;

    /// Enumerate devices usable by sources of the given kind.
    fn list_devices(&self, kind: SourceKind) -> Result<Vec<DeviceInfo>>;

    /// Create an empty scene.
    fn create_scene(&self, name: &str) -> Result<SceneId>;

    /// Release a scene and all its items.
    fn release_scene(&self, id: SceneId) -> Result<()>;

    /// Append a source to a scene, returning the new item.
    fn add_scene_item(&self, scene: SceneId, source: SourceId) -> Result<SceneItemId>;

    /// Apply crop, position, and scale to a scene item.
    fn set_item_transform(
        &self,
        scene: SceneId,
        item: SceneItemId,
        transform: &Transform,
    ) -> Result<()>;

    /// Bind a scene or source to a mixer output slot, or clear the
    /// slot with `None`. See [`VIDEO_SLOT`] and [`AUDIO_SLOT`].
    fn bind_output_slot(&self, slot: u32, binding: Option<SlotBinding>) -> Result<()>;

    /// Create an output sink for the given target.
    fn create_output(&self, target: &OutputTarget) -> Result<OutputId>;

    /// Release an output. Stopped or never-started outputs only.
    fn release_output(&self, id: OutputId) -> Result<()>;

    /// Create a video+audio encoder pair suitable for any output.
    fn create_encoder_pair(&self) -> Result<EncoderPairId>;

    /// Attach an encoder pair to an output. Must precede `start_output`.
    fn bind_encoders(&self, output: OutputId, encoders: EncoderPairId) -> Result<()>;

    /// Start an output. Synchronous: the output is live on return.
    fn start_output(&self, id: OutputId) -> Result<()>;

    /// Begin stopping an output. Asynchronous: completion arrives
    /// later as a [`StopEvent`] through the installed stop handler.
    fn stop_output(&self, id: OutputId) -> Result<()>;

    /// Pause or unpause a running output.
    fn pause_output(&self, id: OutputId, paused: bool) -> Result<()>;

    /// Install the single callback receiving composed frames scaled to
    /// `width` x `height`. At most one callback may be live.
    fn add_frame_callback(&self, width: u32, height: u32, callback: FrameCallback) -> Result<()>;

    /// Remove the frame callback. Safe to call when none is installed.
    fn remove_frame_callback(&self) -> Result<()>;

    /// Install the handler receiving [`StopEvent`]s. Replaces any
    /// previous handler.
    fn set_stopped_handler(&self, handler: StopHandler) -> Result<()>;
}
