//! GStreamer-backed media engine (feature `gst`).
//!
//! One GStreamer pipeline per started output, plus a separate tap
//! pipeline for the raw-frame callback. Pipelines are described with
//! the launch fragments from [`crate::launch`] and materialized with
//! `gst::parse::launch`, so the wiring that matters is the part unit
//! tests already cover. Scene and source bookkeeping mirrors the
//! simulation engine; only the materialization differs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;

use stagecast_common::{Result, StagecastError};
use stagecast_protocol::{
    AudioConfig, DeviceInfo, OutputTarget, SourceKind, SourceSettings, Transform, VideoConfig,
};

use crate::launch::{self, CompositorPad};
use crate::{
    devices, displays, EncoderPairId, EnginePaths, FrameCallback, MediaEngine, OutputId, RawFrame,
    SceneId, SceneItemId, SlotBinding, SourceId, StopEvent, StopHandler, AUDIO_SLOT, VIDEO_SLOT,
};

const VIDEO_BITRATE_KBPS: u32 = 6_000;
const AUDIO_BITRATE_BPS: u32 = 160_000;

/// How long a stopping output may drain before it is forced to Null.
const STOP_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

fn init_gstreamer() -> Result<()> {
    static GST_INIT: OnceLock<std::result::Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(StagecastError::engine(format!(
            "failed to initialize GStreamer: {e}"
        ))),
    }
}

#[derive(Debug)]
struct GstSource {
    kind: SourceKind,
    settings: SourceSettings,
}

#[derive(Debug)]
struct GstItem {
    id: u64,
    source: SourceId,
    transform: Transform,
}

#[derive(Debug)]
struct GstScene {
    name: String,
    items: Vec<GstItem>,
}

struct GstOutput {
    target: OutputTarget,
    encoders: Option<EncoderPairId>,
    /// Present while the output pipeline is live.
    pipeline: Option<gst::Pipeline>,
}

#[derive(Default)]
struct GstState {
    started: bool,
    video: Option<VideoConfig>,
    audio: Option<AudioConfig>,
    next_handle: u64,
    sources: HashMap<u64, GstSource>,
    scenes: HashMap<u64, GstScene>,
    outputs: HashMap<u64, GstOutput>,
    encoder_pairs: Vec<u64>,
    slots: HashMap<u32, SlotBinding>,
    monitors: Vec<displays::MonitorGeometry>,
    tap: Option<gst::Pipeline>,
}

impl GstState {
    fn require_started(&self) -> Result<()> {
        if !self.started {
            return Err(StagecastError::engine("engine not started"));
        }
        Ok(())
    }

    fn allocate(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn video_config(&self) -> Result<VideoConfig> {
        self.video
            .ok_or_else(|| StagecastError::engine("video not configured"))
    }

    fn audio_config(&self) -> Result<AudioConfig> {
        self.audio
            .ok_or_else(|| StagecastError::engine("audio not configured"))
    }

    fn output_mut(&mut self, id: OutputId) -> Result<&mut GstOutput> {
        self.outputs
            .get_mut(&id.0)
            .ok_or_else(|| StagecastError::engine(format!("unknown output handle {}", id.0)))
    }
}

/// GStreamer engine; see the module docs.
pub struct GstEngine {
    state: Mutex<GstState>,
    stop_handler: Arc<Mutex<Option<StopHandler>>>,
}

impl GstEngine {
    pub fn new() -> Self {
        GstEngine {
            state: Mutex::new(GstState::default()),
            stop_handler: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GstState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for GstEngine {
    fn default() -> Self {
        GstEngine::new()
    }
}

/// Build the launch description for one scene's composition graph.
///
/// `video_tail` consumes the compositor (`mix`) output; `audio_tail`,
/// when present, consumes the audio mixer (`amix`) output. Scenes with
/// no live producer on either graph get a silent/black bed element, as
/// aggregators without sink pads never preroll.
fn scene_launch(
    state: &GstState,
    scene_id: SceneId,
    video_tail: &str,
    audio_tail: Option<&str>,
) -> Result<String> {
    let scene = state
        .scenes
        .get(&scene_id.0)
        .ok_or_else(|| StagecastError::engine(format!("unknown scene handle {}", scene_id.0)))?;
    let video = state.video_config()?;
    let audio = state.audio_config()?;
    let fps = video.fps;

    let mut video_branches: Vec<String> = Vec::new();
    let mut pads: Vec<CompositorPad> = Vec::new();
    let mut audio_branches: Vec<String> = Vec::new();

    for item in &scene.items {
        let source = state.sources.get(&item.source.0).ok_or_else(|| {
            StagecastError::engine(format!("unknown source handle {}", item.source.0))
        })?;
        match &source.settings {
            SourceSettings::Display {
                display_num,
                window,
            } => {
                let region = match (window, display_num) {
                    (Some(_), _) => None,
                    (None, Some(n)) => Some(
                        displays::monitor_region(&state.monitors, Some(*n)).ok_or_else(|| {
                            StagecastError::engine(format!("display {n} not found"))
                        })?,
                    ),
                    (None, None) => displays::monitor_region(&state.monitors, None),
                };
                let bin = launch::display_source_bin(region, window.as_deref(), fps)?;
                let native = region
                    .map(|r| (r.2, r.3))
                    .unwrap_or((video.layout.input_width, video.layout.input_height));
                push_video_branch(&mut video_branches, &mut pads, bin, &item.transform, native);
            }
            SourceSettings::Webcam {
                device_id,
                input_width,
                input_height,
            } => {
                let bin = launch::webcam_source_bin(device_id, *input_width, *input_height, fps);
                push_video_branch(
                    &mut video_branches,
                    &mut pads,
                    bin,
                    &item.transform,
                    (*input_width, *input_height),
                );
            }
            SourceSettings::Microphone {
                device_id,
                sync_offset_ns,
            } => {
                if *sync_offset_ns < 0 {
                    tracing::warn!(
                        offset_ns = *sync_offset_ns,
                        "negative audio sync offset cannot be applied, clamping to zero"
                    );
                }
                audio_branches.push(format!(
                    "{} ! amix.",
                    launch::microphone_source_bin(device_id, *sync_offset_ns, audio.sample_rate)
                ));
            }
            SourceSettings::DesktopAudio { device_id } => {
                audio_branches.push(format!(
                    "{} ! amix.",
                    launch::desktop_audio_source_bin(device_id.as_deref(), audio.sample_rate)
                ));
            }
        }
    }

    if video_branches.is_empty() {
        video_branches.push("videotestsrc pattern=black is-live=true ! mix.sink_0".to_string());
        pads.push(CompositorPad {
            index: 0,
            xpos: 0,
            ypos: 0,
            width: Some(video.layout.input_width),
            height: Some(video.layout.input_height),
        });
    }

    let mut parts = vec![format!(
        "{} {video_tail}",
        launch::compositor_fragment("mix", &pads)
    )];
    if let Some(audio_tail) = audio_tail {
        if audio_branches.is_empty() {
            // Scenes without audio items fall back to the source bound
            // to the audio slot, then to silence.
            if let Some(branch) = audio_slot_branch(state, &audio) {
                audio_branches.push(branch);
            } else {
                audio_branches.push("audiotestsrc wave=silence is-live=true ! amix.".to_string());
            }
        }
        parts.push(format!(
            "{} {audio_tail}",
            launch::audiomixer_fragment("amix")
        ));
        parts.extend(audio_branches);
    }
    parts.extend(video_branches);
    Ok(parts.join(" "))
}

/// Launch branch for the source bound to the audio slot, if that
/// binding points at an audio source.
fn audio_slot_branch(state: &GstState, audio: &AudioConfig) -> Option<String> {
    let Some(SlotBinding::Source(id)) = state.slots.get(&AUDIO_SLOT) else {
        return None;
    };
    let source = state.sources.get(&id.0)?;
    match &source.settings {
        SourceSettings::Microphone {
            device_id,
            sync_offset_ns,
        } => Some(format!(
            "{} ! amix.",
            launch::microphone_source_bin(device_id, *sync_offset_ns, audio.sample_rate)
        )),
        SourceSettings::DesktopAudio { device_id } => Some(format!(
            "{} ! amix.",
            launch::desktop_audio_source_bin(device_id.as_deref(), audio.sample_rate)
        )),
        _ => None,
    }
}

fn push_video_branch(
    branches: &mut Vec<String>,
    pads: &mut Vec<CompositorPad>,
    bin: String,
    transform: &Transform,
    native: (u32, u32),
) {
    let index = pads.len();
    let crop = launch::videocrop_fragment(transform);
    branches.push(format!("{bin}{crop} ! mix.sink_{index}"));
    pads.push(CompositorPad::from_transform(
        index, transform, native.0, native.1,
    ));
}

fn parse_pipeline(description: &str) -> Result<gst::Pipeline> {
    tracing::debug!(%description, "building pipeline");
    let element = gst::parse::launch(description)
        .map_err(|e| StagecastError::engine(format!("failed to build pipeline: {e}")))?;
    element
        .dynamic_cast::<gst::Pipeline>()
        .map_err(|_| StagecastError::engine("launch description did not produce a pipeline"))
}

fn play_pipeline(pipeline: &gst::Pipeline, name: &str) -> Result<()> {
    pipeline.set_state(gst::State::Playing).map_err(|e| {
        StagecastError::engine(format!("failed to start {name} pipeline: {e:?}"))
    })?;

    // State changes are asynchronous; wait so capture devices are
    // actually open when this returns.
    match pipeline.state(gst::ClockTime::from_seconds(10)) {
        (Ok(_), gst::State::Playing, _) => Ok(()),
        (Ok(_), state, _) => {
            tracing::warn!(pipeline = name, ?state, "pipeline slow to reach Playing");
            Ok(())
        }
        (Err(e), _, _) => Err(StagecastError::engine(format!(
            "{name} pipeline failed to reach Playing: {e:?}"
        ))),
    }
}

/// Drain a stopping pipeline: EOS, wait for it to travel, then Null.
///
/// Returns the stop code, zero for a clean drain. Runs on the stop
/// thread, never on the command path.
fn drain_and_stop(pipeline: &gst::Pipeline, name: &str) -> i32 {
    let mut code = 0;
    if !pipeline.send_event(gst::event::Eos::new()) {
        tracing::warn!(pipeline = name, "failed to send EOS; output may be truncated");
    } else if let Some(bus) = pipeline.bus() {
        let start = std::time::Instant::now();
        loop {
            let elapsed = start.elapsed();
            if elapsed >= STOP_DRAIN_TIMEOUT {
                tracing::warn!(pipeline = name, "EOS drain timed out");
                break;
            }
            let remaining = STOP_DRAIN_TIMEOUT - elapsed;
            let timeout = gst::ClockTime::from_nseconds(remaining.as_nanos() as u64);
            match bus.timed_pop(timeout) {
                Some(msg) => match msg.view() {
                    gst::MessageView::Eos(_) => {
                        tracing::debug!(pipeline = name, "EOS received; pipeline drained");
                        break;
                    }
                    gst::MessageView::Error(e) => {
                        tracing::warn!(pipeline = name, error = %e.error(), "error during EOS drain");
                        code = 1;
                        break;
                    }
                    _ => {}
                },
                None => {
                    tracing::warn!(pipeline = name, "EOS drain timed out");
                    break;
                }
            }
        }
    }

    if pipeline.set_state(gst::State::Null).is_err() {
        tracing::warn!(pipeline = name, "failed to reach Null state");
        code = 1;
    }
    code
}

impl MediaEngine for GstEngine {
    fn startup(
        &self,
        paths: &EnginePaths,
        video: &VideoConfig,
        audio: &AudioConfig,
    ) -> Result<()> {
        init_gstreamer()?;
        let mut state = self.lock();
        if state.started {
            return Err(StagecastError::engine("engine already started"));
        }
        state.started = true;
        state.video = Some(*video);
        state.audio = Some(*audio);
        state.monitors = displays::detect_monitors();
        tracing::info!(
            plugin_dir = %paths.plugin_dir.display(),
            data_dir = %paths.data_dir.display(),
            monitors = state.monitors.len(),
            fps = video.fps,
            "GStreamer engine started"
        );
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        if let Some(tap) = state.tap.take() {
            let _ = tap.set_state(gst::State::Null);
        }
        for (id, output) in state.outputs.iter_mut() {
            if let Some(pipeline) = output.pipeline.take() {
                tracing::warn!(output = id, "output still live at shutdown, forcing Null");
                let _ = pipeline.set_state(gst::State::Null);
            }
        }
        *state = GstState::default();
        tracing::info!("GStreamer engine shut down");
        Ok(())
    }

    fn reset_video(&self, config: &VideoConfig) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        if state.tap.is_some() {
            return Err(StagecastError::engine(
                "video reset while frame callback registered",
            ));
        }
        state.video = Some(*config);
        Ok(())
    }

    fn reset_audio(&self, config: &AudioConfig) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        state.audio = Some(*config);
        Ok(())
    }

    fn create_source(&self, kind: SourceKind, settings: &SourceSettings) -> Result<SourceId> {
        let mut state = self.lock();
        state.require_started()?;
        if settings.kind() != kind {
            return Err(StagecastError::engine(format!(
                "settings are for {} but source is {kind}",
                settings.kind()
            )));
        }
        let id = state.allocate();
        state.sources.insert(
            id,
            GstSource {
                kind,
                settings: settings.clone(),
            },
        );
        Ok(SourceId(id))
    }

    fn update_source(&self, id: SourceId, settings: &SourceSettings) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        let source = state
            .sources
            .get_mut(&id.0)
            .ok_or_else(|| StagecastError::engine(format!("unknown source handle {}", id.0)))?;
        if settings.kind() != source.kind {
            return Err(StagecastError::engine(format!(
                "settings are for {} but source {} is {}",
                settings.kind(),
                id.0,
                source.kind
            )));
        }
        // Settings take effect in pipelines built after this call;
        // already-running outputs keep their original graph.
        source.settings = settings.clone();
        Ok(())
    }

    fn list_devices(&self, kind: SourceKind) -> Result<Vec<DeviceInfo>> {
        let mut state = self.lock();
        state.require_started()?;
        Ok(match kind {
            SourceKind::Display => {
                state.monitors = displays::detect_monitors();
                displays::monitors_as_devices(&state.monitors)
            }
            SourceKind::Webcam => devices::list_webcams(),
            SourceKind::Microphone => devices::list_audio_sources(false),
            SourceKind::DesktopAudio => devices::list_audio_sources(true),
        })
    }

    fn create_scene(&self, name: &str) -> Result<SceneId> {
        let mut state = self.lock();
        state.require_started()?;
        let id = state.allocate();
        state.scenes.insert(
            id,
            GstScene {
                name: name.to_string(),
                items: Vec::new(),
            },
        );
        Ok(SceneId(id))
    }

    fn release_scene(&self, id: SceneId) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        let bound = state
            .slots
            .values()
            .any(|binding| matches!(binding, SlotBinding::Scene(bound) if *bound == id));
        if bound {
            return Err(StagecastError::engine(format!(
                "scene {} is still bound to an output slot",
                id.0
            )));
        }
        let scene = state
            .scenes
            .remove(&id.0)
            .ok_or_else(|| StagecastError::engine(format!("unknown scene handle {}", id.0)))?;
        tracing::debug!(scene = id.0, name = scene.name, "scene released");
        Ok(())
    }

    fn add_scene_item(&self, scene: SceneId, source: SourceId) -> Result<SceneItemId> {
        let mut state = self.lock();
        state.require_started()?;
        if !state.sources.contains_key(&source.0) {
            return Err(StagecastError::engine(format!(
                "unknown source handle {}",
                source.0
            )));
        }
        let item_id = state.allocate();
        let scene = state
            .scenes
            .get_mut(&scene.0)
            .ok_or_else(|| StagecastError::engine(format!("unknown scene handle {}", scene.0)))?;
        scene.items.push(GstItem {
            id: item_id,
            source,
            transform: Transform::IDENTITY,
        });
        Ok(SceneItemId(item_id))
    }

    fn set_item_transform(
        &self,
        scene: SceneId,
        item: SceneItemId,
        transform: &Transform,
    ) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        let scene = state
            .scenes
            .get_mut(&scene.0)
            .ok_or_else(|| StagecastError::engine(format!("unknown scene handle {}", scene.0)))?;
        let entry = scene
            .items
            .iter_mut()
            .find(|candidate| candidate.id == item.0)
            .ok_or_else(|| StagecastError::engine(format!("unknown scene item {}", item.0)))?;
        entry.transform = *transform;
        Ok(())
    }

    fn bind_output_slot(&self, slot: u32, binding: Option<SlotBinding>) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        match binding {
            Some(SlotBinding::Scene(id)) => {
                if !state.scenes.contains_key(&id.0) {
                    return Err(StagecastError::engine(format!(
                        "unknown scene handle {}",
                        id.0
                    )));
                }
                state.slots.insert(slot, SlotBinding::Scene(id));
            }
            Some(SlotBinding::Source(id)) => {
                if !state.sources.contains_key(&id.0) {
                    return Err(StagecastError::engine(format!(
                        "unknown source handle {}",
                        id.0
                    )));
                }
                state.slots.insert(slot, SlotBinding::Source(id));
            }
            None => {
                state.slots.remove(&slot);
            }
        }
        Ok(())
    }

    fn create_output(&self, target: &OutputTarget) -> Result<OutputId> {
        let mut state = self.lock();
        state.require_started()?;
        let id = state.allocate();
        state.outputs.insert(
            id,
            GstOutput {
                target: target.clone(),
                encoders: None,
                pipeline: None,
            },
        );
        Ok(OutputId(id))
    }

    fn release_output(&self, id: OutputId) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        if state.output_mut(id)?.pipeline.is_some() {
            return Err(StagecastError::engine(format!(
                "output {} is still running",
                id.0
            )));
        }
        state.outputs.remove(&id.0);
        Ok(())
    }

    fn create_encoder_pair(&self) -> Result<EncoderPairId> {
        let mut state = self.lock();
        state.require_started()?;
        let id = state.allocate();
        state.encoder_pairs.push(id);
        Ok(EncoderPairId(id))
    }

    fn bind_encoders(&self, output: OutputId, encoders: EncoderPairId) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        if !state.encoder_pairs.contains(&encoders.0) {
            return Err(StagecastError::engine(format!(
                "unknown encoder pair {}",
                encoders.0
            )));
        }
        state.output_mut(output)?.encoders = Some(encoders);
        Ok(())
    }

    fn start_output(&self, id: OutputId) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        let video = state.video_config()?;
        let scene = match state.slots.get(&VIDEO_SLOT) {
            Some(SlotBinding::Scene(id)) => *id,
            _ => return Err(StagecastError::engine("no scene bound to the video slot")),
        };

        let output = state.output_mut(id)?;
        if output.encoders.is_none() {
            return Err(StagecastError::engine(format!(
                "output {} has no encoders bound",
                id.0
            )));
        }
        if output.pipeline.is_some() {
            return Err(StagecastError::engine(format!(
                "output {} is already running",
                id.0
            )));
        }
        let target = output.target.clone();

        let mux_name = format!("mux{}", id.0);
        let sink = launch::mux_sink_fragment(&target, &mux_name)?;
        let video_tail = format!(
            "! videoscale ! videoconvert ! video/x-raw,width={},height={} ! {} ! {mux_name}.",
            video.layout.output_width,
            video.layout.output_height,
            launch::video_encode_fragment(video.fps, VIDEO_BITRATE_KBPS)
        );
        let audio_tail = format!(
            "! audioconvert ! audioresample ! {} ! {mux_name}.",
            launch::audio_encode_fragment(AUDIO_BITRATE_BPS)
        );
        let description = format!(
            "{} {sink}",
            scene_launch(&state, scene, &video_tail, Some(&audio_tail))?
        );

        let name = format!("output{}", id.0);
        let pipeline = parse_pipeline(&description)?;
        play_pipeline(&pipeline, &name)?;
        state.output_mut(id)?.pipeline = Some(pipeline);
        tracing::info!(output = id.0, stream = target.is_stream(), "output started");
        Ok(())
    }

    fn stop_output(&self, id: OutputId) -> Result<()> {
        let pipeline = {
            let mut state = self.lock();
            state.require_started()?;
            state.output_mut(id)?.pipeline.take().ok_or_else(|| {
                StagecastError::engine(format!("output {} is not running", id.0))
            })?
        };

        let handler = Arc::clone(&self.stop_handler);
        let name = format!("output{}", id.0);
        let spawned = std::thread::Builder::new()
            .name(format!("gst-stop-{}", id.0))
            .spawn(move || {
                let code = drain_and_stop(&pipeline, &name);
                let guard = handler.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(handler) = guard.as_ref() {
                    handler(StopEvent { output: id, code });
                } else {
                    tracing::warn!(output = id.0, "stop completed with no handler installed");
                }
            });
        if spawned.is_err() {
            return Err(StagecastError::engine("failed to spawn stop thread"));
        }
        tracing::info!(output = id.0, "output stopping");
        Ok(())
    }

    fn pause_output(&self, id: OutputId, paused: bool) -> Result<()> {
        let state = self.lock();
        state.require_started()?;
        let output = state
            .outputs
            .get(&id.0)
            .ok_or_else(|| StagecastError::engine(format!("unknown output handle {}", id.0)))?;
        let pipeline = output.pipeline.as_ref().ok_or_else(|| {
            StagecastError::engine(format!("output {} is not running", id.0))
        })?;
        let target_state = if paused {
            gst::State::Paused
        } else {
            gst::State::Playing
        };
        pipeline.set_state(target_state).map_err(|e| {
            StagecastError::engine(format!("failed to change output {} state: {e:?}", id.0))
        })?;
        Ok(())
    }

    fn add_frame_callback(&self, width: u32, height: u32, callback: FrameCallback) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        if state.tap.is_some() {
            return Err(StagecastError::engine("frame callback already registered"));
        }

        let tap_tail = format!("! {}", launch::frame_tap_fragment(width, height));
        let description = match state.slots.get(&VIDEO_SLOT) {
            Some(SlotBinding::Scene(scene)) => scene_launch(&state, *scene, &tap_tail, None)?,
            // No scene bound yet: tap a black canvas so registration
            // still succeeds and frames still flow.
            _ => format!("videotestsrc pattern=black is-live=true {tap_tail}"),
        };

        let pipeline = parse_pipeline(&description)?;
        let appsink = pipeline
            .by_name(launch::FRAME_TAP_SINK)
            .and_then(|element| element.dynamic_cast::<gst_app::AppSink>().ok())
            .ok_or_else(|| StagecastError::engine("tap pipeline is missing its appsink"))?;

        let mut callback = callback;
        appsink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                    let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;
                    let frame = RawFrame {
                        width,
                        height,
                        timestamp_ns: buffer.pts().map(gst::ClockTime::nseconds).unwrap_or(0),
                        data: map.as_slice().to_vec(),
                    };
                    callback(&frame);
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        play_pipeline(&pipeline, "frame-tap")?;
        state.tap = Some(pipeline);
        tracing::info!(width, height, "frame callback registered");
        Ok(())
    }

    fn remove_frame_callback(&self) -> Result<()> {
        let tap = self.lock().tap.take();
        if let Some(tap) = tap {
            let _ = tap.set_state(gst::State::Null);
            tracing::info!("frame callback removed");
        }
        Ok(())
    }

    fn set_stopped_handler(&self, handler: StopHandler) -> Result<()> {
        let mut guard = self.stop_handler.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(handler);
        Ok(())
    }
}
