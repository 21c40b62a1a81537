//! Deterministic in-process media engine.
//!
//! `SimEngine` implements the full [`MediaEngine`] contract without
//! touching real capture hardware: sources, scenes, and outputs are
//! bookkeeping entries, composed frames are synthesized by a ticker
//! thread, and stop completions are delivered from a dedicated event
//! thread so the asynchronous stop contract behaves like the real
//! thing. Sessions run against it on machines with no media stack at
//! all, which is also what makes end-to-end tests reproducible.
//!
//! Synthetic frames are tightly packed RGBA where every byte of row
//! `r` holds `r & 0xff`, so slice extraction can be verified by eye.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use stagecast_common::{Result, StagecastError};
use stagecast_protocol::{
    AudioConfig, DeviceInfo, OutputTarget, SourceKind, SourceSettings, Transform, VideoConfig,
};

use crate::{
    EncoderPairId, EnginePaths, FrameCallback, MediaEngine, OutputId, RawFrame, SceneId,
    SceneItemId, SlotBinding, SourceId, StopEvent, StopHandler,
};

/// Delay between a stop request and its completion event.
///
/// Long enough that a response emitted synchronously would be caught
/// by tests, short enough to keep suites fast.
const STOP_COMPLETION_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct SimSource {
    kind: SourceKind,
    settings: SourceSettings,
}

#[derive(Debug)]
struct SimItem {
    id: u64,
    source: SourceId,
    transform: Transform,
}

#[derive(Debug)]
struct SimScene {
    name: String,
    items: Vec<SimItem>,
}

#[derive(Debug)]
struct SimOutput {
    target: OutputTarget,
    encoders: Option<EncoderPairId>,
    running: bool,
    paused: bool,
}

struct Ticker {
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

#[derive(Default)]
struct SimState {
    started: bool,
    video: Option<VideoConfig>,
    audio: Option<AudioConfig>,
    next_handle: u64,
    sources: HashMap<u64, SimSource>,
    scenes: HashMap<u64, SimScene>,
    outputs: HashMap<u64, SimOutput>,
    encoder_pairs: Vec<u64>,
    slots: HashMap<u32, SlotBinding>,
    ticker: Option<Ticker>,
}

impl SimState {
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

    fn source_mut(&mut self, id: SourceId) -> Result<&mut SimSource> {
        self.sources
            .get_mut(&id.0)
            .ok_or_else(|| StagecastError::engine(format!("unknown source handle {}", id.0)))
    }

    fn scene_mut(&mut self, id: SceneId) -> Result<&mut SimScene> {
        self.scenes
            .get_mut(&id.0)
            .ok_or_else(|| StagecastError::engine(format!("unknown scene handle {}", id.0)))
    }

    fn output_mut(&mut self, id: OutputId) -> Result<&mut SimOutput> {
        self.outputs
            .get_mut(&id.0)
            .ok_or_else(|| StagecastError::engine(format!("unknown output handle {}", id.0)))
    }
}

/// Simulation engine; see the module docs.
pub struct SimEngine {
    state: Mutex<SimState>,
    frame_cb: Arc<Mutex<Option<FrameCallback>>>,
    stop_handler: Arc<Mutex<Option<StopHandler>>>,
    stop_tx: mpsc::Sender<StopEvent>,
}

impl SimEngine {
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<StopEvent>();
        let stop_handler: Arc<Mutex<Option<StopHandler>>> = Arc::new(Mutex::new(None));

        // Event thread: serializes all stop completions so they reach
        // the handler one at a time, in request order, after the stop
        // call has already returned. Exits when the engine is dropped
        // and the channel closes.
        let handler_slot = Arc::clone(&stop_handler);
        std::thread::Builder::new()
            .name("sim-engine-events".to_string())
            .spawn(move || {
                while let Ok(event) = stop_rx.recv() {
                    std::thread::sleep(STOP_COMPLETION_DELAY);
                    let guard = handler_slot.lock().unwrap_or_else(|e| e.into_inner());
                    if let Some(handler) = guard.as_ref() {
                        handler(event);
                    } else {
                        tracing::warn!(output = event.output.0, "stop event with no handler installed");
                    }
                }
            })
            .ok();

        SimEngine {
            state: Mutex::new(SimState::default()),
            frame_cb: Arc::new(Mutex::new(None)),
            stop_handler,
            stop_tx,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Scene currently bound to a mixer slot, if any.
    pub fn bound_scene(&self, slot: u32) -> Option<SceneId> {
        match self.lock().slots.get(&slot) {
            Some(SlotBinding::Scene(id)) => Some(*id),
            _ => None,
        }
    }

    /// Source currently bound to a mixer slot, if any.
    pub fn bound_source(&self, slot: u32) -> Option<SourceId> {
        match self.lock().slots.get(&slot) {
            Some(SlotBinding::Source(id)) => Some(*id),
            _ => None,
        }
    }

    /// Whether an output is currently running.
    pub fn output_running(&self, id: OutputId) -> bool {
        self.lock().outputs.get(&id.0).is_some_and(|o| o.running)
    }

    /// Whether a running output is paused.
    pub fn output_paused(&self, id: OutputId) -> bool {
        self.lock().outputs.get(&id.0).is_some_and(|o| o.paused)
    }

    /// Current settings of a source.
    pub fn source_settings(&self, id: SourceId) -> Option<SourceSettings> {
        self.lock().sources.get(&id.0).map(|s| s.settings.clone())
    }

    /// Items of a scene in composition order.
    pub fn scene_items(&self, id: SceneId) -> Vec<(SceneItemId, SourceId, Transform)> {
        self.lock()
            .scenes
            .get(&id.0)
            .map(|scene| {
                scene
                    .items
                    .iter()
                    .map(|item| (SceneItemId(item.id), item.source, item.transform))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of live scenes.
    pub fn scene_count(&self) -> usize {
        self.lock().scenes.len()
    }

    fn stop_ticker(state: &Mutex<SimState>) {
        let ticker = {
            let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
            guard.ticker.take()
        };
        if let Some(ticker) = ticker {
            ticker.stop.store(true, Ordering::SeqCst);
            if ticker.join.join().is_err() {
                tracing::warn!("frame ticker thread panicked");
            }
        }
    }
}

impl Default for SimEngine {
    fn default() -> Self {
        SimEngine::new()
    }
}

/// Synthesize one packed RGBA frame: row `r` filled with byte `r`.
fn synthetic_frame(width: u32, height: u32, timestamp_ns: u64) -> RawFrame {
    let row_len = width as usize * stagecast_protocol::BYTES_PER_PIXEL;
    let mut data = Vec::with_capacity(row_len * height as usize);
    for row in 0..height {
        data.extend(std::iter::repeat(row as u8).take(row_len));
    }
    RawFrame {
        width,
        height,
        timestamp_ns,
        data,
    }
}

impl MediaEngine for SimEngine {
    fn startup(
        &self,
        paths: &EnginePaths,
        video: &VideoConfig,
        audio: &AudioConfig,
    ) -> Result<()> {
        let mut state = self.lock();
        if state.started {
            return Err(StagecastError::engine("engine already started"));
        }
        state.started = true;
        state.video = Some(*video);
        state.audio = Some(*audio);
        tracing::info!(
            plugin_dir = %paths.plugin_dir.display(),
            data_dir = %paths.data_dir.display(),
            fps = video.fps,
            sample_rate = audio.sample_rate,
            "simulation engine started"
        );
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        SimEngine::stop_ticker(&self.state);
        {
            let mut cb = self.frame_cb.lock().unwrap_or_else(|e| e.into_inner());
            *cb = None;
        }
        let mut state = self.lock();
        state.require_started()?;
        *state = SimState::default();
        tracing::info!("simulation engine shut down");
        Ok(())
    }

    fn reset_video(&self, config: &VideoConfig) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        if state.ticker.is_some() {
            return Err(StagecastError::engine(
                "video reset while frame callback registered",
            ));
        }
        state.video = Some(*config);
        tracing::debug!(
            input_width = config.layout.input_width,
            input_height = config.layout.input_height,
            output_width = config.layout.output_width,
            output_height = config.layout.output_height,
            fps = config.fps,
            "video reconfigured"
        );
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
            SimSource {
                kind,
                settings: settings.clone(),
            },
        );
        tracing::debug!(source = id, %kind, "source created");
        Ok(SourceId(id))
    }

    fn update_source(&self, id: SourceId, settings: &SourceSettings) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        let source = state.source_mut(id)?;
        if settings.kind() != source.kind {
            return Err(StagecastError::engine(format!(
                "settings are for {} but source {} is {}",
                settings.kind(),
                id.0,
                source.kind
            )));
        }
        source.settings = settings.clone();
        Ok(())
    }

    fn list_devices(&self, kind: SourceKind) -> Result<Vec<DeviceInfo>> {
        self.lock().require_started()?;
        Ok(match kind {
            SourceKind::Display => vec![
                DeviceInfo::new("SIM-0", "Simulated Display 0").with_geometry(1920, 1080),
                DeviceInfo::new("SIM-1", "Simulated Display 1").with_geometry(2560, 1440),
            ],
            SourceKind::Webcam => vec![
                DeviceInfo::new("/dev/video0", "Integrated Camera"),
                DeviceInfo::new("/dev/video2", "USB Capture"),
            ],
            SourceKind::Microphone => vec![
                DeviceInfo::new("default", "Built-in Microphone"),
                DeviceInfo::new("alsa_input.usb-mic", "USB Microphone"),
            ],
            SourceKind::DesktopAudio => {
                vec![DeviceInfo::new("@DEFAULT_MONITOR@", "System Audio Monitor")]
            }
        })
    }

    fn create_scene(&self, name: &str) -> Result<SceneId> {
        let mut state = self.lock();
        state.require_started()?;
        let id = state.allocate();
        state.scenes.insert(
            id,
            SimScene {
                name: name.to_string(),
                items: Vec::new(),
            },
        );
        tracing::debug!(scene = id, name, "scene created");
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
        let scene = state.scene_mut(scene)?;
        scene.items.push(SimItem {
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
        let scene = state.scene_mut(scene)?;
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
                tracing::debug!(slot, scene = id.0, "output slot bound to scene");
            }
            Some(SlotBinding::Source(id)) => {
                if !state.sources.contains_key(&id.0) {
                    return Err(StagecastError::engine(format!(
                        "unknown source handle {}",
                        id.0
                    )));
                }
                state.slots.insert(slot, SlotBinding::Source(id));
                tracing::debug!(slot, source = id.0, "output slot bound to source");
            }
            None => {
                state.slots.remove(&slot);
                tracing::debug!(slot, "output slot cleared");
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
            SimOutput {
                target: target.clone(),
                encoders: None,
                running: false,
                paused: false,
            },
        );
        tracing::debug!(output = id, stream = target.is_stream(), "output created");
        Ok(OutputId(id))
    }

    fn release_output(&self, id: OutputId) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        let running = state.output_mut(id)?.running;
        if running {
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
        let output = state.output_mut(id)?;
        if output.encoders.is_none() {
            return Err(StagecastError::engine(format!(
                "output {} has no encoders bound",
                id.0
            )));
        }
        if output.running {
            return Err(StagecastError::engine(format!(
                "output {} is already running",
                id.0
            )));
        }
        output.running = true;
        output.paused = false;
        tracing::info!(output = id.0, "output started");
        Ok(())
    }

    fn stop_output(&self, id: OutputId) -> Result<()> {
        {
            let mut state = self.lock();
            state.require_started()?;
            let output = state.output_mut(id)?;
            if !output.running {
                return Err(StagecastError::engine(format!(
                    "output {} is not running",
                    id.0
                )));
            }
            output.running = false;
            output.paused = false;
        }
        tracing::info!(output = id.0, "output stopping");
        // Completion is delivered later from the event thread.
        self.stop_tx
            .send(StopEvent {
                output: id,
                code: 0,
            })
            .map_err(|_| StagecastError::engine("engine event thread is gone"))?;
        Ok(())
    }

    fn pause_output(&self, id: OutputId, paused: bool) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        let output = state.output_mut(id)?;
        if !output.running {
            return Err(StagecastError::engine(format!(
                "output {} is not running",
                id.0
            )));
        }
        output.paused = paused;
        tracing::debug!(output = id.0, paused, "output pause state changed");
        Ok(())
    }

    fn add_frame_callback(&self, width: u32, height: u32, callback: FrameCallback) -> Result<()> {
        let mut state = self.lock();
        state.require_started()?;
        if state.ticker.is_some() {
            return Err(StagecastError::engine("frame callback already registered"));
        }
        let fps = state.video.map(|v| v.fps).unwrap_or(30).max(1);

        {
            let mut cb = self.frame_cb.lock().unwrap_or_else(|e| e.into_inner());
            *cb = Some(callback);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let cb_slot = Arc::clone(&self.frame_cb);
        let interval = Duration::from_nanos(1_000_000_000 / fps as u64);
        let join = std::thread::Builder::new()
            .name("sim-engine-frames".to_string())
            .spawn(move || {
                let mut index: u64 = 0;
                while !thread_stop.load(Ordering::SeqCst) {
                    let timestamp_ns = index * interval.as_nanos() as u64;
                    let frame = synthetic_frame(width, height, timestamp_ns);
                    {
                        let mut guard = cb_slot.lock().unwrap_or_else(|e| e.into_inner());
                        if let Some(callback) = guard.as_mut() {
                            callback(&frame);
                        }
                    }
                    index += 1;
                    std::thread::sleep(interval);
                }
            })
            .map_err(|err| StagecastError::engine(format!("failed to spawn ticker: {err}")))?;

        state.ticker = Some(Ticker { stop, join });
        tracing::info!(width, height, fps, "frame callback registered");
        Ok(())
    }

    fn remove_frame_callback(&self) -> Result<()> {
        SimEngine::stop_ticker(&self.state);
        let mut cb = self.frame_cb.lock().unwrap_or_else(|e| e.into_inner());
        if cb.take().is_some() {
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
