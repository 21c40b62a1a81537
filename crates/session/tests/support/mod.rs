//! Shared fixtures for the session integration tests: an in-memory
//! response sink, session factories, and a scripted engine that
//! records every call and fires events only when a test says so.

#![allow(dead_code)]

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use stagecast_common::{Result, SessionDefaults, StagecastError};
use stagecast_engine::{
    EncoderPairId, EnginePaths, FrameCallback, MediaEngine, OutputId, RawFrame, SceneId,
    SceneItemId, SimEngine, SlotBinding, SourceId, StopEvent, StopHandler,
};
use stagecast_protocol::{
    AudioConfig, DeviceInfo, OutputTarget, SourceKind, SourceSettings, Transform, VideoConfig,
};
use stagecast_session::{ResponseWriter, Session};

/// Response sink the tests can read back line by line.
#[derive(Clone, Default)]
pub struct Sink(Arc<Mutex<Vec<u8>>>);

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Sink {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Poll until the sink holds at least `count` lines.
    ///
    /// Deferred responses arrive from engine threads, so tests that
    /// assert on them wait instead of sleeping a fixed time.
    pub fn wait_for_lines(&self, count: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let lines = self.lines();
            if lines.len() >= count {
                return lines;
            }
            if Instant::now() > deadline {
                panic!("timed out waiting for {count} responses, have {lines:?}");
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

/// Session over the simulation engine, with its sink for inspection.
pub fn sim_session() -> (Arc<SimEngine>, Sink, Session) {
    let engine = Arc::new(SimEngine::new());
    let sink = Sink::default();
    let writer = Arc::new(ResponseWriter::new(sink.clone()));
    let session = Session::new(
        Arc::clone(&engine) as Arc<dyn MediaEngine>,
        SessionDefaults::default(),
        writer,
    )
    .unwrap();
    (engine, sink, session)
}

/// Session over the scripted engine.
pub fn scripted_session() -> (Arc<ScriptedEngine>, Sink, Session) {
    let engine = Arc::new(ScriptedEngine::new());
    let sink = Sink::default();
    let writer = Arc::new(ResponseWriter::new(sink.clone()));
    let session = Session::new(
        Arc::clone(&engine) as Arc<dyn MediaEngine>,
        SessionDefaults::default(),
        writer,
    )
    .unwrap();
    (engine, sink, session)
}

pub fn initialize(session: &mut Session) {
    session.handle_line(
        r#"{"action":"initialize","actionId":"init","pluginDir":"/p","exeDir":"/e","dataDir":"/d"}"#,
    );
}

/// Engine double that records every call in order and never delivers
/// an event on its own: tests fire stop completions and frames by
/// hand, which makes deferral observable without timing games.
pub struct ScriptedEngine {
    calls: Mutex<Vec<String>>,
    next: AtomicU64,
    outputs: Mutex<Vec<OutputId>>,
    stop_handler: Mutex<Option<StopHandler>>,
    frame_cb: Mutex<Option<FrameCallback>>,
    fail_start_output: AtomicBool,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        ScriptedEngine {
            calls: Mutex::new(Vec::new()),
            next: AtomicU64::new(0),
            outputs: Mutex::new(Vec::new()),
            stop_handler: Mutex::new(None),
            frame_cb: Mutex::new(None),
            fail_start_output: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Outputs created so far, in creation order.
    pub fn created_outputs(&self) -> Vec<OutputId> {
        self.outputs.lock().unwrap().clone()
    }

    /// Make the next `start_output` call fail.
    pub fn fail_next_start(&self) {
        self.fail_start_output.store(true, Ordering::SeqCst);
    }

    /// Deliver a stop completion through the installed handler.
    pub fn fire_stop(&self, output: OutputId, code: i32) {
        let guard = self.stop_handler.lock().unwrap();
        let handler = guard.as_ref().expect("no stop handler installed");
        handler(StopEvent { output, code });
    }

    /// Deliver one frame through the installed callback.
    pub fn fire_frame(&self, frame: &RawFrame) {
        let mut guard = self.frame_cb.lock().unwrap();
        let callback = guard.as_mut().expect("no frame callback installed");
        callback(frame);
    }

    pub fn frame_callback_installed(&self) -> bool {
        self.frame_cb.lock().unwrap().is_some()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn allocate(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl MediaEngine for ScriptedEngine {
    fn startup(&self, _: &EnginePaths, _: &VideoConfig, _: &AudioConfig) -> Result<()> {
        self.record("startup");
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.record("shutdown");
        Ok(())
    }

    fn reset_video(&self, config: &VideoConfig) -> Result<()> {
        if self.frame_cb.lock().unwrap().is_some() {
            return Err(StagecastError::engine(
                "video reset while frame callback registered",
            ));
        }
        self.record(format!(
            "reset_video {}x{}",
            config.layout.scaled_width, config.layout.scaled_height
        ));
        Ok(())
    }

    fn reset_audio(&self, _: &AudioConfig) -> Result<()> {
        self.record("reset_audio");
        Ok(())
    }

    fn create_source(&self, kind: SourceKind, _: &SourceSettings) -> Result<SourceId> {
        self.record(format!("create_source {kind}"));
        Ok(SourceId(self.allocate()))
    }

    fn update_source(&self, id: SourceId, _: &SourceSettings) -> Result<()> {
        self.record(format!("update_source {}", id.0));
        Ok(())
    }

    fn list_devices(&self, kind: SourceKind) -> Result<Vec<DeviceInfo>> {
        self.record(format!("list_devices {kind}"));
        Ok(vec![DeviceInfo::new("scripted-0", "Scripted Device")])
    }

    fn create_scene(&self, name: &str) -> Result<SceneId> {
        self.record(format!("create_scene {name}"));
        Ok(SceneId(self.allocate()))
    }

    fn release_scene(&self, id: SceneId) -> Result<()> {
        self.record(format!("release_scene {}", id.0));
        Ok(())
    }

    fn add_scene_item(&self, scene: SceneId, source: SourceId) -> Result<SceneItemId> {
        self.record(format!("add_scene_item {} {}", scene.0, source.0));
        Ok(SceneItemId(self.allocate()))
    }

    fn set_item_transform(&self, _: SceneId, item: SceneItemId, _: &Transform) -> Result<()> {
        self.record(format!("set_item_transform {}", item.0));
        Ok(())
    }

    fn bind_output_slot(&self, slot: u32, binding: Option<SlotBinding>) -> Result<()> {
        self.record(match binding {
            Some(SlotBinding::Scene(id)) => format!("bind_slot {slot} scene {}", id.0),
            Some(SlotBinding::Source(id)) => format!("bind_slot {slot} source {}", id.0),
            None => format!("bind_slot {slot} none"),
        });
        Ok(())
    }

    fn create_output(&self, target: &OutputTarget) -> Result<OutputId> {
        let id = OutputId(self.allocate());
        self.record(format!(
            "create_output {} {}",
            if target.is_stream() { "stream" } else { "file" },
            id.0
        ));
        self.outputs.lock().unwrap().push(id);
        Ok(id)
    }

    fn release_output(&self, id: OutputId) -> Result<()> {
        self.record(format!("release_output {}", id.0));
        Ok(())
    }

    fn create_encoder_pair(&self) -> Result<EncoderPairId> {
        self.record("create_encoder_pair");
        Ok(EncoderPairId(self.allocate()))
    }

    fn bind_encoders(&self, output: OutputId, _: EncoderPairId) -> Result<()> {
        self.record(format!("bind_encoders {}", output.0));
        Ok(())
    }

    fn start_output(&self, id: OutputId) -> Result<()> {
        if self.fail_start_output.swap(false, Ordering::SeqCst) {
            return Err(StagecastError::engine("scripted start failure"));
        }
        self.record(format!("start_output {}", id.0));
        Ok(())
    }

    fn stop_output(&self, id: OutputId) -> Result<()> {
        self.record(format!("stop_output {}", id.0));
        Ok(())
    }

    fn pause_output(&self, id: OutputId, paused: bool) -> Result<()> {
        self.record(format!("pause_output {} {paused}", id.0));
        Ok(())
    }

    fn add_frame_callback(&self, width: u32, height: u32, callback: FrameCallback) -> Result<()> {
        self.record(format!("add_frame_callback {width}x{height}"));
        *self.frame_cb.lock().unwrap() = Some(callback);
        Ok(())
    }

    fn remove_frame_callback(&self) -> Result<()> {
        self.record("remove_frame_callback");
        *self.frame_cb.lock().unwrap() = None;
        Ok(())
    }

    fn set_stopped_handler(&self, handler: StopHandler) -> Result<()> {
        *self.stop_handler.lock().unwrap() = Some(handler);
        Ok(())
    }
}
