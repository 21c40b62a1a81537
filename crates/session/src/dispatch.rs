//! Command dispatch over the session state.
//!
//! A [`Session`] owns one engine and the live state built on it: the
//! source registry, the scene set, the output manager, and the frame
//! exporter. [`Session::handle_line`] parses one input line into the
//! closed command enum and routes it; every command except
//! `initialize` requires an initialized session and fails with a
//! precondition error otherwise.
//!
//! Handlers answer with a [`Disposition`]: either a response to emit
//! now, or `Deferred` for the two stop actions whose responses wait on
//! the engine's stop completion event.

use std::path::PathBuf;
use std::sync::Arc;

use stagecast_common::{Result, SessionClock, SessionDefaults, StagecastError};
use stagecast_engine::{EnginePaths, MediaEngine, AUDIO_SLOT};
use stagecast_protocol::{
    parse_line, Command, Response, SceneItemPlan, ScenePlan, SliceRegion, SourceKind,
    SourceSettings, Transform, VideoConfig,
};
use stagecast_protocol::{AudioConfig, VideoLayout};

use crate::exporter::FrameExporter;
use crate::notifier::{ResponseWriter, StopNotifier};
use crate::outputs::{OutputManager, StopOutcome};
use crate::registry::SourceRegistry;
use crate::scenes::SceneSet;

/// What a handled command leaves for the caller to emit.
#[derive(Debug)]
pub enum Disposition {
    /// Emit this response now.
    Reply(Response),
    /// The response is withheld; the stop notifier emits it when the
    /// engine confirms the output has stopped.
    Deferred,
}

/// Everything that exists only between `initialize` and `shutdown`.
struct ActiveSession {
    registry: SourceRegistry,
    scenes: SceneSet,
    outputs: OutputManager,
    exporter: FrameExporter,
    clock: SessionClock,
}

impl ActiveSession {
    /// Reset video geometry with the frame callback suspended.
    ///
    /// The engine refuses a reset while a callback is live, so the
    /// order is fixed: unregister, reset, re-register. The exporter
    /// layout (and, when given, its slice) is updated only on success;
    /// a failed reset leaves the previous geometry in force.
    fn apply_video(
        &mut self,
        engine: &dyn MediaEngine,
        config: VideoConfig,
        slice: Option<Option<SliceRegion>>,
    ) -> Result<()> {
        let was_live = self.exporter.suspend()?;
        let result = engine.reset_video(&config);
        if result.is_ok() {
            self.exporter
                .set_layout(config.layout.scaled_width, config.layout.scaled_height);
            if let Some(slice) = slice {
                self.exporter.set_slice(slice);
            }
        }
        if was_live {
            self.exporter.resume()?;
        }
        result
    }
}

/// One command-driven production session over one engine.
pub struct Session {
    engine: Arc<dyn MediaEngine>,
    defaults: SessionDefaults,
    writer: Arc<ResponseWriter>,
    notifier: Arc<StopNotifier>,
    active: Option<ActiveSession>,
}

impl Session {
    /// Build a session and install its stop handler on the engine.
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        defaults: SessionDefaults,
        writer: Arc<ResponseWriter>,
    ) -> Result<Self> {
        let notifier = Arc::new(StopNotifier::new(Arc::clone(&writer)));
        notifier.install(engine.as_ref())?;
        Ok(Session {
            engine,
            defaults,
            writer,
            notifier,
            active: None,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    /// Process one input line, emitting any synchronous response.
    ///
    /// Empty and whitespace-only lines are skipped. Unparseable lines
    /// are answered with an error response, correlated when the line
    /// got far enough to yield an `actionId`.
    pub fn handle_line(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        match parse_line(trimmed) {
            Ok(envelope) => {
                tracing::debug!(
                    action = envelope.command.name(),
                    action_id = envelope.action_id,
                    "command received"
                );
                let action_id = envelope.action_id;
                match self.dispatch(&action_id, envelope.command) {
                    Ok(Disposition::Reply(response)) => self.writer.send(&response),
                    Ok(Disposition::Deferred) => {}
                    Err(err) => {
                        tracing::warn!(action_id, error = %err, "command failed");
                        self.writer
                            .send(&Response::error(Some(action_id), err.response_message()));
                    }
                }
            }
            Err(failure) => {
                tracing::warn!(error = %failure.error, "unusable input line");
                self.writer.send(&Response::error(
                    failure.action_id,
                    failure.error.response_message(),
                ));
            }
        }
    }

    /// Tear the session down at end of input, if it is still up.
    pub fn finish(&mut self) {
        if self.active.is_none() {
            return;
        }
        tracing::info!("input closed with the session still up, shutting down");
        if let Err(err) = self.teardown() {
            tracing::warn!(error = %err, "shutdown at end of input failed");
        }
    }

    fn dispatch(&mut self, action_id: &str, command: Command) -> Result<Disposition> {
        let engine = Arc::clone(&self.engine);
        let notifier = Arc::clone(&self.notifier);

        match command {
            Command::Initialize {
                plugin_dir,
                exe_dir,
                data_dir,
            } => {
                if self.active.is_some() {
                    return Err(StagecastError::precondition(
                        "session is already initialized",
                    ));
                }
                let paths = EnginePaths {
                    plugin_dir: plugin_dir.into(),
                    exe_dir: exe_dir.into(),
                    data_dir: data_dir.into(),
                };
                engine.startup(
                    &paths,
                    &VideoConfig::from_defaults(&self.defaults),
                    &AudioConfig::from_defaults(&self.defaults),
                )?;

                let mut registry = SourceRegistry::new(Arc::clone(&engine));
                if let Err(err) = Self::create_default_sources(&mut registry) {
                    // Leave the engine down so initialize can be retried.
                    if let Err(err) = engine.shutdown() {
                        tracing::warn!(error = %err, "engine teardown after failed init");
                    }
                    return Err(err);
                }

                let exporter = FrameExporter::new(
                    Arc::clone(&engine),
                    self.defaults.scaled_width,
                    self.defaults.scaled_height,
                );
                self.active = Some(ActiveSession {
                    registry,
                    scenes: SceneSet::new(Arc::clone(&engine)),
                    outputs: OutputManager::new(Arc::clone(&engine)),
                    exporter,
                    clock: SessionClock::start(),
                });
                tracing::info!("session initialized");
                Ok(reply_ok(action_id))
            }

            Command::InitializeDisplay {
                display_num,
                window,
            } => {
                if display_num.is_none() && window.is_none() {
                    return Err(StagecastError::validation(
                        "displayNum or window is required",
                    ));
                }
                let active = self.active_mut()?;
                active.registry.update(SourceKind::Display, |settings| {
                    if let SourceSettings::Display {
                        display_num: num,
                        window: win,
                    } = settings
                    {
                        *num = display_num;
                        *win = window;
                    }
                })?;
                Ok(reply_ok(action_id))
            }

            Command::InitializeWebcam {
                input_width,
                input_height,
                device_id,
            } => {
                let active = self.active_mut()?;
                active.registry.update(SourceKind::Webcam, |settings| {
                    if let SourceSettings::Webcam {
                        device_id: id,
                        input_width: width,
                        input_height: height,
                    } = settings
                    {
                        *id = device_id;
                        *width = input_width;
                        *height = input_height;
                    }
                })?;
                Ok(reply_ok(action_id))
            }

            Command::InitializeAudio {
                device_id,
                sync_offset_ms,
            } => {
                let active = self.active_mut()?;
                active.registry.update(SourceKind::Microphone, |settings| {
                    if let SourceSettings::Microphone {
                        device_id: id,
                        sync_offset_ns,
                    } = settings
                    {
                        *id = device_id;
                        *sync_offset_ns = SessionClock::ms_to_ns(sync_offset_ms);
                    }
                })?;
                Ok(reply_ok(action_id))
            }

            Command::SetAudioDelay { audio_delay_ms } => {
                let active = self.active_mut()?;
                active.registry.update(SourceKind::Microphone, |settings| {
                    if let SourceSettings::Microphone { sync_offset_ns, .. } = settings {
                        *sync_offset_ns = SessionClock::ms_to_ns(audio_delay_ms);
                    }
                })?;
                Ok(reply_ok(action_id))
            }

            Command::InitializeSingleVideoRecording {
                layout,
                device_type,
                crop_left,
                crop_top,
                crop_right,
                crop_bottom,
            } => {
                if SourceKind::parse(&device_type).is_none() {
                    return Err(StagecastError::validation(format!(
                        "deviceType `{device_type}` is not a known source kind"
                    )));
                }
                let config = self.video_config(layout);
                let active = self.active_mut()?;
                active.apply_video(engine.as_ref(), config, None)?;
                let plan = ScenePlan {
                    item_sources: vec![SceneItemPlan {
                        kind: device_type,
                        transform: Transform::from_crops(
                            crop_left, crop_top, crop_right, crop_bottom,
                        ),
                    }],
                };
                active.scenes.rebuild(&[plan], &mut active.registry)?;
                Ok(reply_ok(action_id))
            }

            Command::InitializeScenes { scenes } => {
                let active = self.active_mut()?;
                active.scenes.rebuild(&scenes, &mut active.registry)?;
                Ok(reply_ok(action_id))
            }

            Command::InitializeRecording {
                layout,
                slice_x,
                slice_y,
                slice_width,
                slice_height,
            } => {
                let slice =
                    SliceRegion::from_optional_fields(slice_x, slice_y, slice_width, slice_height)
                        .map_err(|field| {
                            StagecastError::validation(format!(
                                "{field} is required when any slice field is present"
                            ))
                        })?;
                if let Some(region) = slice {
                    if !region.fits_within(layout.scaled_width, layout.scaled_height) {
                        return Err(StagecastError::validation(format!(
                            "slice {}x{} at ({}, {}) does not fit the {}x{} scaled output",
                            region.width,
                            region.height,
                            region.x,
                            region.y,
                            layout.scaled_width,
                            layout.scaled_height
                        )));
                    }
                }
                let config = self.video_config(layout);
                let active = self.active_mut()?;
                active.apply_video(engine.as_ref(), config, Some(slice))?;
                Ok(reply_ok(action_id))
            }

            Command::InitializeStreaming {
                layout,
                sources,
                scenes,
                output_file,
            } => {
                let config = self.video_config(layout);
                let active = self.active_mut()?;
                for plan in &sources {
                    match SourceKind::parse(&plan.kind) {
                        Some(kind) => {
                            active.registry.ensure_with(kind, plan.settings(kind))?;
                        }
                        None => {
                            tracing::warn!(kind = %plan.kind, "skipping source plan of unknown type");
                        }
                    }
                }
                active.apply_video(engine.as_ref(), config, None)?;
                active.scenes.rebuild(&scenes, &mut active.registry)?;
                active
                    .outputs
                    .set_prepared_file(Some(PathBuf::from(output_file)));
                Ok(reply_ok(action_id))
            }

            Command::SwitchToScene { scene_num } => {
                let active = self.active_mut()?;
                active.scenes.switch_to(scene_num)?;
                Ok(reply_ok(action_id))
            }

            Command::StartRecording { output_file } => {
                let active = self.active_mut()?;
                let mic = active.registry.get(SourceKind::Microphone);
                active
                    .outputs
                    .start_recording(PathBuf::from(output_file), mic)?;
                Ok(reply_ok(action_id))
            }

            Command::StartStreaming {
                stream_url,
                stream_key,
            } => {
                let active = self.active_mut()?;
                let mic = active.registry.get(SourceKind::Microphone);
                active
                    .outputs
                    .start_streaming(&stream_url, &stream_key, mic)?;
                Ok(reply_ok(action_id))
            }

            Command::PauseRecording => {
                let active = self.active_mut()?;
                active.outputs.pause_recording(true)?;
                Ok(reply_ok(action_id))
            }

            Command::ResumeRecording => {
                let active = self.active_mut()?;
                active.outputs.pause_recording(false)?;
                Ok(reply_ok(action_id))
            }

            Command::StopRecording => {
                let active = self.active_mut()?;
                let Some(output) = active.outputs.running_recording() else {
                    // Nothing to stop; answer now so the caller never
                    // waits on a completion that cannot come.
                    tracing::debug!("stop requested with no recording running");
                    return Ok(reply_ok(action_id));
                };
                // The expectation is registered before the engine stop
                // so the completion event cannot race past it.
                notifier.expect(output, action_id);
                match active.outputs.request_stop_recording() {
                    Ok(StopOutcome::Stopping(_)) => {
                        tracing::info!(
                            elapsed_secs = active.clock.elapsed_secs(),
                            "recording stop pending"
                        );
                        Ok(Disposition::Deferred)
                    }
                    Ok(StopOutcome::NotRunning) => {
                        notifier.cancel(output);
                        Ok(reply_ok(action_id))
                    }
                    Err(err) => {
                        notifier.cancel(output);
                        Err(err)
                    }
                }
            }

            Command::StopStreaming => {
                let active = self.active_mut()?;
                let Some(output) = active.outputs.running_stream() else {
                    tracing::debug!("stop requested with no stream running");
                    return Ok(reply_ok(action_id));
                };
                notifier.expect(output, action_id);
                match active.outputs.request_stop_streaming() {
                    Ok(StopOutcome::Stopping(_)) => {
                        tracing::info!(
                            elapsed_secs = active.clock.elapsed_secs(),
                            "stream stop pending"
                        );
                        Ok(Disposition::Deferred)
                    }
                    Ok(StopOutcome::NotRunning) => {
                        notifier.cancel(output);
                        Ok(reply_ok(action_id))
                    }
                    Err(err) => {
                        notifier.cancel(output);
                        Err(err)
                    }
                }
            }

            Command::Shutdown => {
                self.teardown()?;
                Ok(reply_ok(action_id))
            }

            Command::ListAudioInputDevices => {
                self.active_mut()?;
                let devices = engine.list_devices(SourceKind::Microphone)?;
                Ok(Disposition::Reply(Response::devices(action_id, devices)))
            }

            Command::ListWebcamDevices => {
                self.active_mut()?;
                let devices = engine.list_devices(SourceKind::Webcam)?;
                Ok(Disposition::Reply(Response::devices(action_id, devices)))
            }

            Command::ListDisplays => {
                self.active_mut()?;
                let devices = engine.list_devices(SourceKind::Display)?;
                Ok(Disposition::Reply(Response::devices(action_id, devices)))
            }

            Command::StartRenderFramesPipe { port } => {
                let active = self.active_mut()?;
                active.exporter.start_pipe(port)?;
                Ok(reply_ok(action_id))
            }

            Command::StopRenderFramesPipe => {
                let active = self.active_mut()?;
                active.exporter.stop_pipe()?;
                Ok(reply_ok(action_id))
            }
        }
    }

    fn active_mut(&mut self) -> Result<&mut ActiveSession> {
        self.active
            .as_mut()
            .ok_or_else(|| StagecastError::precondition("session is not initialized"))
    }

    fn video_config(&self, layout: VideoLayout) -> VideoConfig {
        // Commands carry geometry but never a frame rate; the session
        // keeps the rate it was initialized with.
        VideoConfig::new(layout, self.defaults.fps)
    }

    fn create_default_sources(registry: &mut SourceRegistry) -> Result<()> {
        for kind in SourceKind::ALL {
            registry.ensure(kind)?;
        }
        Ok(())
    }

    /// Release session state and shut the engine down.
    fn teardown(&mut self) -> Result<()> {
        let Some(mut active) = self.active.take() else {
            return Err(StagecastError::precondition("session is not initialized"));
        };
        if let Err(err) = active.exporter.stop_pipe() {
            tracing::warn!(error = %err, "failed to close frame pipe during shutdown");
        }
        active.outputs.clear();
        active.scenes.clear();
        if let Err(err) = self.engine.bind_output_slot(AUDIO_SLOT, None) {
            tracing::warn!(error = %err, "failed to clear audio slot during shutdown");
        }
        active.registry.clear();
        let uptime = active.clock.elapsed_secs();
        self.engine.shutdown()?;
        tracing::info!(
            uptime_secs = uptime,
            started_at = active.clock.epoch_wall(),
            "session shut down"
        );
        Ok(())
    }
}

fn reply_ok(action_id: &str) -> Disposition {
    Disposition::Reply(Response::ok(action_id))
}
