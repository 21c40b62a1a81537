//! Recording and streaming output paths.
//!
//! A session runs at most one file output and one stream output at a
//! time; both share a single encoder pair created on first use. The
//! streaming setup can prepare a file target that is then co-started
//! with the stream, so going live also records locally.
//!
//! Stops are asynchronous: a stop request marks the path idle here and
//! returns the output id the completion event will carry, leaving the
//! response correlation to the caller.

use std::path::PathBuf;
use std::sync::Arc;

use stagecast_common::{Result, StagecastError};
use stagecast_engine::{EncoderPairId, MediaEngine, OutputId, SlotBinding, SourceId, AUDIO_SLOT};
use stagecast_protocol::OutputTarget;

/// Outcome of a stop request for one output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running; the caller answers synchronously.
    NotRunning,
    /// Stop underway; the completion event will carry this id.
    Stopping(OutputId),
}

struct ManagedOutput {
    id: OutputId,
    running: bool,
}

pub struct OutputManager {
    engine: Arc<dyn MediaEngine>,
    encoders: Option<EncoderPairId>,
    recording: Option<ManagedOutput>,
    stream: Option<ManagedOutput>,
    prepared_file: Option<PathBuf>,
}

impl OutputManager {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        OutputManager {
            engine,
            encoders: None,
            recording: None,
            stream: None,
            prepared_file: None,
        }
    }

    /// File target the next `start_streaming` co-starts a recording to.
    pub fn set_prepared_file(&mut self, path: Option<PathBuf>) {
        self.prepared_file = path;
    }

    pub fn recording_running(&self) -> bool {
        self.recording.as_ref().is_some_and(|out| out.running)
    }

    pub fn stream_running(&self) -> bool {
        self.stream.as_ref().is_some_and(|out| out.running)
    }

    /// Id of the running file output, if any. Callers correlate stop
    /// completions against this before requesting the stop.
    pub fn running_recording(&self) -> Option<OutputId> {
        self.recording
            .as_ref()
            .filter(|out| out.running)
            .map(|out| out.id)
    }

    /// Id of the running stream output, if any.
    pub fn running_stream(&self) -> Option<OutputId> {
        self.stream
            .as_ref()
            .filter(|out| out.running)
            .map(|out| out.id)
    }

    /// Start the file output. `audio` is bound to the audio slot first
    /// so the output picks up the session microphone.
    pub fn start_recording(&mut self, path: PathBuf, audio: Option<SourceId>) -> Result<()> {
        if self.recording_running() {
            return Err(StagecastError::precondition(
                "recording already in progress",
            ));
        }
        if let Some(old) = self.recording.take() {
            self.release(old.id);
        }
        let target = OutputTarget::file(path);
        let id = self.start_new(&target, audio)?;
        self.recording = Some(ManagedOutput { id, running: true });
        tracing::info!(output = id.0, "recording started");
        Ok(())
    }

    /// Start the stream output, then co-start a recording to the
    /// prepared file target when one is set and no recording runs.
    pub fn start_streaming(
        &mut self,
        url: &str,
        key: &str,
        audio: Option<SourceId>,
    ) -> Result<()> {
        if self.stream_running() {
            return Err(StagecastError::precondition("stream already in progress"));
        }
        if url.trim().is_empty() {
            return Err(StagecastError::validation("streamURL must not be empty"));
        }
        if let Some(old) = self.stream.take() {
            self.release(old.id);
        }
        let target = OutputTarget::stream(url, key);
        let id = self.start_new(&target, audio)?;
        self.stream = Some(ManagedOutput { id, running: true });
        tracing::info!(output = id.0, "stream started");

        if let Some(path) = self.prepared_file.clone() {
            if !self.recording_running() {
                // The stream is already live; a failed local recording
                // is reported but does not take the stream down.
                if let Err(err) = self.start_recording(path, audio) {
                    tracing::warn!(error = %err, "failed to co-start recording with stream");
                }
            }
        }
        Ok(())
    }

    /// Pause or resume the file output. No-op when nothing records.
    pub fn pause_recording(&mut self, paused: bool) -> Result<()> {
        match self.recording.as_ref() {
            Some(output) if output.running => {
                self.engine.pause_output(output.id, paused)?;
                tracing::info!(output = output.id.0, paused, "recording pause toggled");
                Ok(())
            }
            _ => {
                tracing::debug!(paused, "pause ignored, no recording in progress");
                Ok(())
            }
        }
    }

    /// Ask the engine to stop the file output.
    pub fn request_stop_recording(&mut self) -> Result<StopOutcome> {
        match self.recording.as_mut() {
            Some(output) if output.running => {
                self.engine.stop_output(output.id)?;
                output.running = false;
                tracing::info!(output = output.id.0, "recording stop requested");
                Ok(StopOutcome::Stopping(output.id))
            }
            _ => Ok(StopOutcome::NotRunning),
        }
    }

    /// Ask the engine to stop the stream output. A running recording
    /// follows the stream down; its completion event is not correlated
    /// with this request.
    pub fn request_stop_streaming(&mut self) -> Result<StopOutcome> {
        let outcome = match self.stream.as_mut() {
            Some(output) if output.running => {
                self.engine.stop_output(output.id)?;
                output.running = false;
                tracing::info!(output = output.id.0, "stream stop requested");
                StopOutcome::Stopping(output.id)
            }
            _ => StopOutcome::NotRunning,
        };

        if self.recording_running() {
            if let Err(err) = self.request_stop_recording() {
                tracing::warn!(error = %err, "failed to stop recording with stream");
            }
        }
        Ok(outcome)
    }

    /// Drop all output bookkeeping. Running pipelines are torn down by
    /// engine shutdown, so only idle outputs are released here.
    pub fn clear(&mut self) {
        let outputs = self.recording.take().into_iter().chain(self.stream.take());
        for output in outputs {
            if !output.running {
                self.release(output.id);
            }
        }
        self.encoders = None;
        self.prepared_file = None;
    }

    fn start_new(&mut self, target: &OutputTarget, audio: Option<SourceId>) -> Result<OutputId> {
        let encoders = self.encoder_pair()?;
        if let Some(source) = audio {
            self.engine
                .bind_output_slot(AUDIO_SLOT, Some(SlotBinding::Source(source)))?;
        }
        let id = self.engine.create_output(target)?;
        if let Err(err) = self
            .engine
            .bind_encoders(id, encoders)
            .and_then(|_| self.engine.start_output(id))
        {
            self.release(id);
            return Err(err);
        }
        Ok(id)
    }

    fn encoder_pair(&mut self) -> Result<EncoderPairId> {
        if let Some(pair) = self.encoders {
            return Ok(pair);
        }
        let pair = self.engine.create_encoder_pair()?;
        self.encoders = Some(pair);
        Ok(pair)
    }

    fn release(&self, id: OutputId) {
        if let Err(err) = self.engine.release_output(id) {
            tracing::warn!(output = id.0, error = %err, "failed to release output");
        }
    }
}
