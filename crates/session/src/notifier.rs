//! Response channel and deferred stop correlation.
//!
//! Responses come from two execution contexts: the command loop and
//! the engine threads that deliver stop completions. Both funnel
//! through [`ResponseWriter`] so JSON lines never interleave, and
//! [`StopNotifier`] holds the actionIds whose responses wait on a stop
//! completion event.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

use stagecast_common::Result;
use stagecast_engine::{MediaEngine, OutputId, StopEvent};
use stagecast_protocol::Response;

/// Serializes every response line onto one shared writer.
pub struct ResponseWriter {
    inner: Mutex<Box<dyn Write + Send>>,
}

impl ResponseWriter {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        ResponseWriter {
            inner: Mutex::new(Box::new(writer)),
        }
    }

    /// Write one response as a JSON line and flush it.
    ///
    /// Write failures are logged, not surfaced; callers on engine
    /// threads have nowhere to report them anyway.
    pub fn send(&self, response: &Response) {
        let line = match serde_json::to_string(response) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize response");
                return;
            }
        };
        let mut writer = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(err) = writeln!(writer, "{line}").and_then(|_| writer.flush()) {
            tracing::error!(error = %err, "failed to write response");
        }
    }
}

/// Correlates asynchronous stop completions with deferred responses.
pub struct StopNotifier {
    writer: Arc<ResponseWriter>,
    pending: Mutex<HashMap<u64, String>>,
}

impl StopNotifier {
    pub fn new(writer: Arc<ResponseWriter>) -> Self {
        StopNotifier {
            writer,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Remember that `action_id` awaits the completion of `output`.
    pub fn expect(&self, output: OutputId, action_id: &str) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.insert(output.0, action_id.to_string()) {
            // One pending stop per output; a second should have been
            // answered synchronously instead of deferred.
            tracing::warn!(
                output = output.0,
                action_id = previous,
                "replacing pending stop correlation"
            );
        }
    }

    /// Drop a pending correlation, returning the actionId it held.
    ///
    /// Used when the stop request itself fails after the expectation
    /// was registered, so the caller can answer synchronously instead.
    pub fn cancel(&self, output: OutputId) -> Option<String> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.remove(&output.0)
    }

    /// Emit the deferred response for a completed stop, if a command
    /// is waiting on it.
    pub fn complete(&self, event: StopEvent) {
        let waiting = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.remove(&event.output.0)
        };
        match waiting {
            Some(action_id) if event.code == 0 => {
                tracing::debug!(output = event.output.0, action_id, "stop completed");
                self.writer.send(&Response::ok(action_id));
            }
            Some(action_id) => {
                self.writer.send(&Response::error(
                    Some(action_id),
                    format!("output stopped with code {}", event.code),
                ));
            }
            None => {
                tracing::debug!(
                    output = event.output.0,
                    code = event.code,
                    "stop completed with no waiting command"
                );
            }
        }
    }

    /// Install this notifier as the engine's stop handler.
    pub fn install(self: &Arc<Self>, engine: &dyn MediaEngine) -> Result<()> {
        let notifier = Arc::clone(self);
        engine.set_stopped_handler(Box::new(move |event| notifier.complete(event)))
    }
}
