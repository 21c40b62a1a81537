//! Raw composed-frame export over a loopback socket.
//!
//! `startRenderFramesPipe` connects out to a caller-owned port and
//! registers the engine frame callback; every composed frame (or the
//! configured slice of it) is then written to the socket as packed
//! RGBA bytes. Writes happen on the engine's frame thread and are
//! synchronous, so a stalled receiver stalls frame delivery with it;
//! there is no buffering between the engine and the socket.
//!
//! Dimensions and the slice region are captured when the callback is
//! registered and must not change while it is live; the video-reset
//! path suspends the callback, applies the new geometry, and resumes.

use std::io::Write;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use stagecast_common::{Result, StagecastError};
use stagecast_engine::{MediaEngine, RawFrame};
use stagecast_protocol::{frame_byte_len, SliceRegion};

pub struct FrameExporter {
    engine: Arc<dyn MediaEngine>,
    socket: Arc<Mutex<Option<TcpStream>>>,
    slice: Option<SliceRegion>,
    width: u32,
    height: u32,
    registered: bool,
}

impl FrameExporter {
    pub fn new(engine: Arc<dyn MediaEngine>, width: u32, height: u32) -> Self {
        FrameExporter {
            engine,
            socket: Arc::new(Mutex::new(None)),
            slice: None,
            width,
            height,
            registered: false,
        }
    }

    /// Scaled dimensions frames are delivered at. Only valid while the
    /// callback is not live.
    pub fn set_layout(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Sub-rectangle to export instead of the full frame. Only valid
    /// while the callback is not live.
    pub fn set_slice(&mut self, slice: Option<SliceRegion>) {
        self.slice = slice;
    }

    pub fn slice(&self) -> Option<SliceRegion> {
        self.slice
    }

    /// Connect to `127.0.0.1:port` and start forwarding frames.
    ///
    /// After a write failure severed the socket, calling this again
    /// reconnects without touching the still-registered callback.
    pub fn start_pipe(&mut self, port: u16) -> Result<()> {
        if self.registered && self.connected() {
            return Err(StagecastError::precondition("frame pipe already active"));
        }

        let stream = TcpStream::connect(("127.0.0.1", port)).map_err(|err| {
            StagecastError::export(format!("failed to connect to 127.0.0.1:{port}: {err}"))
        })?;
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!(error = %err, "could not disable Nagle on frame socket");
        }
        {
            let mut socket = self.socket.lock().unwrap_or_else(|e| e.into_inner());
            *socket = Some(stream);
        }

        if !self.registered {
            if let Err(err) = self.register() {
                let mut socket = self.socket.lock().unwrap_or_else(|e| e.into_inner());
                *socket = None;
                return Err(err);
            }
        }
        tracing::info!(port, "frame pipe connected");
        Ok(())
    }

    /// Unregister the callback and close the socket. Safe to repeat.
    pub fn stop_pipe(&mut self) -> Result<()> {
        if self.registered {
            self.engine.remove_frame_callback()?;
            self.registered = false;
        }
        let closed = {
            let mut socket = self.socket.lock().unwrap_or_else(|e| e.into_inner());
            socket.take().is_some()
        };
        if closed {
            tracing::info!("frame pipe closed");
        }
        Ok(())
    }

    /// Take the callback down ahead of a video reset. Returns whether
    /// it was live, for [`resume`].
    ///
    /// [`resume`]: FrameExporter::resume
    pub fn suspend(&mut self) -> Result<bool> {
        if !self.registered {
            return Ok(false);
        }
        self.engine.remove_frame_callback()?;
        self.registered = false;
        Ok(true)
    }

    /// Re-register the callback with the current geometry, keeping the
    /// open socket.
    pub fn resume(&mut self) -> Result<()> {
        if self.registered {
            return Ok(());
        }
        self.register()
    }

    fn connected(&self) -> bool {
        self.socket
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn register(&mut self) -> Result<()> {
        let socket = Arc::clone(&self.socket);
        let slice = self.slice;
        let mut scratch: Vec<u8> = Vec::new();
        self.engine.add_frame_callback(
            self.width,
            self.height,
            Box::new(move |frame| forward_frame(frame, slice, &socket, &mut scratch)),
        )?;
        self.registered = true;
        Ok(())
    }
}

/// Forward one composed frame, slicing when configured.
///
/// A frame whose geometry disagrees with the configured slice is
/// skipped. A failed write severs the socket but leaves the callback
/// registered; the caller reissues the pipe command to reconnect.
fn forward_frame(
    frame: &RawFrame,
    slice: Option<SliceRegion>,
    socket: &Mutex<Option<TcpStream>>,
    scratch: &mut Vec<u8>,
) {
    if frame.data.len() < frame_byte_len(frame.width, frame.height) {
        tracing::warn!(
            width = frame.width,
            height = frame.height,
            len = frame.data.len(),
            "short frame buffer, skipping"
        );
        return;
    }

    let payload: &[u8] = match slice {
        Some(region) => {
            if !region.fits_within(frame.width, frame.height) {
                tracing::warn!(
                    width = frame.width,
                    height = frame.height,
                    "slice does not fit the delivered frame, skipping"
                );
                return;
            }
            region.extract_into(&frame.data, frame.width, scratch);
            scratch.as_slice()
        }
        None => &frame.data,
    };

    let mut guard = socket.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(stream) = guard.as_mut() {
        if let Err(err) = stream.write_all(payload) {
            tracing::warn!(error = %err, "frame socket write failed, closing pipe");
            *guard = None;
        }
    }
}
