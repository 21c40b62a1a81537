//! The line loop that turns a reader and a writer into a session.
//!
//! Generic over `BufRead`/`Write` so the binary can pass locked stdio
//! and tests can pass in-memory pipes. Commands run strictly one at a
//! time on the calling thread; deferred stop responses arrive on the
//! engine's notification thread through the shared response writer.

use std::io::{BufRead, Write};
use std::sync::Arc;

use stagecast_common::{Result, SessionDefaults};
use stagecast_engine::MediaEngine;

use crate::dispatch::Session;
use crate::notifier::ResponseWriter;

/// Drive a session over `reader`/`writer` until end of input.
///
/// If the input closes while the session is still initialized, the
/// engine is shut down before returning. A stop response still pending
/// at that point is emitted whenever its completion event arrives, as
/// long as the writer's receiver is still reading.
pub fn run<R, W>(
    engine: Arc<dyn MediaEngine>,
    defaults: SessionDefaults,
    reader: R,
    writer: W,
) -> Result<()>
where
    R: BufRead,
    W: Write + Send + 'static,
{
    let writer = Arc::new(ResponseWriter::new(writer));
    let mut session = Session::new(engine, defaults, writer)?;
    for line in reader.lines() {
        session.handle_line(&line?);
    }
    session.finish();
    Ok(())
}
