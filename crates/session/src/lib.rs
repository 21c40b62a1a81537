//! Stagecast Session Core
//!
//! Turns a line stream of JSON commands into engine work and a line
//! stream of JSON responses. One session owns one engine and drives it
//! strictly sequentially; the only concurrency is on the way out,
//! where stop completions and exported frames arrive from engine
//! threads.
//!
//! # Architecture
//!
//! ```text
//!  stdin lines ──▶ Service ──▶ Session (dispatch)
//!                                 │
//!                 ┌───────────────┼──────────────────┐
//!                 ▼               ▼                  ▼
//!           SourceRegistry     SceneSet        OutputManager
//!                 └───────────────┼──────────────────┘
//!                                 ▼
//!                          MediaEngine (trait)
//!                                 │ engine threads
//!                 ┌───────────────┴──────────────┐
//!                 ▼                              ▼
//!           StopNotifier ──▶ responses     FrameExporter ──▶ TCP
//! ```
//!
//! Every response, synchronous or deferred, goes through one shared
//! [`ResponseWriter`] so output lines never interleave.

pub mod dispatch;
pub mod exporter;
pub mod notifier;
pub mod outputs;
pub mod registry;
pub mod scenes;
pub mod service;

pub use dispatch::Session;
pub use notifier::{ResponseWriter, StopNotifier};
pub use service::run;
