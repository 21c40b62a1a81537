//! Stagecast Wire Protocol
//!
//! Everything that crosses the stdin/stdout boundary lives here: the
//! command envelope and its closed action set, the response shape, and
//! the plain-data models those commands carry (scene plans, source
//! plans, transforms, video layouts, and slice geometry).
//!
//! The protocol is line-delimited JSON. Each request line is an object
//! with an `action` discriminator and an `actionId` correlation token;
//! each response line echoes the `actionId` it answers. Parsing is
//! tolerant of unknown extra fields but strict about the closed action
//! set and each action's required fields.

pub mod command;
pub mod response;
pub mod scene;
pub mod slice;
pub mod source;
pub mod transform;
pub mod video;

pub use command::{parse_line, Command, CommandEnvelope, LineError};
pub use response::{DeviceInfo, Response};
pub use scene::{SceneItemPlan, ScenePlan};
pub use slice::{frame_byte_len, SliceRegion, BYTES_PER_PIXEL};
pub use source::{SourceKind, SourcePlan, SourceSettings};
pub use transform::Transform;
pub use video::{AudioConfig, OutputTarget, VideoConfig, VideoLayout};
