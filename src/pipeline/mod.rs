//! Pull-scheduled stage pipeline.
//!
//! Records flow from sources (streamers, importers) through processing
//! stages to external readers. Nothing runs on its own: reading a port or
//! updating a stage pulls exactly the upstream work needed to answer it.
//!
//! # Architecture
//!
//! ```text
//! [Streamer] ──► Port ──► [Passthrough] ──► Port ──► Reader
//!                              ▲
//! [Importer] ──► Port ─────────┘ (static, re-readable)
//! ```
//!
//! # Design
//!
//! - **Arena ownership** - `Pipeline` owns stages, ports and records; everything
//!   else refers to them by id. Record ids are never reused.
//! - **Memoized execution** - a stage runs only when an input's
//!   `(record id, version)` changed or it was invalidated.
//! - **Delivery policies** - `QueuedAll` ports deliver every frame to every
//!   consumer and stall the producer when full; `LatestOnly` ports overwrite.
//! - **Enum dispatch** - `BuiltinStage` for shipped stages, `Box<dyn StageBody>`
//!   for plugins.
//! - **Dedicated thread** - `PipelineRunner` drives a reader off-thread and
//!   reports frames over crossbeam channels.

pub mod error;
pub mod executor;
pub mod id;
pub mod plan;
pub mod port;
pub mod record;
pub mod runner;
pub mod spatial;
pub mod stage;
pub mod stages;
pub mod store;

pub use error::{PipelineError, PipelineResult, PortSide};
pub use executor::{FrameRef, InputSlot, InputStamp, Pipeline, StageOutcome};
pub use id::{ConsumerId, DeviceId, PortId, ReaderId, RecordId, SpatialNodeId, StageId};
pub use plan::{PullPlan, PullPlanner};
pub use port::{DeliveryPolicy, Port, PortStats};
pub use record::{DataObject, Payload, ReleaseOutcome};
pub use runner::{FrameEvent, FrameSnapshot, PipelineRunner, RunnerCommand};
pub use spatial::{BoundingBox, SceneGraph, SpatialHierarchy};
pub use stage::{AnyStage, BuiltinStage, Demand, FrameStamp, StageBody, StageContext, StageOutput};
pub use stages::{ImporterStage, PassthroughStage, StreamerStage};
pub use store::RecordStore;
