//! # Frameflow: pull-scheduled stream/static pipelines
//!
//! A processing-pipeline core in which stages consume and produce
//! reference-counted records. Sources either stream dynamic frames at a
//! paced rate or import a static record once; downstream stages execute only
//! when their inputs changed, and readers pull frames out of any port.
//!
//! ## Architecture
//!
//! - **Pipeline**: stage arena, delivery-policy ports and the pull scheduler
//! - **Records**: versioned data objects with per-device retain/release
//! - **Spatial**: scene graph and bounding boxes placed by record transforms
//! - **Runner**: a dedicated thread that streams frames over crossbeam channels
//!
//! ## Configuration
//!
//! [`config::FrameflowConfig`] holds the default delivery policy, queue
//! capacities, streamer pacing and logging setup, loaded from TOML or JSON.
//!
//! ## Example
//!
//! ```ignore
//! use frameflow::pipeline::{PassthroughStage, Pipeline, StreamerStage};
//! use std::time::Duration;
//!
//! let mut pipeline = Pipeline::default();
//! let stream = pipeline.add_stage(StreamerStage::new(Duration::from_millis(10), 20));
//! let pass = pipeline.add_stage(PassthroughStage::new());
//! pipeline.link(stream, 0, pass, 0)?;
//!
//! let reader = pipeline.add_reader(pipeline.output_port(pass, 0)?)?;
//! while let Ok(frame) = pipeline.next_frame(reader) {
//!     println!("frame {}", frame.frame_id);
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export commonly used types
pub use config::FrameflowConfig;
pub use error::{FrameflowError, Result};
pub use pipeline::{
    DeliveryPolicy, DeviceId, FrameRef, Payload, Pipeline, PipelineError, PipelineResult,
    PipelineRunner, RecordId, StageId,
};
