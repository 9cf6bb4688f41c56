//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod bodies;
pub mod builders;

use frameflow::pipeline::{FrameRef, Pipeline};
use std::time::Duration;

/// Pacing used by streamers in integration tests
pub const TEST_PACING: Duration = Duration::from_millis(10);

/// Scalar payload of the record behind `frame`
pub fn scalar_of(pipeline: &Pipeline, frame: &FrameRef) -> f64 {
    pipeline
        .record(frame.record)
        .expect("frame record is alive")
        .payload()
        .as_scalar()
        .expect("scalar payload")
}
