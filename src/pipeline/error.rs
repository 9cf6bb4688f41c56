//! Pipeline-specific error types.

use crate::pipeline::id::{DeviceId, PortId, ReaderId, RecordId, StageId};
use thiserror::Error;

/// Which side of a stage an out-of-range index referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSide {
    Input,
    Output,
}

impl std::fmt::Display for PortSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortSide::Input => write!(f, "input"),
            PortSide::Output => write!(f, "output"),
        }
    }
}

/// Errors that can occur within the pipeline system.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Stage {stage:?} has no record bound to required input {input}")]
    MissingInput { stage: StageId, input: usize },

    #[error("Stage {stage:?} has no {side} port {index} (it has {count})")]
    InvalidPortIndex {
        stage: StageId,
        side: PortSide,
        index: usize,
        count: usize,
    },

    #[error("Stage {stage:?} cannot consume its own output")]
    SelfConnection { stage: StageId },

    #[error("Connecting {from:?} into {to:?} would create a cycle")]
    CycleDetected { from: StageId, to: StageId },

    #[error("Record {record:?} released on {device:?} which does not retain it")]
    InvalidRelease { record: RecordId, device: DeviceId },

    #[error("Stage {stage:?} returned {got} outputs, expected {expected}")]
    OutputCountMismatch {
        stage: StageId,
        expected: usize,
        got: usize,
    },

    #[error("Port {port:?} has no further frames: its stream has ended")]
    EndOfStream { port: PortId },

    #[error("Port {port:?} cannot make progress: its producer is stalled on a full queue")]
    Stalled { port: PortId },

    #[error("Record {record:?} was published by a stage and can no longer be mutated")]
    ImmutableRecord { record: RecordId },

    #[error("Record id space exhausted")]
    RecordIdsExhausted,

    #[error("Unknown stage {0:?}")]
    UnknownStage(StageId),

    #[error("Unknown port {0:?}")]
    UnknownPort(PortId),

    #[error("Unknown record {0:?}")]
    UnknownRecord(RecordId),

    #[error("Unknown reader {0:?}")]
    UnknownReader(ReaderId),

    /// Failure reported by a stage body, passed through untouched.
    #[error(transparent)]
    Stage(#[from] anyhow::Error),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
