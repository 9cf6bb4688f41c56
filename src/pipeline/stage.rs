//! Stage abstraction for the pipeline.
//!
//! Two-layer design:
//! - **`StageBody` trait** - the computation collaborator. Anything that turns
//!   resolved input records into output payloads.
//! - **`BuiltinStage` enum** - the stages shipped with the crate (sources and
//!   passthrough). Match arms instead of a vtable on the hot path.
//!
//! `AnyStage` wraps either variant so the executor can handle both uniformly.
//! The executor owns all scheduling state (bindings, version snapshots,
//! execution flags); a body only sees a [`StageContext`].

use crate::pipeline::id::StageId;
use crate::pipeline::record::{DataObject, Payload};
use crate::pipeline::spatial::BoundingBox;
use crate::pipeline::stages::{ImporterStage, PassthroughStage, StreamerStage};

/// Frame identity a stage assigns to an output instead of inheriting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStamp {
    pub frame_id: u64,
    pub is_last_frame: bool,
}

/// One output of a single execution.
///
/// Unset fields are filled by the executor: frame identity is inherited from
/// the first dynamic input (else input 0), `dynamic` from whether any input
/// is dynamic, and the bounding box from the payload's extent.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub payload: Payload,
    pub frame: Option<FrameStamp>,
    pub dynamic: Option<bool>,
    pub bounding_box: Option<BoundingBox>,
}

impl StageOutput {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            ..Default::default()
        }
    }

    pub fn with_frame(mut self, frame_id: u64, is_last_frame: bool) -> Self {
        self.frame = Some(FrameStamp {
            frame_id,
            is_last_frame,
        });
        self
    }

    pub fn with_dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = Some(dynamic);
        self
    }

    pub fn with_bounding_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }
}

impl From<Payload> for StageOutput {
    fn from(payload: Payload) -> Self {
        Self::new(payload)
    }
}

/// Read-only view handed to a stage body for one execution.
pub struct StageContext<'a> {
    /// Stage being executed.
    pub stage: StageId,
    /// Number of successful executions before this one.
    pub execution: u64,
    inputs: Vec<Option<&'a DataObject>>,
}

impl<'a> StageContext<'a> {
    pub fn new(stage: StageId, execution: u64, inputs: Vec<Option<&'a DataObject>>) -> Self {
        Self {
            stage,
            execution,
            inputs,
        }
    }

    /// Record resolved for input `index`; `None` for an unbound optional input.
    pub fn input(&self, index: usize) -> Option<&'a DataObject> {
        self.inputs.get(index).copied().flatten()
    }

    pub fn inputs(&self) -> &[Option<&'a DataObject>] {
        &self.inputs
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }
}

/// What downstream wants from a source stage during one pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Demand {
    /// At least one consumer in this pull has nothing unread on the source's ports.
    pub starved: bool,
    /// The stage has never executed successfully.
    pub first_execution: bool,
    /// `set_modified` was called since the last successful execution.
    pub invalidated: bool,
}

/// Trait for pluggable stage bodies.
pub trait StageBody: Send {
    /// Human-readable name of this stage.
    fn name(&self) -> &str;

    fn num_inputs(&self) -> usize {
        1
    }

    fn num_outputs(&self) -> usize {
        1
    }

    /// Whether executing without input `index` bound is an error.
    fn input_required(&self, _index: usize) -> bool {
        true
    }

    /// Sources only (no inputs): whether this pull should produce a record.
    ///
    /// The default runs once and again after each invalidation. Sources that
    /// pace themselves override it.
    fn has_pending(&self, demand: Demand) -> bool {
        demand.first_execution || demand.invalidated
    }

    /// Called when the stage is explicitly invalidated.
    fn on_invalidate(&mut self) {}

    /// Compute one payload per output from the resolved inputs.
    ///
    /// The engine commits nothing unless this returns `Ok` with exactly
    /// `num_outputs()` entries. State the body advances in here (a frame
    /// counter, a pending flag) is not rolled back on an error or a wrong
    /// output count, so bodies should fail before mutating where they can.
    fn process(&mut self, ctx: &StageContext<'_>) -> anyhow::Result<Vec<StageOutput>>;
}

/// Enum dispatch for built-in stages.
pub enum BuiltinStage {
    Streamer(StreamerStage),
    Importer(ImporterStage),
    Passthrough(PassthroughStage),
}

impl BuiltinStage {
    pub fn name(&self) -> &str {
        match self {
            BuiltinStage::Streamer(s) => s.name(),
            BuiltinStage::Importer(s) => s.name(),
            BuiltinStage::Passthrough(s) => s.name(),
        }
    }

    pub fn num_inputs(&self) -> usize {
        match self {
            BuiltinStage::Streamer(s) => s.num_inputs(),
            BuiltinStage::Importer(s) => s.num_inputs(),
            BuiltinStage::Passthrough(s) => s.num_inputs(),
        }
    }

    pub fn num_outputs(&self) -> usize {
        match self {
            BuiltinStage::Streamer(s) => s.num_outputs(),
            BuiltinStage::Importer(s) => s.num_outputs(),
            BuiltinStage::Passthrough(s) => s.num_outputs(),
        }
    }

    pub fn input_required(&self, index: usize) -> bool {
        match self {
            BuiltinStage::Streamer(s) => s.input_required(index),
            BuiltinStage::Importer(s) => s.input_required(index),
            BuiltinStage::Passthrough(s) => s.input_required(index),
        }
    }

    pub fn has_pending(&self, demand: Demand) -> bool {
        match self {
            BuiltinStage::Streamer(s) => s.has_pending(demand),
            BuiltinStage::Importer(s) => s.has_pending(demand),
            BuiltinStage::Passthrough(s) => s.has_pending(demand),
        }
    }

    pub fn on_invalidate(&mut self) {
        match self {
            BuiltinStage::Streamer(s) => s.on_invalidate(),
            BuiltinStage::Importer(s) => s.on_invalidate(),
            BuiltinStage::Passthrough(s) => s.on_invalidate(),
        }
    }

    pub fn process(&mut self, ctx: &StageContext<'_>) -> anyhow::Result<Vec<StageOutput>> {
        match self {
            BuiltinStage::Streamer(s) => s.process(ctx),
            BuiltinStage::Importer(s) => s.process(ctx),
            BuiltinStage::Passthrough(s) => s.process(ctx),
        }
    }
}

/// Wrapper that holds either a built-in stage (enum dispatch) or a plugin (trait object).
pub enum AnyStage {
    Builtin(BuiltinStage),
    Plugin(Box<dyn StageBody>),
}

impl AnyStage {
    pub fn name(&self) -> &str {
        match self {
            AnyStage::Builtin(s) => s.name(),
            AnyStage::Plugin(s) => s.name(),
        }
    }

    pub fn num_inputs(&self) -> usize {
        match self {
            AnyStage::Builtin(s) => s.num_inputs(),
            AnyStage::Plugin(s) => s.num_inputs(),
        }
    }

    pub fn num_outputs(&self) -> usize {
        match self {
            AnyStage::Builtin(s) => s.num_outputs(),
            AnyStage::Plugin(s) => s.num_outputs(),
        }
    }

    pub fn input_required(&self, index: usize) -> bool {
        match self {
            AnyStage::Builtin(s) => s.input_required(index),
            AnyStage::Plugin(s) => s.input_required(index),
        }
    }

    pub fn has_pending(&self, demand: Demand) -> bool {
        match self {
            AnyStage::Builtin(s) => s.has_pending(demand),
            AnyStage::Plugin(s) => s.has_pending(demand),
        }
    }

    pub fn on_invalidate(&mut self) {
        match self {
            AnyStage::Builtin(s) => s.on_invalidate(),
            AnyStage::Plugin(s) => s.on_invalidate(),
        }
    }

    pub fn process(&mut self, ctx: &StageContext<'_>) -> anyhow::Result<Vec<StageOutput>> {
        match self {
            AnyStage::Builtin(s) => s.process(ctx),
            AnyStage::Plugin(s) => s.process(ctx),
        }
    }

    pub fn as_streamer_mut(&mut self) -> Option<&mut StreamerStage> {
        match self {
            AnyStage::Builtin(BuiltinStage::Streamer(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_importer_mut(&mut self) -> Option<&mut ImporterStage> {
        match self {
            AnyStage::Builtin(BuiltinStage::Importer(s)) => Some(s),
            _ => None,
        }
    }
}

impl From<StreamerStage> for AnyStage {
    fn from(stage: StreamerStage) -> Self {
        AnyStage::Builtin(BuiltinStage::Streamer(stage))
    }
}

impl From<ImporterStage> for AnyStage {
    fn from(stage: ImporterStage) -> Self {
        AnyStage::Builtin(BuiltinStage::Importer(stage))
    }
}

impl From<PassthroughStage> for AnyStage {
    fn from(stage: PassthroughStage) -> Self {
        AnyStage::Builtin(BuiltinStage::Passthrough(stage))
    }
}

impl From<Box<dyn StageBody>> for AnyStage {
    fn from(body: Box<dyn StageBody>) -> Self {
        AnyStage::Plugin(body)
    }
}
