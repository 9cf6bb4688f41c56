//! Pipeline executor - stage graph, pull scheduling and record routing.
//!
//! Execution is demand-driven. `update(stage)` walks the upstream closure of
//! `stage` in dependency order and executes every stage whose inputs changed
//! since its last execution. `next_frame(reader)` pulls the producer of the
//! reader's port until a record is available or the stream ends.
//!
//! Per-stage execution:
//! 1. Resolve each input to the record it would read now and stamp it with
//!    `(record id, version)`.
//! 2. Skip if no stamp changed and no input was unbound since the last
//!    execution. Sources decide through `StageBody::has_pending` instead.
//! 3. Fail with `MissingInput` if a required input is unbound.
//! 4. Stall if any output port cannot accept another record.
//! 5. Run the body, then commit: consume inputs, publish outputs, store stamps.
//!
//! Nothing is committed unless the body succeeds with the right output count.

use crate::config::StreamingConfig;
use crate::pipeline::error::{PipelineError, PipelineResult, PortSide};
use crate::pipeline::id::{ConsumerId, DeviceId, PortId, ReaderId, RecordId, StageId};
use crate::pipeline::plan::{PullPlan, PullPlanner};
use crate::pipeline::port::{DeliveryPolicy, Port};
use crate::pipeline::record::{DataObject, Payload, ReleaseOutcome};
use crate::pipeline::spatial::BoundingBox;
use crate::pipeline::stage::{AnyStage, Demand, StageBody, StageContext};
use crate::pipeline::store::RecordStore;
use glam::Mat4;
use std::collections::HashMap;

/// What an input slot is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputSlot {
    #[default]
    Empty,
    /// Fed by another stage's output port.
    Port(PortId),
    /// A fixed record supplied with [`Pipeline::set_input_data`].
    Static(RecordId),
}

/// `(record id, version)` of the record an input resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputStamp {
    pub record: RecordId,
    pub version: u64,
}

/// Result of asking one stage to bring itself up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The body ran and new records were published.
    Executed,
    /// Nothing changed since the last execution.
    Skipped,
    /// A required port input has nothing to read yet.
    NotReady,
    /// An output port cannot accept another record.
    Stalled,
}

/// Identity of the record a reader just received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRef {
    pub record: RecordId,
    pub frame_id: u64,
    pub is_last_frame: bool,
    pub is_dynamic: bool,
    pub version: u64,
}

impl FrameRef {
    fn of(record: &DataObject) -> Self {
        Self {
            record: record.id(),
            frame_id: record.frame_id(),
            is_last_frame: record.is_last_frame(),
            is_dynamic: record.is_dynamic(),
            version: record.version(),
        }
    }
}

/// A stage plus the scheduling state the executor keeps for it.
pub struct StageSlot {
    pub(crate) body: AnyStage,
    pub(crate) inputs: Vec<InputSlot>,
    pub(crate) outputs: Vec<PortId>,
    /// Stamps of the inputs consumed by the last successful execution.
    last_executed: HashMap<usize, InputStamp>,
    is_modified: bool,
    has_executed: bool,
    /// Forced re-execution requested via `set_modified`.
    invalidated: bool,
    execution_count: u64,
}

impl StageSlot {
    fn new(body: AnyStage, outputs: Vec<PortId>) -> Self {
        let inputs = vec![InputSlot::Empty; body.num_inputs()];
        Self {
            body,
            inputs,
            outputs,
            last_executed: HashMap::new(),
            is_modified: true,
            has_executed: false,
            invalidated: false,
            execution_count: 0,
        }
    }

    fn is_source(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// External consumer of one port.
#[derive(Debug)]
struct ReaderSlot {
    port: PortId,
    /// Record handed out by the last read; held until the next one.
    current: Option<RecordId>,
}

#[derive(Debug, Clone, Copy)]
struct PullReport {
    root: StageOutcome,
    stalled: bool,
}

/// The stage graph, its ports and every live record.
pub struct Pipeline {
    stages: Vec<StageSlot>,
    ports: Vec<Port>,
    readers: Vec<ReaderSlot>,
    records: RecordStore,
    default_policy: DeliveryPolicy,
    stream_capacity: usize,
    static_capacity: usize,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(&StreamingConfig::default())
    }
}

impl Pipeline {
    pub fn new(config: &StreamingConfig) -> Self {
        Self {
            stages: Vec::new(),
            ports: Vec::new(),
            readers: Vec::new(),
            records: RecordStore::new(),
            default_policy: config.mode,
            stream_capacity: config.stream_queue_capacity.max(1),
            static_capacity: config.static_queue_capacity.max(1),
        }
    }

    /// Pipeline whose new stages deliver with `policy` by default.
    pub fn with_policy(policy: DeliveryPolicy) -> Self {
        Self::new(&StreamingConfig {
            mode: policy,
            ..StreamingConfig::default()
        })
    }

    pub fn default_policy(&self) -> DeliveryPolicy {
        self.default_policy
    }

    // ── Graph building ──

    /// Add a stage whose output ports use the pipeline's default policy.
    pub fn add_stage(&mut self, stage: impl Into<AnyStage>) -> StageId {
        self.add_stage_with_policy(stage, self.default_policy)
    }

    /// Add a stage whose output ports use `policy`.
    pub fn add_stage_with_policy(
        &mut self,
        stage: impl Into<AnyStage>,
        policy: DeliveryPolicy,
    ) -> StageId {
        let body = stage.into();
        let id = StageId(self.stages.len() as u32);
        let outputs = (0..body.num_outputs())
            .map(|index| {
                let port_id = PortId(self.ports.len() as u32);
                self.ports.push(
                    Port::new(port_id, id, index, policy)
                        .with_default_capacities(self.stream_capacity, self.static_capacity),
                );
                port_id
            })
            .collect();
        tracing::debug!("Added stage {} ({}, {})", id, body.name(), policy);
        self.stages.push(StageSlot::new(body, outputs));
        id
    }

    /// Add a plugin stage body.
    pub fn add_plugin(&mut self, body: Box<dyn StageBody>) -> StageId {
        self.add_stage(AnyStage::Plugin(body))
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_name(&self, stage: StageId) -> PipelineResult<&str> {
        Ok(self.slot(stage)?.body.name())
    }

    /// Mutable access to a stage body, e.g. to retune a built-in stage.
    pub fn stage_body_mut(&mut self, stage: StageId) -> PipelineResult<&mut AnyStage> {
        Ok(&mut self.slot_mut(stage)?.body)
    }

    pub fn num_inputs(&self, stage: StageId) -> PipelineResult<usize> {
        Ok(self.slot(stage)?.inputs.len())
    }

    pub fn num_outputs(&self, stage: StageId) -> PipelineResult<usize> {
        Ok(self.slot(stage)?.outputs.len())
    }

    /// Current binding of input `index`.
    pub fn input(&self, stage: StageId, index: usize) -> PipelineResult<InputSlot> {
        self.check_input_index(stage, index)?;
        Ok(self.stages[stage.index()].inputs[index])
    }

    /// Port carrying output `index` of `stage`.
    pub fn output_port(&self, stage: StageId, index: usize) -> PipelineResult<PortId> {
        let slot = self.slot(stage)?;
        slot.outputs
            .get(index)
            .copied()
            .ok_or(PipelineError::InvalidPortIndex {
                stage,
                side: PortSide::Output,
                index,
                count: slot.outputs.len(),
            })
    }

    pub fn port(&self, port: PortId) -> PipelineResult<&Port> {
        self.ports
            .get(port.index())
            .ok_or(PipelineError::UnknownPort(port))
    }

    /// Override the queue capacity of one port.
    pub fn set_port_capacity(&mut self, port: PortId, capacity: usize) -> PipelineResult<()> {
        self.ports
            .get_mut(port.index())
            .ok_or(PipelineError::UnknownPort(port))?
            .set_capacity(capacity);
        Ok(())
    }

    /// Bind input `input` of `stage` to `port`, replacing any previous binding.
    pub fn connect(&mut self, stage: StageId, input: usize, port: PortId) -> PipelineResult<()> {
        self.check_input_index(stage, input)?;
        let producer = self.port(port)?.producer();
        if producer == stage {
            tracing::warn!("Rejected self connection on {}", stage);
            return Err(PipelineError::SelfConnection { stage });
        }
        if PullPlanner::reaches_upstream(&self.stages, &self.ports, producer, stage) {
            tracing::warn!("Rejected connection {} -> {}: would create a cycle", producer, stage);
            return Err(PipelineError::CycleDetected {
                from: producer,
                to: stage,
            });
        }

        self.unbind(stage, input);
        self.stages[stage.index()].inputs[input] = InputSlot::Port(port);
        self.ports[port.index()].register(ConsumerId::Stage { stage, input });
        tracing::info!(
            "Connected {} output {} -> {} input {}",
            producer,
            self.ports[port.index()].output_index(),
            stage,
            input
        );
        Ok(())
    }

    /// Shorthand for `connect(to, input, output_port(from, output))`.
    pub fn link(
        &mut self,
        from: StageId,
        output: usize,
        to: StageId,
        input: usize,
    ) -> PipelineResult<()> {
        let port = self.output_port(from, output)?;
        self.connect(to, input, port)
    }

    /// Bind input `input` of `stage` to a fixed record.
    pub fn set_input_data(
        &mut self,
        stage: StageId,
        input: usize,
        record: RecordId,
    ) -> PipelineResult<()> {
        self.check_input_index(stage, input)?;
        self.records.get(record)?;
        self.records.hold(record);
        self.unbind(stage, input);
        self.stages[stage.index()].inputs[input] = InputSlot::Static(record);
        tracing::debug!("Bound {:?} to {} input {}", record, stage, input);
        Ok(())
    }

    /// Leave input `input` of `stage` unbound.
    pub fn disconnect_input(&mut self, stage: StageId, input: usize) -> PipelineResult<()> {
        self.check_input_index(stage, input)?;
        self.unbind(stage, input);
        Ok(())
    }

    fn unbind(&mut self, stage: StageId, input: usize) {
        let previous = std::mem::take(&mut self.stages[stage.index()].inputs[input]);
        match previous {
            InputSlot::Port(port) => {
                self.ports[port.index()].unregister(ConsumerId::Stage { stage, input })
            }
            InputSlot::Static(record) => self.records.unhold(record),
            InputSlot::Empty => {}
        }
    }

    // ── Records ──

    /// Create a record outside any stage, e.g. as static input data.
    ///
    /// Until it is bound, retained or passed to [`Pipeline::discard_record`]
    /// the record stays in the arena.
    pub fn create_record(&mut self, payload: Payload) -> PipelineResult<RecordId> {
        self.records.create(payload)
    }

    /// Drop a record nothing holds or retains. Returns whether it was removed.
    pub fn discard_record(&mut self, record: RecordId) -> PipelineResult<bool> {
        self.records.discard(record)
    }

    pub fn record(&self, record: RecordId) -> PipelineResult<&DataObject> {
        self.records.get(record)
    }

    /// Mutable access to a record created with [`Pipeline::create_record`].
    ///
    /// Records published by a stage are immutable once enqueued. Call
    /// `mark_modified` after changing content in place.
    pub fn record_mut(&mut self, record: RecordId) -> PipelineResult<&mut DataObject> {
        let published = self.records.get(record)?.producer().is_some()
            || self.ports.iter().any(|port| port.references(record));
        if published {
            tracing::warn!("Rejected mutation of published {:?}", record);
            return Err(PipelineError::ImmutableRecord { record });
        }
        self.records.get_mut(record)
    }

    pub fn contains_record(&self, record: RecordId) -> bool {
        self.records.contains(record)
    }

    pub fn live_records(&self) -> usize {
        self.records.len()
    }

    pub fn retain(&mut self, record: RecordId, device: DeviceId) -> PipelineResult<()> {
        self.records.retain(record, device)
    }

    pub fn release(&mut self, record: RecordId, device: DeviceId) -> PipelineResult<ReleaseOutcome> {
        self.records.release(record, device)
    }

    /// Number of device frees triggered by balanced releases.
    pub fn free_count(&self) -> u64 {
        self.records.free_count()
    }

    /// Bounding box of `record` placed by its node's world transform.
    pub fn transformed_bounding_box(&self, record: RecordId) -> PipelineResult<BoundingBox> {
        let object = self.records.get(record)?;
        Ok(object.transformed_bounding_box(self.records.scene()))
    }

    /// Set the local transform of `record`'s spatial node.
    pub fn set_transform(&mut self, record: RecordId, transform: Mat4) -> PipelineResult<()> {
        let node = self.records.get(record)?.spatial_node();
        self.records.scene_mut().set_transform(node, transform);
        Ok(())
    }

    /// Set the transform of the root above `record`'s node.
    pub fn set_parent_transform(&mut self, record: RecordId, transform: Mat4) -> PipelineResult<()> {
        let node = self.records.get(record)?.spatial_node();
        if let Some(parent) = self.records.scene().parent(node) {
            self.records.scene_mut().set_transform(parent, transform);
        }
        Ok(())
    }

    // ── Execution flags ──

    /// Force `stage` to re-execute on its next update.
    pub fn set_modified(&mut self, stage: StageId) -> PipelineResult<()> {
        let slot = self.slot_mut(stage)?;
        slot.body.on_invalidate();
        slot.invalidated = true;
        slot.is_modified = true;
        tracing::debug!("Invalidated {} ({})", stage, slot.body.name());
        Ok(())
    }

    pub fn is_modified(&self, stage: StageId) -> PipelineResult<bool> {
        Ok(self.slot(stage)?.is_modified)
    }

    /// Whether the last update of `stage` ran its body.
    pub fn has_executed(&self, stage: StageId) -> PipelineResult<bool> {
        Ok(self.slot(stage)?.has_executed)
    }

    pub fn set_has_executed(&mut self, stage: StageId, executed: bool) -> PipelineResult<()> {
        self.slot_mut(stage)?.has_executed = executed;
        Ok(())
    }

    pub fn execution_count(&self, stage: StageId) -> PipelineResult<u64> {
        Ok(self.slot(stage)?.execution_count)
    }

    /// Stamp of input `index` as of the last successful execution.
    pub fn last_executed(&self, stage: StageId, index: usize) -> PipelineResult<Option<InputStamp>> {
        self.check_input_index(stage, index)?;
        Ok(self.stages[stage.index()].last_executed.get(&index).copied())
    }

    // ── Execution ──

    /// Bring `stage` and everything upstream of it up to date.
    pub fn update(&mut self, stage: StageId) -> PipelineResult<StageOutcome> {
        self.slot(stage)?;
        let plan = PullPlanner::plan(&self.stages, &self.ports, stage);
        Ok(self.run_plan(&plan, stage, None)?.root)
    }

    fn run_plan(
        &mut self,
        plan: &PullPlan,
        root: StageId,
        reader: Option<(PortId, ConsumerId)>,
    ) -> PipelineResult<PullReport> {
        let mut report = PullReport {
            root: StageOutcome::Skipped,
            stalled: false,
        };
        for &stage in &plan.order {
            let demand = self.demand_for(stage, plan, reader);
            let outcome = self.execute_stage(stage, demand)?;
            report.stalled |= outcome == StageOutcome::Stalled;
            if stage == root {
                report.root = outcome;
            }
        }
        Ok(report)
    }

    /// Demand on a source stage from the consumers taking part in this pull.
    fn demand_for(
        &self,
        stage: StageId,
        plan: &PullPlan,
        reader: Option<(PortId, ConsumerId)>,
    ) -> Demand {
        let slot = &self.stages[stage.index()];
        if !slot.is_source() {
            return Demand::default();
        }
        let first_execution = slot.execution_count == 0;
        let invalidated = slot.invalidated;

        let mut involved = false;
        let mut starved = false;
        for &port_id in &slot.outputs {
            let port = &self.ports[port_id.index()];
            let from_reader = reader
                .filter(|(p, _)| *p == port_id)
                .map(|(_, consumer)| consumer);
            for consumer in plan.consumers_of(port_id).chain(from_reader) {
                involved = true;
                starved |= !port.has_unread(consumer);
            }
        }

        // Pulled directly: fill a port nobody reads, or one a consumer has drained.
        if !involved {
            starved = slot.outputs.iter().any(|p| {
                let port = &self.ports[p.index()];
                port.consumer_count() == 0 || port.consumers().any(|c| !port.has_unread(c))
            });
        }

        Demand {
            starved,
            first_execution,
            invalidated,
        }
    }

    fn execute_stage(&mut self, id: StageId, demand: Demand) -> PipelineResult<StageOutcome> {
        let Self {
            stages,
            ports,
            records,
            ..
        } = self;
        let slot = &mut stages[id.index()];

        let resolved: Vec<Option<RecordId>> = slot
            .inputs
            .iter()
            .enumerate()
            .map(|(index, input)| match input {
                InputSlot::Empty => None,
                InputSlot::Static(record) => Some(*record),
                InputSlot::Port(port) => {
                    ports[port.index()].peek(ConsumerId::Stage { stage: id, input: index })
                }
            })
            .collect();
        let stamps: Vec<Option<InputStamp>> = resolved
            .iter()
            .map(|record| {
                record.and_then(|r| {
                    records.get(r).ok().map(|object| InputStamp {
                        record: r,
                        version: object.version(),
                    })
                })
            })
            .collect();

        let modified = if slot.is_source() {
            slot.body.has_pending(demand)
        } else {
            slot.invalidated
                || slot.execution_count == 0
                || stamps.iter().enumerate().any(|(index, stamp)| {
                    stamp.is_some() && slot.last_executed.get(&index) != stamp.as_ref()
                })
                || slot.inputs.iter().enumerate().any(|(index, input)| {
                    *input == InputSlot::Empty && slot.last_executed.contains_key(&index)
                })
        };
        if !modified {
            slot.is_modified = false;
            slot.has_executed = false;
            tracing::trace!("{} ({}) up to date", id, slot.body.name());
            return Ok(StageOutcome::Skipped);
        }

        for (index, input) in slot.inputs.iter().enumerate() {
            if *input == InputSlot::Empty && slot.body.input_required(index) {
                tracing::warn!("{} ({}) input {} is not bound", id, slot.body.name(), index);
                return Err(PipelineError::MissingInput { stage: id, input: index });
            }
        }
        slot.is_modified = true;

        let waiting = slot.inputs.iter().enumerate().any(|(index, input)| {
            matches!(input, InputSlot::Port(_))
                && resolved[index].is_none()
                && slot.body.input_required(index)
        });
        if waiting {
            slot.has_executed = false;
            tracing::trace!("{} ({}) waiting for input", id, slot.body.name());
            return Ok(StageOutcome::NotReady);
        }

        if !slot.outputs.iter().all(|p| ports[p.index()].can_accept()) {
            slot.has_executed = false;
            tracing::debug!("{} ({}) stalled on a full output port", id, slot.body.name());
            return Ok(StageOutcome::Stalled);
        }

        let inputs: Vec<Option<&DataObject>> = resolved
            .iter()
            .map(|record| record.and_then(|r| records.get(r).ok()))
            .collect();
        let primary = inputs
            .iter()
            .flatten()
            .find(|object| object.is_dynamic())
            .or_else(|| inputs.iter().flatten().next())
            .map(|object| (object.frame_id(), object.is_last_frame()));
        let any_dynamic = inputs.iter().flatten().any(|object| object.is_dynamic());

        let ctx = StageContext::new(id, slot.execution_count, inputs);
        let outputs = match slot.body.process(&ctx) {
            Ok(outputs) => outputs,
            Err(e) => {
                tracing::warn!("{} ({}) failed: {:#}", id, slot.body.name(), e);
                return Err(PipelineError::Stage(e));
            }
        };
        if outputs.len() != slot.outputs.len() {
            return Err(PipelineError::OutputCountMismatch {
                stage: id,
                expected: slot.outputs.len(),
                got: outputs.len(),
            });
        }

        // Commit.
        for (index, input) in slot.inputs.iter().enumerate() {
            if let InputSlot::Port(port) = input {
                ports[port.index()].read(ConsumerId::Stage { stage: id, input: index });
            }
        }

        let fallback_frame = (slot.execution_count, false);
        for (output, &port_id) in outputs.into_iter().zip(slot.outputs.iter()) {
            let record_id = records.create(output.payload)?;
            let object = records.get_mut(record_id)?;
            let (frame_id, is_last) = output
                .frame
                .map(|f| (f.frame_id, f.is_last_frame))
                .or(primary)
                .unwrap_or(fallback_frame);
            object.set_frame(frame_id, is_last);
            object.set_dynamic(output.dynamic.unwrap_or(any_dynamic));
            if let Some(bounding_box) = output.bounding_box {
                object.set_bounding_box(bounding_box);
            }
            object.set_producer(Some(id));
            object.mark_modified();
            let dynamic = object.is_dynamic();

            records.hold(record_id);
            for evicted in ports[port_id.index()].push(record_id, dynamic) {
                records.unhold(evicted);
            }
        }

        slot.last_executed = stamps
            .into_iter()
            .enumerate()
            .filter_map(|(index, stamp)| stamp.map(|s| (index, s)))
            .collect();
        slot.invalidated = false;
        slot.is_modified = false;
        slot.has_executed = true;
        slot.execution_count += 1;
        tracing::trace!(
            "{} ({}) executed #{}",
            id,
            slot.body.name(),
            slot.execution_count
        );
        Ok(StageOutcome::Executed)
    }

    // ── Readers ──

    /// Attach an external consumer to `port`.
    pub fn add_reader(&mut self, port: PortId) -> PipelineResult<ReaderId> {
        self.port(port)?;
        let id = ReaderId(self.readers.len() as u32);
        self.ports[port.index()].register(ConsumerId::Reader(id));
        self.readers.push(ReaderSlot {
            port,
            current: None,
        });
        tracing::debug!("Added reader {:?} on {}", id, port);
        Ok(id)
    }

    pub fn reader_port(&self, reader: ReaderId) -> PipelineResult<PortId> {
        self.readers
            .get(reader.index())
            .map(|r| r.port)
            .ok_or(PipelineError::UnknownReader(reader))
    }

    /// Next record for `reader`, pulling upstream until one is available.
    ///
    /// Fails with `EndOfStream` once the producer can make no further
    /// progress, or `Stalled` if it is blocked by a full port.
    pub fn next_frame(&mut self, reader: ReaderId) -> PipelineResult<FrameRef> {
        let port_id = self.reader_port(reader)?;
        let consumer = ConsumerId::Reader(reader);
        let producer = self.ports[port_id.index()].producer();

        loop {
            if let Some(frame) = self.try_next_frame(reader)? {
                return Ok(frame);
            }

            let pushed = self.ports[port_id.index()].stats().pushed;
            let plan = PullPlanner::plan(&self.stages, &self.ports, producer);
            let report = self.run_plan(&plan, producer, Some((port_id, consumer)))?;

            let port = &self.ports[port_id.index()];
            if port.stats().pushed == pushed && port.peek(consumer).is_none() {
                if report.stalled {
                    tracing::debug!("Reader {:?} blocked: pipeline stalled", reader);
                    return Err(PipelineError::Stalled { port: port_id });
                }
                tracing::debug!("Reader {:?} reached end of stream on {}", reader, port_id);
                return Err(PipelineError::EndOfStream { port: port_id });
            }
        }
    }

    /// Read the next available record without executing anything.
    pub fn try_next_frame(&mut self, reader: ReaderId) -> PipelineResult<Option<FrameRef>> {
        let port_id = self.reader_port(reader)?;
        let Some(record) = self.ports[port_id.index()].read(ConsumerId::Reader(reader)) else {
            return Ok(None);
        };

        self.records.hold(record);
        if let Some(previous) = self.readers[reader.index()].current.replace(record) {
            self.records.unhold(previous);
        }
        let frame = FrameRef::of(self.records.get(record)?);
        tracing::trace!(
            "Reader {:?} got frame {} ({:?})",
            reader,
            frame.frame_id,
            record
        );
        Ok(Some(frame))
    }

    // ── Internals ──

    fn slot(&self, stage: StageId) -> PipelineResult<&StageSlot> {
        self.stages
            .get(stage.index())
            .ok_or(PipelineError::UnknownStage(stage))
    }

    fn slot_mut(&mut self, stage: StageId) -> PipelineResult<&mut StageSlot> {
        self.stages
            .get_mut(stage.index())
            .ok_or(PipelineError::UnknownStage(stage))
    }

    fn check_input_index(&self, stage: StageId, index: usize) -> PipelineResult<()> {
        let count = self.slot(stage)?.inputs.len();
        if index >= count {
            return Err(PipelineError::InvalidPortIndex {
                stage,
                side: PortSide::Input,
                index,
                count,
            });
        }
        Ok(())
    }

    pub(crate) fn stage_slots(&self) -> &[StageSlot] {
        &self.stages
    }

    pub(crate) fn ports(&self) -> &[Port] {
        &self.ports
    }
}
