//! Test graph builders

use super::TEST_PACING;
use frameflow::pipeline::{
    DeliveryPolicy, ImporterStage, PassthroughStage, Payload, Pipeline, ReaderId, StageId,
    StreamerStage,
};

/// Builder for a streamer feeding a chain of passthrough stages
pub struct StreamChainBuilder {
    policy: DeliveryPolicy,
    frames: u64,
    depth: usize,
    port_capacity: Option<usize>,
}

/// A built chain: source, the last stage and a reader on its output
pub struct Chain {
    pub pipeline: Pipeline,
    pub source: StageId,
    pub tail: StageId,
    pub reader: ReaderId,
}

impl StreamChainBuilder {
    pub fn new(policy: DeliveryPolicy) -> Self {
        Self {
            policy,
            frames: 20,
            depth: 1,
            port_capacity: None,
        }
    }

    pub fn frames(mut self, frames: u64) -> Self {
        self.frames = frames;
        self
    }

    /// Number of passthrough stages after the streamer
    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Capacity of the tail's output port
    pub fn port_capacity(mut self, capacity: usize) -> Self {
        self.port_capacity = Some(capacity);
        self
    }

    pub fn build(self) -> Chain {
        let mut pipeline = Pipeline::with_policy(self.policy);
        let source = pipeline.add_stage(StreamerStage::new(TEST_PACING, self.frames));
        let tail = extend_chain(&mut pipeline, source, self.depth);
        let out = pipeline.output_port(tail, 0).unwrap();
        if let Some(capacity) = self.port_capacity {
            pipeline.set_port_capacity(out, capacity).unwrap();
        }
        let reader = pipeline.add_reader(out).unwrap();
        Chain {
            pipeline,
            source,
            tail,
            reader,
        }
    }
}

/// Importer feeding a chain of passthrough stages
pub fn static_chain(policy: DeliveryPolicy, depth: usize) -> Chain {
    let mut pipeline = Pipeline::with_policy(policy);
    let source = pipeline.add_stage(ImporterStage::new(Payload::Scalar(1.0)));
    let tail = extend_chain(&mut pipeline, source, depth);
    let reader = pipeline
        .add_reader(pipeline.output_port(tail, 0).unwrap())
        .unwrap();
    Chain {
        pipeline,
        source,
        tail,
        reader,
    }
}

/// Append `depth` passthrough stages after `from`; returns the last one.
pub fn extend_chain(pipeline: &mut Pipeline, from: StageId, depth: usize) -> StageId {
    let mut prev = from;
    for _ in 0..depth {
        let next = pipeline.add_stage(PassthroughStage::new());
        pipeline.link(prev, 0, next, 0).unwrap();
        prev = next;
    }
    prev
}

/// Passthrough reading `from`, with a reader on its output
pub fn branch(pipeline: &mut Pipeline, from: StageId) -> (StageId, ReaderId) {
    let stage = extend_chain(pipeline, from, 1);
    let reader = pipeline
        .add_reader(pipeline.output_port(stage, 0).unwrap())
        .unwrap();
    (stage, reader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_chain_builder() {
        let chain = StreamChainBuilder::new(DeliveryPolicy::QueuedAll)
            .depth(3)
            .build();
        assert_eq!(chain.pipeline.stage_count(), 4);
        assert_ne!(chain.source, chain.tail);
    }
}
