//! PassthroughStage - forwards input 0 unchanged.
//!
//! The output keeps the input's payload and bounding box; frame identity and
//! the dynamic flag are inherited by the executor.

use crate::pipeline::stage::{StageBody, StageContext, StageOutput};

#[derive(Debug, Default)]
pub struct PassthroughStage;

impl PassthroughStage {
    pub fn new() -> Self {
        Self
    }
}

impl StageBody for PassthroughStage {
    fn name(&self) -> &str {
        "Passthrough"
    }

    fn process(&mut self, ctx: &StageContext<'_>) -> anyhow::Result<Vec<StageOutput>> {
        let input = ctx
            .input(0)
            .ok_or_else(|| anyhow::anyhow!("passthrough has no input record"))?;
        Ok(vec![StageOutput::new(input.payload().clone())
            .with_bounding_box(input.bounding_box())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::id::{RecordId, SpatialNodeId, StageId};
    use crate::pipeline::record::{DataObject, Payload};

    #[test]
    fn test_copies_payload() {
        let record = DataObject::new(RecordId(1), Payload::Signal(vec![1.0, 2.0]), SpatialNodeId(0));
        let ctx = StageContext::new(StageId(0), 0, vec![Some(&record)]);
        let out = PassthroughStage::new().process(&ctx).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].payload, Payload::Signal(vec![1.0, 2.0]));
        assert_eq!(out[0].bounding_box, Some(record.bounding_box()));
    }

    #[test]
    fn test_missing_record_is_an_error() {
        let ctx = StageContext::new(StageId(0), 0, vec![None]);
        assert!(PassthroughStage::new().process(&ctx).is_err());
    }
}
