//! ImporterStage - one-shot static source.
//!
//! Produces its payload once. Invalidating the stage (or replacing the
//! payload) makes it produce again with the next frame id, so downstream
//! stages see a new record version and re-execute.

use crate::pipeline::record::Payload;
use crate::pipeline::spatial::BoundingBox;
use crate::pipeline::stage::{Demand, StageBody, StageContext, StageOutput};

#[derive(Debug, Clone)]
pub struct ImporterStage {
    payload: Payload,
    bounding_box: Option<BoundingBox>,
    generation: u64,
    pending: bool,
}

impl ImporterStage {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            bounding_box: None,
            generation: 0,
            pending: true,
        }
    }

    pub fn with_bounding_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Replace the imported content; the next pull re-imports.
    pub fn set_payload(&mut self, payload: Payload) {
        self.payload = payload;
        self.pending = true;
    }

    /// Number of times the payload has been produced.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl StageBody for ImporterStage {
    fn name(&self) -> &str {
        "Importer"
    }

    fn num_inputs(&self) -> usize {
        0
    }

    fn has_pending(&self, _demand: Demand) -> bool {
        self.pending
    }

    fn on_invalidate(&mut self) {
        self.pending = true;
    }

    fn process(&mut self, _ctx: &StageContext<'_>) -> anyhow::Result<Vec<StageOutput>> {
        let frame = self.generation;
        self.generation += 1;
        self.pending = false;

        let mut output = StageOutput::new(self.payload.clone())
            .with_frame(frame, false)
            .with_dynamic(false);
        output.bounding_box = self.bounding_box;
        Ok(vec![output])
    }
}
