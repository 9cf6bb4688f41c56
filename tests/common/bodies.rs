//! Stage bodies used by integration tests

use frameflow::pipeline::{Payload, StageBody, StageContext, StageOutput};

/// Two-input stage: frame identity comes from input 0 (the stream) and the
/// payload reports the frame id of input 1 (the static record).
pub struct StaticFrameProbe;

impl StageBody for StaticFrameProbe {
    fn name(&self) -> &str {
        "StaticFrameProbe"
    }

    fn num_inputs(&self) -> usize {
        2
    }

    fn process(&mut self, ctx: &StageContext<'_>) -> anyhow::Result<Vec<StageOutput>> {
        let static_frame = ctx
            .input(1)
            .map(|r| r.frame_id())
            .ok_or_else(|| anyhow::anyhow!("static input missing"))?;
        Ok(vec![Payload::Scalar(static_frame as f64).into()])
    }
}
