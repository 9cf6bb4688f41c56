//! StreamerStage - paced source of dynamic frames.
//!
//! Emits `total_frames` records with frame ids `0..total_frames`, the last one
//! flagged as the end of the stream. Consecutive emissions are at least
//! `pacing` apart. A frame is only produced when a consumer in the current
//! pull has nothing left to read, so a full port never makes the stream
//! skip ahead.

use crate::config::StreamerConfig;
use crate::pipeline::record::Payload;
use crate::pipeline::stage::{Demand, StageBody, StageContext, StageOutput};
use std::time::{Duration, Instant};

type FrameGenerator = Box<dyn FnMut(u64) -> Payload + Send>;

pub struct StreamerStage {
    pacing: Duration,
    total_frames: u64,
    next_frame: u64,
    last_emit: Option<Instant>,
    generator: FrameGenerator,
}

impl StreamerStage {
    /// Streamer emitting `Payload::Scalar(frame_id)` for each frame.
    pub fn new(pacing: Duration, total_frames: u64) -> Self {
        Self {
            pacing,
            total_frames,
            next_frame: 0,
            last_emit: None,
            generator: Box::new(|frame| Payload::Scalar(frame as f64)),
        }
    }

    pub fn from_config(config: &StreamerConfig) -> Self {
        Self::new(Duration::from_millis(config.pacing_ms), config.total_frames)
    }

    /// Replace the per-frame payload generator.
    pub fn with_generator(mut self, generator: impl FnMut(u64) -> Payload + Send + 'static) -> Self {
        self.generator = Box::new(generator);
        self
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    pub fn set_pacing(&mut self, pacing: Duration) {
        self.pacing = pacing;
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn set_total_frames(&mut self, total_frames: u64) {
        self.total_frames = total_frames;
    }

    pub fn frames_emitted(&self) -> u64 {
        self.next_frame
    }

    pub fn is_finished(&self) -> bool {
        self.next_frame >= self.total_frames
    }

    fn wait_for_pacing(&self) {
        let Some(last) = self.last_emit else {
            return;
        };
        let elapsed = last.elapsed();
        if elapsed < self.pacing {
            std::thread::sleep(self.pacing - elapsed);
        }
    }
}

impl StageBody for StreamerStage {
    fn name(&self) -> &str {
        "Streamer"
    }

    fn num_inputs(&self) -> usize {
        0
    }

    fn has_pending(&self, demand: Demand) -> bool {
        demand.starved && !self.is_finished()
    }

    /// Rewind to frame 0.
    fn on_invalidate(&mut self) {
        tracing::debug!("Streamer rewound after {} frames", self.next_frame);
        self.next_frame = 0;
        self.last_emit = None;
    }

    fn process(&mut self, _ctx: &StageContext<'_>) -> anyhow::Result<Vec<StageOutput>> {
        if self.is_finished() {
            anyhow::bail!("stream already emitted all {} frames", self.total_frames);
        }
        self.wait_for_pacing();

        let frame = self.next_frame;
        let is_last = frame + 1 == self.total_frames;
        let payload = (self.generator)(frame);
        self.next_frame += 1;
        self.last_emit = Some(Instant::now());

        if is_last {
            tracing::debug!("Streamer emitted last frame {}", frame);
        }
        Ok(vec![StageOutput::new(payload)
            .with_frame(frame, is_last)
            .with_dynamic(true)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::id::StageId;

    const STARVED: Demand = Demand {
        starved: true,
        first_execution: false,
        invalidated: false,
    };

    fn emit(streamer: &mut StreamerStage) -> StageOutput {
        let ctx = StageContext::new(StageId(0), 0, Vec::new());
        streamer.process(&ctx).unwrap().remove(0)
    }

    #[test]
    fn test_frames_count_up_and_mark_last() {
        let mut s = StreamerStage::new(Duration::ZERO, 3);
        let ids: Vec<_> = (0..3).map(|_| emit(&mut s).frame.unwrap()).collect();
        assert_eq!(ids.iter().map(|f| f.frame_id).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(
            ids.iter().map(|f| f.is_last_frame).collect::<Vec<_>>(),
            vec![false, false, true]
        );
        assert!(s.is_finished());
        assert!(!s.has_pending(STARVED));
    }

    #[test]
    fn test_emits_only_when_starved() {
        let s = StreamerStage::new(Duration::ZERO, 5);
        assert!(!s.has_pending(Demand::default()));
        assert!(s.has_pending(STARVED));
        // Pacing ignores first-run and invalidation hints.
        assert!(!s.has_pending(Demand {
            first_execution: true,
            invalidated: true,
            ..Demand::default()
        }));
    }

    #[test]
    fn test_output_is_dynamic() {
        let mut s = StreamerStage::new(Duration::ZERO, 1);
        assert_eq!(emit(&mut s).dynamic, Some(true));
    }

    #[test]
    fn test_pacing_spaces_frames() {
        let mut s = StreamerStage::new(Duration::from_millis(20), 2);
        let start = Instant::now();
        emit(&mut s);
        emit(&mut s);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_invalidate_rewinds() {
        let mut s = StreamerStage::new(Duration::ZERO, 2);
        emit(&mut s);
        emit(&mut s);
        s.on_invalidate();
        assert_eq!(s.frames_emitted(), 0);
        assert_eq!(emit(&mut s).frame.unwrap().frame_id, 0);
    }

    #[test]
    fn test_custom_generator() {
        let mut s = StreamerStage::new(Duration::ZERO, 2)
            .with_generator(|frame| Payload::Signal(vec![frame as f32; 2]));
        emit(&mut s);
        assert_eq!(emit(&mut s).payload, Payload::Signal(vec![1.0, 1.0]));
    }
}
