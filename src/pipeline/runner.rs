//! Thread boundary between a running pipeline and its observer.
//!
//! `PipelineRunner` moves a [`Pipeline`] onto a dedicated thread that keeps
//! pulling one reader until the stream ends, forwarding every frame over a
//! bounded channel. Commands flow the other way and are drained between
//! frames. Joining hands the pipeline back.

use crate::pipeline::error::PipelineError;
use crate::pipeline::executor::{FrameRef, Pipeline};
use crate::pipeline::id::{ReaderId, StageId};
use crate::pipeline::record::Payload;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Commands sent from the observer to the runner thread.
#[derive(Debug, Clone)]
pub enum RunnerCommand {
    /// Invalidate a stage; the next pull re-executes it.
    SetModified(StageId),
    /// Stop after the current frame.
    Stop,
}

/// Copy of a delivered frame, detached from the pipeline's record store.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub frame: FrameRef,
    pub payload: Payload,
    pub created_at: DateTime<Utc>,
}

/// Events sent from the runner thread to the observer.
#[derive(Debug, Clone)]
pub enum FrameEvent {
    Frame(FrameSnapshot),
    /// The reader is blocked by another consumer that never reads.
    Stalled,
    /// No further frames; `frames` were delivered in total.
    Finished { frames: u64 },
    Error(String),
}

const CMD_CHANNEL_CAPACITY: usize = 64;
const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct PipelineRunner {
    cmd_tx: Sender<RunnerCommand>,
    event_rx: Receiver<FrameEvent>,
    handle: JoinHandle<Pipeline>,
}

impl PipelineRunner {
    /// Run `pipeline` on its own thread, pulling `reader` until the stream ends.
    pub fn spawn(pipeline: Pipeline, reader: ReaderId) -> Self {
        Self::spawn_with_limit(pipeline, reader, None)
    }

    /// Like [`PipelineRunner::spawn`] but stop after `frame_limit` frames.
    pub fn spawn_with_limit(pipeline: Pipeline, reader: ReaderId, frame_limit: Option<u64>) -> Self {
        let (cmd_tx, cmd_rx) = bounded(CMD_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = bounded(EVENT_CHANNEL_CAPACITY);
        let handle = std::thread::spawn(move || {
            RunnerLoop {
                pipeline,
                reader,
                cmd_rx,
                event_tx,
                frame_limit,
                frames: 0,
            }
            .run()
        });
        Self {
            cmd_tx,
            event_rx,
            handle,
        }
    }

    pub fn send_command(&self, cmd: RunnerCommand) -> bool {
        self.cmd_tx.send(cmd).is_ok()
    }

    pub fn set_modified(&self, stage: StageId) {
        let _ = self.cmd_tx.send(RunnerCommand::SetModified(stage));
    }

    pub fn stop(&self) {
        let _ = self.cmd_tx.send(RunnerCommand::Stop);
    }

    pub fn try_recv(&self) -> Option<FrameEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Block for the next event; `None` once the thread has exited and the
    /// channel is empty.
    pub fn recv(&self) -> Option<FrameEvent> {
        self.event_rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<FrameEvent, RecvTimeoutError> {
        self.event_rx.recv_timeout(timeout)
    }

    pub fn drain(&self) -> Vec<FrameEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the runner thread and take the pipeline back.
    pub fn join(self) -> std::thread::Result<Pipeline> {
        // Unblock a runner waiting on a full event channel.
        drop(self.event_rx);
        self.handle.join()
    }
}

struct RunnerLoop {
    pipeline: Pipeline,
    reader: ReaderId,
    cmd_rx: Receiver<RunnerCommand>,
    event_tx: Sender<FrameEvent>,
    frame_limit: Option<u64>,
    frames: u64,
}

impl RunnerLoop {
    fn run(mut self) -> Pipeline {
        tracing::info!("Runner thread started on reader {:?}", self.reader);
        while self.process_commands() && self.step() {}
        tracing::info!("Runner thread exiting after {} frames", self.frames);
        self.pipeline
    }

    /// Returns `false` when asked to stop.
    fn process_commands(&mut self) -> bool {
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            match cmd {
                RunnerCommand::Stop => {
                    self.finish();
                    return false;
                }
                RunnerCommand::SetModified(stage) => {
                    if let Err(e) = self.pipeline.set_modified(stage) {
                        tracing::warn!("Ignoring invalidate for {}: {}", stage, e);
                        let _ = self.event_tx.send(FrameEvent::Error(e.to_string()));
                    }
                }
            }
        }
        true
    }

    /// Pull one frame. Returns `false` when the run is over.
    fn step(&mut self) -> bool {
        match self.pipeline.next_frame(self.reader) {
            Ok(frame) => {
                let snapshot = match self.pipeline.record(frame.record) {
                    Ok(record) => FrameSnapshot {
                        frame,
                        payload: record.payload().clone(),
                        created_at: record.created_at(),
                    },
                    Err(e) => return self.fail(e),
                };
                if self.event_tx.send(FrameEvent::Frame(snapshot)).is_err() {
                    tracing::debug!("Observer hung up");
                    return false;
                }
                self.frames += 1;

                let limit_reached = self.frame_limit.is_some_and(|limit| self.frames >= limit);
                if frame.is_last_frame || limit_reached {
                    self.finish();
                    return false;
                }
                true
            }
            Err(PipelineError::EndOfStream { .. }) => {
                self.finish();
                false
            }
            Err(PipelineError::Stalled { port }) => {
                tracing::warn!("Runner stalled on {}", port);
                let _ = self.event_tx.send(FrameEvent::Stalled);
                false
            }
            Err(e) => self.fail(e),
        }
    }

    fn finish(&self) {
        let _ = self.event_tx.send(FrameEvent::Finished {
            frames: self.frames,
        });
    }

    fn fail(&self, error: PipelineError) -> bool {
        tracing::warn!("Runner stopped: {}", error);
        let _ = self.event_tx.send(FrameEvent::Error(error.to_string()));
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stages::StreamerStage;

    fn streaming(frames: u64, pacing: Duration) -> (Pipeline, StageId, ReaderId) {
        let mut p = Pipeline::default();
        let stream = p.add_stage(StreamerStage::new(pacing, frames));
        let port = p.output_port(stream, 0).unwrap();
        let reader = p.add_reader(port).unwrap();
        (p, stream, reader)
    }

    fn collect_until_done(runner: &PipelineRunner) -> (Vec<u64>, FrameEvent) {
        let mut ids = Vec::new();
        loop {
            match runner.recv_timeout(Duration::from_secs(5)).unwrap() {
                FrameEvent::Frame(snapshot) => ids.push(snapshot.frame.frame_id),
                other => return (ids, other),
            }
        }
    }

    #[test]
    fn test_runs_stream_to_completion() {
        let (p, stream, reader) = streaming(5, Duration::ZERO);
        let runner = PipelineRunner::spawn(p, reader);

        let (ids, last) = collect_until_done(&runner);
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(matches!(last, FrameEvent::Finished { frames: 5 }));

        let p = runner.join().unwrap();
        assert_eq!(p.execution_count(stream).unwrap(), 5);
    }

    #[test]
    fn test_frame_limit() {
        let (p, _, reader) = streaming(100, Duration::ZERO);
        let runner = PipelineRunner::spawn_with_limit(p, reader, Some(3));
        let (ids, last) = collect_until_done(&runner);
        assert_eq!(ids.len(), 3);
        assert!(matches!(last, FrameEvent::Finished { frames: 3 }));
    }

    #[test]
    fn test_stop_command() {
        let (p, _, reader) = streaming(10_000, Duration::from_millis(2));
        let runner = PipelineRunner::spawn(p, reader);
        assert!(matches!(
            runner.recv_timeout(Duration::from_secs(5)),
            Ok(FrameEvent::Frame(_))
        ));
        runner.stop();

        let (_, last) = collect_until_done(&runner);
        assert!(matches!(last, FrameEvent::Finished { frames } if frames < 10_000));
        assert!(runner.join().is_ok());
    }

    #[test]
    fn test_unknown_stage_invalidate_reports_error() {
        let (p, _, reader) = streaming(10_000, Duration::from_millis(2));
        let runner = PipelineRunner::spawn(p, reader);
        runner.set_modified(StageId(42));

        let saw_error = (0..100).any(|_| {
            matches!(
                runner.recv_timeout(Duration::from_secs(5)),
                Ok(FrameEvent::Error(_))
            )
        });
        assert!(saw_error);
        runner.stop();
        assert!(runner.join().is_ok());
    }
}
