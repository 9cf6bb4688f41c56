//! Frameflow demo - Main Entry Point
//!
//! Streams a synthetic signal through a passthrough stage, scales it by a
//! static calibration record and logs every frame delivered by the runner.
//!
//! Usage: `frameflow [config.toml|config.json]`

use frameflow::config::{FrameflowConfig, LoggingConfig};
use frameflow::error::ResultExt;
use frameflow::pipeline::{
    FrameEvent, ImporterStage, PassthroughStage, Payload, Pipeline, PipelineRunner, StageBody,
    StageContext, StageOutput, StreamerStage,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SIGNAL_LEN: usize = 64;

/// Multiplies a signal (input 0) by a scalar gain (input 1).
struct Gain;

impl StageBody for Gain {
    fn name(&self) -> &str {
        "Gain"
    }

    fn num_inputs(&self) -> usize {
        2
    }

    fn process(&mut self, ctx: &StageContext<'_>) -> anyhow::Result<Vec<StageOutput>> {
        let Some(Payload::Signal(samples)) = ctx.input(0).map(|r| r.payload()) else {
            anyhow::bail!("gain expects a signal on input 0");
        };
        let gain = ctx
            .input(1)
            .and_then(|r| r.payload().as_scalar())
            .ok_or_else(|| anyhow::anyhow!("gain expects a scalar on input 1"))?;
        let scaled = samples.iter().map(|s| s * gain as f32).collect();
        Ok(vec![Payload::Signal(scaled).into()])
    }
}

fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "frameflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    guard
}

fn synthetic_signal(frame: u64) -> Payload {
    let phase = frame as f32 * 0.1;
    Payload::Signal(
        (0..SIGNAL_LEN)
            .map(|i| (phase + i as f32 / SIGNAL_LEN as f32 * std::f32::consts::TAU).sin())
            .collect(),
    )
}

fn build_pipeline(config: &FrameflowConfig) -> frameflow::Result<(Pipeline, frameflow::pipeline::ReaderId)> {
    let mut pipeline = Pipeline::new(&config.streaming);

    let stream = pipeline
        .add_stage(StreamerStage::from_config(&config.streamer).with_generator(synthetic_signal));
    let pass = pipeline.add_stage(PassthroughStage::new());
    let calibration = pipeline.add_stage(ImporterStage::new(Payload::Scalar(0.5)));
    let gain = pipeline.add_plugin(Box::new(Gain));

    pipeline.link(stream, 0, pass, 0).context("Linking streamer")?;
    pipeline.link(pass, 0, gain, 0).context("Linking signal into gain")?;
    pipeline
        .link(calibration, 0, gain, 1)
        .context("Linking calibration into gain")?;

    let out = pipeline.output_port(gain, 0)?;
    let reader = pipeline.add_reader(out)?;
    Ok((pipeline, reader))
}

fn main() -> frameflow::Result<()> {
    let loaded = std::env::args().nth(1).map(FrameflowConfig::load);
    let (config, load_error) = match loaded {
        Some(Ok(config)) => (config, None),
        Some(Err(e)) => (FrameflowConfig::default(), Some(e)),
        None => (FrameflowConfig::default(), None),
    };

    let _log_guard = init_logging(&config.logging);
    if let Some(e) = load_error {
        tracing::warn!("Failed to load config, using defaults: {}", e);
    }

    tracing::info!(
        "Starting Frameflow demo ({}, {} frames every {} ms)",
        config.streaming.mode,
        config.streamer.total_frames,
        config.streamer.pacing_ms
    );

    let (pipeline, reader) = build_pipeline(&config)?;
    let runner = PipelineRunner::spawn(pipeline, reader);

    while let Some(event) = runner.recv() {
        match event {
            FrameEvent::Frame(snapshot) => {
                let peak = match &snapshot.payload {
                    Payload::Signal(samples) => samples.iter().fold(0.0f32, |m, s| m.max(s.abs())),
                    _ => 0.0,
                };
                tracing::info!(
                    "Frame {}{} peak {:.3} (created {})",
                    snapshot.frame.frame_id,
                    if snapshot.frame.is_last_frame { " [last]" } else { "" },
                    peak,
                    snapshot.created_at.format("%H:%M:%S%.3f")
                );
            }
            FrameEvent::Finished { frames } => {
                tracing::info!("Stream finished after {} frames", frames);
                break;
            }
            FrameEvent::Stalled => {
                tracing::warn!("Pipeline stalled");
                break;
            }
            FrameEvent::Error(message) => {
                tracing::error!("Pipeline error: {}", message);
                break;
            }
        }
    }

    match runner.join() {
        Ok(pipeline) => tracing::info!("Shutting down ({} live records)", pipeline.live_records()),
        Err(_) => tracing::error!("Runner thread panicked"),
    }
    Ok(())
}
