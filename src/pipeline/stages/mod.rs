//! Built-in pipeline stage implementations.

pub mod importer;
pub mod passthrough;
pub mod streamer;

pub use importer::ImporterStage;
pub use passthrough::PassthroughStage;
pub use streamer::StreamerStage;
