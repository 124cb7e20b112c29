pub mod error;
pub mod render;
pub mod report;
pub mod snapshot;

pub use error::LoadviewError;
pub use render::{render, OutputSink};
pub use snapshot::{StatsNode, StatsSnapshot};
