use serde::Serialize;

use crate::snapshot::model::Metric;

#[derive(Debug, thiserror::Error)]
pub enum LoadviewError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("Node '{node}' has no {metric} metric")]
    MissingMetric { node: String, metric: Metric },

    #[error("Output sink has no slot '{slot}'")]
    InvalidSink { slot: String },

    #[error("Node not found: {0}")]
    NodeNotFound(String),
}

impl Serialize for LoadviewError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
