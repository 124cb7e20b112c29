pub mod export;

use serde::{Deserialize, Serialize};

use crate::snapshot::StatsSnapshot;

pub use export::{export_csv, export_html, export_json};

/// Title used when neither the options nor the run name provide one.
pub const DEFAULT_TITLE: &str = "Load test report";

/// Options controlling report exports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReportOptions {
    /// Page title. Falls back to the simulation name, then [`DEFAULT_TITLE`].
    #[serde(default)]
    pub title: Option<String>,
    /// Slug of the node shown in the stats table. Defaults to the root.
    #[serde(default)]
    pub node: Option<String>,
}

impl ReportOptions {
    pub fn resolve_title(&self, snapshot: &StatsSnapshot) -> String {
        self.title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| snapshot.run().map(|r| r.simulation.clone()))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string())
    }
}
