pub mod io;
pub mod model;
pub mod validation;

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::LoadviewError;
pub use model::{LatencyBucket, Metric, MetricSet, NodeKind, Scalar, Split, StatsNode};

// ---------------------------------------------------------------------------
// RunInfo
// ---------------------------------------------------------------------------

static REPORT_DIR_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<sim>.+)-(?P<secs>\d{14})(?P<millis>\d{3})$")
        .expect("report directory pattern is valid")
});

/// Simulation name and start time of a test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunInfo {
    pub simulation: String,
    pub started_at: DateTime<Utc>,
}

impl RunInfo {
    /// Parse a report directory name of the form
    /// `<simulation>-<yyyyMMddHHmmssSSS>`, e.g.
    /// `englabstresstest-20251107225345549`. The timestamp is taken as UTC.
    pub fn from_report_dir_name(name: &str) -> Option<Self> {
        let caps = REPORT_DIR_NAME.captures(name)?;
        let naive = NaiveDateTime::parse_from_str(&caps["secs"], "%Y%m%d%H%M%S").ok()?;
        let millis: i64 = caps["millis"].parse().ok()?;
        let started_at = naive.and_utc() + TimeDelta::milliseconds(millis);
        Some(Self {
            simulation: caps["sim"].to_string(),
            started_at,
        })
    }
}

// ---------------------------------------------------------------------------
// StatsSnapshot
// ---------------------------------------------------------------------------

/// The complete, read-only statistics tree of one test run.
///
/// Built once (normally by the loader in [`io`]) and never mutated. It holds
/// no interior mutability, so a shared reference can be handed to any number
/// of threads rendering different nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    root: StatsNode,
    run: Option<RunInfo>,
}

impl StatsSnapshot {
    /// Wrap a node tree, checking every data-model invariant first.
    ///
    /// All violations are reported together in one
    /// [`LoadviewError::MalformedSnapshot`].
    pub fn new(root: StatsNode) -> Result<Self, LoadviewError> {
        let errors = validation::validate_tree(&root);
        if !errors.is_empty() {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(LoadviewError::MalformedSnapshot(joined));
        }
        Ok(Self { root, run: None })
    }

    pub fn with_run(mut self, run: RunInfo) -> Self {
        self.run = Some(run);
        self
    }

    pub fn root(&self) -> &StatsNode {
        &self.root
    }

    pub fn run(&self) -> Option<&RunInfo> {
        self.run.as_ref()
    }

    /// Resolve the root or any nested node by its slug.
    pub fn lookup(&self, path_formatted: &str) -> Option<&StatsNode> {
        self.iter().find(|n| n.path_formatted == path_formatted)
    }

    /// Like [`lookup`](Self::lookup), for callers that treat an unknown slug
    /// as an error.
    pub fn node(&self, path_formatted: &str) -> Result<&StatsNode, LoadviewError> {
        self.lookup(path_formatted)
            .ok_or_else(|| LoadviewError::NodeNotFound(path_formatted.to_string()))
    }

    /// Depth-first traversal: the root first, siblings in slug order.
    pub fn iter(&self) -> Nodes<'_> {
        Nodes {
            stack: vec![&self.root],
        }
    }

    /// All request (leaf) nodes in traversal order.
    pub fn requests(&self) -> impl Iterator<Item = &StatsNode> {
        self.iter().filter(|n| n.kind == NodeKind::Request)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Always false: a snapshot holds at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Depth-first iterator over the nodes of a [`StatsSnapshot`].
pub struct Nodes<'a> {
    stack: Vec<&'a StatsNode>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a StatsNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.values().rev());
        Some(node)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
