use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    /// A named group of requests (the report root is always a group).
    Group,
    /// A single named request.
    Request,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Group => "GROUP",
            NodeKind::Request => "REQUEST",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Scalar
// ---------------------------------------------------------------------------

/// A single non-negative metric value.
///
/// The engine writes counts and latencies as strings (`"515094"`) but bucket
/// counts as numbers; both forms are normalized to `f64` when deserializing.
/// Anything that is not a finite, non-negative number is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Scalar(f64);

impl Scalar {
    /// Build a scalar, rejecting negative and non-finite values.
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value >= 0.0 {
            // Collapse -0.0 so it never displays with a sign.
            Some(Self(value + 0.0))
        } else {
            None
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<f64>().ok().and_then(Self::new)
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Self(f64::from(value))
    }
}

/// Shortest round-trip form: `515094`, `761.973`, `0`.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Scalar {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ScalarVisitor;

        impl Visitor<'_> for ScalarVisitor {
            type Value = Scalar;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative number or numeric string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Scalar, E> {
                Ok(Scalar(v as f64))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Scalar, E> {
                Scalar::new(v as f64)
                    .ok_or_else(|| E::custom(format!("metric value must not be negative (got {v})")))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Scalar, E> {
                Scalar::new(v).ok_or_else(|| {
                    E::custom(format!("metric value must be finite and non-negative (got {v})"))
                })
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Scalar, E> {
                Scalar::parse(v)
                    .ok_or_else(|| E::custom(format!("metric value '{v}' is not a non-negative number")))
            }
        }

        deserializer.deserialize_any(ScalarVisitor)
    }
}

// ---------------------------------------------------------------------------
// Split
// ---------------------------------------------------------------------------

/// A metric reported for all outcomes, successful ones and failed ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub total: Scalar,
    pub ok: Scalar,
    pub ko: Scalar,
}

impl Split {
    pub fn new(total: Scalar, ok: Scalar, ko: Scalar) -> Self {
        Self { total, ok, ko }
    }

    /// Convenience for whole-number splits such as request counts.
    pub fn counts(total: u32, ok: u32, ko: u32) -> Self {
        Self::new(total.into(), ok.into(), ko.into())
    }

    /// Whether the ok and ko arms add up to the total.
    pub fn is_additive(&self) -> bool {
        self.ok.value() + self.ko.value() == self.total.value()
    }
}

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

/// The scalar metrics of a [`MetricSet`], in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    RequestCount,
    MinLatency,
    MaxLatency,
    MeanLatency,
    StdDeviation,
    P1,
    P2,
    P3,
    P4,
    MeanThroughput,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Metric::RequestCount,
        Metric::MinLatency,
        Metric::MaxLatency,
        Metric::MeanLatency,
        Metric::StdDeviation,
        Metric::P1,
        Metric::P2,
        Metric::P3,
        Metric::P4,
        Metric::MeanThroughput,
    ];

    /// Key used by the engine's output, which also names the output slot.
    pub fn wire_key(self) -> &'static str {
        match self {
            Metric::RequestCount => "numberOfRequests",
            Metric::MinLatency => "minResponseTime",
            Metric::MaxLatency => "maxResponseTime",
            Metric::MeanLatency => "meanResponseTime",
            Metric::StdDeviation => "standardDeviation",
            Metric::P1 => "percentiles1",
            Metric::P2 => "percentiles2",
            Metric::P3 => "percentiles3",
            Metric::P4 => "percentiles4",
            Metric::MeanThroughput => "meanNumberOfRequestsPerSecond",
        }
    }

    /// Human-readable label for tables.
    pub fn label(self) -> &'static str {
        match self {
            Metric::RequestCount => "Requests",
            Metric::MinLatency => "Min (ms)",
            Metric::MaxLatency => "Max (ms)",
            Metric::MeanLatency => "Mean (ms)",
            Metric::StdDeviation => "Std deviation (ms)",
            Metric::P1 => "Percentile 1 (ms)",
            Metric::P2 => "Percentile 2 (ms)",
            Metric::P3 => "Percentile 3 (ms)",
            Metric::P4 => "Percentile 4 (ms)",
            Metric::MeanThroughput => "Mean req/s",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_key())
    }
}

// ---------------------------------------------------------------------------
// LatencyBucket
// ---------------------------------------------------------------------------

/// Number and share of responses that fell into one response-time range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyBucket {
    #[serde(rename = "name")]
    pub label: String,
    /// Label with inline markup, as shown in the engine's own report.
    #[serde(rename = "htmlName")]
    pub display_label: String,
    pub count: u64,
    /// Rounded share of all requests, 0–100.
    pub percentage: u32,
}

impl LatencyBucket {
    pub fn new(label: impl Into<String>, count: u64, percentage: u32) -> Self {
        let label = label.into();
        Self {
            display_label: label.clone(),
            label,
            count,
            percentage,
        }
    }
}

// ---------------------------------------------------------------------------
// MetricSet
// ---------------------------------------------------------------------------

/// Aggregated statistics of one node.
///
/// Scalar metrics are optional at this level so that an incomplete node can
/// still be loaded and inspected; rendering requires all of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    #[serde(rename = "numberOfRequests", skip_serializing_if = "Option::is_none")]
    pub request_count: Option<Split>,
    #[serde(rename = "minResponseTime", skip_serializing_if = "Option::is_none")]
    pub min_latency: Option<Split>,
    #[serde(rename = "maxResponseTime", skip_serializing_if = "Option::is_none")]
    pub max_latency: Option<Split>,
    #[serde(rename = "meanResponseTime", skip_serializing_if = "Option::is_none")]
    pub mean_latency: Option<Split>,
    #[serde(rename = "standardDeviation", skip_serializing_if = "Option::is_none")]
    pub std_deviation: Option<Split>,
    #[serde(rename = "percentiles1", skip_serializing_if = "Option::is_none")]
    pub p1: Option<Split>,
    #[serde(rename = "percentiles2", skip_serializing_if = "Option::is_none")]
    pub p2: Option<Split>,
    #[serde(rename = "percentiles3", skip_serializing_if = "Option::is_none")]
    pub p3: Option<Split>,
    #[serde(rename = "percentiles4", skip_serializing_if = "Option::is_none")]
    pub p4: Option<Split>,
    #[serde(rename = "group1")]
    pub bucket1: LatencyBucket,
    #[serde(rename = "group2")]
    pub bucket2: LatencyBucket,
    #[serde(rename = "group3")]
    pub bucket3: LatencyBucket,
    #[serde(rename = "group4")]
    pub bucket4: LatencyBucket,
    #[serde(
        rename = "meanNumberOfRequestsPerSecond",
        skip_serializing_if = "Option::is_none"
    )]
    pub mean_throughput: Option<Split>,
}

impl MetricSet {
    pub fn get(&self, metric: Metric) -> Option<&Split> {
        match metric {
            Metric::RequestCount => self.request_count.as_ref(),
            Metric::MinLatency => self.min_latency.as_ref(),
            Metric::MaxLatency => self.max_latency.as_ref(),
            Metric::MeanLatency => self.mean_latency.as_ref(),
            Metric::StdDeviation => self.std_deviation.as_ref(),
            Metric::P1 => self.p1.as_ref(),
            Metric::P2 => self.p2.as_ref(),
            Metric::P3 => self.p3.as_ref(),
            Metric::P4 => self.p4.as_ref(),
            Metric::MeanThroughput => self.mean_throughput.as_ref(),
        }
    }

    pub fn set(&mut self, metric: Metric, split: Option<Split>) {
        let slot = match metric {
            Metric::RequestCount => &mut self.request_count,
            Metric::MinLatency => &mut self.min_latency,
            Metric::MaxLatency => &mut self.max_latency,
            Metric::MeanLatency => &mut self.mean_latency,
            Metric::StdDeviation => &mut self.std_deviation,
            Metric::P1 => &mut self.p1,
            Metric::P2 => &mut self.p2,
            Metric::P3 => &mut self.p3,
            Metric::P4 => &mut self.p4,
            Metric::MeanThroughput => &mut self.mean_throughput,
        };
        *slot = split;
    }

    /// The scalar metrics that are absent, in report order.
    pub fn missing(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| self.get(*m).is_none())
            .collect()
    }

    pub fn buckets(&self) -> [&LatencyBucket; 4] {
        [&self.bucket1, &self.bucket2, &self.bucket3, &self.bucket4]
    }
}

// ---------------------------------------------------------------------------
// StatsNode
// ---------------------------------------------------------------------------

/// A request group or a single request together with its statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsNode {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    #[serde(default)]
    pub path: String,
    /// Display-safe slug, unique within a report.
    #[serde(rename = "pathFormatted")]
    pub path_formatted: String,
    #[serde(rename = "stats")]
    pub metrics: MetricSet,
    /// Child nodes keyed by their slug. Only groups have children.
    #[serde(rename = "contents", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, StatsNode>,
}

impl StatsNode {
    pub fn new(
        kind: NodeKind,
        name: impl Into<String>,
        path: impl Into<String>,
        path_formatted: impl Into<String>,
        metrics: MetricSet,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            path: path.into(),
            path_formatted: path_formatted.into(),
            metrics,
            children: BTreeMap::new(),
        }
    }

    /// Attach a child under its own slug, replacing any previous child with
    /// the same slug.
    pub fn with_child(mut self, child: StatsNode) -> Self {
        self.children.insert(child.path_formatted.clone(), child);
        self
    }

    pub fn is_group(&self) -> bool {
        self.kind == NodeKind::Group
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
