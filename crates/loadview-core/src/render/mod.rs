pub mod sink;

use std::fmt;

use crate::error::LoadviewError;
use crate::snapshot::model::{Metric, Scalar, Split, StatsNode};

pub use sink::{AppendLog, SlotMap, WriteMode};

/// Number of slots written by [`render`]: one per metric per arm.
pub const SLOT_COUNT: usize = Metric::ALL.len() * Arm::ALL.len();

// ---------------------------------------------------------------------------
// Arm
// ---------------------------------------------------------------------------

/// One side of a [`Split`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arm {
    Total,
    Ok,
    Ko,
}

impl Arm {
    pub const ALL: [Arm; 3] = [Arm::Total, Arm::Ok, Arm::Ko];

    /// Suffix appended to the metric key to form the slot id.
    pub fn suffix(self) -> &'static str {
        match self {
            Arm::Total => "",
            Arm::Ok => "OK",
            Arm::Ko => "KO",
        }
    }

    pub fn pick(self, split: &Split) -> Scalar {
        match self {
            Arm::Total => split.total,
            Arm::Ok => split.ok,
            Arm::Ko => split.ko,
        }
    }
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// A named output position, e.g. `numberOfRequestsKO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub metric: Metric,
    pub arm: Arm,
}

impl Slot {
    pub fn id(self) -> String {
        self.to_string()
    }

    /// Every slot in write order: metrics in report order, then total, ok, ko.
    pub fn all() -> impl Iterator<Item = Slot> {
        Metric::ALL
            .into_iter()
            .flat_map(|metric| Arm::ALL.into_iter().map(move |arm| Slot { metric, arm }))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.metric.wire_key(), self.arm.suffix())
    }
}

// ---------------------------------------------------------------------------
// OutputSink
// ---------------------------------------------------------------------------

/// A write target exposing named slots.
pub trait OutputSink {
    /// Whether the sink has a slot with this id.
    fn has_slot(&self, slot: &str) -> bool;

    /// Write text into a slot. Only called for slots that exist.
    fn append(&mut self, slot: &str, value: &str);
}

// ---------------------------------------------------------------------------
// render
// ---------------------------------------------------------------------------

/// Copy the scalar metrics of `node` into `sink`, one slot per metric arm.
///
/// Both the node and the sink are checked before the first write, so on
/// error the sink is left untouched.
pub fn render<S>(node: &StatsNode, sink: &mut S) -> Result<(), LoadviewError>
where
    S: OutputSink + ?Sized,
{
    let mut splits = Vec::with_capacity(Metric::ALL.len());
    for metric in Metric::ALL {
        let split = node
            .metrics
            .get(metric)
            .ok_or_else(|| LoadviewError::MissingMetric {
                node: node.path_formatted.clone(),
                metric,
            })?;
        splits.push((metric, split));
    }

    if let Some(slot) = Slot::all().find(|s| !sink.has_slot(&s.id())) {
        return Err(LoadviewError::InvalidSink { slot: slot.id() });
    }

    for (metric, split) in splits {
        for arm in Arm::ALL {
            let slot = Slot { metric, arm };
            sink.append(&slot.id(), &arm.pick(split).to_string());
        }
    }

    tracing::debug!(node = %node.path_formatted, slots = SLOT_COUNT, "rendered node");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::io::parse_stats_js;
    use crate::snapshot::tests::make_metrics;
    use crate::snapshot::{NodeKind, StatsSnapshot};

    const SAMPLE: &str = include_str!("../../testdata/stats.js");

    fn sample() -> StatsSnapshot {
        parse_stats_js(SAMPLE).expect("sample should parse")
    }

    #[test]
    fn slot_ids_follow_engine_naming() {
        let ids: Vec<String> = Slot::all().map(Slot::id).collect();
        assert_eq!(ids.len(), SLOT_COUNT);
        assert_eq!(ids[0], "numberOfRequests");
        assert_eq!(ids[1], "numberOfRequestsOK");
        assert_eq!(ids[2], "numberOfRequestsKO");
        assert_eq!(ids[3], "minResponseTime");
        assert_eq!(ids[SLOT_COUNT - 1], "meanNumberOfRequestsPerSecondKO");
        assert!(ids.contains(&"percentiles3OK".to_string()));
    }

    #[test]
    fn slot_ids_are_unique() {
        let ids: std::collections::HashSet<String> = Slot::all().map(Slot::id).collect();
        assert_eq!(ids.len(), SLOT_COUNT);
    }

    #[test]
    fn slot_display_matches_id() {
        for slot in Slot::all() {
            assert_eq!(slot.to_string(), slot.id());
        }
    }

    #[test]
    fn render_root_request_counts() {
        let snap = sample();
        let mut sink = SlotMap::standard(WriteMode::Append);
        render(snap.root(), &mut sink).unwrap();
        assert_eq!(sink.get("numberOfRequests"), Some("515094"));
        assert_eq!(sink.get("numberOfRequestsOK"), Some("298366"));
        assert_eq!(sink.get("numberOfRequestsKO"), Some("216728"));
    }

    #[test]
    fn render_root_mean_response_time() {
        let snap = sample();
        let mut sink = SlotMap::standard(WriteMode::Append);
        render(snap.root(), &mut sink).unwrap();
        assert_eq!(sink.get("meanResponseTime"), Some("528"));
        assert_eq!(sink.get("meanResponseTimeOK"), Some("513"));
        assert_eq!(sink.get("meanResponseTimeKO"), Some("549"));
        assert_eq!(sink.get("meanNumberOfRequestsPerSecond"), Some("761.973"));
    }

    #[test]
    fn render_child_node() {
        let snap = sample();
        let node = snap.lookup("req_creation-1820421855").unwrap();
        let mut sink = SlotMap::standard(WriteMode::Replace);
        render(node, &mut sink).unwrap();
        assert_eq!(sink.get("numberOfRequests"), Some("150684"));
        assert_eq!(sink.get("meanNumberOfRequestsPerSecond"), Some("222.905"));
    }

    #[test]
    fn render_writes_every_slot_once_in_order() {
        let snap = sample();
        let mut log = AppendLog::new();
        render(snap.root(), &mut log).unwrap();
        let written: Vec<&str> = log.entries().iter().map(|(s, _)| s.as_str()).collect();
        let expected: Vec<String> = Slot::all().map(Slot::id).collect();
        assert_eq!(written.len(), SLOT_COUNT);
        assert_eq!(written, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn missing_metric_fails_without_writes() {
        let mut metrics = make_metrics(3, 1);
        metrics.p1 = None;
        let node = StatsNode::new(NodeKind::Request, "creation", "creation", "req_creation", metrics);
        let mut log = AppendLog::new();
        let err = render(&node, &mut log).unwrap_err();
        assert!(matches!(
            err,
            LoadviewError::MissingMetric { ref node, metric: Metric::P1 } if node == "req_creation"
        ));
        assert!(log.entries().is_empty());
    }

    #[test]
    fn sink_missing_slot_fails_without_writes() {
        let node = sample().root().clone();
        let slots = Slot::all()
            .map(Slot::id)
            .filter(|id| id != "percentiles4KO");
        let mut sink = SlotMap::with_slots(slots, WriteMode::Append);
        let err = render(&node, &mut sink).unwrap_err();
        assert!(matches!(err, LoadviewError::InvalidSink { ref slot } if slot == "percentiles4KO"));
        assert!(sink.iter().all(|(_, v)| v.is_empty()));
    }

    #[test]
    fn missing_metric_is_reported_before_invalid_sink() {
        let mut metrics = make_metrics(3, 1);
        metrics.mean_throughput = None;
        let node = StatsNode::new(NodeKind::Group, "All", "", "group_all", metrics);
        let mut sink = SlotMap::with_slots(Vec::<String>::new(), WriteMode::Append);
        let err = render(&node, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            LoadviewError::MissingMetric { metric: Metric::MeanThroughput, .. }
        ));
    }

    #[test]
    fn render_never_writes_outside_standard_slots() {
        let snap = sample();
        let mut extra = Slot::all().map(Slot::id).collect::<Vec<_>>();
        extra.push("requestTitle".to_string());
        let mut sink = SlotMap::with_slots(extra, WriteMode::Append);
        render(snap.root(), &mut sink).unwrap();
        assert_eq!(sink.get("requestTitle"), Some(""));
    }

    #[test]
    fn repeated_render_duplicates_on_append_sink() {
        let snap = sample();
        let mut sink = SlotMap::standard(WriteMode::Append);
        render(snap.root(), &mut sink).unwrap();
        render(snap.root(), &mut sink).unwrap();
        assert_eq!(sink.get("numberOfRequests"), Some("515094515094"));
    }

    #[test]
    fn repeated_render_is_stable_on_replace_sink() {
        let snap = sample();
        let mut sink = SlotMap::standard(WriteMode::Replace);
        render(snap.root(), &mut sink).unwrap();
        let first = sink.clone();
        render(snap.root(), &mut sink).unwrap();
        assert_eq!(sink, first);
    }

    #[test]
    fn render_through_trait_object() {
        let snap = sample();
        let mut log = AppendLog::new();
        let sink: &mut dyn OutputSink = &mut log;
        render(snap.root(), sink).unwrap();
        assert_eq!(log.entries().len(), SLOT_COUNT);
    }

    #[test]
    fn concurrent_renders_share_one_snapshot() {
        let snap = sample();
        let slugs: Vec<String> = snap.iter().map(|n| n.path_formatted.clone()).collect();
        let totals: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = slugs
                .iter()
                .map(|slug| {
                    let snap = &snap;
                    scope.spawn(move || {
                        let mut sink = SlotMap::standard(WriteMode::Replace);
                        render(snap.lookup(slug).unwrap(), &mut sink).unwrap();
                        sink.get("numberOfRequests").unwrap_or_default().to_string()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(totals.len(), 4);
        assert!(totals.contains(&"515094".to_string()));
        assert!(totals.contains(&"61260".to_string()));
    }
}
