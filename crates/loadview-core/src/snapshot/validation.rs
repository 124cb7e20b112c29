use std::collections::HashSet;

use crate::error::LoadviewError;
use crate::snapshot::model::{NodeKind, StatsNode};

/// Allowed distance between the sum of bucket percentages and 100. Each of
/// the four shares is rounded independently.
pub const PERCENTAGE_DRIFT: u32 = 2;

/// Validate a node tree and return every invariant violation found.
///
/// An empty `Vec` means the tree can be wrapped in a snapshot.
pub fn validate_tree(root: &StatsNode) -> Vec<LoadviewError> {
    let mut errors = Vec::new();

    if root.kind != NodeKind::Group {
        errors.push(malformed(
            &root.path_formatted,
            "root node must be a GROUP".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    validate_node(root, &mut seen, &mut errors);
    errors
}

fn validate_node<'a>(
    node: &'a StatsNode,
    seen: &mut HashSet<&'a str>,
    errors: &mut Vec<LoadviewError>,
) {
    let slug = node.path_formatted.as_str();

    if slug.trim().is_empty() {
        errors.push(malformed(
            &node.name,
            "pathFormatted must not be empty".to_string(),
        ));
    } else if !seen.insert(slug) {
        errors.push(malformed(slug, "duplicate pathFormatted".to_string()));
    }

    if node.kind == NodeKind::Request && !node.children.is_empty() {
        errors.push(malformed(
            slug,
            format!("REQUEST node has {} children", node.children.len()),
        ));
    }

    errors.extend(validate_metrics(node));

    for (key, child) in &node.children {
        if key != &child.path_formatted {
            errors.push(malformed(
                slug,
                format!(
                    "child key '{}' does not match its pathFormatted '{}'",
                    key, child.path_formatted
                ),
            ));
        }
        validate_node(child, seen, errors);
    }
}

fn validate_metrics(node: &StatsNode) -> Vec<LoadviewError> {
    let mut errors = Vec::new();
    let slug = node.path_formatted.as_str();
    let metrics = &node.metrics;

    let mut pct_out_of_range = false;
    for bucket in metrics.buckets() {
        if bucket.percentage > 100 {
            pct_out_of_range = true;
            errors.push(malformed(
                slug,
                format!(
                    "bucket '{}' percentage {} exceeds 100",
                    bucket.label, bucket.percentage
                ),
            ));
        }
    }

    // Bucket totals can only be checked against a request count.
    let Some(count) = metrics.request_count else {
        return errors;
    };

    for (arm, value) in [("total", count.total), ("ok", count.ok), ("ko", count.ko)] {
        if value.value().fract() != 0.0 {
            errors.push(malformed(
                slug,
                format!("numberOfRequests.{arm} must be a whole number (got {value})"),
            ));
        }
    }

    if !count.is_additive() {
        errors.push(malformed(
            slug,
            format!(
                "numberOfRequests ok ({}) + ko ({}) does not equal total ({})",
                count.ok, count.ko, count.total
            ),
        ));
    }

    let bucket_sum = metrics
        .buckets()
        .iter()
        .try_fold(0u64, |acc, b| acc.checked_add(b.count));
    match bucket_sum {
        None => errors.push(malformed(
            slug,
            "latency bucket counts overflow when summed".to_string(),
        )),
        Some(sum) if sum as f64 != count.total.value() => errors.push(malformed(
            slug,
            format!(
                "latency bucket counts sum to {} but numberOfRequests.total is {}",
                sum, count.total
            ),
        )),
        Some(_) => {}
    }

    // Shares above 100 are already reported and make the sum meaningless.
    if !pct_out_of_range {
        let pct_sum: u32 = metrics.buckets().iter().map(|b| b.percentage).sum();
        let all_zero = count.total.value() == 0.0 && pct_sum == 0;
        if !all_zero && pct_sum.abs_diff(100) > PERCENTAGE_DRIFT {
            errors.push(malformed(
                slug,
                format!("latency bucket percentages sum to {pct_sum}, expected about 100"),
            ));
        }
    }

    errors
}

fn malformed(slug: &str, message: String) -> LoadviewError {
    LoadviewError::MalformedSnapshot(format!("{slug}: {message}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::model::{LatencyBucket, MetricSet, Split};
    use crate::snapshot::tests::{make_metrics, make_tree};

    #[test]
    fn valid_tree_produces_no_errors() {
        assert!(validate_tree(&make_tree()).is_empty());
    }

    #[test]
    fn request_root_is_rejected() {
        let root = StatsNode::new(NodeKind::Request, "x", "x", "req_x", make_metrics(1, 0));
        let errors = validate_tree(&root);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("root node must be a GROUP"));
    }

    #[test]
    fn non_additive_request_count_is_rejected() {
        let mut root = make_tree();
        root.metrics.request_count = Some(Split::counts(40, 30, 9));
        let errors = validate_tree(&root);
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("does not equal total")));
    }

    #[test]
    fn latency_metrics_need_not_be_additive() {
        let mut root = make_tree();
        root.metrics.mean_latency = Some(Split::counts(528, 513, 549));
        root.metrics.max_latency = Some(Split::counts(12195, 9945, 12195));
        assert!(validate_tree(&root).is_empty());
    }

    #[test]
    fn bucket_counts_must_sum_to_total() {
        let mut root = make_tree();
        root.metrics.bucket3.count += 1;
        let errors = validate_tree(&root);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("bucket counts sum to 41"));
    }

    #[test]
    fn percentage_drift_within_tolerance_is_accepted() {
        let mut root = make_tree();
        // 75 + 25 -> 101, as produced by independent rounding.
        root.metrics.bucket1.percentage = 76;
        assert!(validate_tree(&root).is_empty());
    }

    #[test]
    fn percentage_drift_beyond_tolerance_is_rejected() {
        let mut root = make_tree();
        root.metrics.bucket1.percentage = 50;
        let errors = validate_tree(&root);
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("percentages sum to 75")));
    }

    #[test]
    fn percentage_above_hundred_is_rejected() {
        let mut root = make_tree();
        root.metrics.bucket2.percentage = 101;
        let errors = validate_tree(&root);
        assert!(errors.iter().any(|e| e.to_string().contains("exceeds 100")));
    }

    #[test]
    fn huge_percentages_are_rejected_without_summing() {
        let mut root = make_tree();
        root.metrics.bucket1.percentage = u32::MAX;
        root.metrics.bucket2.percentage = u32::MAX;
        let errors = validate_tree(&root);
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages
                .iter()
                .filter(|m| m.contains("exceeds 100"))
                .count(),
            2
        );
        assert!(!messages.iter().any(|m| m.contains("percentages sum to")));
    }

    #[test]
    fn overflowing_bucket_counts_are_rejected() {
        let mut root = make_tree();
        root.metrics.bucket1.count = u64::MAX;
        root.metrics.bucket2.count = u64::MAX;
        let errors = validate_tree(&root);
        assert_eq!(errors.len(), 1);
        assert!(errors[0]
            .to_string()
            .contains("group_all: latency bucket counts overflow"));
        assert!(matches!(errors[0], LoadviewError::MalformedSnapshot(_)));
    }

    #[test]
    fn empty_run_with_zero_percentages_is_accepted() {
        let root = StatsNode::new(NodeKind::Group, "All", "", "group_all", make_metrics(0, 0));
        assert!(validate_tree(&root).is_empty());
    }

    #[test]
    fn fractional_request_count_is_rejected() {
        let mut root = make_tree();
        let mut count = Split::counts(40, 30, 10);
        count.ok = crate::snapshot::model::Scalar::new(29.5).unwrap();
        count.ko = crate::snapshot::model::Scalar::new(10.5).unwrap();
        root.metrics.request_count = Some(count);
        let errors = validate_tree(&root);
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("must be a whole number")));
    }

    #[test]
    fn request_with_children_is_rejected() {
        let leaf = StatsNode::new(NodeKind::Request, "a", "a", "req_a", make_metrics(1, 0))
            .with_child(StatsNode::new(
                NodeKind::Request,
                "b",
                "b",
                "req_b",
                make_metrics(1, 0),
            ));
        let root = StatsNode::new(NodeKind::Group, "All", "", "group_all", make_metrics(1, 0))
            .with_child(leaf);
        let errors = validate_tree(&root);
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("REQUEST node has 1 children")));
    }

    #[test]
    fn duplicate_slugs_are_rejected() {
        let nested = StatsNode::new(NodeKind::Group, "g", "g", "group_g", make_metrics(1, 0))
            .with_child(StatsNode::new(
                NodeKind::Request,
                "again",
                "g / again",
                "req_creation",
                make_metrics(1, 0),
            ));
        let root = make_tree().with_child(nested);
        let errors = validate_tree(&root);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("req_creation: duplicate pathFormatted"));
    }

    #[test]
    fn mismatched_child_key_is_rejected() {
        let mut root = make_tree();
        let child = root.children.remove("req_creation").unwrap();
        root.children.insert("req_other".to_string(), child);
        let errors = validate_tree(&root);
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("child key 'req_other'")));
    }

    #[test]
    fn empty_slug_is_rejected() {
        let root = StatsNode::new(NodeKind::Group, "All", "", " ", make_metrics(1, 0));
        let errors = validate_tree(&root);
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("pathFormatted must not be empty")));
    }

    #[test]
    fn missing_scalar_metrics_are_not_validation_errors() {
        let mut metrics = make_metrics(3, 1);
        metrics.p1 = None;
        metrics.std_deviation = None;
        let root = StatsNode::new(NodeKind::Group, "All", "", "group_all", metrics);
        assert!(validate_tree(&root).is_empty());
    }

    #[test]
    fn node_without_request_count_skips_bucket_checks() {
        let metrics = MetricSet {
            bucket1: LatencyBucket::new("t < 800 ms", 7, 100),
            ..MetricSet::default()
        };
        let root = StatsNode::new(NodeKind::Group, "All", "", "group_all", metrics);
        assert!(validate_tree(&root).is_empty());
    }
}
