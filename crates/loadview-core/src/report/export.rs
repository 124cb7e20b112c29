use chrono::{SecondsFormat, Utc};

use super::ReportOptions;
use crate::error::LoadviewError;
use crate::render::{render, Arm, Slot, SlotMap, WriteMode};
use crate::snapshot::model::{Metric, Split, StatsNode};
use crate::snapshot::StatsSnapshot;

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Export every node of a snapshot as CSV.
///
/// Columns: slug, name, kind, one column per render slot (named by slot id),
/// then the four latency bucket counts (`group1Count`..`group4Count`).
/// Absent metrics leave empty cells.
pub fn export_csv(snapshot: &StatsSnapshot) -> Result<String, LoadviewError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![
        "path_formatted".to_string(),
        "name".to_string(),
        "kind".to_string(),
    ];
    header.extend(Slot::all().map(Slot::id));
    header.extend((1..=4).map(|i| format!("group{i}Count")));
    writer.write_record(&header)?;

    for node in snapshot.iter() {
        let mut row = vec![
            node.path_formatted.clone(),
            node.name.clone(),
            node.kind.to_string(),
        ];
        row.extend(Slot::all().map(|slot| {
            node.metrics
                .get(slot.metric)
                .map(|split| slot.arm.pick(split).to_string())
                .unwrap_or_default()
        }));
        row.extend(node.metrics.buckets().iter().map(|b| b.count.to_string()));
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes)
        .map_err(|e| LoadviewError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

// ---------------------------------------------------------------------------
// JSON export
// ---------------------------------------------------------------------------

/// Export the node tree as pretty-printed JSON, loadable again with
/// [`crate::snapshot::io::parse_json`].
pub fn export_json(snapshot: &StatsSnapshot) -> Result<String, LoadviewError> {
    Ok(serde_json::to_string_pretty(snapshot.root())?)
}

// ---------------------------------------------------------------------------
// HTML export
// ---------------------------------------------------------------------------

/// Export a snapshot as a standalone HTML report with inline CSS.
///
/// The stats table cells carry the render slot ids and are filled through
/// [`render`], so the selected node must have every scalar metric.
pub fn export_html(
    snapshot: &StatsSnapshot,
    options: &ReportOptions,
) -> Result<String, LoadviewError> {
    let node = match options.node.as_deref() {
        Some(slug) => snapshot.node(slug)?,
        None => snapshot.root(),
    };

    let mut cells = SlotMap::standard(WriteMode::Replace);
    render(node, &mut cells)?;

    let title = options.resolve_title(snapshot);
    let run_meta = match snapshot.run() {
        Some(run) => format!(
            "<span>Simulation: {}</span><span>Started: {}</span>",
            html_escape(&run.simulation),
            run.started_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
        None => String::new(),
    };

    // --- stats table rows, one per metric ---
    let stats_rows: String = Metric::ALL
        .iter()
        .map(|&metric| {
            let tds: String = Arm::ALL
                .iter()
                .map(|&arm| {
                    let id = Slot { metric, arm }.id();
                    let value = cells.get(&id).unwrap_or_default();
                    format!("<td id=\"{}\">{}</td>", id, html_escape(value))
                })
                .collect();
            format!("<tr><td class=\"metric\">{}</td>{}</tr>", metric.label(), tds)
        })
        .collect::<Vec<_>>()
        .join("\n");

    // --- latency distribution rows ---
    let bucket_rows: String = node
        .metrics
        .buckets()
        .iter()
        .enumerate()
        .map(|(i, b)| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}%</td>\
                 <td><div class=\"bar bar{}\" style=\"width:{}%\"></div></td></tr>",
                html_escape(&b.label),
                b.count,
                b.percentage,
                i + 1,
                b.percentage.min(100),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    // --- per-request summary rows ---
    let request_rows: String = snapshot
        .requests()
        .map(|n| {
            format!(
                "<tr><td>{}</td><td class=\"slug\">{}</td><td>{}</td><td>{}</td>\
                 <td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                html_escape(&n.name),
                html_escape(&n.path_formatted),
                arm_text(n, Metric::RequestCount, Arm::Total),
                arm_text(n, Metric::RequestCount, Arm::Ok),
                arm_text(n, Metric::RequestCount, Arm::Ko),
                arm_text(n, Metric::MeanLatency, Arm::Total),
                arm_text(n, Metric::P4, Arm::Total),
                arm_text(n, Metric::MeanThroughput, Arm::Total),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let generated = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<style>
  *, *::before, *::after {{ box-sizing: border-box; }}
  body {{
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    margin: 0; padding: 2rem;
    background: #0f172a; color: #e2e8f0;
    line-height: 1.5;
  }}
  h1 {{ font-size: 1.75rem; font-weight: 700; color: #f1f5f9; margin: 0 0 0.25rem; }}
  h2 {{ font-size: 1.125rem; font-weight: 600; color: #94a3b8;
        text-transform: uppercase; letter-spacing: 0.05em;
        margin: 2rem 0 0.75rem; border-bottom: 1px solid #1e293b; padding-bottom: 0.5rem; }}
  .meta {{ color: #64748b; font-size: 0.875rem; margin-bottom: 2rem; }}
  .meta span {{ margin-right: 1.5rem; }}
  table {{
    width: 100%; border-collapse: collapse; font-size: 0.8125rem;
    background: #1e293b; border-radius: 0.5rem; overflow: hidden;
    margin-bottom: 2rem;
  }}
  thead {{ background: #0f172a; }}
  th {{
    padding: 0.625rem 0.875rem; text-align: left;
    font-weight: 600; color: #94a3b8;
    text-transform: uppercase; letter-spacing: 0.04em;
    font-size: 0.75rem;
  }}
  td {{ padding: 0.5rem 0.875rem; border-top: 1px solid #334155; color: #cbd5e1; }}
  td.metric {{ color: #94a3b8; }}
  td.slug {{ font-family: monospace; font-size: 0.75rem; color: #64748b; }}
  .bar {{ height: 0.75rem; border-radius: 0.25rem; }}
  .bar1 {{ background: #34d399; }}
  .bar2 {{ background: #fbbf24; }}
  .bar3 {{ background: #fb923c; }}
  .bar4 {{ background: #f87171; }}
  footer {{
    margin-top: 3rem; padding-top: 1rem; border-top: 1px solid #1e293b;
    color: #475569; font-size: 0.8125rem;
  }}
</style>
</head>
<body>
<h1>{title}</h1>
<div class="meta">
  {run_meta}
  <span>Node: {node_name} ({node_kind})</span>
</div>

<h2>Statistics</h2>
<table>
  <thead>
    <tr><th>Metric</th><th>Total</th><th>OK</th><th>KO</th></tr>
  </thead>
  <tbody>
{stats_rows}
  </tbody>
</table>

<h2>Response Time Distribution</h2>
<table>
  <thead>
    <tr><th>Range</th><th>Count</th><th>Share</th><th></th></tr>
  </thead>
  <tbody>
{bucket_rows}
  </tbody>
</table>

<h2>Requests</h2>
<table>
  <thead>
    <tr>
      <th>Request</th><th>Slug</th><th>Total</th><th>OK</th><th>KO</th>
      <th>Mean (ms)</th><th>Percentile 4 (ms)</th><th>Mean req/s</th>
    </tr>
  </thead>
  <tbody>
{request_rows}
  </tbody>
</table>

<footer>Generated by loadview &bull; {generated}</footer>
</body>
</html>
"#,
        title = html_escape(&title),
        run_meta = run_meta,
        node_name = html_escape(&node.name),
        node_kind = node.kind,
        stats_rows = stats_rows,
        bucket_rows = bucket_rows,
        request_rows = request_rows,
        generated = generated,
    ))
}

/// One arm of a metric as text, or `-` when the metric is absent.
fn arm_text(node: &StatsNode, metric: Metric, arm: Arm) -> String {
    node.metrics
        .get(metric)
        .map(|split: &Split| arm.pick(split).to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
