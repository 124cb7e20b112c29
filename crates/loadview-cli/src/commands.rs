use std::io::Write;

use anyhow::Context as _;
use chrono::SecondsFormat;
use loadview_core::render::{render, AppendLog, SlotMap, WriteMode};
use loadview_core::report::{export_csv, export_html, export_json, ReportOptions};
use loadview_core::snapshot::io::{load, read_tree};
use loadview_core::snapshot::validation::validate_tree;
use loadview_core::snapshot::{Metric, StatsNode, StatsSnapshot};
use loadview_core::LoadviewError;
use serde::Serialize;

use crate::cli::{ExportArgs, ExportFormat, ListArgs, RenderArgs, TextFormat, ValidateArgs};
use crate::exit_codes::ExitCode;

async fn load_input(input: &std::path::Path) -> anyhow::Result<StatsSnapshot> {
    load(input)
        .await
        .with_context(|| format!("failed to load snapshot from {}", input.display()))
}

fn select<'a>(snapshot: &'a StatsSnapshot, slug: Option<&str>) -> anyhow::Result<&'a StatsNode> {
    Ok(match slug {
        Some(slug) => snapshot.node(slug)?,
        None => snapshot.root(),
    })
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

pub async fn list(args: ListArgs, out: &mut impl Write) -> anyhow::Result<ExitCode> {
    let snapshot = load_input(&args.input).await?;

    if let Some(run) = snapshot.run() {
        writeln!(
            out,
            "{} (started {})",
            run.simulation,
            run.started_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )?;
    }
    writeln!(out, "{:<40} {:<8} {:>10}  NAME", "SLUG", "KIND", "REQUESTS")?;
    for node in snapshot.iter() {
        let requests = node
            .metrics
            .get(Metric::RequestCount)
            .map(|s| s.total.to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{:<40} {:<8} {:>10}  {}",
            node.path_formatted,
            node.kind.to_string(),
            requests,
            node.name
        )?;
    }
    Ok(ExitCode::Success)
}

// ---------------------------------------------------------------------------
// render
// ---------------------------------------------------------------------------

pub async fn render_node(args: RenderArgs, out: &mut impl Write) -> anyhow::Result<ExitCode> {
    let snapshot = load_input(&args.input).await?;
    let node = select(&snapshot, args.node.as_deref())?;

    match args.format {
        TextFormat::Text => {
            let mut log = AppendLog::new();
            render(node, &mut log)?;
            for (slot, value) in log.entries() {
                writeln!(out, "{slot}={value}")?;
            }
        }
        TextFormat::Json => {
            let mut slots = SlotMap::standard(WriteMode::Replace);
            render(node, &mut slots)?;
            serde_json::to_writer_pretty(&mut *out, &slots)?;
            writeln!(out)?;
        }
    }
    Ok(ExitCode::Success)
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ValidationReport {
    valid: bool,
    nodes: usize,
    errors: Vec<LoadviewError>,
    /// Nodes that load but cannot be rendered.
    warnings: Vec<String>,
}

fn collect_warnings(node: &StatsNode, warnings: &mut Vec<String>) {
    let missing = node.metrics.missing();
    if !missing.is_empty() {
        let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
        warnings.push(format!(
            "{}: missing {}",
            node.path_formatted,
            names.join(", ")
        ));
    }
    for child in node.children.values() {
        collect_warnings(child, warnings);
    }
}

fn count_nodes(node: &StatsNode) -> usize {
    1 + node.children.values().map(count_nodes).sum::<usize>()
}

pub async fn validate(args: ValidateArgs, out: &mut impl Write) -> anyhow::Result<ExitCode> {
    let (tree, _run) = read_tree(&args.input)
        .await
        .with_context(|| format!("failed to read snapshot from {}", args.input.display()))?;

    let errors = validate_tree(&tree);
    let mut warnings = Vec::new();
    collect_warnings(&tree, &mut warnings);
    let report = ValidationReport {
        valid: errors.is_empty(),
        nodes: count_nodes(&tree),
        errors,
        warnings,
    };
    tracing::debug!(
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "validated snapshot"
    );

    match args.format {
        TextFormat::Text => {
            for err in &report.errors {
                writeln!(out, "error: {err}")?;
            }
            for warning in &report.warnings {
                writeln!(out, "warning: {warning}")?;
            }
            if report.valid {
                writeln!(out, "ok: {} nodes", report.nodes)?;
            }
        }
        TextFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
    }

    Ok(if report.valid {
        ExitCode::Success
    } else {
        ExitCode::ValidationFailed
    })
}

// ---------------------------------------------------------------------------
// export
// ---------------------------------------------------------------------------

pub async fn export(args: ExportArgs, out: &mut impl Write) -> anyhow::Result<ExitCode> {
    let snapshot = load_input(&args.input).await?;
    let options = ReportOptions {
        title: args.title,
        node: args.node,
    };

    let content = match args.format {
        ExportFormat::Html => export_html(&snapshot, &options)?,
        ExportFormat::Json => export_json(&snapshot)?,
        ExportFormat::Csv => export_csv(&snapshot)?,
    };

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, content)
                .await
                .map_err(LoadviewError::from)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => out.write_all(content.as_bytes())?,
    }
    Ok(ExitCode::Success)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
