use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::LoadviewError;
use crate::snapshot::model::StatsNode;
use crate::snapshot::{RunInfo, StatsSnapshot};

/// Location of the statistics script inside a report directory.
pub const STATS_SCRIPT: &str = "js/stats.js";

static STATS_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"var\s+stats\s*=\s*").expect("stats assignment pattern is valid")
});

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse the root node of a JSON document without validating it.
pub fn parse_json_tree(content: &str) -> Result<StatsNode, LoadviewError> {
    serde_json::from_str(content).map_err(|e| LoadviewError::MalformedSnapshot(e.to_string()))
}

/// Parse the root node of the engine's `stats.js` script without validating
/// it.
///
/// The script assigns an object literal to `var stats` and may define
/// functions after it; only the literal is read. Bare identifier keys
/// (`type: "GROUP"`) are quoted before the literal is parsed as JSON.
pub fn parse_stats_js_tree(content: &str) -> Result<StatsNode, LoadviewError> {
    let literal = extract_stats_literal(content)?;
    parse_json_tree(&quote_bare_keys(literal))
}

/// Parse and validate a snapshot from a JSON document whose top level is the
/// root node.
pub fn parse_json(content: &str) -> Result<StatsSnapshot, LoadviewError> {
    build(parse_json_tree(content)?)
}

/// Parse and validate a snapshot from the engine's `stats.js` script.
pub fn parse_stats_js(content: &str) -> Result<StatsSnapshot, LoadviewError> {
    build(parse_stats_js_tree(content)?)
}

fn build(root: StatsNode) -> Result<StatsSnapshot, LoadviewError> {
    let snapshot = StatsSnapshot::new(root)?;
    for node in snapshot.iter() {
        let missing = node.metrics.missing();
        if !missing.is_empty() {
            tracing::warn!(
                node = %node.path_formatted,
                ?missing,
                "node is missing scalar metrics and cannot be rendered"
            );
        }
    }
    tracing::debug!(nodes = snapshot.len(), "snapshot loaded");
    Ok(snapshot)
}

/// Return the `{ ... }` literal assigned to `var stats`.
fn extract_stats_literal(content: &str) -> Result<&str, LoadviewError> {
    let start = STATS_ASSIGNMENT
        .find(content)
        .ok_or_else(|| {
            LoadviewError::MalformedSnapshot("no `var stats = ...` assignment found".to_string())
        })?
        .end();

    let body = &content[start..];
    if !body.starts_with('{') {
        return Err(LoadviewError::MalformedSnapshot(
            "`var stats` is not assigned an object literal".to_string(),
        ));
    }

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&body[..=idx]);
                }
            }
            _ => {}
        }
    }

    Err(LoadviewError::MalformedSnapshot(
        "unterminated `var stats` object literal".to_string(),
    ))
}

/// Quote identifier keys that directly follow `{` or `,`, leaving string
/// contents untouched.
fn quote_bare_keys(literal: &str) -> String {
    let chars: Vec<char> = literal.chars().collect();
    let mut out = String::with_capacity(literal.len() + 64);
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut last_significant: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if let Some(q) = quote {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
                last_significant = Some(ch);
            }
            i += 1;
            continue;
        }

        let key_position = matches!(last_significant, Some('{') | Some(','));
        if key_position && (ch.is_alphabetic() || ch == '_' || ch == '$') {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
            {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            let next = chars[i..].iter().find(|c| !c.is_whitespace());
            if next == Some(&':') {
                out.push('"');
                out.push_str(&ident);
                out.push('"');
            } else {
                out.push_str(&ident);
            }
            last_significant = ident.chars().last();
            continue;
        }

        if ch == '"' || ch == '\'' {
            quote = Some(ch);
        }
        if !ch.is_whitespace() {
            last_significant = Some(ch);
        }
        out.push(ch);
        i += 1;
    }

    out
}

// ---------------------------------------------------------------------------
// Loading from disk
// ---------------------------------------------------------------------------

/// Read a snapshot file without validating it: `.js` files are treated as
/// the engine's script, anything else as JSON.
async fn read_file_tree(path: &Path) -> Result<StatsNode, LoadviewError> {
    let content = tokio::fs::read_to_string(path).await?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "read snapshot file");
    let is_script = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("js"));
    if is_script {
        parse_stats_js_tree(&content)
    } else {
        parse_json_tree(&content)
    }
}

/// Read the unvalidated node tree from a report directory or a single
/// snapshot file, together with the run identity when the input is a report
/// directory whose name encodes one.
pub async fn read_tree(
    path: impl AsRef<Path>,
) -> Result<(StatsNode, Option<RunInfo>), LoadviewError> {
    let path = path.as_ref();
    if tokio::fs::metadata(path).await?.is_dir() {
        read_report_dir_tree(path).await
    } else {
        Ok((read_file_tree(path).await?, None))
    }
}

async fn read_report_dir_tree(
    dir: &Path,
) -> Result<(StatsNode, Option<RunInfo>), LoadviewError> {
    let tree = read_file_tree(&dir.join(STATS_SCRIPT)).await?;
    let run = dir
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(RunInfo::from_report_dir_name);
    Ok((tree, run))
}

fn with_run(snapshot: StatsSnapshot, run: Option<RunInfo>) -> StatsSnapshot {
    match run {
        Some(run) => snapshot.with_run(run),
        None => snapshot,
    }
}

/// Read and validate a single snapshot file.
pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<StatsSnapshot, LoadviewError> {
    build(read_file_tree(path.as_ref()).await?)
}

/// Read and validate `js/stats.js` from an engine report directory.
pub async fn load_report_dir(dir: impl AsRef<Path>) -> Result<StatsSnapshot, LoadviewError> {
    let (tree, run) = read_report_dir_tree(dir.as_ref()).await?;
    Ok(with_run(build(tree)?, run))
}

/// Load from a report directory or a single snapshot file.
pub async fn load(path: impl AsRef<Path>) -> Result<StatsSnapshot, LoadviewError> {
    let path = path.as_ref();
    if tokio::fs::metadata(path).await?.is_dir() {
        load_report_dir(path).await
    } else {
        load_snapshot(path).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
