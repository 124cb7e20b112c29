use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TextFormat {
    /// Human-readable lines.
    Text,
    /// A single JSON document on stdout.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// Standalone HTML report page.
    Html,
    /// The node tree as pretty-printed JSON.
    Json,
    /// One row per node.
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "loadview",
    author,
    version,
    about = "Inspect and export load-test statistics snapshots",
    long_about = "loadview reads the statistics a load-test run leaves behind (a report directory containing js/stats.js, a stats.js script, or the same tree as JSON), validates it and renders or exports it.",
    after_help = "Examples:\n  loadview list results/englabstresstest-20251107225345549\n  loadview render stats.js --node req_creation-1820421855\n  loadview validate stats.json --format json\n  loadview export results/run-20251107225345549 --format html -o report.html"
)]
pub struct Cli {
    /// Log filter for stderr output (e.g. warn, debug, loadview_core=trace)
    #[arg(long, global = true, env = "LOADVIEW_LOG", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List every node of a snapshot
    List(ListArgs),

    /// Render one node's metrics as named slots
    Render(RenderArgs),

    /// Check a snapshot against its invariants
    Validate(ValidateArgs),

    /// Write a report in HTML, JSON or CSV
    Export(ExportArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Report directory, stats.js script or JSON snapshot
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Report directory, stats.js script or JSON snapshot
    pub input: PathBuf,

    /// Slug (pathFormatted) of the node to render; defaults to the root
    #[arg(long, value_name = "SLUG")]
    pub node: Option<String>,

    #[arg(long, value_enum, default_value_t = TextFormat::Text)]
    pub format: TextFormat,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Report directory, stats.js script or JSON snapshot
    pub input: PathBuf,

    #[arg(long, value_enum, default_value_t = TextFormat::Text)]
    pub format: TextFormat,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Report directory, stats.js script or JSON snapshot
    pub input: PathBuf,

    #[arg(long, value_enum)]
    pub format: ExportFormat,

    /// Page title for HTML reports
    #[arg(long, env = "LOADVIEW_TITLE")]
    pub title: Option<String>,

    /// Slug of the node shown in the HTML stats table; defaults to the root
    #[arg(long, value_name = "SLUG")]
    pub node: Option<String>,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
