//! flpinfo: extract notes and track sequences from FL Studio projects.
//!
//! Usage:
//!   flpinfo song.flp
//!   flpinfo song.flp -o reports --sort-placements

use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use flp_report::{
    ClockTime, Extractor, NoteLine, PlacementOrder, Project, ReportConfig, RunSummary,
    DEFAULT_PERCUSSION_MARKER, TOOL_NAME,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Notes shown per pattern while narrating.
const PREVIEW_NOTES: usize = 3;

/// Command-line arguments for flpinfo
#[derive(Parser, Debug)]
#[command(name = "flpinfo")]
#[command(about = "Extract notes and track sequences from FL Studio projects")]
#[command(version)]
struct Args {
    /// FL Studio project (.flp); asked for when omitted
    path: Option<String>,

    /// Directory for the report files
    #[arg(short, long, default_value = ".", env = "FLPINFO_OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Channel-name substring marking percussion channels (empty disables)
    #[arg(long, default_value = DEFAULT_PERCUSSION_MARKER, env = "FLPINFO_PERCUSSION_MARKER")]
    percussion_marker: String,

    /// Sort placements within a track by start time
    #[arg(long)]
    sort_placements: bool,

    /// Skip the per-pattern report files
    #[arg(long)]
    no_pattern_files: bool,

    /// Exit without waiting for Enter
    #[arg(long)]
    no_wait: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> ReportConfig {
        ReportConfig {
            output_dir: self.output_dir.clone(),
            percussion_marker: self.percussion_marker.clone(),
            placement_order: if self.sort_placements {
                PlacementOrder::StartTime
            } else {
                PlacementOrder::Encounter
            },
            pattern_files: !self.no_pattern_files,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    println!("{}", TOOL_NAME);
    println!("{}", "=".repeat(80));

    let status = match run_guarded(&args) {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("processing failed: {:?}", err);
            println!("\nProcessing failed: {:#}", err);
            ExitCode::FAILURE
        }
    };

    if !args.no_wait {
        println!("\nPress Enter to exit...");
        let _ = io::stdin().read_line(&mut String::new());
    }
    status
}

/// Run the pipeline, turning a panic into an error.
fn run_guarded(args: &Args) -> Result<RunSummary> {
    guarded(|| run(args))
}

fn guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| String::from("unknown panic"));
            Err(anyhow!("panic: {}", message))
        }
    }
}

fn run(args: &Args) -> Result<RunSummary> {
    let raw = match &args.path {
        Some(path) => path.clone(),
        None => prompt_path()?,
    };
    let path = PathBuf::from(strip_quotes(&raw));

    if !is_flp(&path) {
        warn!("{} does not have an .flp extension", path.display());
    }

    let extractor = Extractor::new(args.config());
    let project = extractor.load(&path)?;
    describe(&path, &project);

    let summary = extractor.process_project(&path, project)?;
    preview(&summary);
    Ok(summary)
}

fn prompt_path() -> Result<String> {
    print!("FLP file path: ");
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read path from stdin")?;
    Ok(line)
}

fn strip_quotes(raw: &str) -> &str {
    raw.trim().trim_matches(|c: char| c == '"' || c == '\'')
}

fn is_flp(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("flp"))
}

fn describe(path: &Path, project: &Project) {
    info!("Loaded {}", path.display());
    if let Some(title) = &project.title {
        println!("Title:    {}", title);
    }
    if let Some(version) = &project.version {
        println!("FL:       {}", version);
    }
    let timing = project.timing();
    println!("Tempo:    {} BPM, PPQ: {}", timing.tempo(), timing.ppq());

    println!("Channels: {}", project.channels.len());
    for (i, channel) in project.channels.iter().enumerate() {
        let id = channel.id.unwrap_or(i as i64);
        let name = channel.name.as_deref().unwrap_or("-");
        match &channel.plugin {
            Some(plugin) => println!("  [{}] {} ({})", id, name, plugin),
            None => println!("  [{}] {}", id, name),
        }
    }

    println!("Patterns: {}", project.patterns.len());
    for (i, pattern) in project.patterns.iter().enumerate() {
        println!(
            "  {:3}. {} ({} notes)",
            i + 1,
            pattern.name.as_deref().unwrap_or("-"),
            pattern.notes.len()
        );
    }
    println!();
}

fn preview(summary: &RunSummary) {
    let notes = &summary.extraction.notes;
    for group in &notes.groups {
        println!("{}: {} notes", group.name, group.notes.len());
        for (i, note) in notes.group_notes(group).take(PREVIEW_NOTES).enumerate() {
            println!(
                "  {}. {}  {}-{}",
                i + 1,
                NoteLine(note),
                ClockTime(note.start_secs),
                ClockTime(note.end_secs)
            );
        }
    }
}

fn print_summary(summary: &RunSummary) {
    let extraction = &summary.extraction;
    println!();
    println!("Notes:      {} ({} skipped)", extraction.notes.len(), extraction.notes.skipped);
    println!(
        "Tracks:     {} ({} placements, {} skipped)",
        extraction.timeline.tracks.len(),
        extraction.timeline.placement_count(),
        extraction.timeline.skipped
    );

    let written = &summary.written;
    if written.is_empty() {
        println!("No report files written (nothing to report)");
    }
    for path in written
        .all_notes
        .iter()
        .chain(&written.patterns)
        .chain(&written.track_sequence)
    {
        println!("Wrote {}", path.display());
    }
    println!("Done in {:.2}s", summary.elapsed.as_secs_f64());
}
