//! Headless extraction pipeline for flpinfo.
//!
//! Loads an FLP file, runs the reconstruction layer and writes the text
//! reports. The CLI and the integration tests share this API.

mod config;
pub mod format;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use flp_resolve::{assemble_timeline, normalize_notes, Identities, NormalizedNotes, Timeline};
use thiserror::Error;
use tracing::{debug, info, warn};

// Re-export common types so callers don't need the lower crates directly.
pub use config::ReportConfig;
pub use flp_formats::FormatError;
pub use flp_ir::{ClockTime, Project};
pub use flp_resolve::{PlacementOrder, DEFAULT_PERCUSSION_MARKER};
pub use format::{
    safe_file_name, AllNotesReport, NoteLine, PatternReport, PlacementLine, ReportHeader,
    TrackSequenceReport, TOOL_NAME,
};

/// Fatal errors: the run produces no reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("file does not exist: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything derived from one project.
#[derive(Debug)]
pub struct Extraction {
    /// Source file name shown in report headers
    pub source_name: String,
    pub project: Project,
    pub identities: Identities,
    pub notes: NormalizedNotes,
    pub timeline: Timeline,
}

/// Run the reconstruction layer over a loaded project.
pub fn extract(project: Project, source_name: &str, config: &ReportConfig) -> Extraction {
    let identities = Identities::build(&project);
    let notes = normalize_notes(&project, &identities, &config.normalize_options());
    let timeline = assemble_timeline(&project, &identities, config.placement_order);
    Extraction {
        source_name: source_name.to_string(),
        project,
        identities,
        notes,
        timeline,
    }
}

impl Extraction {
    pub fn header(&self) -> ReportHeader<'_> {
        ReportHeader {
            source: &self.source_name,
            timing: self.project.timing(),
        }
    }

    pub fn all_notes_report(&self) -> AllNotesReport<'_> {
        AllNotesReport {
            header: self.header(),
            notes: &self.notes,
        }
    }

    pub fn pattern_reports(&self) -> impl Iterator<Item = PatternReport<'_>> + '_ {
        self.notes.groups.iter().map(move |group| PatternReport {
            header: self.header(),
            notes: &self.notes,
            group,
        })
    }

    pub fn track_sequence_report(&self) -> TrackSequenceReport<'_> {
        TrackSequenceReport {
            header: self.header(),
            timeline: &self.timeline,
        }
    }
}

/// Paths of the report files a run produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WrittenReports {
    pub all_notes: Option<PathBuf>,
    pub patterns: Vec<PathBuf>,
    pub track_sequence: Option<PathBuf>,
}

impl WrittenReports {
    pub fn count(&self) -> usize {
        self.all_notes.iter().count() + self.patterns.len() + self.track_sequence.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

fn write_file(path: PathBuf, contents: String) -> Result<PathBuf, ReportError> {
    match fs::write(&path, contents) {
        Ok(()) => {
            debug!("wrote {}", path.display());
            Ok(path)
        }
        Err(source) => Err(ReportError::Write { path, source }),
    }
}

fn create_dir(path: &Path) -> Result<(), ReportError> {
    fs::create_dir_all(path).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the reports for `extraction` into `config.output_dir`, with file
/// names derived from `stem`. Reports with nothing in them are not written.
pub fn write_reports(
    extraction: &Extraction,
    stem: &str,
    config: &ReportConfig,
) -> Result<WrittenReports, ReportError> {
    let mut written = WrittenReports::default();
    let out = &config.output_dir;
    if extraction.notes.is_empty() && extraction.timeline.is_empty() {
        return Ok(written);
    }
    create_dir(out)?;

    if !extraction.notes.is_empty() {
        let path = out.join(format!("{}_all_notes.txt", stem));
        written.all_notes = Some(write_file(path, extraction.all_notes_report().to_string())?);

        if config.pattern_files {
            let dir = out.join(format!("{}_patterns", stem));
            create_dir(&dir)?;
            for report in extraction.pattern_reports() {
                let stem = safe_file_name(&report.group.name);
                let mut path = dir.join(report.file_name());
                let mut n = 1;
                while written.patterns.contains(&path) {
                    n += 1;
                    path = dir.join(format!("{}_{}.txt", stem, n));
                }
                if n > 1 {
                    warn!(
                        "pattern {:?} shares its file name, writing {}",
                        report.group.name,
                        path.display()
                    );
                }
                written.patterns.push(write_file(path, report.to_string())?);
            }
        }
    }

    if !extraction.timeline.is_empty() {
        let path = out.join(format!("{}_track_sequence.txt", stem));
        written.track_sequence = Some(write_file(path, extraction.track_sequence_report().to_string())?);
    }

    Ok(written)
}

/// Outcome of processing one file.
#[derive(Debug)]
pub struct RunSummary {
    pub source: PathBuf,
    pub extraction: Extraction,
    pub written: WrittenReports,
    pub elapsed: Duration,
}

/// Headless extractor: one file in, reports out.
#[derive(Clone, Debug, Default)]
pub struct Extractor {
    config: ReportConfig,
}

impl Extractor {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Read and decode a project file.
    pub fn load(&self, path: &Path) -> Result<Project, ReportError> {
        if !path.is_file() {
            return Err(ReportError::NotFound(path.to_path_buf()));
        }
        let data = fs::read(path).map_err(|source| ReportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        flp_formats::load_flp(&data).map_err(|source| ReportError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Extract and write reports for an already loaded project.
    pub fn process_project(&self, path: &Path, project: Project) -> Result<RunSummary, ReportError> {
        let started = Instant::now();
        let extraction = extract(project, &file_name(path), &self.config);
        let written = write_reports(&extraction, &file_stem(path), &self.config)?;
        info!(
            "{}: {} notes, {} tracks, {} files written",
            extraction.source_name,
            extraction.notes.len(),
            extraction.timeline.tracks.len(),
            written.count()
        );
        Ok(RunSummary {
            source: path.to_path_buf(),
            extraction,
            written,
            elapsed: started.elapsed(),
        })
    }

    /// Load, extract and write reports for one file.
    pub fn process(&self, path: &Path) -> Result<RunSummary, ReportError> {
        let project = self.load(path)?;
        self.process_project(path, project)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("project"))
}
