use std::path::PathBuf;

use flp_resolve::{NormalizeOptions, PlacementOrder, DEFAULT_PERCUSSION_MARKER};

/// Settings for one extraction run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportConfig {
    /// Directory the report files go into
    pub output_dir: PathBuf,
    /// Channel-name substring marking percussion channels
    pub percussion_marker: String,
    pub placement_order: PlacementOrder,
    /// Write one file per pattern
    pub pattern_files: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            percussion_marker: DEFAULT_PERCUSSION_MARKER.to_string(),
            placement_order: PlacementOrder::Encounter,
            pattern_files: true,
        }
    }
}

impl ReportConfig {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            percussion_marker: self.percussion_marker.clone(),
        }
    }
}
