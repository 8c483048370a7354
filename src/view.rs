//! The two plots drawn from one table.

use crate::model::Row;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Process index against relative time.
    Timeline,
    /// Progress value against relative time.
    Progress,
}

impl View {
    pub const ALL: [View; 2] = [View::Timeline, View::Progress];

    pub fn file_stem(self) -> &'static str {
        match self {
            View::Timeline => "process_timeline",
            View::Progress => "process_progress",
        }
    }

    /// `<dir>/<stem><suffix>.png`
    pub fn output_path(self, dir: &Path, suffix: Option<&str>) -> PathBuf {
        dir.join(format!("{}{}.png", self.file_stem(), suffix.unwrap_or("")))
    }

    pub fn y_value(self, row: &Row) -> f64 {
        match self {
            View::Timeline => row.sample.process_index as f64,
            View::Progress => row.sample.progress,
        }
    }

    /// Half-height of the y axis when every sample has the same y.
    pub fn flat_pad(self) -> f64 {
        match self {
            View::Timeline => 0.5,
            View::Progress => 1.0,
        }
    }
}
