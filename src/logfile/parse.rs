use crate::logfile::row::{FIELD_COUNT, RawRecord};
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

/// A progress log read fully into memory.
///
/// The file handle is only held while reading; records are then produced
/// lazily from the buffered text.
#[derive(Debug, Clone)]
pub struct LogFile {
    path: PathBuf,
    text: String,
}

impl LogFile {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let text = fs::read_to_string(&path)
            .with_context(|| format!("read log file {}", path.display()))?;
        Ok(Self { path, text })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total number of lines, retained or not.
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }

    pub fn records(&self) -> impl Iterator<Item = RawRecord<'_>> {
        records(&self.text)
    }
}

/// Yield every line of `text` that has exactly five whitespace-separated
/// tokens. Anything else (blank lines, headers, truncated lines) is skipped
/// without error.
pub fn records(text: &str) -> impl Iterator<Item = RawRecord<'_>> {
    text.lines()
        .enumerate()
        .filter_map(|(lineno, line)| split_record(lineno + 1, line))
}

fn split_record(line: usize, text: &str) -> Option<RawRecord<'_>> {
    let mut tokens = text.split_whitespace();
    let fields: [&str; FIELD_COUNT] = [
        tokens.next()?,
        tokens.next()?,
        tokens.next()?,
        tokens.next()?,
        tokens.next()?,
    ];
    if tokens.next().is_some() {
        log::trace!("line {}: more than {} fields, skipped", line, FIELD_COUNT);
        return None;
    }

    let [process_index, process_id, progress, progress_percent, timestamp] = fields;
    Some(RawRecord {
        line,
        process_index,
        process_id,
        progress,
        progress_percent,
        timestamp,
    })
}
