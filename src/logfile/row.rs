/// Number of whitespace-separated tokens a sample line must have.
pub const FIELD_COUNT: usize = 5;

/// A retained log line, still untyped.
///
/// Columns (whitespace-separated):
/// process_index  process_id  progress  progress_percent  timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    /// 1-based line number in the source file.
    pub line: usize,
    pub process_index: &'a str,
    pub process_id: &'a str,
    pub progress: &'a str,
    pub progress_percent: &'a str,
    pub timestamp: &'a str,
}
