//! Typed sample table: casts the retained records and derives relative time.

pub mod timestamp;

pub use timestamp::{Timestamp, TimestampParser};

use crate::Result;
use crate::logfile::RawRecord;
use anyhow::{Context, bail};
use chrono::TimeDelta;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// One typed log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub process_index: i64,
    /// Opaque token, carried for display and export only.
    pub process_id: String,
    pub progress: f64,
    /// Kept verbatim; never used numerically.
    pub progress_percent: String,
    pub timestamp: Timestamp,
}

impl Sample {
    /// Cast a raw record. Any bad token fails the record (and with it the run).
    pub fn from_record(record: &RawRecord<'_>, timestamps: &TimestampParser) -> Result<Self> {
        let process_index: i64 = record.process_index.parse().with_context(|| {
            format!(
                "line {}: process_index is not an integer: {:?}",
                record.line, record.process_index
            )
        })?;
        let progress: f64 = record.progress.parse().with_context(|| {
            format!(
                "line {}: progress is not a number: {:?}",
                record.line, record.progress
            )
        })?;
        let timestamp = timestamps
            .parse(record.timestamp)
            .with_context(|| format!("line {}: bad timestamp", record.line))?;

        Ok(Self {
            process_index,
            process_id: record.process_id.to_string(),
            progress,
            progress_percent: record.progress_percent.to_string(),
            timestamp,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    #[serde(flatten)]
    pub sample: Sample,
    /// Time since the earliest sample in the table.
    #[serde(rename = "relative_time_seconds", serialize_with = "serialize_seconds")]
    pub relative_time: TimeDelta,
}

impl Row {
    pub fn relative_seconds(&self) -> f64 {
        seconds(self.relative_time)
    }
}

/// `delta` in seconds, at nanosecond resolution.
pub fn seconds(delta: TimeDelta) -> f64 {
    let whole = delta.num_seconds();
    let nanos = (delta - TimeDelta::seconds(whole))
        .num_nanoseconds()
        .unwrap_or(0);
    whole as f64 + nanos as f64 / 1e9
}

fn serialize_seconds<S: Serializer>(
    delta: &TimeDelta,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(seconds(*delta))
}

/// Rows sharing one process index, in table order.
#[derive(Debug, Clone)]
pub struct Group<'a> {
    pub process_index: i64,
    pub rows: Vec<&'a Row>,
}

/// The normalized samples, in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    /// Derive relative times from already-typed samples.
    pub fn from_samples(samples: Vec<Sample>) -> Result<Self> {
        let Some(first) = samples.first() else {
            return Ok(Self::default());
        };

        let aware = first.timestamp.is_aware();
        if let Some(odd) = samples.iter().find(|s| s.timestamp.is_aware() != aware) {
            bail!(
                "timestamps with and without UTC offset cannot be mixed: {} vs {}",
                first.timestamp,
                odd.timestamp
            );
        }

        let Some(start) = samples.iter().map(|s| s.timestamp.naive()).min() else {
            return Ok(Self::default());
        };

        let rows = samples
            .into_iter()
            .map(|sample| {
                let relative_time = sample.timestamp.naive() - start;
                Row {
                    sample,
                    relative_time,
                }
            })
            .collect();

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Earliest timestamp, the zero of the relative time axis.
    pub fn start(&self) -> Option<Timestamp> {
        self.rows.iter().map(|r| r.sample.timestamp).min()
    }

    /// Partition rows by process index. Groups come out in order of first
    /// appearance, so colour and legend assignment is reproducible.
    pub fn groups(&self) -> Vec<Group<'_>> {
        let mut groups: Vec<Group<'_>> = Vec::new();
        let mut slot: BTreeMap<i64, usize> = BTreeMap::new();

        for row in &self.rows {
            let idx = *slot.entry(row.sample.process_index).or_insert_with(|| {
                groups.push(Group {
                    process_index: row.sample.process_index,
                    rows: Vec::new(),
                });
                groups.len() - 1
            });
            groups[idx].rows.push(row);
        }

        groups
    }

    /// Distinct process indices in first-appearance order.
    pub fn process_indices(&self) -> Vec<i64> {
        self.groups().iter().map(|g| g.process_index).collect()
    }
}

/// Cast every record and build the table. Stops at the first bad record.
pub fn build_table<'a>(records: impl IntoIterator<Item = RawRecord<'a>>) -> Result<Table> {
    let timestamps = TimestampParser::new()?;
    let samples = records
        .into_iter()
        .map(|record| Sample::from_record(&record, &timestamps))
        .collect::<Result<Vec<_>>>()?;
    Table::from_samples(samples)
}
