//! Line filter for per-process progress logs.

pub mod parse;
pub mod row;

pub use parse::LogFile;
pub use row::RawRecord;
