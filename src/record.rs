//! Parser for the result file written by one trial.
//!
//! The external benchmark prints a header of `#` comment lines followed by
//! data lines of five whitespace-separated fields:
//!
//! ```text
//! #bytes #repetitions  t[usec]   Mbytes/sec  msg/sec
//! 1024   10            2.85      359.30      350878
//! ```
//!
//! Comment and blank lines are skipped silently. Malformed data lines are
//! reported through `tracing` and skipped; they never stop parsing.

use crate::error::RecordParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// One parsed data line of trial output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub bytes: u64,
    pub repetitions: u64,
    pub time_usec: f64,
    pub mb_per_sec: f64,
    pub msg_per_sec: i64,
}

fn field<T: FromStr>(name: &'static str, value: &str) -> Result<T, RecordParseError> {
    value.parse().map_err(|_| RecordParseError::InvalidField {
        name,
        value: value.to_string(),
    })
}

impl FromStr for BenchmarkRecord {
    type Err = RecordParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(RecordParseError::FieldCount(fields.len()));
        }

        Ok(Self {
            bytes: field("bytes", fields[0])?,
            repetitions: field("repetitions", fields[1])?,
            time_usec: field("time_usec", fields[2])?,
            mb_per_sec: field("mb_per_sec", fields[3])?,
            msg_per_sec: field("msg_per_sec", fields[4])?,
        })
    }
}

impl fmt::Display for BenchmarkRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.bytes, self.repetitions, self.time_usec, self.mb_per_sec, self.msg_per_sec
        )
    }
}

/// True for lines that carry no data: blank, or a `#` after optional
/// leading whitespace.
fn is_skippable(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Lazy iterator over the records of a result stream.
pub struct RecordReader<R> {
    lines: std::io::Lines<R>,
    line_number: usize,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = BenchmarkRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    warn!("Stopped reading result stream at line {}: {}", self.line_number + 1, e);
                    return None;
                }
            };
            self.line_number += 1;

            if is_skippable(&line) {
                continue;
            }

            match line.parse::<BenchmarkRecord>() {
                Ok(record) => return Some(record),
                Err(e) => warn!("Skipping line {} ({}): {}", self.line_number, e, line),
            }
        }
    }
}

/// Parse every record in `path`.
///
/// A file that cannot be opened yields no records, exactly like an empty
/// file; the caller decides whether that is fatal.
pub fn parse_file(path: &Path) -> Vec<BenchmarkRecord> {
    match File::open(path) {
        Ok(file) => RecordReader::new(BufReader::new(file)).collect(),
        Err(e) => {
            warn!("Error opening file {:?}: {}", path, e);
            Vec::new()
        }
    }
}
