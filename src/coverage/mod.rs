//! Coverage module
//!
//! Provides:
//! - The in-memory coverage model
//! - LCOV parsing
//! - Baseline comparison

mod diff;
mod lcov;

pub use diff::*;
pub use lcov::*;

use std::collections::BTreeMap;

/// Percentage reported for anything with no instrumented lines.
pub const VACUOUS_PERCENTAGE: f64 = 100.0;

/// Covered/total ratio as a percentage, 100 when nothing was instrumented
pub fn percentage(covered: u64, total: u64) -> f64 {
    if total == 0 {
        return VACUOUS_PERCENTAGE;
    }
    (covered as f64 / total as f64) * 100.0
}

/// Hit count for a single executable line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRecord {
    pub line_number: u32,
    pub hit_count: u64,
}

/// Coverage data for a single source file
///
/// Summary fields are computed once from the line records and never change.
#[derive(Debug, Clone, PartialEq)]
pub struct FileCoverage {
    path: String,
    lines: Vec<LineRecord>,
    total_lines: u64,
    covered_lines: u64,
    percentage: f64,
}

impl FileCoverage {
    /// Build a file entry from raw line records.
    ///
    /// Records are sorted by line number; when a line number repeats, the
    /// record that came last wins.
    pub fn new(path: impl Into<String>, records: impl IntoIterator<Item = LineRecord>) -> Self {
        let mut by_line: BTreeMap<u32, u64> = BTreeMap::new();
        for record in records {
            by_line.insert(record.line_number, record.hit_count);
        }

        let lines: Vec<LineRecord> = by_line
            .into_iter()
            .map(|(line_number, hit_count)| LineRecord { line_number, hit_count })
            .collect();

        let total_lines = lines.len() as u64;
        let covered_lines = lines.iter().filter(|l| l.hit_count > 0).count() as u64;

        Self {
            path: path.into(),
            lines,
            total_lines,
            covered_lines,
            percentage: percentage(covered_lines, total_lines),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn lines(&self) -> &[LineRecord] {
        &self.lines
    }

    pub fn total_lines(&self) -> u64 {
        self.total_lines
    }

    pub fn covered_lines(&self) -> u64 {
        self.covered_lines
    }

    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    /// Line numbers that were instrumented but never hit
    pub fn uncovered_lines(&self) -> Vec<u32> {
        self.lines
            .iter()
            .filter(|l| l.hit_count == 0)
            .map(|l| l.line_number)
            .collect()
    }
}

/// Summed line counts over a whole model
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CoverageTotals {
    pub files: usize,
    pub total_lines: u64,
    pub covered_lines: u64,
}

impl CoverageTotals {
    pub fn percentage(&self) -> f64 {
        percentage(self.covered_lines, self.total_lines)
    }
}

/// Parsed representation of one LCOV report, keyed by file path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageModel {
    files: BTreeMap<String, FileCoverage>,
}

impl CoverageModel {
    pub fn from_files(files: impl IntoIterator<Item = FileCoverage>) -> Self {
        let mut model = Self::default();
        for file in files {
            model.insert(file);
        }
        model
    }

    /// Replaces any previous entry for the same path
    pub(crate) fn insert(&mut self, file: FileCoverage) {
        self.files.insert(file.path.clone(), file);
    }

    pub fn get(&self, path: &str) -> Option<&FileCoverage> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &FileCoverage> {
        self.files.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn totals(&self) -> CoverageTotals {
        self.files().fold(
            CoverageTotals {
                files: self.files.len(),
                ..Default::default()
            },
            |mut acc, file| {
                acc.total_lines += file.total_lines;
                acc.covered_lines += file.covered_lines;
                acc
            },
        )
    }

    pub fn percentage(&self) -> f64 {
        self.totals().percentage()
    }
}
