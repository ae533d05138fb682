//! Comparison of a coverage model against an optional baseline

use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::{CoverageModel, CoverageTotals, FileCoverage};

/// How a file relates to the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// No baseline was supplied
    Current,
    /// Present only in the current report
    Added,
    /// Present in both with a visible percentage change
    Changed,
    /// Present in both, same percentage at display precision
    Unchanged,
}

/// One row of the current-state table
#[derive(Debug, Clone, PartialEq)]
pub struct FileDelta<'a> {
    pub file: &'a FileCoverage,
    pub status: FileStatus,
    pub base_percentage: Option<f64>,
    pub delta: Option<f64>,
}

impl FileDelta<'_> {
    pub fn path(&self) -> &str {
        self.file.path()
    }

    pub fn percentage(&self) -> f64 {
        self.file.percentage()
    }
}

/// A file that only exists in the baseline
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedFile<'a> {
    pub file: &'a FileCoverage,
}

/// Full comparison result, rows already in display order
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageDiff<'a> {
    pub current: CoverageTotals,
    pub base: Option<CoverageTotals>,
    pub files: Vec<FileDelta<'a>>,
    pub removed: Vec<RemovedFile<'a>>,
}

impl<'a> CoverageDiff<'a> {
    pub fn percentage(&self) -> f64 {
        self.current.percentage()
    }

    pub fn base_percentage(&self) -> Option<f64> {
        self.base.map(|b| b.percentage())
    }

    /// Overall current minus base, absent without a baseline
    pub fn overall_delta(&self) -> Option<f64> {
        self.base_percentage().map(|base| self.percentage() - base)
    }

    pub fn has_baseline(&self) -> bool {
        self.base.is_some()
    }

    pub fn regressions(&self) -> impl Iterator<Item = &FileDelta<'a>> + '_ {
        self.files
            .iter()
            .filter(|f| f.delta.map(|d| round_to_display(d) < 0.0).unwrap_or(false))
    }
}

/// Round to the two decimals used for display.
///
/// Ordering and "changed" detection work on this value so that a row shown
/// as `0.00%` is never treated as a change.
pub fn round_to_display(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // Normalize -0.0 so it neither sorts nor prints as negative
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Compare `current` against an optional `base`.
///
/// Files only present in `base` are reported as removed and never count
/// toward the current totals.
pub fn diff_coverage<'a>(
    current: &'a CoverageModel,
    base: Option<&'a CoverageModel>,
) -> CoverageDiff<'a> {
    let mut files: Vec<FileDelta<'a>> = current
        .files()
        .map(|file| match base {
            None => FileDelta {
                file,
                status: FileStatus::Current,
                base_percentage: None,
                delta: None,
            },
            Some(base) => match base.get(file.path()) {
                None => FileDelta {
                    file,
                    status: FileStatus::Added,
                    base_percentage: None,
                    delta: None,
                },
                Some(before) => {
                    let delta = file.percentage() - before.percentage();
                    let status = if round_to_display(delta) == 0.0 {
                        FileStatus::Unchanged
                    } else {
                        FileStatus::Changed
                    };
                    FileDelta {
                        file,
                        status,
                        base_percentage: Some(before.percentage()),
                        delta: Some(delta),
                    }
                }
            },
        })
        .collect();

    files.sort_by(compare_rows);

    let removed = match base {
        Some(base) => {
            let current_paths: BTreeSet<&str> = current.paths().collect();
            base.files()
                .filter(|f| !current_paths.contains(f.path()))
                .map(|file| RemovedFile { file })
                .collect()
        }
        None => Vec::new(),
    };

    CoverageDiff {
        current: current.totals(),
        base: base.map(CoverageModel::totals),
        files,
        removed,
    }
}

/// Visible changes first, worst regression first; then everything else; ties by path
fn compare_rows(a: &FileDelta<'_>, b: &FileDelta<'_>) -> Ordering {
    let key = |row: &FileDelta<'_>| match row.status {
        FileStatus::Changed => row.delta.map(round_to_display),
        _ => None,
    };

    match (key(a), key(b)) {
        (Some(da), Some(db)) => da.total_cmp(&db),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.path().cmp(b.path()))
}
