//! lcov-reporter - coverage summaries for pull requests
//!
//! A library for turning LCOV reports into review comments with:
//! - Permissive LCOV parsing into an immutable coverage model
//! - Per-file and overall deltas against a baseline report
//! - Deterministic Markdown rendering
//! - GitHub comment lookup, update and creation

pub mod config;
pub mod coverage;
pub mod github;
pub mod inputs;
pub mod report;

pub use coverage::{
    diff_coverage, parse_lcov, parse_lcov_bytes, parse_lcov_string, CoverageDiff, CoverageModel,
    FileCoverage, FileDelta, FileStatus, LineRecord,
};
pub use report::{diff, render, ReportOptions};
