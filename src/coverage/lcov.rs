//! LCOV format parser
//!
//! Only `SF`, `DA` and `end_of_record` carry information for the model.
//! Every other directive (`TN`, `FN`, `FNDA`, `BRDA`, `LF`, `LH`, ...) is
//! skipped, and summary counts are always recomputed from `DA` lines.

use anyhow::{Context, Result};
use std::path::Path;

use super::{CoverageModel, FileCoverage, LineRecord};

/// Read and parse an LCOV file, failing only on I/O or non UTF-8 content
pub fn parse_lcov(path: &Path) -> Result<CoverageModel> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read coverage report: {}", path.display()))?;
    parse_lcov_bytes(&bytes)
        .with_context(|| format!("Coverage report is not valid text: {}", path.display()))
}

/// Parse LCOV content that has not been decoded yet
pub fn parse_lcov_bytes(bytes: &[u8]) -> Result<CoverageModel> {
    let content = std::str::from_utf8(bytes).context("LCOV input is not valid UTF-8")?;
    Ok(parse_lcov_string(content))
}

/// Parse LCOV content from a string
pub fn parse_lcov_string(content: &str) -> CoverageModel {
    let mut model = CoverageModel::default();

    let mut current_file: Option<String> = None;
    let mut records: Vec<LineRecord> = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        if let Some(path) = line.strip_prefix("SF:") {
            // A new SF before end_of_record drops the unfinished record
            current_file = Some(path.to_string());
            records.clear();
        } else if let Some(data) = line.strip_prefix("DA:") {
            if current_file.is_none() {
                continue;
            }
            if let Some(record) = parse_line_data(data) {
                records.push(record);
            }
        } else if line == "end_of_record" {
            if let Some(path) = current_file.take() {
                model.insert(FileCoverage::new(path, records.drain(..)));
            }
            records.clear();
        }
    }

    model
}

/// `DA:<line>,<hits>[,<checksum>]`
fn parse_line_data(data: &str) -> Option<LineRecord> {
    let mut parts = data.split(',');
    let line_number = parts.next()?.trim().parse::<u32>().ok()?;
    let hit_count = parse_hit_count(parts.next()?.trim())?;

    if line_number == 0 {
        return None;
    }

    Some(LineRecord { line_number, hit_count })
}

/// Some generators emit negative or float counts; clamp them rather than drop the line
fn parse_hit_count(raw: &str) -> Option<u64> {
    if let Ok(count) = raw.parse::<u64>() {
        return Some(count);
    }
    if let Ok(count) = raw.parse::<i64>() {
        return Some(count.max(0) as u64);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| f.max(0.0) as u64)
}
