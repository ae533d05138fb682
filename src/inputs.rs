//! Loading the current and baseline reports from disk

use anyhow::{Context, Result};
use std::path::Path;

use crate::coverage::{parse_lcov_bytes, CoverageModel};

/// Parsed inputs for one run
#[derive(Debug, Default)]
pub struct LoadedReports {
    /// `None` when the main report could not be read
    pub current: Option<CoverageModel>,
    /// `None` when no baseline was configured or it could not be read
    pub base: Option<CoverageModel>,
}

/// File contents, or `None` if it cannot be read
pub async fn read_optional(path: &Path) -> Option<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "report not readable");
            None
        }
    }
}

/// Read and parse one report. Unreadable files give `Ok(None)`, undecodable ones fail
pub async fn load_report(path: &Path) -> Result<Option<CoverageModel>> {
    match read_optional(path).await {
        Some(bytes) => {
            let model = parse_lcov_bytes(&bytes)
                .with_context(|| format!("Invalid coverage report: {}", path.display()))?;
            tracing::debug!(path = %path.display(), files = model.len(), "parsed report");
            Ok(Some(model))
        }
        None => Ok(None),
    }
}

/// Load the main report and optional baseline concurrently
pub async fn load_reports(current: &Path, base: Option<&Path>) -> Result<LoadedReports> {
    let base_future = async {
        match base {
            Some(path) => load_report(path).await,
            None => Ok(None),
        }
    };

    let (current_model, base_model) = tokio::join!(load_report(current), base_future);
    let current_model = current_model?;
    let base_model = base_model?;

    if current_model.is_none() {
        tracing::warn!("No coverage report found at '{}', exiting...", current.display());
    }
    if let (Some(path), None) = (base, &base_model) {
        tracing::warn!("No coverage report found at '{}', ignoring...", path.display());
    }

    Ok(LoadedReports {
        current: current_model,
        base: base_model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_missing_main_report_is_soft() {
        let dir = tempfile::tempdir().unwrap();
        let reports = load_reports(&dir.path().join("lcov.info"), None).await.unwrap();
        assert!(reports.current.is_none());
        assert!(reports.base.is_none());
    }

    #[tokio::test]
    async fn test_missing_base_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let current = dir.path().join("lcov.info");
        fs::write(&current, "SF:a.js\nDA:1,1\nend_of_record\n").unwrap();

        let missing = dir.path().join("base.info");
        let reports = load_reports(&current, Some(&missing)).await.unwrap();
        assert_eq!(reports.current.unwrap().len(), 1);
        assert!(reports.base.is_none());
    }

    #[tokio::test]
    async fn test_both_reports_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let current = dir.path().join("lcov.info");
        let base = dir.path().join("base.info");
        fs::write(&current, "SF:a.js\nDA:1,1\nend_of_record\n").unwrap();
        fs::write(&base, "SF:a.js\nDA:1,0\nend_of_record\nSF:b.js\nend_of_record\n").unwrap();

        let reports = load_reports(&current, Some(&base)).await.unwrap();
        assert_eq!(reports.base.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_binary_report_fails() {
        let dir = tempfile::tempdir().unwrap();
        let current = dir.path().join("lcov.info");
        fs::write(&current, [0xffu8, 0xfe, 0x00]).unwrap();

        assert!(load_reports(&current, None).await.is_err());
    }
}
