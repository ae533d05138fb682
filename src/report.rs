//! Markdown rendering of a coverage comparison

use std::fmt::Write;

use crate::coverage::{diff_coverage, round_to_display, CoverageDiff, CoverageModel, FileDelta, FileStatus};

pub const DEFAULT_MARKER: &str = "Coverage ";
pub const DEFAULT_SERVER_URL: &str = "https://github.com";

/// Uncovered ranges listed per row before the cell is truncated
const MAX_UNCOVERED_RANGES: usize = 8;

/// Run metadata passed to the renderer
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// `owner/name`
    pub repository: Option<String>,
    pub commit: Option<String>,
    pub head: Option<String>,
    pub base: Option<String>,
    /// Stripped from the start of every displayed path
    pub prefix: Option<String>,
    /// Literal every report starts with, used to find earlier comments
    pub marker: String,
    pub server_url: String,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            repository: None,
            commit: None,
            head: None,
            base: None,
            prefix: None,
            marker: DEFAULT_MARKER.to_string(),
            server_url: DEFAULT_SERVER_URL.to_string(),
        }
    }
}

impl ReportOptions {
    /// Path as shown in the report
    pub fn display_path<'p>(&self, path: &'p str) -> &'p str {
        match self.prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => path.strip_prefix(prefix).unwrap_or(path),
            _ => path,
        }
    }

    /// Permalink to a file at the reported commit
    fn blob_url(&self, display_path: &str) -> Option<String> {
        let repository = self.repository.as_deref()?;
        let commit = self.commit.as_deref()?;
        if display_path.starts_with('/') {
            return None;
        }
        Some(format!(
            "{}/{}/blob/{}/{}",
            self.server_url.trim_end_matches('/'),
            repository,
            commit,
            display_path
        ))
    }

    fn commit_url(&self) -> Option<String> {
        let repository = self.repository.as_deref()?;
        let commit = self.commit.as_deref()?;
        Some(format!(
            "{}/{}/commit/{}",
            self.server_url.trim_end_matches('/'),
            repository,
            commit
        ))
    }
}

/// Render the report for `current`, with deltas when `base` is given.
///
/// Output depends only on the arguments, so identical input always gives a
/// byte-identical body.
pub fn diff(current: &CoverageModel, base: Option<&CoverageModel>, options: &ReportOptions) -> String {
    let comparison = diff_coverage(current, base);
    render(&comparison, options)
}

/// Render an already computed comparison
pub fn render(diff: &CoverageDiff<'_>, options: &ReportOptions) -> String {
    let mut out = String::new();

    let header = build_header(options);
    if !header.starts_with(&options.marker) {
        out.push_str(&options.marker);
        out.push('\n');
    }
    out.push_str(&header);
    out.push_str("\n\n");

    out.push_str(&build_overall(diff));
    out.push_str("\n\n");

    if diff.files.is_empty() {
        out.push_str("_No files in the coverage report._\n");
    } else {
        out.push_str(&build_table(diff, options));
    }

    if !diff.removed.is_empty() {
        out.push('\n');
        out.push_str(&build_removed(diff, options));
    }

    out
}

fn build_header(options: &ReportOptions) -> String {
    let commit = options.commit.as_deref().map(|sha| {
        let short = short_sha(sha);
        match options.commit_url() {
            Some(url) => format!("[`{}`]({})", short, url),
            None => format!("`{}`", short),
        }
    });

    match (options.head.as_deref(), options.base.as_deref()) {
        (Some(head), Some(base)) => {
            let mut line = format!("Coverage after merging **{}** into **{}**", head, base);
            if let Some(commit) = commit {
                let _ = write!(line, " ({})", commit);
            }
            line
        }
        (Some(head), None) => match commit {
            Some(commit) => format!("Coverage for **{}** at {}", head, commit),
            None => format!("Coverage for **{}**", head),
        },
        _ => match commit {
            Some(commit) => format!("Coverage for commit {}", commit),
            None => "Coverage report".to_string(),
        },
    }
}

fn build_overall(diff: &CoverageDiff<'_>) -> String {
    let totals = diff.current;
    let mut line = format!("**Overall coverage: {}**", format_percentage(diff.percentage()));

    if let Some(delta) = diff.overall_delta() {
        let _ = write!(line, " ({})", format_delta(delta));
    }

    let _ = write!(
        line,
        "\n\n{} of {} lines covered across {} {}",
        totals.covered_lines,
        totals.total_lines,
        totals.files,
        if totals.files == 1 { "file" } else { "files" }
    );

    if let Some(base) = diff.base_percentage() {
        let _ = write!(line, " (base: {})", format_percentage(base));
    }

    line
}

fn build_table(diff: &CoverageDiff<'_>, options: &ReportOptions) -> String {
    let mut table = String::new();

    if diff.has_baseline() {
        table.push_str("| File | Lines | Coverage | Δ | Uncovered lines |\n");
        table.push_str("| :--- | ---: | ---: | ---: | :--- |\n");
    } else {
        table.push_str("| File | Lines | Coverage | Uncovered lines |\n");
        table.push_str("| :--- | ---: | ---: | :--- |\n");
    }

    for row in &diff.files {
        let _ = writeln!(table, "{}", build_row(row, diff.has_baseline(), options));
    }

    table
}

fn build_row(row: &FileDelta<'_>, with_delta: bool, options: &ReportOptions) -> String {
    let display = options.display_path(row.path());
    let name = match options.blob_url(display) {
        Some(url) => format!("[{}]({})", escape_cell(display), url),
        None => escape_cell(display),
    };

    let lines = format!("{}/{}", row.file.covered_lines(), row.file.total_lines());
    let coverage = format_percentage(row.percentage());
    let uncovered = format_ranges(&row.file.uncovered_lines());

    if !with_delta {
        return format!("| {} | {} | {} | {} |", name, lines, coverage, uncovered);
    }

    let delta = match (row.status, row.delta) {
        (FileStatus::Added, _) => "_new_".to_string(),
        (_, Some(delta)) => format_delta(delta),
        (_, None) => String::new(),
    };

    format!("| {} | {} | {} | {} | {} |", name, lines, coverage, delta, uncovered)
}

fn build_removed(diff: &CoverageDiff<'_>, options: &ReportOptions) -> String {
    let mut section = format!(
        "<details><summary>Removed files ({})</summary>\n\n",
        diff.removed.len()
    );

    for removed in &diff.removed {
        let _ = writeln!(
            section,
            "- `{}` (was {})",
            options.display_path(removed.file.path()),
            format_percentage(removed.file.percentage())
        );
    }

    section.push_str("\n</details>\n");
    section
}

/// `50.00%`
pub fn format_percentage(value: f64) -> String {
    format!("{:.2}%", round_to_display(value))
}

/// `▴ +1.50%`, `▾ -2.00%`, or `0.00%` when nothing visible changed
pub fn format_delta(delta: f64) -> String {
    let delta = round_to_display(delta);
    if delta > 0.0 {
        format!("▴ {:+.2}%", delta)
    } else if delta < 0.0 {
        format!("▾ {:+.2}%", delta)
    } else {
        "0.00%".to_string()
    }
}

/// Collapse sorted line numbers into `3-5, 9` style ranges
pub fn format_ranges(lines: &[u32]) -> String {
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    for &line in lines {
        match ranges.last_mut() {
            Some((_, end)) if *end + 1 == line => *end = line,
            _ => ranges.push((line, line)),
        }
    }

    let mut parts: Vec<String> = ranges
        .iter()
        .take(MAX_UNCOVERED_RANGES)
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{}-{}", start, end)
            }
        })
        .collect();

    if ranges.len() > MAX_UNCOVERED_RANGES {
        parts.push("…".to_string());
    }

    parts.join(", ")
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{parse_lcov_string, FileCoverage, LineRecord};
    use proptest::prelude::*;

    fn file(path: &str, covered: u32, total: u32) -> FileCoverage {
        FileCoverage::new(
            path,
            (1..=total).map(|n| LineRecord {
                line_number: n,
                hit_count: u64::from(n <= covered),
            }),
        )
    }

    fn options() -> ReportOptions {
        ReportOptions {
            repository: Some("o/r".to_string()),
            commit: Some("abc".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_report_without_base() {
        let current = parse_lcov_string("SF:a.js\nDA:1,1\nDA:2,0\nend_of_record\n");
        let report = diff(&current, None, &options());

        assert!(report.starts_with("Coverage "));
        assert!(report.contains("**Overall coverage: 50.00%**\n"));
        assert!(!report.contains('▴'));
        assert!(!report.contains('▾'));
        assert!(!report.contains("Δ"));
        assert!(report.contains("| [a.js](https://github.com/o/r/blob/abc/a.js) | 1/2 | 50.00% | 2 |"));
    }

    #[test]
    fn test_report_with_added_and_removed() {
        let base = CoverageModel::from_files(vec![file("old.js", 4, 5)]);
        let current = CoverageModel::from_files(vec![file("new.js", 3, 5)]);

        let report = diff(&current, Some(&base), &ReportOptions::default());

        assert!(report.contains("| new.js | 3/5 | 60.00% | _new_ | 4-5 |"));
        assert!(report.contains("3 of 5 lines covered across 1 file"));
        assert!(report.contains("Removed files (1)"));
        assert!(report.contains("- `old.js` (was 80.00%)"));
        assert!(!report.contains("| old.js"));
        assert!(report.contains("**Overall coverage: 60.00%** (▾ -20.00%)"));
    }

    #[test]
    fn test_report_rows_follow_sorted_order() {
        let base = CoverageModel::from_files(vec![file("a.js", 4, 4), file("b.js", 4, 4), file("c.js", 1, 4)]);
        let current = CoverageModel::from_files(vec![file("a.js", 4, 4), file("b.js", 2, 4), file("c.js", 2, 4)]);

        let report = diff(&current, Some(&base), &ReportOptions::default());
        let b = report.find("| b.js").unwrap();
        let c = report.find("| c.js").unwrap();
        let a = report.find("| a.js").unwrap();
        assert!(b < c && c < a);
        assert!(report.contains("| b.js | 2/4 | 50.00% | ▾ -50.00% | 3-4 |"));
        assert!(report.contains("| c.js | 2/4 | 50.00% | ▴ +25.00% | 3-4 |"));
        assert!(report.contains("| a.js | 4/4 | 100.00% | 0.00% |  |"));
    }

    #[test]
    fn test_prefix_is_stripped() {
        let opts = ReportOptions {
            prefix: Some("/home/runner/work/app/".to_string()),
            ..Default::default()
        };
        assert_eq!(opts.display_path("/home/runner/work/app/src/foo.js"), "src/foo.js");
        assert_eq!(opts.display_path("/elsewhere/src/foo.js"), "/elsewhere/src/foo.js");

        let current = CoverageModel::from_files(vec![file("/home/runner/work/app/src/foo.js", 1, 1)]);
        let report = diff(&current, None, &opts);
        assert!(report.contains("| src/foo.js |"));
        assert!(!report.contains("/home/runner"));
    }

    #[test]
    fn test_absolute_paths_are_not_linked() {
        let current = CoverageModel::from_files(vec![file("/tmp/x.js", 1, 1)]);
        let report = diff(&current, None, &options());
        assert!(report.contains("| /tmp/x.js |"));
        assert!(!report.contains("blob/abc//tmp"));
    }

    #[test]
    fn test_empty_current_renders() {
        let report = diff(&CoverageModel::default(), None, &options());
        assert!(report.contains("**Overall coverage: 100.00%**"));
        assert!(report.contains("0 of 0 lines covered across 0 files"));
        assert!(report.contains("_No files in the coverage report._"));
    }

    #[test]
    fn test_headers() {
        let pr = ReportOptions {
            head: Some("feature".to_string()),
            base: Some("main".to_string()),
            commit: Some("0123456789abcdef".to_string()),
            ..Default::default()
        };
        assert_eq!(build_header(&pr), "Coverage after merging **feature** into **main** (`0123456`)");

        let push = ReportOptions {
            head: Some("refs/heads/main".to_string()),
            ..options()
        };
        assert_eq!(
            build_header(&push),
            "Coverage for **refs/heads/main** at [`abc`](https://github.com/o/r/commit/abc)"
        );

        assert_eq!(build_header(&ReportOptions::default()), "Coverage report");
    }

    #[test]
    fn test_custom_marker_is_prepended() {
        let opts = ReportOptions {
            marker: "<!-- lcov-reporter -->".to_string(),
            ..Default::default()
        };
        let report = diff(&CoverageModel::default(), None, &opts);
        assert!(report.starts_with("<!-- lcov-reporter -->\nCoverage report"));
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_percentage(200.0 / 3.0), "66.67%");
        assert_eq!(format_delta(1.5), "▴ +1.50%");
        assert_eq!(format_delta(-2.0), "▾ -2.00%");
        assert_eq!(format_delta(-0.001), "0.00%");
        assert_eq!(format_ranges(&[1, 2, 3, 5, 7, 8]), "1-3, 5, 7-8");
        assert_eq!(format_ranges(&[]), "");
        let many: Vec<u32> = (1..=40).step_by(2).collect();
        assert!(format_ranges(&many).ends_with(", …"));
    }

    #[test]
    fn test_pipe_in_path_is_escaped() {
        let current = CoverageModel::from_files(vec![file("a|b.js", 1, 1)]);
        let report = diff(&current, None, &ReportOptions::default());
        assert!(report.contains("| a\\|b.js |"));
    }

    proptest! {
        #[test]
        fn prop_report_is_idempotent(
            current in proptest::collection::vec((0u32..10, 0u32..10), 0..8),
            base in proptest::collection::vec((0u32..10, 0u32..10), 0..8),
        ) {
            let build = |counts: &[(u32, u32)]| CoverageModel::from_files(
                counts.iter().enumerate().map(|(i, &(c, extra))| file(&format!("src/f{i}.js"), c, c + extra))
            );
            let current = build(&current[..]);
            let base = build(&base[..]);
            let opts = options();

            let first = diff(&current, Some(&base), &opts);
            let second = diff(&current, Some(&base), &opts);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.starts_with(&opts.marker));
        }
    }
}
