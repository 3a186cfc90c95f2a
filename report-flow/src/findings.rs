//! Turns the free-text summary returned by the extractor into key-finding bullet points.

use regex::Regex;
use std::sync::LazyLock;

/// Fragments this short are treated as splitting artifacts, not findings.
pub const MIN_POINT_CHARS: usize = 20;

static BULLET_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\s*\*|\*").expect("Invalid regex"));

/// Split a summary on `*` bullet markers (optionally preceded by a sentence-ending period).
///
/// Candidates are trimmed and kept only when longer than [`MIN_POINT_CHARS`]; any leading run of
/// `*` or whitespace is stripped from survivors. When nothing survives, the untouched summary is
/// returned as the single point so the findings list is never empty.
pub fn extract_summary_points(summary: &str) -> Vec<String> {
    let points: Vec<String> = BULLET_BOUNDARY
        .split(summary)
        .map(str::trim)
        .filter(|candidate| candidate.chars().count() > MIN_POINT_CHARS)
        .map(|candidate| {
            candidate
                .trim_start_matches(|c: char| c == '*' || c.is_whitespace())
                .to_string()
        })
        .collect();

    if points.is_empty() {
        vec![summary.to_string()]
    } else {
        points
    }
}
