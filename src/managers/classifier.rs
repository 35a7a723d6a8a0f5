//! Line-oriented failure heuristic over the remote utility's stderr.
//!
//! runrep reports failures as free text rather than a structured status, so a
//! line is treated as an error when it contains one of a fixed set of
//! keywords, case-insensitively. The keyword set is a compatibility contract
//! with existing deployments; changing it changes which runs are classified
//! as failed.

/// Keywords that mark a stderr line as an application-level failure.
pub const ERROR_KEYWORDS: &[&str] = &["error", "failed", "exception", "error running", "failure"];

/// Returns the first keyword contained in the line, if any. Blank lines never
/// match.
pub fn matching_keyword(line: &str) -> Option<&'static str> {
    if line.trim().is_empty() {
        return None;
    }
    let lowered = line.to_lowercase();
    ERROR_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| lowered.contains(keyword))
}

pub fn is_error_line(line: &str) -> bool {
    matching_keyword(line).is_some()
}
