use relint_findings::{RawFinding, TrackedFinding};

/// The flat projection the matching engine operates on.
///
/// Every matchable shape (a fresh raw finding, an in-memory tracked finding,
/// a record rebuilt from disk) converts to this struct up front, so the
/// engine itself never dispatches over source types. Absent fields disable
/// the corresponding matching tier for that token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchToken<'a> {
    pub rule_key: &'a str,
    pub message: &'a str,
    pub line: Option<u32>,
    pub range_digest: Option<&'a str>,
    pub line_digest: Option<&'a str>,
}

impl<'a> From<&'a RawFinding> for MatchToken<'a> {
    fn from(raw: &'a RawFinding) -> Self {
        Self {
            rule_key: &raw.rule_key,
            message: &raw.message,
            line: raw.line,
            range_digest: raw.range_digest.as_deref(),
            line_digest: raw.line_digest.as_deref(),
        }
    }
}

impl<'a> From<&'a TrackedFinding> for MatchToken<'a> {
    fn from(tracked: &'a TrackedFinding) -> Self {
        tracked.raw().into()
    }
}
