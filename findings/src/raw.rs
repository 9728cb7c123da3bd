use serde::{Deserialize, Serialize};

/// Severity reported by the analyzer, from most to least urgent.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocker,
    Critical,
    Major,
    Minor,
    Info,
}

/// What kind of defect a rule reports.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Bug,
    Vulnerability,
    CodeSmell,
}

/// One defect report from a single analysis pass.
///
/// Raw findings carry no history: they are correlated against the previously
/// tracked set and then discarded. Absent fields mean "no signal" for the
/// corresponding matching tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFinding {
    /// Rule identifier, e.g. `"java:S1481"`.
    pub rule_key: String,
    /// Human-readable message for this occurrence.
    pub message: String,
    /// 1-based line number; `None` for file- or project-level findings.
    pub line: Option<u32>,
    /// Digest of the exact text range content, when the finding has one.
    pub range_digest: Option<String>,
    /// Digest of the enclosing line's content, when the finding has one.
    pub line_digest: Option<String>,
    /// Severity as reported by the analyzer.
    pub severity: Severity,
    /// Kind as reported by the analyzer.
    pub kind: FindingKind,
}

impl RawFinding {
    /// A file- or project-level finding with no position and no digests.
    pub fn file_level(
        rule_key: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        kind: FindingKind,
    ) -> Self {
        Self {
            rule_key: rule_key.into(),
            message: message.into(),
            line: None,
            range_digest: None,
            line_digest: None,
            severity,
            kind,
        }
    }
}
