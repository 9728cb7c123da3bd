use relint_findings::{FindingKind, RawFinding, Severity, TrackedFinding};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// On-disk schema version of [`StoredFindings`]. Bumped when a change cannot
/// be expressed as a new optional field.
pub const RECORD_VERSION: u32 = 1;

/// One persisted finding. Everything evolution-prone is optional so that
/// records written by older releases keep decoding.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StoredFinding {
    pub id: Option<Uuid>,
    pub rule_key: String,
    pub message: String,
    pub line: Option<u32>,
    pub range_digest: Option<String>,
    pub line_digest: Option<String>,
    pub severity: Severity,
    pub kind: FindingKind,
    /// Unix milliseconds; `None` when the introduction date is unknown.
    pub introduced_at_ms: Option<i64>,
    pub resolved: bool,
    pub server_key: Option<String>,
    pub severity_override: Option<Severity>,
    pub kind_override: Option<FindingKind>,
    pub on_new_code: bool,
    pub marker_id: Option<String>,
}

/// The per-file record the object store persists.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StoredFindings {
    pub version: u32,
    pub findings: Vec<StoredFinding>,
}

impl StoredFindings {
    /// Snapshot of a live collection, ready to persist.
    pub fn snapshot(findings: &[TrackedFinding]) -> Self {
        Self {
            version: RECORD_VERSION,
            findings: findings.iter().map(StoredFinding::from).collect(),
        }
    }

    /// Rebuilds the live collection, or `None` when the record was written
    /// by an incompatible schema version.
    pub fn restore(self) -> Option<Vec<TrackedFinding>> {
        if self.version != RECORD_VERSION {
            log::warn!(
                "stored findings use schema version {} (current {RECORD_VERSION}), discarding",
                self.version
            );
            return None;
        }
        Some(self.findings.into_iter().map(StoredFinding::restore).collect())
    }
}

impl StoredFinding {
    fn restore(self) -> TrackedFinding {
        let raw = RawFinding {
            rule_key: self.rule_key,
            message: self.message,
            line: self.line,
            range_digest: self.range_digest,
            line_digest: self.line_digest,
            severity: self.severity,
            kind: self.kind,
        };
        let introduced_at = self
            .introduced_at_ms
            .and_then(|ms| OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok());
        TrackedFinding::restored(
            raw,
            self.id,
            introduced_at,
            self.resolved,
            self.server_key,
            self.severity_override,
            self.kind_override,
            self.on_new_code,
            self.marker_id,
        )
    }
}

impl From<&TrackedFinding> for StoredFinding {
    fn from(tracked: &TrackedFinding) -> Self {
        let raw = tracked.raw();
        Self {
            id: tracked.id,
            rule_key: raw.rule_key.clone(),
            message: raw.message.clone(),
            line: raw.line,
            range_digest: raw.range_digest.clone(),
            line_digest: raw.line_digest.clone(),
            severity: raw.severity,
            kind: raw.kind,
            introduced_at_ms: tracked
                .introduced_at
                .map(|at| (at.unix_timestamp_nanos() / 1_000_000) as i64),
            resolved: tracked.resolved,
            server_key: tracked.server_key.clone(),
            severity_override: tracked.severity_override,
            kind_override: tracked.kind_override,
            on_new_code: tracked.on_new_code,
            marker_id: tracked.marker_id.clone(),
        }
    }
}
