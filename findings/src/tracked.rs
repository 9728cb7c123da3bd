use crate::raw::{FindingKind, RawFinding, Severity};
use time::OffsetDateTime;
use uuid::Uuid;

/// One entry of a server-matching response, positionally aligned with the
/// request it answers.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerMatch {
    /// The finding exists in the remote tracking system.
    Remote {
        id: Uuid,
        introduced_at: Option<OffsetDateTime>,
        severity_override: Option<Severity>,
        kind_override: Option<FindingKind>,
        server_key: String,
        resolved: bool,
        on_new_code: bool,
    },
    /// The server knows of no remote counterpart; only the locally assigned
    /// identity and resolution come back.
    LocalOnly { id: Uuid, resolved: bool },
}

/// A defect record with persistent identity.
///
/// Wraps the most recent raw occurrence plus everything that must survive
/// re-analysis: when the finding was introduced, whether a human resolved it,
/// and how it links to the remote tracking system and to the editor's
/// annotation for it.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedFinding {
    raw: RawFinding,
    /// Locally unique identifier, assigned by the first server round trip.
    pub id: Option<Uuid>,
    /// When the finding first appeared. `None` means unknown: the file was
    /// first analyzed with the finding already present, so there is no
    /// baseline to date it against.
    pub introduced_at: Option<OffsetDateTime>,
    /// Set only by explicit user action or by remote tracking state.
    pub resolved: bool,
    /// Key of the matched remote record, once one exists.
    pub server_key: Option<String>,
    /// Severity override from the server or local configuration; the raw
    /// severity is authoritative while this is `None`.
    pub severity_override: Option<Severity>,
    /// Kind override, same contract as `severity_override`.
    pub kind_override: Option<FindingKind>,
    /// `false` once the server reports the finding as pre-existing.
    pub on_new_code: bool,
    /// Opaque editor annotation identifier. Set by the UI layer, persisted
    /// verbatim, never interpreted here.
    pub marker_id: Option<String>,
}

impl TrackedFinding {
    /// A finding seen on the very first analysis of a file. There is no
    /// earlier baseline, so the introduction date is unknown rather than
    /// "now".
    pub fn baseline(raw: RawFinding) -> Self {
        Self {
            raw,
            id: None,
            introduced_at: None,
            resolved: false,
            server_key: None,
            severity_override: None,
            kind_override: None,
            on_new_code: true,
            marker_id: None,
        }
    }

    /// A finding that appeared after a baseline already existed for the file.
    pub fn introduced(raw: RawFinding, at: OffsetDateTime) -> Self {
        Self {
            introduced_at: Some(at),
            ..Self::baseline(raw)
        }
    }

    /// A matched finding: identity scalars are copied forward from the
    /// previous record and the raw payload is replaced by the new occurrence.
    pub fn renewed(previous: &TrackedFinding, raw: RawFinding) -> Self {
        Self {
            raw,
            id: previous.id,
            introduced_at: previous.introduced_at,
            resolved: previous.resolved,
            server_key: previous.server_key.clone(),
            severity_override: previous.severity_override,
            kind_override: previous.kind_override,
            on_new_code: previous.on_new_code,
            marker_id: previous.marker_id.clone(),
        }
    }

    /// Rebuilds a finding from persisted scalar parts on cold reload.
    #[allow(clippy::too_many_arguments)]
    pub fn restored(
        raw: RawFinding,
        id: Option<Uuid>,
        introduced_at: Option<OffsetDateTime>,
        resolved: bool,
        server_key: Option<String>,
        severity_override: Option<Severity>,
        kind_override: Option<FindingKind>,
        on_new_code: bool,
        marker_id: Option<String>,
    ) -> Self {
        Self {
            raw,
            id,
            introduced_at,
            resolved,
            server_key,
            severity_override,
            kind_override,
            on_new_code,
            marker_id,
        }
    }

    /// Copies the identity fields of one server-matching response entry onto
    /// this finding.
    pub fn apply_server_match(&mut self, m: &ServerMatch) {
        match m {
            ServerMatch::Remote {
                id,
                introduced_at,
                severity_override,
                kind_override,
                server_key,
                resolved,
                on_new_code,
            } => {
                self.id = Some(*id);
                self.introduced_at = *introduced_at;
                self.severity_override = *severity_override;
                self.kind_override = *kind_override;
                self.server_key = Some(server_key.clone());
                self.resolved = *resolved;
                self.on_new_code = *on_new_code;
            }
            ServerMatch::LocalOnly { id, resolved } => {
                self.id = Some(*id);
                self.resolved = *resolved;
            }
        }
    }

    /// The most recent raw occurrence of this finding.
    pub fn raw(&self) -> &RawFinding {
        &self.raw
    }

    /// Effective severity: the override when present, the raw value otherwise.
    pub fn severity(&self) -> Severity {
        self.severity_override.unwrap_or(self.raw.severity)
    }

    /// Effective kind, same resolution as [`TrackedFinding::severity`].
    pub fn kind(&self) -> FindingKind {
        self.kind_override.unwrap_or(self.raw.kind)
    }
}
