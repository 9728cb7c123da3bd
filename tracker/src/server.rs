use relint_findings::{ServerMatch, TrackedFinding};
use thiserror::Error;

/// One finding of a server-matching request, in the exact order the tracked
/// collection holds it. The responder answers each entry at the same
/// position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerMatchEntry {
    pub server_key: Option<String>,
    pub rule_key: String,
    pub message: String,
    pub line: Option<u32>,
    pub range_digest: Option<String>,
    pub line_digest: Option<String>,
}

impl From<&TrackedFinding> for ServerMatchEntry {
    fn from(tracked: &TrackedFinding) -> Self {
        let raw = tracked.raw();
        Self {
            server_key: tracked.server_key.clone(),
            rule_key: raw.rule_key.clone(),
            message: raw.message.clone(),
            line: raw.line,
            range_digest: raw.range_digest.clone(),
            line_digest: raw.line_digest.clone(),
        }
    }
}

/// The per-file portion of a server-matching request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerMatchRequest {
    pub file: String,
    pub entries: Vec<ServerMatchEntry>,
}

#[derive(Error, Debug)]
pub enum ServerMatchError {
    /// The wait for the response was cancelled or interrupted.
    #[error("server matching was interrupted")]
    Interrupted,

    #[error("server matching failed: {0}")]
    Failed(String),
}

/// External collaborator that reconciles local findings with the remote
/// tracking system.
///
/// The response must contain one `Vec<ServerMatch>` per request, and within
/// each file one entry per request entry, in the same order. Reordering is a
/// contract violation; the tracker validates shapes before applying anything.
pub trait ServerMatcher {
    fn match_batch(
        &self,
        requests: &[ServerMatchRequest],
    ) -> Result<Vec<Vec<ServerMatch>>, ServerMatchError>;
}
