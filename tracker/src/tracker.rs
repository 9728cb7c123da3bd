use crate::error::{Result, TrackerError};
use crate::server::{ServerMatchEntry, ServerMatchRequest, ServerMatcher};
use log::{debug, info, warn};
use relint_findings::{RawFinding, TrackedFinding};
use relint_issue_store::{FindingCache, ObjectStore};
use relint_matcher::{MatchToken, correlate};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use time::OffsetDateTime;
use uuid::Uuid;

/// Owns the tracked findings of one project.
///
/// Every mutating operation runs inside this tracker's critical section and
/// may call into the cache from there; the cache never calls back, so the
/// lock order is always tracker first, cache second.
pub struct ProjectTracker {
    state: Mutex<()>,
    cache: FindingCache,
}

impl ProjectTracker {
    /// Opens a tracker whose issue store lives under `storage_root`.
    pub fn open(storage_root: impl Into<PathBuf>, cache_capacity: usize) -> Result<Self> {
        let store = ObjectStore::open(storage_root).map_err(TrackerError::Store)?;
        Ok(Self {
            state: Mutex::new(()),
            cache: FindingCache::new(store, cache_capacity),
        })
    }

    /// Correlates one analysis pass's raw findings for `file` against the
    /// previously tracked set and returns the updated collection.
    ///
    /// Three cases, kept deliberately distinct:
    /// - no live entry and no stored record: first analysis ever, every raw
    ///   finding becomes a baseline with an unknown introduction date;
    /// - live entry: matched findings keep their identity, unmatched raws
    ///   are introduced "now", unmatched previous findings are dropped;
    /// - stored record only: same as the live case, after restoring the
    ///   persisted collection (cold reload after a restart).
    pub fn process_raw_findings(
        &self,
        file: &str,
        raw: Vec<RawFinding>,
    ) -> Result<Vec<TrackedFinding>> {
        let _guard = self.lock_state();

        if let Some(previous) = self.cache.live(file) {
            let updated = reconcile(&previous, raw, OffsetDateTime::now_utc());
            self.install(file, updated.clone());
            return Ok(updated);
        }

        let stored = match self.cache.stored(file) {
            Ok(stored) => stored,
            Err(err) => {
                warn!("could not reload stored findings for {file}, starting fresh: {err}");
                None
            }
        };

        let updated = match stored {
            Some(previous) => {
                debug!(
                    "cold reload for {file}: {} persisted finding(s)",
                    previous.len()
                );
                reconcile(&previous, raw, OffsetDateTime::now_utc())
            }
            None => {
                debug!("first analysis of {file}: {} finding(s)", raw.len());
                raw.into_iter().map(TrackedFinding::baseline).collect()
            }
        };
        self.install(file, updated.clone());
        Ok(updated)
    }

    /// Sends the live findings of `files` to the server-matching
    /// collaborator and applies the response positionally: response entry i
    /// updates request finding i of the same file.
    ///
    /// The whole response shape is validated before the first finding is
    /// touched, so a failed, interrupted, or malformed round trip leaves
    /// prior state untouched.
    pub fn apply_server_matches(
        &self,
        matcher: &dyn ServerMatcher,
        files: &[String],
    ) -> Result<()> {
        let _guard = self.lock_state();

        let mut requests = Vec::with_capacity(files.len());
        let mut live_sets = Vec::with_capacity(files.len());
        for file in files {
            let findings = self.cache.live_or_fail(file)?;
            requests.push(ServerMatchRequest {
                file: file.clone(),
                entries: findings.iter().map(ServerMatchEntry::from).collect(),
            });
            live_sets.push(findings);
        }

        let responses = match matcher.match_batch(&requests) {
            Ok(responses) => responses,
            Err(err) => {
                warn!("server matching failed, keeping prior state: {err}");
                return Err(err.into());
            }
        };

        if responses.len() != requests.len() {
            return Err(TrackerError::ResponseShape(format!(
                "{} file(s) requested, {} answered",
                requests.len(),
                responses.len()
            )));
        }
        for (request, response) in requests.iter().zip(&responses) {
            if response.len() != request.entries.len() {
                return Err(TrackerError::ResponseShape(format!(
                    "{}: {} finding(s) requested, {} answered",
                    request.file,
                    request.entries.len(),
                    response.len()
                )));
            }
        }

        for ((file, mut findings), response) in files.iter().zip(live_sets).zip(responses) {
            for (finding, entry) in findings.iter_mut().zip(&response) {
                finding.apply_server_match(entry);
            }
            self.install(file, findings);
        }
        info!("applied server matches for {} file(s)", files.len());
        Ok(())
    }

    /// Marks the finding with `id` in `file` as resolved. The file must have
    /// live state in this session.
    pub fn mark_resolved(&self, file: &str, id: Uuid) -> Result<()> {
        let _guard = self.lock_state();
        self.update_live(file, id, |finding| finding.resolved = true)
    }

    /// Records the UI annotation identifier for the finding with `id` in
    /// `file`. The value is persisted verbatim and never interpreted.
    pub fn set_marker(&self, file: &str, id: Uuid, marker_id: Option<String>) -> Result<()> {
        let _guard = self.lock_state();
        self.update_live(file, id, |finding| finding.marker_id = marker_id.clone())
    }

    /// The current tracked collection for `file` (live, or persisted), if
    /// any. Read-only from the caller's perspective.
    pub fn current_findings(&self, file: &str) -> Result<Option<Vec<TrackedFinding>>> {
        let _guard = self.lock_state();
        Ok(self.cache.current(file)?)
    }

    /// Whether `file` has never been analyzed — absent from both the live
    /// cache and the store.
    pub fn is_first_analysis(&self, file: &str) -> bool {
        let _guard = self.lock_state();
        self.cache.is_first_analysis(file)
    }

    /// Persists every live collection without dropping any of them.
    pub fn flush_all(&self) -> Result<()> {
        let _guard = self.lock_state();
        self.cache.flush_all().map_err(TrackerError::Store)
    }

    /// Flushes everything, then releases live memory. For host shutdown.
    pub fn shutdown(&self) -> Result<()> {
        let _guard = self.lock_state();
        self.cache.shutdown().map_err(TrackerError::Store)
    }

    /// Resets all tracking state for this project, in memory and on disk.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock_state();
        self.cache.clear().map_err(TrackerError::Store)
    }

    /// Drops persisted records for keys the predicate rejects (files removed
    /// from or no longer analyzable in the workspace).
    pub fn prune_stale(&self, is_valid: impl Fn(&str) -> bool) -> Result<usize> {
        let _guard = self.lock_state();
        self.cache.prune_stale(is_valid).map_err(TrackerError::Store)
    }

    fn update_live(
        &self,
        file: &str,
        id: Uuid,
        mut apply: impl FnMut(&mut TrackedFinding),
    ) -> Result<()> {
        let mut findings = self.cache.live_or_fail(file)?;
        let Some(finding) = findings.iter_mut().find(|f| f.id == Some(id)) else {
            return Err(TrackerError::UnknownFinding(id));
        };
        apply(finding);
        self.install(file, findings);
        Ok(())
    }

    /// Puts a collection into the cache; a failed eviction write-back is
    /// logged but never blocks analysis.
    fn install(&self, file: &str, findings: Vec<TrackedFinding>) {
        if let Err(err) = self.cache.put(file, findings) {
            warn!("eviction write-back failed while caching {file}: {err}");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ()> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Correlates raw findings against an existing tracked set: matched pairs
/// keep their identity and swap in the new raw payload, unmatched raws are
/// introduced at `now`, unmatched previous findings disappear. Output is in
/// raw order.
fn reconcile(
    previous: &[TrackedFinding],
    raw: Vec<RawFinding>,
    now: OffsetDateTime,
) -> Vec<TrackedFinding> {
    let raw_tokens: Vec<MatchToken<'_>> = raw.iter().map(MatchToken::from).collect();
    let previous_tokens: Vec<MatchToken<'_>> = previous.iter().map(MatchToken::from).collect();
    let matching = correlate(&raw_tokens, &previous_tokens);

    let predecessor: HashMap<usize, usize> = matching.pairs.iter().copied().collect();
    raw.into_iter()
        .enumerate()
        .map(|(raw_index, raw_finding)| match predecessor.get(&raw_index) {
            Some(previous_index) => TrackedFinding::renewed(&previous[*previous_index], raw_finding),
            None => TrackedFinding::introduced(raw_finding, now),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServerMatchError;
    use pretty_assertions::assert_eq;
    use relint_findings::{FindingKind, ServerMatch, Severity};
    use relint_issue_store::{CacheError, StoredFindings};
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    fn raw(rule: &str, line: u32, range_digest: &str) -> RawFinding {
        RawFinding {
            rule_key: rule.to_string(),
            message: format!("{rule} fired"),
            line: Some(line),
            range_digest: Some(range_digest.to_string()),
            line_digest: None,
            severity: Severity::Major,
            kind: FindingKind::Bug,
        }
    }

    fn tracker(dir: &TempDir) -> ProjectTracker {
        ProjectTracker::open(dir.path().join("project"), 8).expect("open tracker")
    }

    #[test]
    fn first_analysis_leaves_introduction_unknown() {
        let dir = TempDir::new().expect("temp dir");
        let tracker = tracker(&dir);

        let tracked = tracker
            .process_raw_findings("a.rs", vec![raw("r1", 10, "d1")])
            .expect("process");

        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].introduced_at, None);
        assert!(!tracker.is_first_analysis("a.rs"));
    }

    #[test]
    fn warm_pass_preserves_identity_across_line_shift() {
        let dir = TempDir::new().expect("temp dir");
        let tracker = tracker(&dir);

        tracker
            .process_raw_findings("a.rs", vec![raw("r1", 10, "d1")])
            .expect("first pass");
        // Same content digest, shifted one line down.
        let second = tracker
            .process_raw_findings("a.rs", vec![raw("r1", 11, "d1")])
            .expect("second pass");

        assert_eq!(second.len(), 1);
        assert_eq!(second[0].introduced_at, None); // inherited, not reset
        assert_eq!(second[0].raw().line, Some(11));
    }

    #[test]
    fn new_findings_on_existing_baseline_are_dated() {
        let dir = TempDir::new().expect("temp dir");
        let tracker = tracker(&dir);

        tracker
            .process_raw_findings("a.rs", vec![raw("r1", 10, "d1")])
            .expect("first pass");
        let second = tracker
            .process_raw_findings("a.rs", vec![raw("r1", 10, "d1"), raw("r2", 20, "d2")])
            .expect("second pass");

        let new = second
            .iter()
            .find(|f| f.raw().rule_key == "r2")
            .expect("new finding present");
        assert!(new.introduced_at.is_some());
    }

    #[test]
    fn disappeared_findings_are_dropped() {
        let dir = TempDir::new().expect("temp dir");
        let tracker = tracker(&dir);

        tracker
            .process_raw_findings("a.rs", vec![raw("r1", 10, "d1"), raw("r2", 20, "d2")])
            .expect("first pass");
        let second = tracker
            .process_raw_findings("a.rs", vec![raw("r2", 20, "d2")])
            .expect("second pass");

        assert_eq!(second.len(), 1);
        assert_eq!(second[0].raw().rule_key, "r2");
    }

    #[test]
    fn cold_reload_inherits_persisted_identity() {
        let dir = TempDir::new().expect("temp dir");
        let id = Uuid::new_v4();
        {
            let tracker = tracker(&dir);
            tracker
                .process_raw_findings("a.rs", vec![raw("r1", 10, "d1")])
                .expect("first pass");
            tracker
                .apply_server_matches(
                    &FixedResponses::local_only(vec![id]),
                    &["a.rs".to_string()],
                )
                .expect("server match");
            tracker.flush_all().expect("flush");
        }

        // Fresh tracker over the same storage: nothing live, store hit.
        let reopened = tracker(&dir);
        let tracked = reopened
            .process_raw_findings("a.rs", vec![raw("r1", 12, "d1")])
            .expect("cold reload");

        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].id, Some(id));
        assert_eq!(tracked[0].raw().line, Some(12));
    }

    #[test]
    fn incompatible_stored_record_degrades_to_first_analysis() {
        let dir = TempDir::new().expect("temp dir");
        let root = dir.path().join("project");
        {
            let store: ObjectStore<StoredFindings> =
                ObjectStore::open(&root).expect("open store");
            let mut record = StoredFindings::snapshot(&[TrackedFinding::baseline(raw(
                "r1", 10, "d1",
            ))]);
            record.version += 1;
            store.write("a.rs", &record).expect("write");
        }

        let tracker = ProjectTracker::open(&root, 8).expect("open tracker");
        let tracked = tracker
            .process_raw_findings("a.rs", vec![raw("r1", 10, "d1")])
            .expect("process");
        assert_eq!(tracked[0].introduced_at, None);
    }

    /// Scripted collaborator: hands out predetermined responses or errors,
    /// and records the requests it saw.
    struct FixedResponses {
        responses: StdMutex<Option<std::result::Result<Vec<Vec<ServerMatch>>, ServerMatchError>>>,
        seen: StdMutex<Vec<ServerMatchRequest>>,
    }

    impl FixedResponses {
        fn new(result: std::result::Result<Vec<Vec<ServerMatch>>, ServerMatchError>) -> Self {
            Self {
                responses: StdMutex::new(Some(result)),
                seen: StdMutex::new(Vec::new()),
            }
        }

        fn local_only(ids: Vec<Uuid>) -> Self {
            Self::new(Ok(vec![
                ids.into_iter()
                    .map(|id| ServerMatch::LocalOnly { id, resolved: false })
                    .collect(),
            ]))
        }
    }

    impl ServerMatcher for FixedResponses {
        fn match_batch(
            &self,
            requests: &[ServerMatchRequest],
        ) -> std::result::Result<Vec<Vec<ServerMatch>>, ServerMatchError> {
            self.seen
                .lock()
                .expect("seen lock")
                .extend(requests.iter().cloned());
            self.responses
                .lock()
                .expect("responses lock")
                .take()
                .unwrap_or(Err(ServerMatchError::Failed("exhausted".to_string())))
        }
    }

    #[test]
    fn server_matches_apply_positionally_per_file() {
        let dir = TempDir::new().expect("temp dir");
        let tracker = tracker(&dir);

        tracker
            .process_raw_findings("a.rs", vec![raw("r1", 1, "da")])
            .expect("a.rs");
        tracker
            .process_raw_findings("b.rs", vec![raw("r2", 2, "db"), raw("r3", 3, "dc")])
            .expect("b.rs");

        let id_a0 = Uuid::new_v4();
        let id_b0 = Uuid::new_v4();
        let id_b1 = Uuid::new_v4();
        let matcher = FixedResponses::new(Ok(vec![
            vec![ServerMatch::LocalOnly { id: id_a0, resolved: false }],
            vec![
                ServerMatch::Remote {
                    id: id_b0,
                    introduced_at: None,
                    severity_override: Some(Severity::Blocker),
                    kind_override: None,
                    server_key: "SRV-B0".to_string(),
                    resolved: false,
                    on_new_code: false,
                },
                ServerMatch::LocalOnly { id: id_b1, resolved: true },
            ],
        ]));

        tracker
            .apply_server_matches(&matcher, &["a.rs".to_string(), "b.rs".to_string()])
            .expect("apply");

        let a = tracker.current_findings("a.rs").expect("a").expect("some");
        assert_eq!(a[0].id, Some(id_a0));

        let b = tracker.current_findings("b.rs").expect("b").expect("some");
        assert_eq!(b[0].id, Some(id_b0));
        assert_eq!(b[0].server_key.as_deref(), Some("SRV-B0"));
        assert_eq!(b[0].severity(), Severity::Blocker);
        assert!(!b[0].on_new_code);
        assert_eq!(b[1].id, Some(id_b1));
        assert!(b[1].resolved);

        // The request mirrored the tracked order.
        let seen = matcher.seen.lock().expect("seen lock");
        assert_eq!(seen[1].entries[0].rule_key, "r2");
        assert_eq!(seen[1].entries[1].rule_key, "r3");
    }

    #[test]
    fn failed_round_trip_leaves_state_untouched() {
        let dir = TempDir::new().expect("temp dir");
        let tracker = tracker(&dir);

        tracker
            .process_raw_findings("a.rs", vec![raw("r1", 1, "da")])
            .expect("a.rs");
        let before = tracker.current_findings("a.rs").expect("a");

        let matcher = FixedResponses::new(Err(ServerMatchError::Interrupted));
        let result = tracker.apply_server_matches(&matcher, &["a.rs".to_string()]);
        assert!(matches!(
            result,
            Err(TrackerError::ServerMatch(ServerMatchError::Interrupted))
        ));

        assert_eq!(tracker.current_findings("a.rs").expect("a"), before);
    }

    #[test]
    fn malformed_response_shape_applies_nothing() {
        let dir = TempDir::new().expect("temp dir");
        let tracker = tracker(&dir);

        tracker
            .process_raw_findings("a.rs", vec![raw("r1", 1, "da"), raw("r2", 2, "db")])
            .expect("a.rs");
        let before = tracker.current_findings("a.rs").expect("a");

        // One answer for two findings.
        let matcher = FixedResponses::new(Ok(vec![vec![ServerMatch::LocalOnly {
            id: Uuid::new_v4(),
            resolved: true,
        }]]));
        let result = tracker.apply_server_matches(&matcher, &["a.rs".to_string()]);
        assert!(matches!(result, Err(TrackerError::ResponseShape(_))));
        assert_eq!(tracker.current_findings("a.rs").expect("a"), before);
    }

    #[test]
    fn server_matching_requires_live_state() {
        let dir = TempDir::new().expect("temp dir");
        let tracker = tracker(&dir);

        let matcher = FixedResponses::new(Ok(vec![]));
        let result = tracker.apply_server_matches(&matcher, &["never-analyzed.rs".to_string()]);
        assert!(matches!(
            result,
            Err(TrackerError::Cache(CacheError::NotLive(_)))
        ));
    }

    #[test]
    fn mark_resolved_and_set_marker_update_live_state() {
        let dir = TempDir::new().expect("temp dir");
        let tracker = tracker(&dir);
        let id = Uuid::new_v4();

        tracker
            .process_raw_findings("a.rs", vec![raw("r1", 1, "da")])
            .expect("a.rs");
        tracker
            .apply_server_matches(&FixedResponses::local_only(vec![id]), &["a.rs".to_string()])
            .expect("server match");

        tracker.mark_resolved("a.rs", id).expect("resolve");
        tracker
            .set_marker("a.rs", id, Some("marker-3".to_string()))
            .expect("marker");

        let findings = tracker.current_findings("a.rs").expect("a").expect("some");
        assert!(findings[0].resolved);
        assert_eq!(findings[0].marker_id.as_deref(), Some("marker-3"));

        let unknown = tracker.mark_resolved("a.rs", Uuid::new_v4());
        assert!(matches!(unknown, Err(TrackerError::UnknownFinding(_))));
    }

    #[test]
    fn clear_resets_to_first_analysis() {
        let dir = TempDir::new().expect("temp dir");
        let tracker = tracker(&dir);

        tracker
            .process_raw_findings("a.rs", vec![raw("r1", 1, "da")])
            .expect("a.rs");
        tracker.flush_all().expect("flush");
        tracker.clear().expect("clear");

        assert!(tracker.is_first_analysis("a.rs"));
        assert_eq!(tracker.current_findings("a.rs").expect("a"), None);
    }

    #[test]
    fn prune_stale_drops_persisted_records() {
        let dir = TempDir::new().expect("temp dir");
        let tracker = tracker(&dir);

        tracker
            .process_raw_findings("gone.rs", vec![raw("r1", 1, "da")])
            .expect("gone.rs");
        tracker.flush_all().expect("flush");

        let dropped = tracker.prune_stale(|key| key != "gone.rs").expect("prune");
        assert_eq!(dropped, 1);
    }
}
