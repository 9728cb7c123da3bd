use crate::config::TrackingConfig;
use crate::error::Result;
use crate::tracker::ProjectTracker;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One tracker per open project.
///
/// An explicit object rather than process-wide state: the composition root
/// that wires the host environment's lifecycle events owns the registry and
/// forwards project-closed/deleted signals to it. Get-or-create runs under a
/// single lock, so concurrent callers can never race two trackers into
/// existence for the same project.
pub struct TrackerRegistry {
    config: TrackingConfig,
    trackers: Mutex<HashMap<String, Arc<ProjectTracker>>>,
}

impl TrackerRegistry {
    pub fn new(config: TrackingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            trackers: Mutex::new(HashMap::new()),
        })
    }

    /// The tracker for `project_id`, creating it lazily on first use.
    pub fn get_or_create(&self, project_id: &str) -> Result<Arc<ProjectTracker>> {
        let mut trackers = self.lock_trackers();
        if let Some(tracker) = trackers.get(project_id) {
            return Ok(Arc::clone(tracker));
        }
        let root = self.config.storage_root.join(project_dir_name(project_id));
        debug!("creating tracker for {project_id} at {}", root.display());
        let tracker = Arc::new(ProjectTracker::open(root, self.config.cache_capacity)?);
        trackers.insert(project_id.to_string(), Arc::clone(&tracker));
        Ok(tracker)
    }

    /// The tracker for `project_id`, if one has been created.
    pub fn get(&self, project_id: &str) -> Option<Arc<ProjectTracker>> {
        self.lock_trackers().get(project_id).map(Arc::clone)
    }

    /// Handles a project-closed or project-deleted signal from the host:
    /// removes the tracker and force-flushes it. Unknown projects are a
    /// no-op.
    pub fn project_closed(&self, project_id: &str) {
        let removed = self.lock_trackers().remove(project_id);
        if let Some(tracker) = removed {
            info!("flushing tracker for closed project {project_id}");
            if let Err(err) = tracker.shutdown() {
                warn!("flush on close failed for {project_id}: {err}");
            }
        }
    }

    /// Flushes every tracker. Called once at host shutdown.
    pub fn shutdown(&self) {
        let trackers = std::mem::take(&mut *self.lock_trackers());
        for (project_id, tracker) in trackers {
            if let Err(err) = tracker.shutdown() {
                warn!("flush on shutdown failed for {project_id}: {err}");
            }
        }
    }

    fn lock_trackers(&self) -> MutexGuard<'_, HashMap<String, Arc<ProjectTracker>>> {
        self.trackers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A filesystem-safe, collision-free directory name for a project id:
/// readable prefix plus a short digest, since ids may contain path
/// separators or coincide after sanitization.
fn project_dir_name(project_id: &str) -> String {
    let sanitized: String = project_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '-' })
        .collect();
    let digest = blake3::hash(project_id.as_bytes()).to_hex();
    format!("{sanitized}-{}", &digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use relint_findings::{FindingKind, RawFinding, Severity};
    use std::thread;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> TrackerRegistry {
        TrackerRegistry::new(TrackingConfig::new(dir.path().join("storage"))).expect("registry")
    }

    fn raw() -> RawFinding {
        RawFinding {
            rule_key: "r1".to_string(),
            message: "r1 fired".to_string(),
            line: Some(1),
            range_digest: Some("d1".to_string()),
            line_digest: None,
            severity: Severity::Minor,
            kind: FindingKind::CodeSmell,
        }
    }

    #[test]
    fn get_or_create_returns_the_same_tracker() {
        let dir = TempDir::new().expect("temp dir");
        let registry = registry(&dir);

        let first = registry.get_or_create("project-a").expect("create");
        let second = registry.get_or_create("project-a").expect("lookup");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.get("project-a").is_some());
        assert!(registry.get("project-b").is_none());
    }

    #[test]
    fn concurrent_get_or_create_never_duplicates() {
        let dir = TempDir::new().expect("temp dir");
        let registry = Arc::new(registry(&dir));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.get_or_create("shared").expect("create"))
            })
            .collect();
        let trackers: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .collect();

        for tracker in &trackers[1..] {
            assert!(Arc::ptr_eq(&trackers[0], tracker));
        }
    }

    #[test]
    fn project_closed_flushes_and_forgets() {
        let dir = TempDir::new().expect("temp dir");
        let registry = registry(&dir);

        let tracker = registry.get_or_create("project-a").expect("create");
        tracker
            .process_raw_findings("a.rs", vec![raw()])
            .expect("process");
        registry.project_closed("project-a");
        assert!(registry.get("project-a").is_none());

        // The forced flush persisted the findings: a re-created tracker
        // over the same storage sees them as already analyzed.
        let reopened = registry.get_or_create("project-a").expect("recreate");
        assert!(!reopened.is_first_analysis("a.rs"));
    }

    #[test]
    fn closing_an_unknown_project_is_a_no_op() {
        let dir = TempDir::new().expect("temp dir");
        let registry = registry(&dir);
        registry.project_closed("never-opened");
    }

    #[test]
    fn shutdown_flushes_every_tracker() {
        let dir = TempDir::new().expect("temp dir");
        let registry = registry(&dir);

        registry
            .get_or_create("project-a")
            .expect("a")
            .process_raw_findings("a.rs", vec![raw()])
            .expect("process");
        registry
            .get_or_create("project-b")
            .expect("b")
            .process_raw_findings("b.rs", vec![raw()])
            .expect("process");
        registry.shutdown();

        assert!(!registry
            .get_or_create("project-a")
            .expect("a again")
            .is_first_analysis("a.rs"));
        assert!(!registry
            .get_or_create("project-b")
            .expect("b again")
            .is_first_analysis("b.rs"));
    }

    #[test]
    fn distinct_project_ids_get_distinct_directories() {
        assert_ne!(project_dir_name("a/b"), project_dir_name("a-b"));
        let name = project_dir_name("my project!");
        assert!(!name.contains(' '));
        assert!(!name.contains('!'));
        assert!(!name.contains('/'));
    }
}
