/*!
# relint tracker

Per-project orchestration of finding identity.

A [`ProjectTracker`] receives each analysis pass's raw findings for a file,
correlates them against the previously tracked set (live in memory, or
reloaded from the issue store after a restart), and keeps the per-file
tracked collections current. A [`TrackerRegistry`] owns one tracker per open
project and tears it down — with a forced flush — when the project closes.

The only externally-waiting operation is the server-matching round trip
([`ProjectTracker::apply_server_matches`]), whose response is applied
positionally and only after full validation, so a failed or interrupted round
trip never leaves partially updated state.
*/

mod config;
mod error;
mod registry;
mod server;
mod tracker;

pub use config::TrackingConfig;
pub use error::{Result, TrackerError};
pub use registry::TrackerRegistry;
pub use server::{ServerMatchEntry, ServerMatchError, ServerMatchRequest, ServerMatcher};
pub use tracker::ProjectTracker;

pub use relint_findings::ServerMatch;
