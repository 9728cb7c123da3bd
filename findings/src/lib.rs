/*!
# relint findings

Data model for the finding-tracking engine: the stateless [`RawFinding`]
produced by one analysis pass, and the identity-bearing [`TrackedFinding`]
that survives across passes, restarts, and server round trips.

Derived records are built by value-copying constructors (`renewed`,
`restored`, `apply_server_match`). They copy the scalar fields they need and
never hold a reference back to the record they were derived from, so a chain
of re-analyses cannot keep the whole history of prior results reachable.
*/

mod raw;
mod tracked;

pub use raw::{FindingKind, RawFinding, Severity};
pub use tracked::{ServerMatch, TrackedFinding};
