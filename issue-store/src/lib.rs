/*!
# relint issue store

Disk-backed persistence for tracked findings, plus the bounded in-memory
cache that sits in front of it.

[`ObjectStore`] maps a project-relative file path to an on-disk binary record
through a hashed two-level directory fan-out, with a separate versioned index
so lookups and deletions never recompute the hash. [`FindingCache`] keeps the
most recently analyzed files live in memory and writes the least recently
used entry back to the store on eviction, so restarting the host never loses
finding identity and memory stays bounded regardless of project size.
*/

mod cache;
mod error;
mod record;
mod store;

pub use cache::{DEFAULT_CACHE_CAPACITY, FindingCache};
pub use error::{CacheError, Result, StoreError};
pub use record::{StoredFinding, StoredFindings};
pub use store::ObjectStore;
