//! Dependency and runtime-compatibility resolution
//!
//! ```text
//! event (publish / edit / new runtime release)
//!   -> ResolutionService   per-entity lock, read-compute-replace
//!        -> DependencyResolver / CompatibilityResolver   pure
//!        -> ResolutionStorer (Cache)                     SQLite
//!   -> refresh                                           async fan-out
//! ```
//!
//! Readers only consult the cache.

pub mod cache;
pub mod compatibility;
pub mod dependency;
pub mod error;
pub mod refresh;
pub mod service;
pub mod storer;
pub mod types;

pub use cache::Cache;
pub use compatibility::{CompatibilityResolver, latest_release, resolve_compatibility};
pub use dependency::DependencyResolver;
pub use error::{CacheError, ResolveError};
pub use refresh::{DependencyJob, RefreshSummary, refresh_dependables, refresh_unpinned_compatibility};
pub use service::ResolutionService;
pub use storer::ResolutionStorer;
pub use types::{
    CachedResolution, Candidate, CandidatePool, CompatibilityRequest, CompatibilityResolution,
    CompatibleRelease, DependableKind, DependableRef, Dependency, Resolution, ResolvedDependency,
    RuntimeRelease,
};
