//! Read-compute-replace cycle under a per-entity lock

use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::ResolverConfig;
use crate::resolution::compatibility::CompatibilityResolver;
use crate::resolution::dependency::DependencyResolver;
use crate::resolution::error::ResolveError;
use crate::resolution::storer::ResolutionStorer;
use crate::resolution::types::{
    CandidatePool, CompatibilityRequest, CompatibilityResolution, DependableRef, Dependency,
    ModVersionId, Resolution, ResolvedDependency, RuntimeRelease, compatibility_lock_key,
};

pub struct ResolutionService<S: ResolutionStorer> {
    storer: Arc<S>,
    dependencies: DependencyResolver,
    compatibility: CompatibilityResolver,
    lock_attempts: u32,
    lock_retry_delay: Duration,
}

impl<S: ResolutionStorer> ResolutionService<S> {
    pub fn new(storer: Arc<S>, config: &ResolverConfig) -> Self {
        Self {
            storer,
            dependencies: DependencyResolver::new(),
            compatibility: CompatibilityResolver::new(
                config.compatibility.pin_bounded_constraints,
            ),
            lock_attempts: config.refresh.lock_attempts.max(1),
            lock_retry_delay: Duration::from_millis(config.refresh.lock_retry_delay_ms),
        }
    }

    pub fn storer(&self) -> &Arc<S> {
        &self.storer
    }

    /// Run `work` while holding the resolution lock for `entity`
    ///
    /// The lock is released whether or not `work` succeeds.
    fn with_entity_lock<T>(
        &self,
        entity: &str,
        work: impl FnOnce() -> Result<T, ResolveError>,
    ) -> Result<T, ResolveError> {
        let mut acquired = false;
        for attempt in 1..=self.lock_attempts {
            if self.storer.try_start_resolution(entity)? {
                acquired = true;
                break;
            }
            warn!(
                "Resolution for {} already in progress (attempt {}/{})",
                entity, attempt, self.lock_attempts
            );
            if attempt < self.lock_attempts {
                sleep(self.lock_retry_delay);
            }
        }

        if !acquired {
            return Err(ResolveError::Busy {
                entity: entity.to_string(),
            });
        }

        let result = work();

        let _ = self
            .storer
            .finish_resolution(entity)
            .inspect_err(|e| error!("Failed to finish resolution for {}: {}", entity, e));

        result
    }

    /// Resolve a dependable's dependencies and replace its cached rows
    pub fn resolve_dependencies(
        &self,
        dependable: DependableRef,
        dependencies: &[Dependency],
        pool: &CandidatePool,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<ResolvedDependency>, ResolveError> {
        self.with_entity_lock(&dependable.lock_key(), || {
            debug!(
                "Resolving {} dependencies for {}",
                dependencies.len(),
                dependable
            );

            let previous = self
                .storer
                .get_resolved_dependencies(dependable)?
                .unwrap_or_default();
            let rows = self
                .dependencies
                .resolve(dependable, dependencies, pool, as_of);

            log_changes(dependable, &previous, &rows);

            self.storer.replace_resolved_dependencies(dependable, &rows)?;
            Ok(rows)
        })
    }

    /// Resolve a mod version's runtime compatibility and replace its cached rows
    pub fn resolve_compatibility(
        &self,
        request: &CompatibilityRequest,
        releases: &[RuntimeRelease],
        as_of: DateTime<Utc>,
    ) -> Result<CompatibilityResolution, ResolveError> {
        self.with_entity_lock(&request.lock_key(), || {
            let resolution = self.compatibility.resolve(request, releases, as_of);
            self.storer.replace_compatibility(&resolution)?;
            Ok(resolution)
        })
    }

    /// Re-resolve a mod version from the state cached for it
    ///
    /// The state is read under the entity lock, so an edit made after the
    /// caller listed the mod version wins. Returns false when the mod version
    /// is no longer cached or has been pinned since.
    pub fn refresh_compatibility(
        &self,
        mod_version_id: ModVersionId,
        releases: &[RuntimeRelease],
        as_of: DateTime<Utc>,
    ) -> Result<bool, ResolveError> {
        self.with_entity_lock(&compatibility_lock_key(mod_version_id), || {
            let current = match self.storer.get_compatibility(mod_version_id)? {
                Some(current) if !current.pinned => current.request(),
                Some(_) => {
                    debug!("Mod version {} was pinned, skipping refresh", mod_version_id);
                    return Ok(false);
                }
                None => {
                    debug!("Mod version {} has no cached state, skipping refresh", mod_version_id);
                    return Ok(false);
                }
            };

            let resolution = self.compatibility.resolve(&current, releases, as_of);
            self.storer.replace_compatibility(&resolution)?;
            Ok(true)
        })
    }
}

fn log_changes(dependable: DependableRef, previous: &[ResolvedDependency], rows: &[ResolvedDependency]) {
    for row in rows {
        let before = previous
            .iter()
            .find(|p| p.dependency_id == row.dependency_id)
            .map(|p| &p.resolution);

        if before != Some(&row.resolution) {
            debug!(
                "Dependency {} of {} changed: {:?} -> {:?}",
                row.dependency_id, dependable, before, row.resolution
            );
        }

        if row.resolution == Resolution::Unsatisfied {
            info!(
                "Dependency {} of {} on mod {} is unsatisfied",
                row.dependency_id, dependable, row.target_mod_id
            );
        }
    }

    for removed in previous
        .iter()
        .filter(|p| !rows.iter().any(|r| r.dependency_id == p.dependency_id))
    {
        debug!(
            "Dependency {} of {} removed",
            removed.dependency_id, dependable
        );
    }
}
