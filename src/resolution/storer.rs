//! Storage boundary for resolution outputs

#[cfg(test)]
use mockall::automock;

use crate::resolution::error::CacheError;
use crate::resolution::types::{
    CachedResolution, CompatibilityRequest, CompatibilityResolution, DependableRef, DependencyId,
    ModVersionId, ResolvedDependency,
};

/// Trait for persisting and reading resolver outputs
#[cfg_attr(test, automock)]
pub trait ResolutionStorer: Send + Sync + 'static {
    /// Replace every resolved dependency row of a dependable in one unit
    fn replace_resolved_dependencies(
        &self,
        dependable: DependableRef,
        rows: &[ResolvedDependency],
    ) -> Result<(), CacheError>;

    /// Get the resolved rows of a dependable, `None` if it was never resolved
    fn get_resolved_dependencies(
        &self,
        dependable: DependableRef,
    ) -> Result<Option<Vec<ResolvedDependency>>, CacheError>;

    /// Look up the cached outcome for one dependency
    fn get_resolution(
        &self,
        dependable: DependableRef,
        dependency_id: DependencyId,
    ) -> Result<CachedResolution, CacheError> {
        let Some(rows) = self.get_resolved_dependencies(dependable)? else {
            return Ok(CachedResolution::NotResolved);
        };
        Ok(rows
            .into_iter()
            .find(|row| row.dependency_id == dependency_id)
            .map(|row| row.resolution.into())
            .unwrap_or(CachedResolution::NotResolved))
    }

    /// Replace the compatibility rows of a mod version in one unit
    fn replace_compatibility(&self, resolution: &CompatibilityResolution)
    -> Result<(), CacheError>;

    /// Get the cached compatibility of a mod version, `None` if never resolved
    fn get_compatibility(
        &self,
        mod_version_id: ModVersionId,
    ) -> Result<Option<CompatibilityResolution>, CacheError>;

    /// Requests of every mod version whose rows are not pinned
    fn get_unpinned_requests(&self) -> Result<Vec<CompatibilityRequest>, CacheError>;

    /// Try to take the resolution lock for an entity
    ///
    /// Returns false when another run holds a lock that has not gone stale.
    fn try_start_resolution(&self, entity: &str) -> Result<bool, CacheError>;

    /// Release the resolution lock for an entity
    fn finish_resolution(&self, entity: &str) -> Result<(), CacheError>;
}
