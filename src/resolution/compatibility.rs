//! Runtime compatibility resolution and the pin policy
//!
//! A mod version's compatibility rows are pinned when its constraint cannot
//! admit any release newer than the latest published one. Unpinned rows are
//! recomputed whenever a runtime release is published.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::resolution::types::{
    CompatibilityRequest, CompatibilityResolution, CompatibleRelease, RuntimeRelease,
};
use crate::version::Constraint;

/// Published releases in publish order, ties broken by version then id
pub fn published_releases(releases: &[RuntimeRelease], as_of: DateTime<Utc>) -> Vec<&RuntimeRelease> {
    let mut published: Vec<_> = releases.iter().filter(|r| r.is_published(as_of)).collect();
    published.sort_by(|a, b| {
        a.published_at
            .cmp(&b.published_at)
            .then_with(|| a.version.cmp(&b.version))
            .then_with(|| a.id.cmp(&b.id))
    });
    published
}

/// The greatest published release by version
pub fn latest_release(releases: &[RuntimeRelease], as_of: DateTime<Utc>) -> Option<&RuntimeRelease> {
    releases
        .iter()
        .filter(|r| r.is_published(as_of))
        .max_by(|a, b| a.version.cmp(&b.version).then_with(|| a.id.cmp(&b.id)))
}

#[derive(Debug, Clone, Copy)]
pub struct CompatibilityResolver {
    pin_bounded: bool,
}

impl Default for CompatibilityResolver {
    fn default() -> Self {
        Self { pin_bounded: true }
    }
}

impl CompatibilityResolver {
    /// `pin_bounded` enables automatic pinning of bounded constraints
    pub fn new(pin_bounded: bool) -> Self {
        Self { pin_bounded }
    }

    /// Decide whether rows computed for `constraint` should be pinned
    pub fn should_pin(
        &self,
        constraint: &Constraint,
        force_pin: bool,
        latest: Option<&RuntimeRelease>,
    ) -> bool {
        if force_pin {
            return true;
        }
        if !self.pin_bounded || constraint.is_any() {
            return false;
        }
        latest.is_some_and(|l| !constraint.has_headroom_above(&l.version))
    }

    pub fn resolve(
        &self,
        request: &CompatibilityRequest,
        releases: &[RuntimeRelease],
        as_of: DateTime<Utc>,
    ) -> CompatibilityResolution {
        let matches: Vec<CompatibleRelease> = published_releases(releases, as_of)
            .into_iter()
            .filter(|r| request.constraint.matches(&r.version))
            .map(|r| CompatibleRelease {
                release_id: r.id,
                version: r.version.clone(),
            })
            .collect();

        let latest = latest_release(releases, as_of);
        let pinned = self.should_pin(&request.constraint, request.force_pin, latest);

        debug!(
            "Mod version {} constraint '{}' matches {} releases (pinned: {})",
            request.mod_version_id,
            request.constraint,
            matches.len(),
            pinned
        );

        CompatibilityResolution {
            mod_version_id: request.mod_version_id,
            constraint: request.constraint.clone(),
            matches,
            pinned,
        }
    }
}

/// Resolve with the default policy
pub fn resolve_compatibility(
    request: &CompatibilityRequest,
    releases: &[RuntimeRelease],
    as_of: DateTime<Utc>,
) -> CompatibilityResolution {
    CompatibilityResolver::default().resolve(request, releases, as_of)
}
