//! Constraint evaluation against versions
//!
//! Pre-release versions only match a range set when some comparison target in
//! that set also carries labels. The empty constraint and bare `*` match
//! everything, pre-releases included.

use crate::version::constraint::{Constraint, VersionRange, VersionSpec};
use crate::version::types::Version;

impl VersionRange {
    /// Check if a version satisfies this range, ignoring the pre-release gate
    fn satisfies(&self, version: &Version) -> bool {
        match self {
            VersionRange::Any => true,
            VersionRange::Exact(v) => version == v,
            VersionRange::NotEqual(v) => version != v,
            VersionRange::Caret { floor, ceiling } | VersionRange::Tilde { floor, ceiling } => {
                version >= floor && ceiling.as_ref().is_none_or(|c| version < c)
            }
            VersionRange::Gte(v) => version >= v,
            VersionRange::Gt(v) => version > v,
            VersionRange::Lte(v) => version <= v,
            VersionRange::Lt(v) => version < v,
            VersionRange::WildcardMajor(major) => version.major == *major,
            VersionRange::WildcardMinor(major, minor) => {
                version.major == *major && version.minor == *minor
            }
            VersionRange::Hyphen { from, to } => version >= from && version <= to,
        }
    }

    /// Check whether the upper edge of this range admits `probe`
    ///
    /// Lower edges are ignored: a range starting above every known release
    /// still admits future releases.
    fn admits_above(&self, probe: &Version) -> bool {
        match self {
            VersionRange::Exact(v) | VersionRange::Lte(v) => probe <= v,
            VersionRange::Hyphen { to, .. } => probe <= to,
            VersionRange::Lt(v) => probe < v,
            VersionRange::Caret { ceiling, .. } | VersionRange::Tilde { ceiling, .. } => {
                ceiling.as_ref().is_none_or(|c| probe < c)
            }
            VersionRange::WildcardMajor(major) => probe.major <= *major,
            VersionRange::WildcardMinor(major, minor) => (probe.major, probe.minor) <= (*major, *minor),
            VersionRange::Any
            | VersionRange::NotEqual(_)
            | VersionRange::Gte(_)
            | VersionRange::Gt(_) => true,
        }
    }

    fn opts_into_prerelease(&self) -> bool {
        self.target().is_some_and(Version::is_prerelease)
    }
}

/// A set of ranges that must all hold
fn set_satisfies(ranges: &[VersionRange], version: &Version) -> bool {
    if version.is_prerelease() && !ranges.iter().any(VersionRange::opts_into_prerelease) {
        return false;
    }
    ranges.iter().all(|r| r.satisfies(version))
}

impl VersionSpec {
    /// Check if a version satisfies this spec
    pub(crate) fn satisfies(&self, version: &Version) -> bool {
        match self {
            VersionSpec::Any => true,
            VersionSpec::Single(range) => set_satisfies(std::slice::from_ref(range), version),
            VersionSpec::And(ranges) => set_satisfies(ranges, version),
            VersionSpec::Or(specs) => specs.iter().any(|s| s.satisfies(version)),
        }
    }

    /// Check whether some alternative's upper edges all admit `probe`
    pub(crate) fn admits_above(&self, probe: &Version) -> bool {
        match self {
            VersionSpec::Any => true,
            VersionSpec::Single(range) => range.admits_above(probe),
            VersionSpec::And(ranges) => ranges.iter().all(|r| r.admits_above(probe)),
            VersionSpec::Or(specs) => specs.iter().any(|s| s.admits_above(probe)),
        }
    }
}

impl Constraint {
    /// Check if a version satisfies this constraint
    pub fn matches(&self, version: &Version) -> bool {
        self.spec().satisfies(version)
    }

    /// Whether a release newer than `latest` could still satisfy this constraint
    ///
    /// The smallest such release is the final release of a pre-release
    /// `latest`, otherwise `latest` with its patch bumped. The constraint has
    /// headroom when its upper edges admit it.
    pub fn has_headroom_above(&self, latest: &Version) -> bool {
        let probe = if latest.is_prerelease() {
            latest.release()
        } else {
            Version::new(latest.major, latest.minor, latest.patch.saturating_add(1))
        };
        self.spec().admits_above(&probe)
    }

    /// The greatest version satisfying this constraint
    pub fn max_satisfying<'a, I>(&self, versions: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        versions.into_iter().filter(|v| self.matches(v)).max()
    }
}

/// Check if `version` satisfies `constraint`
pub fn matches(constraint: &Constraint, version: &Version) -> bool {
    constraint.matches(version)
}
