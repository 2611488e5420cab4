//! Common types for resolution inputs and outputs

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::version::{Constraint, Version};

pub type ModId = i64;
pub type ModVersionId = i64;
pub type DependencyId = i64;
pub type RuntimeReleaseId = i64;

/// Kind of artifact version that can declare dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependableKind {
    /// A version of a mod
    ModVersion,
    /// A version of an add-on attached to a mod
    AddonVersion,
}

impl DependableKind {
    /// Returns the string representation stored in the cache
    pub fn as_str(&self) -> &'static str {
        match self {
            DependableKind::ModVersion => "mod_version",
            DependableKind::AddonVersion => "addon_version",
        }
    }
}

impl std::str::FromStr for DependableKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mod_version" => Ok(DependableKind::ModVersion),
            "addon_version" => Ok(DependableKind::AddonVersion),
            _ => Err(()),
        }
    }
}

/// The subject of a dependency edge: kind plus identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependableRef {
    pub kind: DependableKind,
    pub id: i64,
}

impl DependableRef {
    pub fn mod_version(id: ModVersionId) -> Self {
        Self {
            kind: DependableKind::ModVersion,
            id,
        }
    }

    pub fn addon_version(id: i64) -> Self {
        Self {
            kind: DependableKind::AddonVersion,
            id,
        }
    }

    /// Key used for per-entity resolution locks
    pub fn lock_key(&self) -> String {
        format!("dependencies:{}", self)
    }
}

impl fmt::Display for DependableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// A declared requirement from a dependable on a target mod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: DependencyId,
    pub dependable: DependableRef,
    pub target_mod_id: ModId,
    #[serde(default)]
    pub constraint: Constraint,
}

/// A concrete version of a target mod that a dependency may resolve to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: ModVersionId,
    pub mod_id: ModId,
    pub version: Version,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl Candidate {
    /// Published at or before `as_of`, not disabled, not soft-deleted
    pub fn is_eligible(&self, as_of: DateTime<Utc>) -> bool {
        !self.disabled && !self.deleted && self.published_at.is_some_and(|at| at <= as_of)
    }
}

/// Candidate versions grouped by mod, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidatePool {
    by_mod: IndexMap<ModId, Vec<Candidate>>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, candidate: Candidate) {
        self.by_mod
            .entry(candidate.mod_id)
            .or_default()
            .push(candidate);
    }

    /// All known candidates for a mod, eligible or not
    pub fn candidates_for(&self, mod_id: ModId) -> &[Candidate] {
        self.by_mod.get(&mod_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_mod.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<Candidate> for CandidatePool {
    fn from_iter<I: IntoIterator<Item = Candidate>>(iter: I) -> Self {
        let mut pool = Self::new();
        for candidate in iter {
            pool.insert(candidate);
        }
        pool
    }
}

/// Outcome of resolving one dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    /// The best matching candidate
    Satisfied {
        version_id: ModVersionId,
        version: Version,
    },
    /// No eligible candidate matches the constraint
    Unsatisfied,
}

impl Resolution {
    pub fn version_id(&self) -> Option<ModVersionId> {
        match self {
            Resolution::Satisfied { version_id, .. } => Some(*version_id),
            Resolution::Unsatisfied => None,
        }
    }
}

/// A cached resolution fact for one (dependable, dependency) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDependency {
    pub dependable: DependableRef,
    pub dependency_id: DependencyId,
    pub target_mod_id: ModId,
    pub resolution: Resolution,
}

/// What the cache knows about a single dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CachedResolution {
    /// The resolver has not run for this pair yet
    NotResolved,
    /// The resolver ran and nothing matched
    Unsatisfied,
    /// The resolver ran and selected this version
    Satisfied {
        version_id: ModVersionId,
        version: Version,
    },
}

impl From<Resolution> for CachedResolution {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Satisfied {
                version_id,
                version,
            } => CachedResolution::Satisfied {
                version_id,
                version,
            },
            Resolution::Unsatisfied => CachedResolution::Unsatisfied,
        }
    }
}

/// A release of the SPT runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeRelease {
    pub id: RuntimeReleaseId,
    pub version: Version,
    /// Unpublished releases are invisible to resolution
    pub published_at: Option<DateTime<Utc>>,
    /// Display hint carried through for listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_class: Option<String>,
}

impl RuntimeRelease {
    pub fn is_published(&self, as_of: DateTime<Utc>) -> bool {
        self.published_at.is_some_and(|at| at <= as_of)
    }
}

/// A mod version's declared runtime compatibility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityRequest {
    pub mod_version_id: ModVersionId,
    #[serde(default)]
    pub constraint: Constraint,
    /// Pin regardless of the constraint's shape
    #[serde(default)]
    pub force_pin: bool,
}

impl CompatibilityRequest {
    pub fn new(mod_version_id: ModVersionId, constraint: &str) -> Self {
        Self {
            mod_version_id,
            constraint: Constraint::parse(constraint),
            force_pin: false,
        }
    }

    /// Key used for per-entity resolution locks
    pub fn lock_key(&self) -> String {
        compatibility_lock_key(self.mod_version_id)
    }
}

/// Resolution lock key of a mod version's compatibility rows
pub fn compatibility_lock_key(mod_version_id: ModVersionId) -> String {
    format!("compatibility:{}", mod_version_id)
}

/// A runtime release a mod version is compatible with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibleRelease {
    pub release_id: RuntimeReleaseId,
    pub version: Version,
}

/// Compatibility of one mod version with the published runtime releases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityResolution {
    pub mod_version_id: ModVersionId,
    pub constraint: Constraint,
    /// Matching releases in publish order
    pub matches: Vec<CompatibleRelease>,
    /// Not re-evaluated when new releases are published
    pub pinned: bool,
}

/// One persisted compatibility row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompatibilityRow {
    pub mod_version_id: ModVersionId,
    pub runtime_release_id: RuntimeReleaseId,
    pub pinned: bool,
}

impl CompatibilityResolution {
    pub fn rows(&self) -> Vec<CompatibilityRow> {
        self.matches
            .iter()
            .map(|m| CompatibilityRow {
                mod_version_id: self.mod_version_id,
                runtime_release_id: m.release_id,
                pinned: self.pinned,
            })
            .collect()
    }

    /// The request that would reproduce this resolution
    pub fn request(&self) -> CompatibilityRequest {
        CompatibilityRequest {
            mod_version_id: self.mod_version_id,
            constraint: self.constraint.clone(),
            force_pin: false,
        }
    }
}
