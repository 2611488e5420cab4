//! Dependency resolution
//!
//! Looks exactly one hop from a dependable to each declared target mod.
//! Cycles are not detected here.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::debug;

use crate::resolution::types::{
    Candidate, CandidatePool, DependableRef, Dependency, Resolution, ResolvedDependency,
};

/// Ranking among matching candidates: version, then publish time, then id
fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    a.version
        .cmp(&b.version)
        .then_with(|| a.published_at.cmp(&b.published_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Select the best candidate for one dependency
pub fn select_candidate<'a>(
    dependency: &Dependency,
    pool: &'a CandidatePool,
    as_of: DateTime<Utc>,
) -> Option<&'a Candidate> {
    pool.candidates_for(dependency.target_mod_id)
        .iter()
        .filter(|c| c.is_eligible(as_of))
        .filter(|c| dependency.constraint.matches(&c.version))
        .max_by(|a, b| rank(a, b))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve every dependency declared by `dependable`
    ///
    /// Returns one row per distinct dependency id, ordered by id. Dependencies
    /// declared by another dependable are ignored. Unsatisfied dependencies
    /// are kept as explicit rows.
    pub fn resolve(
        &self,
        dependable: DependableRef,
        dependencies: &[Dependency],
        pool: &CandidatePool,
        as_of: DateTime<Utc>,
    ) -> Vec<ResolvedDependency> {
        let mut rows: IndexMap<_, ResolvedDependency> = IndexMap::new();

        for dependency in dependencies {
            if dependency.dependable != dependable {
                debug!(
                    "Skipping dependency {} declared by {}, not {}",
                    dependency.id, dependency.dependable, dependable
                );
                continue;
            }
            if rows.contains_key(&dependency.id) {
                continue;
            }

            let resolution = match select_candidate(dependency, pool, as_of) {
                Some(candidate) => Resolution::Satisfied {
                    version_id: candidate.id,
                    version: candidate.version.clone(),
                },
                None => Resolution::Unsatisfied,
            };

            rows.insert(
                dependency.id,
                ResolvedDependency {
                    dependable,
                    dependency_id: dependency.id,
                    target_mod_id: dependency.target_mod_id,
                    resolution,
                },
            );
        }

        rows.sort_keys();
        rows.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{Constraint, Version};
    use chrono::TimeZone;
    use rstest::rstest;

    const TARGET: i64 = 100;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn candidate(id: i64, version: &str, published: i64) -> Candidate {
        Candidate {
            id,
            mod_id: TARGET,
            version: Version::parse(version),
            published_at: Some(at(published)),
            disabled: false,
            deleted: false,
        }
    }

    fn dependency(id: i64, constraint: &str) -> Dependency {
        Dependency {
            id,
            dependable: DependableRef::mod_version(1),
            target_mod_id: TARGET,
            constraint: Constraint::parse(constraint),
        }
    }

    fn resolve_one(constraint: &str, pool: &CandidatePool) -> Resolution {
        let rows = DependencyResolver::new().resolve(
            DependableRef::mod_version(1),
            &[dependency(1, constraint)],
            pool,
            at(1_000),
        );
        assert_eq!(rows.len(), 1);
        rows.into_iter().next().unwrap().resolution
    }

    #[rstest]
    #[case("^1.0.0", Some(2))]
    #[case("~1.0.0", Some(1))]
    #[case(">=2.0.0", Some(3))]
    #[case("", Some(3))]
    #[case("^3.0.0", None)]
    fn resolve_selects_greatest_match(#[case] constraint: &str, #[case] expected: Option<i64>) {
        let pool: CandidatePool = [
            candidate(1, "1.0.0", 10),
            candidate(2, "1.5.0", 20),
            candidate(3, "2.0.0", 30),
        ]
        .into_iter()
        .collect();

        assert_eq!(resolve_one(constraint, &pool).version_id(), expected);
    }

    #[test]
    fn resolve_returns_unsatisfied_when_no_candidates() {
        let pool = CandidatePool::new();
        assert_eq!(resolve_one("^1.0.0", &pool), Resolution::Unsatisfied);
        assert_eq!(resolve_one("", &pool), Resolution::Unsatisfied);
    }

    #[test]
    fn resolve_ignores_ineligible_candidates() {
        let mut disabled = candidate(4, "1.9.0", 10);
        disabled.disabled = true;
        let mut deleted = candidate(5, "1.8.0", 10);
        deleted.deleted = true;
        let scheduled = candidate(6, "1.7.0", 5_000);
        let mut unpublished = candidate(7, "1.6.0", 10);
        unpublished.published_at = None;

        let pool: CandidatePool = [
            candidate(1, "1.0.0", 10),
            disabled,
            deleted,
            scheduled,
            unpublished,
        ]
        .into_iter()
        .collect();

        assert_eq!(resolve_one("^1.0.0", &pool).version_id(), Some(1));
    }

    #[test]
    fn resolve_breaks_version_ties_by_latest_publish_time() {
        let pool: CandidatePool = [
            candidate(1, "1.5.0", 30),
            candidate(2, "v1.5.0", 20),
            candidate(3, "1.4.0", 40),
        ]
        .into_iter()
        .collect();

        assert_eq!(resolve_one("^1.0.0", &pool).version_id(), Some(1));
    }

    #[test]
    fn resolve_breaks_full_ties_by_highest_id() {
        let pool: CandidatePool = [candidate(8, "1.5.0", 30), candidate(9, "1.5.0", 30)]
            .into_iter()
            .collect();

        assert_eq!(resolve_one("^1.0.0", &pool).version_id(), Some(9));
    }

    #[test]
    fn resolve_orders_rows_by_dependency_id_and_drops_duplicates() {
        let pool: CandidatePool = [candidate(1, "1.0.0", 10)].into_iter().collect();
        let mut foreign = dependency(2, "^1.0.0");
        foreign.dependable = DependableRef::addon_version(1);

        let rows = DependencyResolver::new().resolve(
            DependableRef::mod_version(1),
            &[
                dependency(5, "^1.0.0"),
                dependency(3, "^2.0.0"),
                dependency(5, "^2.0.0"),
                foreign,
            ],
            &pool,
            at(1_000),
        );

        let summary: Vec<_> = rows
            .iter()
            .map(|r| (r.dependency_id, r.resolution.version_id()))
            .collect();
        assert_eq!(summary, vec![(3, None), (5, Some(1))]);
    }

    #[test]
    fn resolve_is_deterministic() {
        let pool: CandidatePool = [candidate(1, "1.0.0", 10), candidate(2, "1.2.0", 20)]
            .into_iter()
            .collect();
        let deps = [dependency(1, "^1.0.0"), dependency(2, "^9.0.0")];
        let resolver = DependencyResolver::new();

        let first = resolver.resolve(DependableRef::mod_version(1), &deps, &pool, at(1_000));
        let second = resolver.resolve(DependableRef::mod_version(1), &deps, &pool, at(1_000));
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
