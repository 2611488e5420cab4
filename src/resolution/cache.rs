use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::resolution::error::CacheError;
use crate::resolution::storer::ResolutionStorer;
use crate::resolution::types::{
    CompatibilityRequest, CompatibilityResolution, CompatibleRelease, DependableRef,
    ModVersionId, Resolution, ResolvedDependency,
};
use crate::version::{Constraint, Version};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed resolution cache
pub struct Cache {
    conn: Mutex<Connection>,
    lock_timeout_ms: i64,
}

impl Cache {
    pub fn new(db_path: &Path, lock_timeout_ms: i64) -> Result<Self, CacheError> {
        info!("Initializing resolution cache at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        debug!("Database connection established");

        let cache = Self {
            conn: Mutex::new(conn),
            lock_timeout_ms,
        };

        cache.create_schema()?;
        info!("Resolution cache initialized");

        Ok(cache)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }

    fn current_timestamp_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn create_schema(&self) -> Result<(), CacheError> {
        debug!("Creating database schema");

        let conn = self.lock_conn()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS dependable_resolutions (
                dependable_kind TEXT NOT NULL,
                dependable_id INTEGER NOT NULL,
                resolved_at INTEGER NOT NULL,
                PRIMARY KEY (dependable_kind, dependable_id)
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS resolved_dependencies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                dependable_kind TEXT NOT NULL,
                dependable_id INTEGER NOT NULL,
                dependency_id INTEGER NOT NULL,
                target_mod_id INTEGER NOT NULL,
                resolved_version_id INTEGER,
                resolved_version TEXT,
                UNIQUE(dependable_kind, dependable_id, dependency_id)
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_resolved_dependencies_target ON resolved_dependencies(target_mod_id)",
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS compatibility_states (
                mod_version_id INTEGER PRIMARY KEY,
                constraint_text TEXT NOT NULL,
                pinned INTEGER NOT NULL,
                resolved_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS compatibilities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mod_version_id INTEGER NOT NULL,
                runtime_release_id INTEGER NOT NULL,
                runtime_version TEXT,
                pinned INTEGER NOT NULL,
                position INTEGER NOT NULL,
                UNIQUE(mod_version_id, runtime_release_id)
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS resolution_locks (
                entity TEXT PRIMARY KEY,
                locked_since INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_compatibility_states_pinned ON compatibility_states(pinned)",
            [],
        )?;

        debug!("Database schema created successfully");
        Ok(())
    }
}

impl ResolutionStorer for Cache {
    fn replace_resolved_dependencies(
        &self,
        dependable: DependableRef,
        rows: &[ResolvedDependency],
    ) -> Result<(), CacheError> {
        let kind = dependable.kind.as_str();
        debug!("Saving {} resolved dependencies for {}", rows.len(), dependable);

        let now = Self::current_timestamp_ms();

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM resolved_dependencies WHERE dependable_kind = ?1 AND dependable_id = ?2",
            (kind, dependable.id),
        )?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO resolved_dependencies
                    (dependable_kind, dependable_id, dependency_id, target_mod_id,
                     resolved_version_id, resolved_version)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(dependable_kind, dependable_id, dependency_id) DO UPDATE SET
                    target_mod_id = excluded.target_mod_id,
                    resolved_version_id = excluded.resolved_version_id,
                    resolved_version = excluded.resolved_version
                "#,
            )?;
            for row in rows {
                let (version_id, version) = match &row.resolution {
                    Resolution::Satisfied {
                        version_id,
                        version,
                    } => (Some(*version_id), Some(version.raw.as_str())),
                    Resolution::Unsatisfied => (None, None),
                };
                stmt.execute((
                    kind,
                    dependable.id,
                    row.dependency_id,
                    row.target_mod_id,
                    version_id,
                    version,
                ))?;
            }
        }

        tx.execute(
            r#"
            INSERT INTO dependable_resolutions (dependable_kind, dependable_id, resolved_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(dependable_kind, dependable_id) DO UPDATE SET resolved_at = excluded.resolved_at
            "#,
            (kind, dependable.id, now),
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_resolved_dependencies(
        &self,
        dependable: DependableRef,
    ) -> Result<Option<Vec<ResolvedDependency>>, CacheError> {
        let kind = dependable.kind.as_str();
        let conn = self.lock_conn()?;

        let resolved: bool = conn.query_row(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM dependable_resolutions
                WHERE dependable_kind = ?1 AND dependable_id = ?2
            )
            "#,
            (kind, dependable.id),
            |row| row.get(0),
        )?;

        if !resolved {
            return Ok(None);
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT dependency_id, target_mod_id, resolved_version_id, resolved_version
            FROM resolved_dependencies
            WHERE dependable_kind = ?1 AND dependable_id = ?2
            ORDER BY dependency_id
            "#,
        )?;

        let rows = stmt
            .query_map((kind, dependable.id), |row| {
                let version_id: Option<i64> = row.get(2)?;
                let version: Option<String> = row.get(3)?;
                let resolution = match version_id {
                    Some(version_id) => Resolution::Satisfied {
                        version_id,
                        version: Version::parse(version.as_deref().unwrap_or_default()),
                    },
                    None => Resolution::Unsatisfied,
                };
                Ok(ResolvedDependency {
                    dependable,
                    dependency_id: row.get(0)?,
                    target_mod_id: row.get(1)?,
                    resolution,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(rows))
    }

    fn replace_compatibility(
        &self,
        resolution: &CompatibilityResolution,
    ) -> Result<(), CacheError> {
        debug!(
            "Saving {} compatibility rows for mod version {}",
            resolution.matches.len(),
            resolution.mod_version_id
        );

        let now = Self::current_timestamp_ms();

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO compatibility_states (mod_version_id, constraint_text, pinned, resolved_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(mod_version_id) DO UPDATE SET
                constraint_text = excluded.constraint_text,
                pinned = excluded.pinned,
                resolved_at = excluded.resolved_at
            "#,
            (
                resolution.mod_version_id,
                resolution.constraint.raw(),
                resolution.pinned,
                now,
            ),
        )?;

        tx.execute(
            "DELETE FROM compatibilities WHERE mod_version_id = ?1",
            [resolution.mod_version_id],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO compatibilities
                    (mod_version_id, runtime_release_id, runtime_version, pinned, position)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for (position, release) in resolution.matches.iter().enumerate() {
                stmt.execute((
                    resolution.mod_version_id,
                    release.release_id,
                    release.version.raw.as_str(),
                    resolution.pinned,
                    position as i64,
                ))?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn get_compatibility(
        &self,
        mod_version_id: ModVersionId,
    ) -> Result<Option<CompatibilityResolution>, CacheError> {
        let conn = self.lock_conn()?;

        let state = conn
            .query_row(
                "SELECT constraint_text, pinned FROM compatibility_states WHERE mod_version_id = ?1",
                [mod_version_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)),
            )
            .optional()?;

        let Some((constraint_text, pinned)) = state else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            r#"
            SELECT runtime_release_id, runtime_version FROM compatibilities
            WHERE mod_version_id = ?1
            ORDER BY position
            "#,
        )?;

        let matches = stmt
            .query_map([mod_version_id], |row| {
                let version: Option<String> = row.get(1)?;
                Ok(CompatibleRelease {
                    release_id: row.get(0)?,
                    version: Version::parse(version.as_deref().unwrap_or_default()),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(CompatibilityResolution {
            mod_version_id,
            constraint: Constraint::parse(&constraint_text),
            matches,
            pinned,
        }))
    }

    fn get_unpinned_requests(&self) -> Result<Vec<CompatibilityRequest>, CacheError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT mod_version_id, constraint_text FROM compatibility_states
            WHERE pinned = 0
            ORDER BY mod_version_id
            "#,
        )?;

        let requests = stmt
            .query_map([], |row| {
                let constraint_text: String = row.get(1)?;
                Ok(CompatibilityRequest {
                    mod_version_id: row.get(0)?,
                    constraint: Constraint::parse(&constraint_text),
                    force_pin: false,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(requests)
    }

    fn try_start_resolution(&self, entity: &str) -> Result<bool, CacheError> {
        let now = Self::current_timestamp_ms();
        let timeout_threshold = now - self.lock_timeout_ms;

        let conn = self.lock_conn()?;

        // Take over a lock whose holder has gone stale
        let rows_affected = conn.execute(
            "UPDATE resolution_locks SET locked_since = ?1 WHERE entity = ?2 AND locked_since < ?3",
            (now, entity, timeout_threshold),
        )?;

        if rows_affected > 0 {
            debug!("Took over stale resolution lock for {}", entity);
            return Ok(true);
        }

        // Only the first inserter wins; later callers hit the primary key
        let rows_inserted = conn.execute(
            "INSERT OR IGNORE INTO resolution_locks (entity, locked_since) VALUES (?1, ?2)",
            (entity, now),
        )?;

        Ok(rows_inserted > 0)
    }

    fn finish_resolution(&self, entity: &str) -> Result<(), CacheError> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM resolution_locks WHERE entity = ?1", [entity])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::types::CachedResolution;
    use rstest::rstest;
    use tempfile::TempDir;

    fn create_test_cache() -> (TempDir, Cache) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let cache = Cache::new(&db_path, 30_000).unwrap();
        (temp_dir, cache)
    }

    fn satisfied(dependency_id: i64, version_id: i64, version: &str) -> ResolvedDependency {
        ResolvedDependency {
            dependable: DependableRef::mod_version(1),
            dependency_id,
            target_mod_id: 100 + dependency_id,
            resolution: Resolution::Satisfied {
                version_id,
                version: Version::parse(version),
            },
        }
    }

    fn unsatisfied(dependency_id: i64) -> ResolvedDependency {
        ResolvedDependency {
            dependable: DependableRef::mod_version(1),
            dependency_id,
            target_mod_id: 100 + dependency_id,
            resolution: Resolution::Unsatisfied,
        }
    }

    fn compatibility(mod_version_id: i64, constraint: &str, ids: &[i64], pinned: bool) -> CompatibilityResolution {
        CompatibilityResolution {
            mod_version_id,
            constraint: Constraint::parse(constraint),
            matches: ids
                .iter()
                .map(|&id| CompatibleRelease {
                    release_id: id,
                    version: Version::parse(&format!("3.{}.0", id)),
                })
                .collect(),
            pinned,
        }
    }

    #[test]
    fn get_resolved_dependencies_returns_none_before_first_resolution() {
        let (_temp_dir, cache) = create_test_cache();

        let rows = cache
            .get_resolved_dependencies(DependableRef::mod_version(1))
            .unwrap();
        assert_eq!(rows, None);
    }

    #[test]
    fn replace_resolved_dependencies_round_trips_rows() {
        let (_temp_dir, cache) = create_test_cache();
        let rows = vec![satisfied(1, 11, "v1.5.0"), unsatisfied(2)];

        cache
            .replace_resolved_dependencies(DependableRef::mod_version(1), &rows)
            .unwrap();

        let saved = cache
            .get_resolved_dependencies(DependableRef::mod_version(1))
            .unwrap();
        assert_eq!(saved, Some(rows));
    }

    #[test]
    fn replace_resolved_dependencies_drops_stale_edges() {
        let (_temp_dir, cache) = create_test_cache();
        let dependable = DependableRef::mod_version(1);

        cache
            .replace_resolved_dependencies(dependable, &[satisfied(1, 11, "1.0.0"), satisfied(2, 12, "2.0.0")])
            .unwrap();
        cache
            .replace_resolved_dependencies(dependable, &[satisfied(2, 13, "2.1.0")])
            .unwrap();

        let saved = cache.get_resolved_dependencies(dependable).unwrap().unwrap();
        assert_eq!(saved, vec![satisfied(2, 13, "2.1.0")]);
    }

    #[test]
    fn replace_resolved_dependencies_with_no_rows_marks_resolved() {
        let (_temp_dir, cache) = create_test_cache();
        let dependable = DependableRef::addon_version(4);

        cache.replace_resolved_dependencies(dependable, &[]).unwrap();

        assert_eq!(
            cache.get_resolved_dependencies(dependable).unwrap(),
            Some(vec![])
        );
    }

    #[test]
    fn dependables_of_different_kinds_do_not_collide() {
        let (_temp_dir, cache) = create_test_cache();

        cache
            .replace_resolved_dependencies(DependableRef::mod_version(1), &[satisfied(1, 11, "1.0.0")])
            .unwrap();

        assert_eq!(
            cache
                .get_resolved_dependencies(DependableRef::addon_version(1))
                .unwrap(),
            None
        );
    }

    #[rstest]
    #[case(1, CachedResolution::Satisfied { version_id: 11, version: Version::parse("1.5.0") })]
    #[case(2, CachedResolution::Unsatisfied)]
    #[case(3, CachedResolution::NotResolved)]
    fn get_resolution_distinguishes_outcomes(
        #[case] dependency_id: i64,
        #[case] expected: CachedResolution,
    ) {
        let (_temp_dir, cache) = create_test_cache();
        cache
            .replace_resolved_dependencies(
                DependableRef::mod_version(1),
                &[satisfied(1, 11, "1.5.0"), unsatisfied(2)],
            )
            .unwrap();

        assert_eq!(
            cache
                .get_resolution(DependableRef::mod_version(1), dependency_id)
                .unwrap(),
            expected
        );
    }

    #[test]
    fn replace_compatibility_round_trips_in_position_order() {
        let (_temp_dir, cache) = create_test_cache();
        let resolution = compatibility(7, "~3.9.0", &[9, 3, 5], false);

        cache.replace_compatibility(&resolution).unwrap();

        assert_eq!(cache.get_compatibility(7).unwrap(), Some(resolution));
        assert_eq!(cache.get_compatibility(8).unwrap(), None);
    }

    #[test]
    fn replace_compatibility_replaces_previous_rows() {
        let (_temp_dir, cache) = create_test_cache();

        cache
            .replace_compatibility(&compatibility(7, ">=3.0.0", &[1, 2, 3], false))
            .unwrap();
        cache
            .replace_compatibility(&compatibility(7, "3.2.0", &[2], true))
            .unwrap();

        let saved = cache.get_compatibility(7).unwrap().unwrap();
        assert_eq!(saved, compatibility(7, "3.2.0", &[2], true));
        assert_eq!(saved.constraint.raw(), "3.2.0");
    }

    #[test]
    fn get_unpinned_requests_returns_only_unpinned_states() {
        let (_temp_dir, cache) = create_test_cache();

        cache
            .replace_compatibility(&compatibility(3, ">=3.0.0", &[1], false))
            .unwrap();
        cache
            .replace_compatibility(&compatibility(1, "", &[1], false))
            .unwrap();
        cache
            .replace_compatibility(&compatibility(2, "3.1.0", &[1], true))
            .unwrap();

        let requests = cache.get_unpinned_requests().unwrap();
        assert_eq!(
            requests,
            vec![
                CompatibilityRequest::new(1, ""),
                CompatibilityRequest::new(3, ">=3.0.0"),
            ]
        );
    }

    #[test]
    fn try_start_resolution_returns_true_for_free_entity() {
        let (_temp_dir, cache) = create_test_cache();

        assert!(cache.try_start_resolution("compatibility:1").unwrap());
    }

    #[test]
    fn try_start_resolution_returns_false_while_held() {
        let (_temp_dir, cache) = create_test_cache();

        assert!(cache.try_start_resolution("compatibility:1").unwrap());
        assert!(!cache.try_start_resolution("compatibility:1").unwrap());
        assert!(cache.try_start_resolution("compatibility:2").unwrap());
    }

    #[test]
    fn finish_resolution_releases_lock() {
        let (_temp_dir, cache) = create_test_cache();

        assert!(cache.try_start_resolution("dependencies:mod_version:1").unwrap());
        cache.finish_resolution("dependencies:mod_version:1").unwrap();
        assert!(cache.try_start_resolution("dependencies:mod_version:1").unwrap());
    }

    #[test]
    fn try_start_resolution_takes_over_stale_lock() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let cache = Cache::new(&db_path, 30_000).unwrap();

        {
            let conn = cache.lock_conn().unwrap();
            conn.execute(
                "INSERT INTO resolution_locks (entity, locked_since) VALUES ('compatibility:1', ?1)",
                [Cache::current_timestamp_ms() - 60_000],
            )
            .unwrap();
        }

        assert!(cache.try_start_resolution("compatibility:1").unwrap());
        assert!(!cache.try_start_resolution("compatibility:1").unwrap());
    }

    #[test]
    fn cache_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        {
            let cache = Cache::new(&db_path, 30_000).unwrap();
            cache
                .replace_compatibility(&compatibility(7, "^3.9.0", &[1], false))
                .unwrap();
        }

        let cache = Cache::new(&db_path, 30_000).unwrap();
        assert!(cache.get_compatibility(7).unwrap().is_some());
    }

    mod schema {
        use super::*;

        fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
            conn.query_row(
                &format!(
                    "SELECT COUNT(*) > 0 FROM pragma_table_info('{}') WHERE name = '{}'",
                    table, column
                ),
                [],
                |row| row.get(0),
            )
            .unwrap_or(false)
        }

        fn index_exists(conn: &Connection, name: &str) -> bool {
            conn.query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'index' AND name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap_or(false)
        }

        #[rstest]
        #[case("compatibilities", "runtime_version")]
        #[case("compatibility_states", "constraint_text")]
        #[case("resolved_dependencies", "resolved_version_id")]
        #[case("resolution_locks", "locked_since")]
        fn new_database_has_column(#[case] table: &str, #[case] column: &str) {
            let (_temp_dir, cache) = create_test_cache();
            let conn = cache.lock_conn().unwrap();
            assert!(column_exists(&conn, table, column));
        }

        #[test]
        fn schema_creation_is_idempotent() {
            let temp_dir = TempDir::new().unwrap();
            let db_path = temp_dir.path().join("test.db");

            {
                let cache = Cache::new(&db_path, 30_000).unwrap();
                cache
                    .replace_compatibility(&compatibility(7, ">=3.0.0", &[1], false))
                    .unwrap();
            }

            let cache = Cache::new(&db_path, 30_000).unwrap();
            {
                let conn = cache.lock_conn().unwrap();
                assert!(index_exists(&conn, "idx_compatibility_states_pinned"));
                assert!(index_exists(&conn, "idx_resolved_dependencies_target"));
            }
            let saved = cache.get_compatibility(7).unwrap().unwrap();
            assert_eq!(saved.matches.len(), 1);
        }
    }
}
