//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use forge_resolver::config::ResolverConfig;
use forge_resolver::resolution::{
    Cache, Candidate, DependableRef, Dependency, ResolutionService, RuntimeRelease,
};
use forge_resolver::version::{Constraint, Version};

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// Config with no sleeping between retries
pub fn fast_config() -> ResolverConfig {
    let mut config = ResolverConfig::default();
    config.refresh.retry_delay_ms = 0;
    config.refresh.lock_retry_delay_ms = 0;
    config
}

pub fn create_test_service() -> (TempDir, Arc<ResolutionService<Cache>>) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("resolution.db");
    let cache = Cache::new(&db_path, 30_000).unwrap();
    let service = ResolutionService::new(Arc::new(cache), &fast_config());
    (temp_dir, Arc::new(service))
}

pub fn candidate(id: i64, mod_id: i64, version: &str, published: i64) -> Candidate {
    Candidate {
        id,
        mod_id,
        version: Version::parse(version),
        published_at: Some(at(published)),
        disabled: false,
        deleted: false,
    }
}

pub fn dependency(id: i64, dependable: DependableRef, target_mod_id: i64, constraint: &str) -> Dependency {
    Dependency {
        id,
        dependable,
        target_mod_id,
        constraint: Constraint::parse(constraint),
    }
}

pub fn release(id: i64, version: &str, published: i64) -> RuntimeRelease {
    RuntimeRelease {
        id,
        version: Version::parse(version),
        published_at: Some(at(published)),
        color_class: None,
    }
}
