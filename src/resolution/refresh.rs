//! Batch re-resolution fan-outs
//!
//! Each entity is an independent unit of work with its own retries. A failed
//! entity is reported in the summary and never stops the others.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::RefreshConfig;
use crate::resolution::error::{CacheError, ResolveError};
use crate::resolution::service::ResolutionService;
use crate::resolution::storer::ResolutionStorer;
use crate::resolution::types::{CandidatePool, DependableRef, Dependency, RuntimeRelease};

/// Outcome of a fan-out, ids in ascending order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshSummary<K> {
    pub succeeded: Vec<K>,
    /// Entities whose cached state changed hands before their turn came
    pub skipped: Vec<K>,
    pub failed: Vec<K>,
}

impl<K> Default for RefreshSummary<K> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    Skipped,
    Failed,
}

impl<K: Ord> RefreshSummary<K> {
    fn from_outcomes(outcomes: Vec<(K, Outcome)>) -> Self {
        let mut summary = Self::default();
        for (key, outcome) in outcomes {
            match outcome {
                Outcome::Succeeded => summary.succeeded.push(key),
                Outcome::Skipped => summary.skipped.push(key),
                Outcome::Failed => summary.failed.push(key),
            }
        }
        summary.succeeded.sort();
        summary.skipped.sort();
        summary.failed.sort();
        summary
    }
}

/// A dependable and the dependencies it currently declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyJob {
    pub dependable: DependableRef,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

/// Run blocking `work` with retries, returning its value if it eventually succeeded
async fn run_with_retry<T, F>(entity: String, options: &RefreshConfig, work: F) -> Option<T>
where
    T: Send + 'static,
    F: Fn() -> Result<T, ResolveError> + Send + Sync + 'static,
{
    let work = Arc::new(work);
    let max_attempts = options.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let task = Arc::clone(&work);
        match tokio::task::spawn_blocking(move || task()).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => warn!(
                "Resolution of {} failed (attempt {}/{}): {}",
                entity, attempt, max_attempts, e
            ),
            Err(e) => error!("Resolution task for {} panicked: {}", entity, e),
        }
        if attempt < max_attempts {
            sleep(Duration::from_millis(options.retry_delay_ms)).await;
        }
    }

    error!(
        "Giving up on {} after {} attempts",
        entity, max_attempts
    );
    None
}

/// Re-resolve every unpinned mod version against the current releases
///
/// Called after a runtime release is published. Each mod version is
/// recomputed from the state cached at its turn, not from the listing, so
/// edits and pins made in between are kept. Only loading the unpinned set can
/// fail as a whole.
pub async fn refresh_unpinned_compatibility<S: ResolutionStorer>(
    service: Arc<ResolutionService<S>>,
    releases: Arc<Vec<RuntimeRelease>>,
    as_of: DateTime<Utc>,
    options: &RefreshConfig,
) -> Result<RefreshSummary<i64>, CacheError> {
    let requests = service.storer().get_unpinned_requests()?;
    info!(
        "Refreshing compatibility for {} unpinned mod versions",
        requests.len()
    );

    let outcomes = stream::iter(requests)
        .map(|request| {
            let service = Arc::clone(&service);
            let releases = Arc::clone(&releases);
            async move {
                let id = request.mod_version_id;
                let outcome = match run_with_retry(request.lock_key(), options, move || {
                    service.refresh_compatibility(id, &releases, as_of)
                })
                .await
                {
                    Some(true) => Outcome::Succeeded,
                    Some(false) => Outcome::Skipped,
                    None => Outcome::Failed,
                };
                (id, outcome)
            }
        })
        .buffer_unordered(options.concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    let summary = RefreshSummary::from_outcomes(outcomes);
    info!(
        "Compatibility refresh finished: {} succeeded, {} skipped, {} failed",
        summary.succeeded.len(),
        summary.skipped.len(),
        summary.failed.len()
    );
    Ok(summary)
}

/// Re-resolve the dependencies of many dependables
///
/// Called when a target mod's version set changes.
pub async fn refresh_dependables<S: ResolutionStorer>(
    service: Arc<ResolutionService<S>>,
    jobs: Vec<DependencyJob>,
    pool: Arc<CandidatePool>,
    as_of: DateTime<Utc>,
    options: &RefreshConfig,
) -> RefreshSummary<DependableRef> {
    info!("Refreshing dependencies for {} dependables", jobs.len());

    let outcomes = stream::iter(jobs)
        .map(|job| {
            let service = Arc::clone(&service);
            let pool = Arc::clone(&pool);
            async move {
                let dependable = job.dependable;
                let outcome = match run_with_retry(dependable.lock_key(), options, move || {
                    service
                        .resolve_dependencies(job.dependable, &job.dependencies, &pool, as_of)
                        .map(|_| ())
                })
                .await
                {
                    Some(()) => Outcome::Succeeded,
                    None => Outcome::Failed,
                };
                (dependable, outcome)
            }
        })
        .buffer_unordered(options.concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    let summary = RefreshSummary::from_outcomes(outcomes);
    info!(
        "Dependency refresh finished: {} succeeded, {} failed",
        summary.succeeded.len(),
        summary.failed.len()
    );
    summary
}
