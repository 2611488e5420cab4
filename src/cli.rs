//! Operator and debugging command line

use std::cmp::Ordering;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::ResolverConfig;
use crate::resolution::{
    Cache, Candidate, CandidatePool, CompatibilityRequest, DependableKind, DependableRef,
    Dependency, ResolutionService, ResolutionStorer, RuntimeRelease,
    refresh_unpinned_compatibility,
};
use crate::version::{Constraint, Version, natural_cmp};

#[derive(Debug, Parser)]
#[command(name = "forge-resolver")]
#[command(version, about = "Version constraint resolution for mods and SPT releases")]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Resolution cache database, overrides the configured path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compare two versions
    Compare { a: String, b: String },
    /// Sort versions in ascending order
    Sort {
        /// Compare raw text naturally instead of parsing versions
        #[arg(long)]
        natural: bool,
        versions: Vec<String>,
    },
    /// Print the versions that satisfy a constraint
    Matches {
        constraint: String,
        versions: Vec<String>,
    },
    /// Resolve one dependable's dependencies and store the result
    ResolveDeps {
        #[arg(long)]
        input: PathBuf,
    },
    /// Resolve runtime compatibility for mod versions and store the result
    ResolveCompat {
        #[arg(long)]
        input: PathBuf,
    },
    /// Re-resolve every unpinned mod version after a runtime release
    PublishRelease {
        #[arg(long)]
        input: PathBuf,
    },
    /// Show cached dependency resolutions
    ShowDeps {
        #[arg(long, value_parser = parse_kind)]
        kind: DependableKind,
        #[arg(long)]
        id: i64,
    },
    /// Show cached runtime compatibility
    ShowCompat {
        #[arg(long)]
        id: i64,
    },
}

fn parse_kind(s: &str) -> Result<DependableKind, String> {
    s.parse()
        .map_err(|_| format!("unknown kind '{}', expected mod_version or addon_version", s))
}

/// Input for `resolve-deps`
#[derive(Debug, Deserialize)]
pub struct DependencyInput {
    pub dependable: DependableRef,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub as_of: Option<DateTime<Utc>>,
}

/// Input for `resolve-compat`
#[derive(Debug, Deserialize)]
pub struct CompatibilityInput {
    pub requests: Vec<CompatibilityRequest>,
    #[serde(default)]
    pub releases: Vec<RuntimeRelease>,
    pub as_of: Option<DateTime<Utc>>,
}

/// Input for `publish-release`: the full release list after publication
#[derive(Debug, Deserialize)]
pub struct ReleaseInput {
    pub releases: Vec<RuntimeRelease>,
    pub as_of: Option<DateTime<Utc>>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<ResolverConfig> {
    match path {
        Some(path) => Ok(ResolverConfig::load(path)?),
        None => Ok(ResolverConfig::default()),
    }
}

fn read_input<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid input {:?}", path))
}

fn open_cache(config: &ResolverConfig, db: Option<&Path>) -> anyhow::Result<Arc<Cache>> {
    let db_path = db.map(Path::to_path_buf).unwrap_or_else(|| config.db_path());
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {:?}", parent))?;
    }
    Ok(Arc::new(Cache::new(&db_path, config.cache.lock_timeout_ms)?))
}

fn write_json<W: Write, T: serde::Serialize>(out: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn ordering_name(ordering: Ordering) -> &'static str {
    match ordering {
        Ordering::Less => "less",
        Ordering::Equal => "equal",
        Ordering::Greater => "greater",
    }
}

/// Execute a parsed command, writing results to `out`
pub async fn run<W: Write>(cli: Cli, config: &ResolverConfig, out: &mut W) -> anyhow::Result<()> {
    let db = cli.db.as_deref();

    match cli.command {
        Command::Compare { a, b } => {
            let ordering = Version::parse(&a).cmp(&Version::parse(&b));
            writeln!(out, "{}", ordering_name(ordering))?;
        }
        Command::Sort { natural, mut versions } => {
            if natural {
                versions.sort_by(|a, b| natural_cmp(a, b));
            } else {
                versions.sort_by_cached_key(|v| Version::parse(v));
            }
            for version in versions {
                writeln!(out, "{}", version)?;
            }
        }
        Command::Matches {
            constraint,
            versions,
        } => {
            let constraint = Constraint::parse(&constraint);
            for version in versions.iter().filter(|v| constraint.matches(&Version::parse(v))) {
                writeln!(out, "{}", version)?;
            }
        }
        Command::ResolveDeps { input } => {
            let input: DependencyInput = read_input(&input)?;
            let service = ResolutionService::new(open_cache(config, db)?, config);
            let pool: CandidatePool = input.candidates.into_iter().collect();
            let rows = service.resolve_dependencies(
                input.dependable,
                &input.dependencies,
                &pool,
                input.as_of.unwrap_or_else(Utc::now),
            )?;
            write_json(out, &rows)?;
        }
        Command::ResolveCompat { input } => {
            let input: CompatibilityInput = read_input(&input)?;
            let service = ResolutionService::new(open_cache(config, db)?, config);
            let as_of = input.as_of.unwrap_or_else(Utc::now);
            let resolutions = input
                .requests
                .iter()
                .map(|request| service.resolve_compatibility(request, &input.releases, as_of))
                .collect::<Result<Vec<_>, _>>()?;
            write_json(out, &resolutions)?;
        }
        Command::PublishRelease { input } => {
            let input: ReleaseInput = read_input(&input)?;
            let service = Arc::new(ResolutionService::new(open_cache(config, db)?, config));
            let summary = refresh_unpinned_compatibility(
                service,
                Arc::new(input.releases),
                input.as_of.unwrap_or_else(Utc::now),
                &config.refresh,
            )
            .await?;
            write_json(out, &summary)?;
        }
        Command::ShowDeps { kind, id } => {
            let cache = open_cache(config, db)?;
            let dependable = DependableRef { kind, id };
            match cache.get_resolved_dependencies(dependable)? {
                Some(rows) => write_json(out, &rows)?,
                None => writeln!(out, "{} has not been resolved", dependable)?,
            }
        }
        Command::ShowCompat { id } => {
            let cache = open_cache(config, db)?;
            let resolution = cache
                .get_compatibility(id)?
                .ok_or_else(|| anyhow!("mod version {} has not been resolved", id))?;
            write_json(out, &resolution)?;
        }
    }

    Ok(())
}
