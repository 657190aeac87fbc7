//! Reading commits from several repositories with bounded parallelism.
//!
//! A failing repository is logged and skipped; the others still contribute.
//! Cross-repository deduplication and ordering happen in the timesheet
//! pipeline.

use std::path::PathBuf;

use rayon::prelude::*;
use thiserror::Error;

use crate::commit::RawCommit;
use crate::git::{GitSource, LOCAL_REPO_TYPE, LogOptions, RepoInfo, SourceError};

/// Repositories read at the same time unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A repository that could not be read.
#[derive(Debug)]
pub struct RepoFailure {
    pub path: PathBuf,
    pub error: SourceError,
}

/// Records gathered from all readable repositories, in source order.
#[derive(Debug, Default)]
pub struct CollectedCommits {
    /// Records tagged with their repository name and type.
    pub records: Vec<RawCommit>,
    pub repositories: Vec<RepoInfo>,
    /// Malformed log records dropped across all repositories.
    pub dropped: usize,
    pub failures: Vec<RepoFailure>,
}

struct RepoBatch {
    info: RepoInfo,
    records: Vec<RawCommit>,
    dropped: usize,
}

fn read_repository(source: &GitSource, options: &LogOptions) -> Result<RepoBatch, SourceError> {
    let parsed = source.fetch(options)?;
    let info = source.repo_info()?;
    let dropped = parsed.dropped();
    let records = parsed
        .records
        .into_iter()
        .map(|mut record| {
            record.repo = Some(info.name.clone());
            record.repo_type = Some(LOCAL_REPO_TYPE.to_string());
            record
        })
        .collect();
    Ok(RepoBatch {
        info,
        records,
        dropped,
    })
}

/// Read every source with at most `concurrency` repositories in flight.
pub fn collect_repositories(
    sources: &[GitSource],
    options: &LogOptions,
    concurrency: usize,
) -> Result<CollectedCommits, CollectError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency.max(1))
        .build()?;

    let results: Vec<Result<RepoBatch, SourceError>> =
        pool.install(|| sources.par_iter().map(|s| read_repository(s, options)).collect());

    let mut collected = CollectedCommits::default();
    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(batch) => {
                tracing::debug!(
                    repo = %batch.info.name,
                    records = batch.records.len(),
                    "collected repository"
                );
                collected.dropped += batch.dropped;
                collected.records.extend(batch.records);
                collected.repositories.push(batch.info);
            }
            Err(error) => {
                tracing::warn!(path = ?source.path(), error = %error, "skipping repository");
                collected.failures.push(RepoFailure {
                    path: source.path().to_path_buf(),
                    error,
                });
            }
        }
    }
    Ok(collected)
}
