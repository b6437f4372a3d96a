//! Concurrent asset downloads.
//!
//! [`AssetFetcher`] downloads every [`AssetReference`] into the staging
//! directory with at most `concurrency` transfers in flight. Each transfer
//! runs an explicit bounded retry loop: transient failures (timeout,
//! refused connection, aborted transfer, HTTP 408) are retried immediately
//! up to `max_retries` times; anything else fails the asset at once.
//!
//! Outcomes are values, never errors: the caller receives one
//! [`FetchResult`] per reference, in input order, and uses
//! [`FetchReport::failed_paths`] to prune the media manifest.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::AssetsConfig;
use crate::error::{FailureKind, FetchError};
use crate::models::AssetReference;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub concurrency: usize,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
}

impl From<&AssetsConfig> for FetchSettings {
    fn from(config: &AssetsConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            timeout: config.timeout(),
            connect_timeout: config.connect_timeout(),
            max_retries: config.max_retries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// File written after `retries` failed attempts.
    Downloaded { retries: u32 },
    /// Target already existed; nothing was requested.
    AlreadyPresent,
    /// Permanent failure, classified by the last attempt's error.
    Failed {
        retries: u32,
        kind: FailureKind,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub asset: AssetReference,
    pub outcome: FetchOutcome,
}

/// A permanently failed asset, as surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub url: String,
    pub path: String,
    pub kind: FailureKind,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub results: Vec<FetchResult>,
}

impl FetchReport {
    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::Downloaded { .. }))
    }

    pub fn already_present(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::AlreadyPresent))
    }

    pub fn retries(&self) -> u32 {
        self.results
            .iter()
            .map(|r| match &r.outcome {
                FetchOutcome::Downloaded { retries } | FetchOutcome::Failed { retries, .. } => {
                    *retries
                }
                FetchOutcome::AlreadyPresent => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> Vec<FetchFailure> {
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                FetchOutcome::Failed { kind, reason, .. } => Some(FetchFailure {
                    url: r.asset.url.clone(),
                    path: r.asset.path.clone(),
                    kind: *kind,
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Manifest paths of every permanently failed asset.
    pub fn failed_paths(&self) -> HashSet<String> {
        self.failures().into_iter().map(|f| f.path).collect()
    }

    fn count(&self, pred: impl Fn(&FetchOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

pub struct AssetFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl AssetFetcher {
    /// Connections are not reused between downloads.
    pub fn new(settings: FetchSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self { client, settings })
    }

    /// Downloads every asset below `dest`. Results come back in input order.
    pub async fn fetch_all(&self, assets: Vec<AssetReference>, dest: &Path) -> FetchReport {
        let total = assets.len();
        info!(assets = total, concurrency = self.settings.concurrency, "fetching assets");

        let mut indexed: Vec<(usize, FetchResult)> = stream::iter(assets.into_iter().enumerate())
            .map(|(index, asset)| async move {
                let outcome = self.fetch_one(&asset, dest).await;
                (index, FetchResult { asset, outcome })
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);

        let report = FetchReport {
            results: indexed.into_iter().map(|(_, result)| result).collect(),
        };
        info!(
            downloaded = report.downloaded(),
            already_present = report.already_present(),
            failed = total - report.downloaded() - report.already_present(),
            retries = report.retries(),
            "asset fetch complete"
        );
        report
    }

    pub async fn fetch_one(&self, asset: &AssetReference, dest: &Path) -> FetchOutcome {
        let target = dest.join(&asset.path);
        if target.exists() {
            debug!(path = %asset.path, "asset already present");
            return FetchOutcome::AlreadyPresent;
        }
        if let Some(parent) = target.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return failed(asset, 0, FetchError::Io(e));
            }
        }

        let url = asset.url.replace(' ', "%20");
        let mut retries = 0;
        loop {
            match self.attempt(&url, &target).await {
                Ok(()) => {
                    debug!(url = %url, retries, "asset downloaded");
                    return FetchOutcome::Downloaded { retries };
                }
                Err(e) if e.is_retryable() && retries < self.settings.max_retries => {
                    retries += 1;
                    debug!(url = %url, attempt = retries, error = %e, "retrying asset");
                }
                Err(e) => return failed(asset, retries, e),
            }
        }
    }

    async fn attempt(&self, url: &str, target: &Path) -> Result<(), FetchError> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let partial = part_path(target);
        let written = async {
            let mut file = tokio::fs::File::create(&partial).await?;
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<(), FetchError>(())
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        tokio::fs::rename(&partial, target).await?;
        Ok(())
    }
}

fn failed(asset: &AssetReference, retries: u32, error: FetchError) -> FetchOutcome {
    warn!(url = %asset.url, retries, error = %error, "asset download failed");
    FetchOutcome::Failed {
        retries,
        kind: error.kind(),
        reason: error.to_string(),
    }
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}
