//! Migration pipeline orchestration.
//!
//! Coordinates the full run: parse → normalize links → derive assets →
//! (fetch assets ∥ build content) → prune manifest → package.
//!
//! All run state lives in a [`MigrationContext`] built once from the
//! configuration. Everything that can make the run fail for configuration
//! reasons (missing container ids, bad exclusion globs, unreadable template)
//! is checked when the context is constructed, before any output exists.
//! Asset downloads run on a spawned tokio task so content building overlaps
//! them; their failures are reconciled into the media manifest afterwards.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use globset::GlobSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::assets::{build_exclusions, derive_assets};
use crate::builders::{BuildContext, ThemeBuilders};
use crate::bundle::{self, ContentSections, Recipe};
use crate::config::Config;
use crate::fetch::{AssetFetcher, FetchFailure, FetchSettings};
use crate::models::{AssetReference, Export, ItemType};
use crate::parser::parse_export_file;
use crate::permalink::LinkStrategy;
use crate::taxonomy::TaxonomyResolver;

/// Name of the staging directory created inside the work dir.
pub const STAGING_DIR: &str = "recipe";

/// Default archive name inside the work dir.
pub const ARCHIVE_NAME: &str = "recipe.zip";

/// Counts and failures of one completed run.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub site_title: Option<String>,
    pub posts: usize,
    pub pages: usize,
    pub categories: usize,
    pub tags: usize,
    pub redirects: usize,
    pub assets: usize,
    pub downloaded: usize,
    pub already_present: usize,
    pub retries: u32,
    pub failures: Vec<FetchFailure>,
    pub manifest_entries: usize,
    pub content_items: usize,
    pub archived_files: usize,
    pub archive: PathBuf,
}

pub struct MigrationContext {
    config: Config,
    builders: ThemeBuilders,
    exclusions: GlobSet,
    template: Recipe,
    created_utc: String,
}

impl MigrationContext {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let builders = ThemeBuilders::for_theme(config.recipe.theme, &config.theme)?;
        let exclusions = build_exclusions(&config.assets.exclude_globs)
            .context("Invalid assets.exclude_globs")?;
        let template = match &config.recipe.template {
            Some(path) => bundle::load_template(path)?,
            None => Recipe::default(),
        };
        Ok(Self {
            config,
            builders,
            exclusions,
            template,
            created_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }

    /// Runs the migration of `input`, staging under `work_dir` and writing
    /// the finished bundle to `archive`.
    pub async fn run(&self, input: &Path, work_dir: &Path, archive: &Path) -> Result<MigrationReport> {
        info!(input = %input.display(), theme = self.config.recipe.theme.as_str(), "starting migration");

        let mut export = parse_export_file(input)
            .with_context(|| format!("Failed to parse export: {}", input.display()))?;
        info!(
            items = export.items.len(),
            posts = export.count(&ItemType::Post),
            pages = export.count(&ItemType::Page),
            categories = export.categories.len(),
            tags = export.tags.len(),
            "export parsed"
        );

        LinkStrategy::from_config(&self.config.recipe).apply(&mut export.items);

        let assets = derive_assets(&export.items, &self.exclusions);
        let staging = work_dir.join(STAGING_DIR);
        std::fs::create_dir_all(&staging)
            .with_context(|| format!("Failed to create staging dir: {}", staging.display()))?;

        match self.stage(&export, assets, &staging, archive).await {
            Ok(report) => Ok(report),
            Err(e) => {
                discard_staging(&staging);
                Err(e)
            }
        }
    }

    /// Everything that writes below `staging`. The caller removes partial
    /// output when this fails.
    async fn stage(
        &self,
        export: &Export,
        assets: Vec<AssetReference>,
        staging: &Path,
        archive: &Path,
    ) -> Result<MigrationReport> {
        let fetcher = AssetFetcher::new(FetchSettings::from(&self.config.assets))?;
        let fetch_assets = assets.clone();
        let fetch_dest = staging.to_path_buf();
        let fetch = tokio::spawn(async move { fetcher.fetch_all(fetch_assets, &fetch_dest).await });

        let sections = match self.build_content(export, &assets) {
            Ok(sections) => sections,
            Err(e) => {
                fetch.abort();
                // Wait for the task to stop touching the staging dir.
                let _ = fetch.await;
                return Err(e);
            }
        };
        let content_items = sections.len();
        let redirects = sections.redirects.len();

        let fetched = fetch.await.context("Asset fetch task failed")?;

        let mut media = bundle::media_step(&assets);
        let pruned = bundle::prune_failed_media(&mut media, &fetched.failed_paths());
        let manifest_entries = assets.len() - pruned;
        info!(entries = manifest_entries, pruned, "media manifest reconciled");

        let recipe = bundle::assemble(self.template.clone(), media, sections.into_step());
        let archived_files = match bundle::package(&recipe, staging, archive) {
            Ok(count) => count,
            Err(e) => {
                // A failed run keeps no archive, stale or partial.
                if archive.exists() {
                    if let Err(remove) = std::fs::remove_file(archive) {
                        warn!(path = %archive.display(), error = %remove, "failed to remove partial archive");
                    }
                }
                return Err(e);
            }
        };
        info!(archive = %archive.display(), files = archived_files, "recipe archive written");

        Ok(MigrationReport {
            site_title: export.site_title.clone(),
            posts: export.count(&ItemType::Post),
            pages: export.count(&ItemType::Page),
            categories: export.categories.len(),
            tags: export.tags.len(),
            redirects,
            assets: assets.len(),
            downloaded: fetched.downloaded(),
            already_present: fetched.already_present(),
            retries: fetched.retries(),
            failures: fetched.failures(),
            manifest_entries,
            content_items,
            archived_files,
            archive: archive.to_path_buf(),
        })
    }

    fn build_content(&self, export: &Export, assets: &[AssetReference]) -> Result<ContentSections> {
        let strip = &self.config.recipe.slug_strip_chars;
        let taxonomy = TaxonomyResolver::new(&export.categories, &export.tags);
        let ctx = BuildContext {
            items: &export.items,
            taxonomy: &taxonomy,
            assets,
            authors: &self.config.authors,
            created_utc: &self.created_utc,
        };

        let pages = self
            .builders
            .pages
            .build(&ctx)
            .with_context(|| format!("{} failed", self.builders.pages.name()))?;
        let posts = self
            .builders
            .posts
            .build(&ctx)
            .with_context(|| format!("{} failed", self.builders.posts.name()))?;

        let sections = ContentSections {
            categories: taxonomy.category_items(strip, &self.created_utc),
            tags: taxonomy.tag_items(strip, &self.created_utc),
            pages,
            posts,
            redirects: bundle::redirect_items(&export.items, &self.created_utc),
        };
        sections.check_unique_ids()?;
        info!(
            categories = sections.categories.len(),
            tags = sections.tags.len(),
            pages = sections.pages.len(),
            posts = sections.posts.len(),
            redirects = sections.redirects.len(),
            "content built"
        );
        Ok(sections)
    }
}

/// Removes the staging dir after a failed run.
fn discard_staging(staging: &Path) {
    if staging.exists() {
        if let Err(e) = std::fs::remove_dir_all(staging) {
            warn!(path = %staging.display(), error = %e, "failed to remove staging dir");
        }
    }
}

/// Builds a [`MigrationContext`] from `config` and runs it once.
pub async fn run_migration(
    config: &Config,
    input: &Path,
    work_dir: &Path,
    archive: &Path,
) -> Result<MigrationReport> {
    MigrationContext::new(config.clone())?
        .run(input, work_dir, archive)
        .await
}
