//! # WordPress to Orchard Core CLI (`wp2oc`)
//!
//! The `wp2oc` binary converts a WordPress WXR export into an Orchard Core
//! recipe archive, or summarizes an export without converting it.
//!
//! ## Usage
//!
//! ```bash
//! wp2oc --config ./config/wp2oc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wp2oc migrate <export>` | Build `recipe.zip` from an export |
//! | `wp2oc inspect <export>` | Print item, term and asset counts |
//!
//! ## Examples
//!
//! ```bash
//! # TheBlog theme, defaults for everything else
//! wp2oc migrate ./site.WordPress.2024-01-01.xml
//!
//! # EtchPlay theme with date-based permalinks and redirect items
//! wp2oc migrate ./site.xml --theme etch-play --redirects --output ./out/site.zip
//!
//! # Check what an export contains before migrating it
//! wp2oc inspect ./site.xml
//! ```
//!
//! Progress is logged to stderr; set `RUST_LOG=debug` for per-item detail.
//! The summary printed to stdout ends with `ok` on success.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use wp_to_orchard::assets::{build_exclusions, derive_assets};
use wp_to_orchard::config::{self, Config, Theme};
use wp_to_orchard::models::ItemType;
use wp_to_orchard::parser::parse_export_file;
use wp_to_orchard::pipeline::{run_migration, ARCHIVE_NAME};

/// WordPress to Orchard Core migrator.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file is not an error: every setting has a default.
#[derive(Parser)]
#[command(
    name = "wp2oc",
    about = "Migrate a WordPress export into an Orchard Core recipe bundle",
    version,
    long_about = "Reads a WordPress WXR export, downloads its media library, converts posts, \
    pages, categories and tags into Orchard Core content items for the selected theme, and \
    packages the result as a recipe archive."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/wp2oc.toml`. Used only if the file exists.
    #[arg(long, global = true, default_value = "./config/wp2oc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Convert an export into a recipe archive.
    ///
    /// Media files are downloaded into `<work-dir>/recipe/`, which is
    /// zipped together with the generated `recipe.json` and then removed.
    Migrate {
        /// Path to the WXR export file.
        export: PathBuf,

        /// Archive to write. Defaults to `<work-dir>/recipe.zip`.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Directory for staging downloads. Defaults to the export's directory.
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Target theme: `the-blog` or `etch-play`. Overrides `recipe.theme`.
        #[arg(long)]
        theme: Option<Theme>,

        /// Rewrite permalinks and emit redirect items. Overrides
        /// `recipe.create_redirects`.
        #[arg(long)]
        redirects: bool,
    },

    /// Summarize an export without converting it.
    Inspect {
        /// Path to the WXR export file.
        export: PathBuf,
    },
}

fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Migrate {
            export,
            output,
            work_dir,
            theme,
            redirects,
        } => {
            if let Some(theme) = theme {
                cfg.recipe.theme = theme;
            }
            if redirects {
                cfg.recipe.create_redirects = true;
            }
            cfg.validate()?;

            let work_dir = work_dir.unwrap_or_else(|| match export.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            });
            let archive = output.unwrap_or_else(|| work_dir.join(ARCHIVE_NAME));

            let report = run_migration(&cfg, &export, &work_dir, &archive).await?;

            println!("migrate");
            if let Some(title) = &report.site_title {
                println!("  site: {}", title);
            }
            println!("  theme: {}", cfg.recipe.theme.as_str());
            println!("  posts: {}", report.posts);
            println!("  pages: {}", report.pages);
            println!("  categories: {}", report.categories);
            println!("  tags: {}", report.tags);
            println!("  redirects: {}", report.redirects);
            println!("  content items: {}", report.content_items);
            println!(
                "  assets: {} (downloaded: {}, present: {}, failed: {}, retries: {})",
                report.assets,
                report.downloaded,
                report.already_present,
                report.failures.len(),
                report.retries
            );
            for failure in &report.failures {
                println!("  failed: {} ({})", failure.url, failure.reason);
            }
            println!("  media entries: {}", report.manifest_entries);
            println!(
                "  archive: {} ({} files)",
                report.archive.display(),
                report.archived_files
            );
            println!("ok");
        }
        Commands::Inspect { export: path } => {
            let export = parse_export_file(&path)
                .with_context(|| format!("Failed to parse export: {}", path.display()))?;
            let exclusions = build_exclusions(&cfg.assets.exclude_globs)?;
            let assets = derive_assets(&export.items, &exclusions);

            println!("inspect");
            if let Some(title) = &export.site_title {
                println!("  site: {}", title);
            }
            println!("  items: {}", export.items.len());
            println!("  posts: {}", export.count(&ItemType::Post));
            println!("  pages: {}", export.count(&ItemType::Page));
            println!("  attachments: {}", export.count(&ItemType::Attachment));
            println!("  categories: {}", export.categories.len());
            println!("  tags: {}", export.tags.len());
            println!("  assets: {}", assets.len());
            println!("ok");
        }
    }

    Ok(())
}
