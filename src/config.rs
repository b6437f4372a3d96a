//! TOML configuration parsing.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, see [`Config::default`]) describes a valid TheBlog migration without
//! redirects.
//!
//! ```toml
//! [recipe]
//! theme = "etch-play"
//! create_redirects = true
//! permalink_structure = "yyyy/MM/dd"
//! template = "templates/etch-play.json"
//!
//! [theme]
//! list_id = "49q1qde4sg4q27vb9jt1gac6w5"
//!
//! [assets]
//! concurrency = 4
//! timeout_secs = 10
//! exclude_globs = ["**/*.php"]
//!
//! [authors]
//! "Danny T" = "4p1y8e3fw6wd2cjj7v9sbbq5h1"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub recipe: RecipeConfig,
    #[serde(default)]
    pub theme: ThemeConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    /// Author display name to Orchard user id.
    #[serde(default)]
    pub authors: HashMap<String, String>,
}

/// Target theme; decides which content builders the pipeline uses.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    TheBlog,
    EtchPlay,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::TheBlog => "the-blog",
            Theme::EtchPlay => "etch-play",
        }
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "the-blog" | "theblog" => Ok(Theme::TheBlog),
            "etch-play" | "etchplay" => Ok(Theme::EtchPlay),
            other => bail!("Unknown theme: '{}'. Must be the-blog or etch-play.", other),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecipeConfig {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub create_redirects: bool,
    #[serde(default = "default_permalink_structure")]
    pub permalink_structure: String,
    #[serde(default = "default_true")]
    pub strip_trailing_slash: bool,
    /// Characters removed from titles before slugification.
    #[serde(default = "default_slug_strip_chars")]
    pub slug_strip_chars: Vec<String>,
    /// Template recipe whose steps precede the generated ones.
    #[serde(default)]
    pub template: Option<PathBuf>,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            create_redirects: false,
            permalink_structure: default_permalink_structure(),
            strip_trailing_slash: true,
            slug_strip_chars: default_slug_strip_chars(),
            template: None,
        }
    }
}

fn default_permalink_structure() -> String {
    "yyyy/MM/dd".to_string()
}
fn default_true() -> bool {
    true
}
fn default_slug_strip_chars() -> Vec<String> {
    vec!["?".to_string()]
}

/// Overrides for the container ids baked into each theme's recipe.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ThemeConfig {
    #[serde(default)]
    pub list_id: Option<String>,
    #[serde(default)]
    pub categories_taxonomy_id: Option<String>,
    #[serde(default)]
    pub tags_taxonomy_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssetsConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_exclude_globs")]
    pub exclude_globs: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            exclude_globs: default_exclude_globs(),
        }
    }
}

impl AssetsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_concurrency() -> usize {
    4
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    5
}
fn default_exclude_globs() -> Vec<String> {
    vec!["**/*.php".to_string()]
}

impl Config {
    /// Checks cross-field constraints. Called by [`load_config`] and again
    /// by the CLI after applying flag overrides.
    pub fn validate(&self) -> Result<()> {
        if self.assets.concurrency == 0 {
            bail!("assets.concurrency must be > 0");
        }
        if self.assets.timeout_secs == 0 || self.assets.connect_timeout_secs == 0 {
            bail!("assets.timeout_secs and assets.connect_timeout_secs must be > 0");
        }
        if self.recipe.create_redirects && self.recipe.permalink_structure.trim().is_empty() {
            bail!("recipe.permalink_structure must be set when create_redirects is enabled");
        }
        for (name, id) in &self.authors {
            if id.trim().is_empty() {
                bail!("authors.\"{}\" must map to a non-empty user id", name);
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.recipe.theme, Theme::TheBlog);
        assert!(!config.recipe.create_redirects);
        assert_eq!(config.recipe.permalink_structure, "yyyy/MM/dd");
        assert_eq!(config.assets.concurrency, 4);
        assert_eq!(config.assets.max_retries, 5);
        assert_eq!(config.assets.exclude_globs, vec!["**/*.php"]);
        config.validate().unwrap();
    }

    #[test]
    fn parses_full_file() {
        let config: Config = toml::from_str(
            r#"
            [recipe]
            theme = "etch-play"
            create_redirects = true
            slug_strip_chars = ["?", "!"]

            [theme]
            list_id = "abc"

            [assets]
            concurrency = 8

            [authors]
            "Jane Doe" = "user-1"
            "#,
        )
        .unwrap();
        assert_eq!(config.recipe.theme, Theme::EtchPlay);
        assert!(config.recipe.create_redirects);
        assert_eq!(config.recipe.slug_strip_chars, vec!["?", "!"]);
        assert_eq!(config.theme.list_id.as_deref(), Some("abc"));
        assert_eq!(config.assets.concurrency, 8);
        assert_eq!(config.authors.get("Jane Doe").map(String::as_str), Some("user-1"));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let config: Config = toml::from_str("[assets]\nconcurrency = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn theme_from_str() {
        assert_eq!("etch-play".parse::<Theme>().unwrap(), Theme::EtchPlay);
        assert_eq!("the-blog".parse::<Theme>().unwrap(), Theme::TheBlog);
        assert!("wordpress".parse::<Theme>().is_err());
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/wp2oc.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
