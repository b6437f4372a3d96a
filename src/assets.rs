//! Asset references derived from attachment items.
//!
//! Each attachment whose sanitized path is not excluded becomes one
//! [`AssetReference`]. The same path names the downloaded file inside the
//! staging directory and the `SourcePath`/`TargetPath` of its media manifest
//! entry, so a failed download can be pruned from the manifest by path.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::models::{AssetReference, ItemType, SourceItem};
use crate::permalink::sanitize_relative_path;

pub fn build_exclusions(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Filesystem-safe relative path for an asset URL. Path separators are kept
/// as directories; characters that are invalid in file names on common
/// platforms are replaced with `_`. `.` and `..` segments are dropped so the
/// result always stays below the staging root.
pub fn safe_relative_path(url: &str) -> String {
    sanitize_relative_path(url, true)
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map(|segment| {
            segment
                .chars()
                .map(|c| match c {
                    '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\\' => '_',
                    c if c.is_control() => '_',
                    c => c,
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// One reference per downloadable attachment, in source order. Duplicate
/// URLs collapse onto the first attachment that names them.
pub fn derive_assets(items: &[SourceItem], exclusions: &GlobSet) -> Vec<AssetReference> {
    let mut seen_urls = HashSet::new();
    let mut seen_paths = HashSet::new();
    let mut assets = Vec::new();

    for item in items.iter().filter(|i| i.item_type == ItemType::Attachment) {
        let Some(url) = item.attachment_url.as_deref() else {
            continue;
        };
        let path = safe_relative_path(url);
        if path.is_empty() {
            warn!(item = item.id, url = %url, "attachment URL has no path; skipping");
            continue;
        }
        if exclusions.is_match(&path) {
            debug!(item = item.id, path = %path, "attachment excluded");
            continue;
        }
        if !seen_urls.insert(url.to_string()) {
            continue;
        }
        if !seen_paths.insert(path.clone()) {
            warn!(item = item.id, path = %path, "attachment path collides with an earlier one; skipping");
            continue;
        }
        assets.push(AssetReference {
            item_id: item.id,
            path,
            url: url.to_string(),
        });
    }

    assets
}
