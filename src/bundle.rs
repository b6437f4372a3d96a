//! Recipe assembly and packaging.
//!
//! The output recipe is the template recipe with two steps appended:
//!
//! ```json
//! { "steps": [ ...template steps,
//!     { "name": "media", "Files": [ { "SourcePath": "...", "TargetPath": "..." } ] },
//!     { "name": "content", "data": [ categories, tags, pages, posts, redirects ] } ] }
//! ```
//!
//! `recipe.json` is written into the staging directory next to the fetched
//! media, the directory is zipped, and the staging directory is removed.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::models::{content_item_ids, AssetReference, ContentNode, SourceItem};
use crate::taxonomy::IMPORT_AUTHOR;

pub const RECIPE_FILE: &str = "recipe.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    #[serde(default)]
    pub steps: Vec<Value>,
    /// Every other top-level key of the template, kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub fn load_template(path: &Path) -> Result<Recipe> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read template recipe: {}", path.display()))?;
    let recipe: Recipe = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse template recipe: {}", path.display()))?;
    Ok(recipe)
}

pub fn media_step(assets: &[AssetReference]) -> Value {
    let files: Vec<Value> = assets
        .iter()
        .map(|a| json!({ "SourcePath": a.path, "TargetPath": a.path }))
        .collect();
    json!({ "name": "media", "Files": files })
}

/// Removes manifest entries whose source path failed to download. Returns
/// the number of entries removed.
pub fn prune_failed_media(step: &mut Value, failed: &HashSet<String>) -> usize {
    let Some(files) = step.get_mut("Files").and_then(Value::as_array_mut) else {
        return 0;
    };
    let before = files.len();
    files.retain(|entry| {
        entry
            .get("SourcePath")
            .and_then(Value::as_str)
            .map_or(true, |path| !failed.contains(path))
    });
    before - files.len()
}

/// One `Redirect` item per item that carries an old link.
pub fn redirect_items(items: &[SourceItem], created_utc: &str) -> Vec<Value> {
    items
        .iter()
        .filter(|item| item.item_type.is_routable())
        .filter_map(|item| {
            let from = item.old_link.as_deref()?;
            let id = format!("redirect-{}", item.id);
            Some(json!({
                "ContentItemId": id,
                "ContentItemVersionId": id,
                "ContentType": "Redirect",
                "DisplayText": item.title,
                "Latest": true,
                "Published": item.is_published(),
                "ModifiedUtc": created_utc,
                "PublishedUtc": created_utc,
                "CreatedUtc": created_utc,
                "Owner": IMPORT_AUTHOR,
                "Author": IMPORT_AUTHOR,
                "TitlePart": { "Title": item.title },
                "RedirectPart": {
                    "FromUrl": from,
                    "ToUrl": item.link,
                    "IsPermanent": true
                }
            }))
        })
        .collect()
}

/// Content grouped the way the content step lists it.
#[derive(Debug, Default)]
pub struct ContentSections {
    pub categories: Vec<Value>,
    pub tags: Vec<Value>,
    pub pages: Vec<ContentNode>,
    pub posts: Vec<ContentNode>,
    pub redirects: Vec<Value>,
}

impl ContentSections {
    pub fn len(&self) -> usize {
        self.categories.len()
            + self.tags.len()
            + self.pages.len()
            + self.posts.len()
            + self.redirects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fails if two top-level or nested items share a content item id.
    pub fn check_unique_ids(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let documents = self
            .categories
            .iter()
            .chain(&self.tags)
            .chain(self.pages.iter().map(|n| &n.document))
            .chain(self.posts.iter().map(|n| &n.document))
            .chain(&self.redirects);
        for document in documents {
            for id in content_item_ids(document) {
                if !seen.insert(id.clone()) {
                    bail!("duplicate content item id: {}", id);
                }
            }
        }
        Ok(())
    }

    pub fn into_step(self) -> Value {
        let data: Vec<Value> = self
            .categories
            .into_iter()
            .chain(self.tags)
            .chain(self.pages.into_iter().map(|n| n.document))
            .chain(self.posts.into_iter().map(|n| n.document))
            .chain(self.redirects)
            .collect();
        json!({ "name": "content", "data": data })
    }
}

/// Appends the generated steps after the template's own steps.
pub fn assemble(template: Recipe, media: Value, content: Value) -> Recipe {
    let mut recipe = template;
    recipe.steps.push(media);
    recipe.steps.push(content);
    recipe
}

pub fn write_recipe(recipe: &Recipe, staging: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(staging)
        .with_context(|| format!("Failed to create staging dir: {}", staging.display()))?;
    let path = staging.join(RECIPE_FILE);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, recipe)?;
    writer.flush()?;
    Ok(path)
}

/// Zips the staging directory into `archive`, replacing any existing file.
/// Entry names are relative to the staging root. Returns the number of
/// files written.
pub fn write_archive(staging: &Path, archive: &Path) -> Result<usize> {
    if archive.exists() {
        std::fs::remove_file(archive)
            .with_context(|| format!("Failed to replace {}", archive.display()))?;
    }
    if let Some(parent) = archive.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(archive)
        .with_context(|| format!("Failed to create archive: {}", archive.display()))?;
    let mut zip = ZipWriter::new(file);
    let mut count = 0;

    for entry in WalkDir::new(staging).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(staging)?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(name, entry_options())?;
        } else {
            zip.start_file(name, entry_options())?;
            let mut source = File::open(entry.path())?;
            std::io::copy(&mut source, &mut zip)?;
            count += 1;
        }
    }

    zip.finish()?;
    Ok(count)
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Writes the recipe, archives the staging directory and removes it.
pub fn package(recipe: &Recipe, staging: &Path, archive: &Path) -> Result<usize> {
    write_recipe(recipe, staging)?;
    let count = write_archive(staging, archive)?;
    std::fs::remove_dir_all(staging)
        .with_context(|| format!("Failed to remove staging dir: {}", staging.display()))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemType;
    use std::io::Read;
    use tempfile::TempDir;

    fn asset(path: &str) -> AssetReference {
        AssetReference {
            item_id: 1,
            path: path.to_string(),
            url: format!("http://example.com/{}", path),
        }
    }

    #[test]
    fn media_step_lists_every_asset() {
        let step = media_step(&[asset("a.jpg"), asset("dir/b.png")]);
        assert_eq!(step["name"], "media");
        assert_eq!(step["Files"][1]["SourcePath"], "dir/b.png");
        assert_eq!(step["Files"][1]["TargetPath"], "dir/b.png");
    }

    #[test]
    fn prune_removes_failed_paths_only() {
        let mut step = media_step(&[asset("a.jpg"), asset("b.jpg"), asset("c.jpg")]);
        let failed: HashSet<String> = ["b.jpg".to_string()].into_iter().collect();
        assert_eq!(prune_failed_media(&mut step, &failed), 1);
        let paths: Vec<&str> = step["Files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["SourcePath"].as_str().unwrap())
            .collect();
        assert_eq!(paths, vec!["a.jpg", "c.jpg"]);
    }

    #[test]
    fn redirects_only_for_items_with_old_link() {
        let items = vec![
            SourceItem {
                id: 1,
                item_type: ItemType::Post,
                title: "Moved".to_string(),
                link: "/2020/03/04/moved".to_string(),
                old_link: Some("/?p=1".to_string()),
                status: "publish".to_string(),
                ..Default::default()
            },
            SourceItem {
                id: 2,
                item_type: ItemType::Page,
                link: "about".to_string(),
                ..Default::default()
            },
        ];
        let redirects = redirect_items(&items, "2024-01-01T00:00:00Z");
        assert_eq!(redirects.len(), 1);
        assert_eq!(redirects[0]["ContentItemId"], "redirect-1");
        assert_eq!(redirects[0]["RedirectPart"]["FromUrl"], "/?p=1");
        assert_eq!(redirects[0]["RedirectPart"]["ToUrl"], "/2020/03/04/moved");
        assert_eq!(redirects[0]["RedirectPart"]["IsPermanent"], true);
    }

    #[test]
    fn content_step_orders_sections() {
        let sections = ContentSections {
            categories: vec![json!({ "ContentItemId": "wpcat-1" })],
            tags: vec![json!({ "ContentItemId": "wptag-1" })],
            pages: vec![ContentNode::new(json!({ "ContentItemId": "wppage-1" }))],
            posts: vec![ContentNode::new(json!({ "ContentItemId": "wppost-1" }))],
            redirects: vec![json!({ "ContentItemId": "redirect-1" })],
        };
        assert_eq!(sections.len(), 5);
        sections.check_unique_ids().unwrap();

        let step = sections.into_step();
        let ids: Vec<&str> = step["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["ContentItemId"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["wpcat-1", "wptag-1", "wppage-1", "wppost-1", "redirect-1"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let sections = ContentSections {
            pages: vec![ContentNode::new(json!({
                "ContentItemId": "wppage-1",
                "Content": { "ContentItems": [ { "ContentItemId": "wppage-1" } ] }
            }))],
            ..Default::default()
        };
        assert!(sections.check_unique_ids().is_err());
    }

    #[test]
    fn template_keys_survive_assembly() {
        let dir = TempDir::new().unwrap();
        let template_path = dir.path().join("template.json");
        std::fs::write(
            &template_path,
            r#"{ "name": "TheBlog", "issetuprecipe": false, "steps": [ { "name": "feature" } ] }"#,
        )
        .unwrap();

        let template = load_template(&template_path).unwrap();
        let recipe = assemble(template, media_step(&[]), ContentSections::default().into_step());
        assert_eq!(recipe.steps.len(), 3);
        assert_eq!(recipe.steps[0]["name"], "feature");
        assert_eq!(recipe.steps[2]["name"], "content");

        let value = serde_json::to_value(&recipe).unwrap();
        assert_eq!(value["name"], "TheBlog");
        assert_eq!(value["issetuprecipe"], false);
    }

    #[test]
    fn package_zips_staging_and_removes_it() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("recipe");
        std::fs::create_dir_all(staging.join("uploads/2020")).unwrap();
        std::fs::write(staging.join("uploads/2020/a.jpg"), b"img").unwrap();
        let archive = dir.path().join("recipe.zip");
        std::fs::write(&archive, b"stale").unwrap();

        let recipe = assemble(Recipe::default(), media_step(&[]), ContentSections::default().into_step());
        let files = package(&recipe, &staging, &archive).unwrap();

        assert_eq!(files, 2);
        assert!(!staging.exists());
        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut json = String::new();
        zip.by_name(RECIPE_FILE).unwrap().read_to_string(&mut json).unwrap();
        let parsed: Recipe = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, recipe);
        assert!(zip.by_name("uploads/2020/a.jpg").is_ok());
    }
}
