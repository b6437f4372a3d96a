//! Core data models used throughout the migrator.
//!
//! These types represent the records parsed from a WordPress export, the
//! assets derived from them, and the content nodes that flow into the
//! generated Orchard Core recipe.

use chrono::NaiveDateTime;
use serde_json::Value;

/// The `wp:post_type` of an exported item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ItemType {
    Post,
    Page,
    Attachment,
    NavMenuItem,
    #[default]
    Other,
}

impl ItemType {
    /// Maps a raw `wp:post_type` value to its variant. Unknown types
    /// (custom post types, revisions, ...) become [`ItemType::Other`].
    pub fn from_wp(value: &str) -> Self {
        match value.trim() {
            "post" => ItemType::Post,
            "page" => ItemType::Page,
            "attachment" => ItemType::Attachment,
            "nav_menu_item" => ItemType::NavMenuItem,
            _ => ItemType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Post => "post",
            ItemType::Page => "page",
            ItemType::Attachment => "attachment",
            ItemType::NavMenuItem => "nav_menu_item",
            ItemType::Other => "other",
        }
    }

    /// Posts and pages are the only items that receive permalinks and redirects.
    pub fn is_routable(&self) -> bool {
        matches!(self, ItemType::Post | ItemType::Page)
    }
}

/// One `<item>` of the export: a post, page, attachment, or menu entry.
#[derive(Debug, Clone, Default)]
pub struct SourceItem {
    pub id: u64,
    pub item_type: ItemType,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub status: String,
    pub published_at: Option<NaiveDateTime>,
    pub author: String,
    pub link: String,
    /// Relative form of the original link, set only in redirect mode.
    pub old_link: Option<String>,
    pub attachment_url: Option<String>,
    pub parent_id: u64,
    pub thumbnail_id: Option<u64>,
    /// Category nice-names in document order.
    pub categories: Vec<String>,
    /// Tag slugs in document order.
    pub tags: Vec<String>,
}

impl SourceItem {
    pub fn is_published(&self) -> bool {
        self.status == "publish"
    }

    /// Publish timestamp rendered the way recipe content items expect it.
    pub fn published_utc(&self) -> Value {
        match self.published_at {
            Some(ts) => Value::String(
                ts.and_utc()
                    .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            ),
            None => Value::Null,
        }
    }
}

/// A `<wp:category>` term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub nice_name: String,
    /// Nice-name of the parent category; empty for root terms.
    pub parent: String,
    pub description: String,
}

/// A `<wp:tag>` term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub description: String,
}

/// Everything the record parser recovers from one export document.
#[derive(Debug, Clone, Default)]
pub struct Export {
    pub site_title: Option<String>,
    pub site_description: Option<String>,
    pub items: Vec<SourceItem>,
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
}

impl Export {
    pub fn count(&self, item_type: &ItemType) -> usize {
        self.items.iter().filter(|i| &i.item_type == item_type).count()
    }
}

/// A downloadable media file derived from an attachment item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub item_id: u64,
    /// Filesystem-safe relative path; doubles as the media manifest path.
    pub path: String,
    /// Original absolute URL.
    pub url: String,
}

/// One generated content item. The JSON document is opaque to the pipeline;
/// nested child items live inside it wherever the theme puts them.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentNode {
    pub id: String,
    pub content_type: String,
    pub document: Value,
}

impl ContentNode {
    pub fn new(document: Value) -> Self {
        let id = document
            .get("ContentItemId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let content_type = document
            .get("ContentType")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self {
            id,
            content_type,
            document,
        }
    }

    /// Ids of this node and every nested content item below it, depth first.
    pub fn ids(&self) -> Vec<String> {
        content_item_ids(&self.document)
    }
}

/// Every `ContentItemId` found in a content item document, depth first.
pub fn content_item_ids(document: &Value) -> Vec<String> {
    let mut ids = Vec::new();
    collect_ids(document, &mut ids);
    ids
}

fn collect_ids(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(id)) = map.get("ContentItemId") {
                out.push(id.clone());
            }
            for child in map.values() {
                collect_ids(child, out);
            }
        }
        Value::Array(values) => {
            for child in values {
                collect_ids(child, out);
            }
        }
        _ => {}
    }
}
