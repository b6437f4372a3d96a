//! Theme-specific content builders.
//!
//! A [`ContentBuilder`] turns the source items of one type into Orchard Core
//! content items for one target theme. Each theme ships a page builder and
//! a post builder; [`ThemeBuilders::for_theme`] selects the pair once, when
//! the pipeline is constructed.
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │               ThemeBuilders               │
//! │  ┌──────────────────┐ ┌─────────────────┐ │
//! │  │ the-blog         │ │ etch-play       │ │
//! │  │ Page  (FlowPart) │ │ Page  (Section) │ │
//! │  │ BlogPost (md)    │ │ NewsPost (json) │ │
//! │  └──────────────────┘ └─────────────────┘ │
//! └─────────────────────┬─────────────────────┘
//!                       ▼
//!            BundleAssembler content step
//! ```
//!
//! Builders never fail on content: unresolved terms are dropped, missing
//! dates become `null` and a missing thumbnail yields an empty path list.
//! The only fatal condition is a missing container id, which is reported
//! by the builder's constructor before any content is produced.

pub mod etch_play;
pub mod the_blog;

use anyhow::Result;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::config::{Theme, ThemeConfig};
use crate::models::{AssetReference, ContentNode, ItemType, SourceItem};
use crate::taxonomy::{TaxonomyResolver, TermKind};

// ═══════════════════════════════════════════════════════════════════════
// Build context
// ═══════════════════════════════════════════════════════════════════════

/// Everything a builder may read while producing content.
pub struct BuildContext<'a> {
    pub items: &'a [SourceItem],
    pub taxonomy: &'a TaxonomyResolver<'a>,
    pub assets: &'a [AssetReference],
    /// Author display name to Orchard user id.
    pub authors: &'a HashMap<String, String>,
    /// Timestamp of this run; `ModifiedUtc` of undated items.
    pub created_utc: &'a str,
}

impl<'a> BuildContext<'a> {
    pub fn items_of(&self, item_type: ItemType) -> impl Iterator<Item = &'a SourceItem> {
        let items: &'a [SourceItem] = self.items;
        items.iter().filter(move |i| i.item_type == item_type)
    }

    /// Manifest path of the asset derived from attachment `item_id`.
    pub fn asset_path(&self, item_id: u64) -> Option<&'a str> {
        self.assets
            .iter()
            .find(|a| a.item_id == item_id)
            .map(|a| a.path.as_str())
    }

    /// Orchard user id for an author, falling back to the display name.
    pub fn owner(&self, author: &str) -> String {
        self.authors
            .get(author)
            .cloned()
            .unwrap_or_else(|| author.to_string())
    }

    pub fn term_ids(&self, kind: TermKind, keys: &[String]) -> Vec<String> {
        self.taxonomy.term_ids(kind, keys)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ContentBuilder trait
// ═══════════════════════════════════════════════════════════════════════

/// Produces content items for one [`ItemType`] in one theme.
///
/// Implementations fix the content type, the nesting of child items, how
/// the body is transformed and which list the items are contained in.
/// [`build`](ContentBuilder::build) preserves source order.
///
/// # Example
///
/// ```rust,ignore
/// use wp_to_orchard::builders::{BuildContext, ContentBuilder};
/// use wp_to_orchard::models::{ContentNode, ItemType, SourceItem};
///
/// struct LandingPages;
///
/// impl ContentBuilder for LandingPages {
///     fn name(&self) -> &str { "landing-pages" }
///     fn item_type(&self) -> ItemType { ItemType::Page }
///
///     fn build_item(&self, item: &SourceItem, ctx: &BuildContext<'_>) -> Result<ContentNode> {
///         Ok(ContentNode::new(content_header("LandingPage", &format!("wppage-{}", item.id), item, ctx)))
///     }
/// }
/// ```
pub trait ContentBuilder: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// The source item type this builder consumes.
    fn item_type(&self) -> ItemType;

    fn build_item(&self, item: &SourceItem, ctx: &BuildContext<'_>) -> Result<ContentNode>;

    fn build(&self, ctx: &BuildContext<'_>) -> Result<Vec<ContentNode>> {
        ctx.items_of(self.item_type())
            .map(|item| self.build_item(item, ctx))
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Theme selection
// ═══════════════════════════════════════════════════════════════════════

/// Container ids a theme's recipe defines for imported content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerIds {
    /// List content item that contains posts.
    pub list_id: String,
    pub categories_taxonomy_id: String,
    pub tags_taxonomy_id: String,
}

const CATEGORIES_TAXONOMY_ID: &str = "4zwnd978ed66tvxj1cb69mbc5z";
const TAGS_TAXONOMY_ID: &str = "49ymvebjd46550a9z95j4udiej";

impl ContainerIds {
    pub fn for_theme(theme: Theme, overrides: &ThemeConfig) -> Self {
        let default_list = match theme {
            Theme::TheBlog => the_blog::BLOG_LIST_ID,
            Theme::EtchPlay => etch_play::NEWS_LIST_ID,
        };
        Self {
            list_id: overrides
                .list_id
                .clone()
                .unwrap_or_else(|| default_list.to_string()),
            categories_taxonomy_id: overrides
                .categories_taxonomy_id
                .clone()
                .unwrap_or_else(|| CATEGORIES_TAXONOMY_ID.to_string()),
            tags_taxonomy_id: overrides
                .tags_taxonomy_id
                .clone()
                .unwrap_or_else(|| TAGS_TAXONOMY_ID.to_string()),
        }
    }
}

pub struct ThemeBuilders {
    pub pages: Box<dyn ContentBuilder>,
    pub posts: Box<dyn ContentBuilder>,
}

impl ThemeBuilders {
    pub fn for_theme(theme: Theme, overrides: &ThemeConfig) -> Result<Self> {
        let ids = ContainerIds::for_theme(theme, overrides);
        let builders = match theme {
            Theme::TheBlog => Self {
                pages: Box::new(the_blog::PageBuilder),
                posts: Box::new(the_blog::PostBuilder::new(ids)?),
            },
            Theme::EtchPlay => Self {
                pages: Box::new(etch_play::PageBuilder),
                posts: Box::new(etch_play::PostBuilder::new(ids)?),
            },
        };
        Ok(builders)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Shared document fragments
// ═══════════════════════════════════════════════════════════════════════

/// Fields every top-level content item carries.
pub fn content_header(
    content_type: &str,
    id: &str,
    item: &SourceItem,
    ctx: &BuildContext<'_>,
) -> Value {
    let published = item.published_utc();
    let modified = match &published {
        Value::Null => Value::String(ctx.created_utc.to_string()),
        date => date.clone(),
    };
    json!({
        "ContentItemId": id,
        "ContentItemVersionId": id,
        "ContentType": content_type,
        "DisplayText": item.title,
        "Latest": true,
        "Published": item.is_published(),
        "ModifiedUtc": modified,
        "PublishedUtc": published,
        "CreatedUtc": published,
        "Owner": ctx.owner(&item.author),
        "Author": item.author,
        "TitlePart": { "Title": item.title }
    })
}

/// Fields of a child item nested inside another item's document.
pub fn widget_header(
    content_type: &str,
    id: &str,
    display_text: Option<&str>,
    item: &SourceItem,
) -> Value {
    json!({
        "ContentItemId": id,
        "ContentItemVersionId": id,
        "ContentType": content_type,
        "DisplayText": display_text,
        "Latest": false,
        "Published": false,
        "ModifiedUtc": item.published_utc(),
        "PublishedUtc": null,
        "CreatedUtc": null,
        "Owner": null,
        "Author": item.author
    })
}

pub fn autoroute(link: &str) -> Value {
    json!({
        "Path": link.trim_matches('/'),
        "SetHomepage": false
    })
}

pub fn contained_in(list_id: &str) -> Value {
    json!({
        "ListContentItemId": list_id,
        "Order": 0
    })
}

pub fn term_field(ids: Vec<String>, taxonomy_id: &str) -> Value {
    json!({
        "TermContentItemIds": ids,
        "TaxonomyContentItemId": taxonomy_id
    })
}

/// Adds `key: value` to a JSON object; no-op for other values.
pub(crate) fn insert(document: &mut Value, key: &str, value: Value) {
    if let Value::Object(map) = document {
        map.insert(key.to_string(), value);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::NaiveDateTime;

    pub fn post(id: u64, title: &str, body: &str) -> SourceItem {
        SourceItem {
            id,
            item_type: ItemType::Post,
            title: title.to_string(),
            body: body.to_string(),
            status: "publish".to_string(),
            author: "Danny T".to_string(),
            link: "2020/03/04/hello-world".to_string(),
            published_at: NaiveDateTime::parse_from_str("2020-03-04 09:30:00", "%Y-%m-%d %H:%M:%S")
                .ok(),
            categories: vec!["news".to_string(), "missing".to_string()],
            tags: vec!["rust".to_string()],
            ..Default::default()
        }
    }

    pub fn page(id: u64, title: &str, body: &str) -> SourceItem {
        SourceItem {
            id,
            item_type: ItemType::Page,
            title: title.to_string(),
            body: body.to_string(),
            status: "draft".to_string(),
            author: "Danny T".to_string(),
            link: "about".to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Tag};

    #[test]
    fn container_ids_default_per_theme_and_accept_overrides() {
        let blog = ContainerIds::for_theme(Theme::TheBlog, &ThemeConfig::default());
        assert_eq!(blog.list_id, the_blog::BLOG_LIST_ID);
        assert_eq!(blog.categories_taxonomy_id, CATEGORIES_TAXONOMY_ID);

        let overrides = ThemeConfig {
            list_id: Some("custom-list".to_string()),
            ..Default::default()
        };
        let news = ContainerIds::for_theme(Theme::EtchPlay, &overrides);
        assert_eq!(news.list_id, "custom-list");
        assert_eq!(news.tags_taxonomy_id, TAGS_TAXONOMY_ID);
    }

    #[test]
    fn empty_list_id_fails_before_building() {
        let overrides = ThemeConfig {
            list_id: Some(String::new()),
            ..Default::default()
        };
        assert!(ThemeBuilders::for_theme(Theme::TheBlog, &overrides).is_err());
        assert!(ThemeBuilders::for_theme(Theme::EtchPlay, &overrides).is_err());
    }

    #[test]
    fn header_uses_author_table_for_owner() {
        let categories: Vec<Category> = Vec::new();
        let tags: Vec<Tag> = Vec::new();
        let taxonomy = TaxonomyResolver::new(&categories, &tags);
        let mut authors = HashMap::new();
        authors.insert("Danny T".to_string(), "user-42".to_string());
        let item = test_support::post(1, "Hello", "");
        let items = vec![item.clone()];
        let ctx = BuildContext {
            items: &items,
            taxonomy: &taxonomy,
            assets: &[],
            authors: &authors,
            created_utc: "2024-01-01T00:00:00Z",
        };

        let header = content_header("BlogPost", "wppost-1", &item, &ctx);
        assert_eq!(header["Owner"], "user-42");
        assert_eq!(header["Author"], "Danny T");
        assert_eq!(header["Published"], true);
        assert_eq!(header["PublishedUtc"], "2020-03-04T09:30:00Z");

        let empty = HashMap::new();
        let ctx = BuildContext { authors: &empty, ..ctx };
        assert_eq!(content_header("BlogPost", "wppost-1", &item, &ctx)["Owner"], "Danny T");
    }

    #[test]
    fn builders_preserve_source_order() {
        let categories: Vec<Category> = Vec::new();
        let tags: Vec<Tag> = Vec::new();
        let taxonomy = TaxonomyResolver::new(&categories, &tags);
        let authors = HashMap::new();
        let items = vec![
            test_support::post(3, "Third", "c"),
            test_support::page(9, "Page", "p"),
            test_support::post(1, "First", "a"),
        ];
        let ctx = BuildContext {
            items: &items,
            taxonomy: &taxonomy,
            assets: &[],
            authors: &authors,
            created_utc: "2024-01-01T00:00:00Z",
        };
        let builders = ThemeBuilders::for_theme(Theme::TheBlog, &ThemeConfig::default()).unwrap();
        let posts = builders.posts.build(&ctx).unwrap();
        let ids: Vec<&str> = posts.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["wppost-3", "wppost-1"]);
    }
}
