//! Builders for the EtchPlayBoilerplate theme.
//!
//! Pages nest the body inside a `Section` holding one `Html` child, with
//! WordPress shortcodes removed. Posts become `NewsPost` items whose body is
//! an editor.js block document stored as a JSON string.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

use super::{
    autoroute, contained_in, content_header, insert, term_field, widget_header, BuildContext,
    ContainerIds, ContentBuilder,
};
use crate::blocks;
use crate::models::{ContentNode, ItemType, SourceItem};
use crate::taxonomy::TermKind;

/// News list defined by the EtchPlayBoilerplate recipe.
pub const NEWS_LIST_ID: &str = "49q1qde4sg4q27vb9jt1gac6w5";

const SECTION_TITLE: &str = "Imported Content";

static SHORTCODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]*\]").unwrap());

pub struct PageBuilder;

impl ContentBuilder for PageBuilder {
    fn name(&self) -> &str {
        "etch-play pages"
    }

    fn item_type(&self) -> ItemType {
        ItemType::Page
    }

    fn build_item(&self, item: &SourceItem, ctx: &BuildContext<'_>) -> Result<ContentNode> {
        let id = format!("wppage-{}", item.id);
        let html = SHORTCODE.replace_all(&item.body, "");

        let mut child = widget_header(
            "Html",
            &format!("wppagehtml-{}", item.id),
            Some(SECTION_TITLE),
            item,
        );
        insert(&mut child, "Html", json!({ "Body": { "Html": html } }));
        insert(&mut child, "TitlePart", json!({ "Title": SECTION_TITLE }));

        let mut section = widget_header(
            "Section",
            &format!("wppagesection-{}", item.id),
            Some(SECTION_TITLE),
            item,
        );
        insert(
            &mut section,
            "Section",
            json!([
                { "BackgroundColour": { "Text": "default" } },
                { "Alignment": { "Text": "default" } }
            ]),
        );
        insert(&mut section, "TitlePart", json!({ "Title": SECTION_TITLE }));
        insert(&mut section, "Children", json!({ "ContentItems": [child] }));

        let mut document = content_header("Page", &id, item, ctx);
        insert(&mut document, "Page", json!({}));
        insert(&mut document, "AutoroutePart", autoroute(&item.link));
        insert(&mut document, "Content", json!({ "ContentItems": [section] }));
        Ok(ContentNode::new(document))
    }
}

pub struct PostBuilder {
    ids: ContainerIds,
}

impl PostBuilder {
    pub fn new(ids: ContainerIds) -> Result<Self> {
        if ids.list_id.trim().is_empty() {
            bail!("EtchPlay posts require a news list id (theme.list_id)");
        }
        Ok(Self { ids })
    }
}

impl ContentBuilder for PostBuilder {
    fn name(&self) -> &str {
        "etch-play posts"
    }

    fn item_type(&self) -> ItemType {
        ItemType::Post
    }

    fn build_item(&self, item: &SourceItem, ctx: &BuildContext<'_>) -> Result<ContentNode> {
        let id = format!("wppost-{}", item.id);
        let body = serde_json::to_string(&blocks::convert(&item.body))
            .with_context(|| format!("Failed to serialize blocks for post {}", item.id))?;
        let thumbnail: Vec<Value> = item
            .thumbnail_id
            .and_then(|thumb| ctx.asset_path(thumb))
            .map(|path| vec![Value::String(path.to_string())])
            .unwrap_or_default();
        let categories = ctx.term_ids(TermKind::Category, &item.categories);
        let tags = ctx.term_ids(TermKind::Tag, &item.tags);

        let mut document = content_header("NewsPost", &id, item, ctx);
        insert(&mut document, "ContainedPart", contained_in(&self.ids.list_id));
        insert(&mut document, "AutoroutePart", autoroute(&item.link));
        insert(
            &mut document,
            "NewsPost",
            json!({
                "Content": { "Data": body, "Html": null },
                "Thumbnail": { "Paths": thumbnail },
                "ThumbnailAlt": { "Text": "" },
                "Author": { "Text": item.author },
                "FurtherReading": { "ContentItemIds": [] },
                "Categories": term_field(categories, &self.ids.categories_taxonomy_id),
                "Tags": term_field(tags, &self.ids.tags_taxonomy_id)
            }),
        );
        Ok(ContentNode::new(document))
    }
}
