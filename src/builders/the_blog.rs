//! Builders for the TheBlog theme.
//!
//! Pages carry their body verbatim in a single `RawHtml` flow widget; posts
//! become `BlogPost` items in the blog list with a Markdown body.

use anyhow::{bail, Result};
use serde_json::json;

use super::{
    autoroute, contained_in, content_header, insert, term_field, widget_header, BuildContext,
    ContainerIds, ContentBuilder,
};
use crate::markdown::to_markdown;
use crate::models::{ContentNode, ItemType, SourceItem};
use crate::taxonomy::TermKind;

/// Blog list defined by the TheBlog recipe.
pub const BLOG_LIST_ID: &str = "4m2pj0mpy25450jcz817odyhbg";

pub struct PageBuilder;

impl ContentBuilder for PageBuilder {
    fn name(&self) -> &str {
        "the-blog pages"
    }

    fn item_type(&self) -> ItemType {
        ItemType::Page
    }

    fn build_item(&self, item: &SourceItem, ctx: &BuildContext<'_>) -> Result<ContentNode> {
        let id = format!("wppage-{}", item.id);

        let mut widget = widget_header("RawHtml", &format!("wppagewidget-{}", item.id), None, item);
        insert(
            &mut widget,
            "RawHtml",
            json!({ "Content": { "Html": item.body } }),
        );
        insert(
            &mut widget,
            "FlowMetadata",
            json!({ "Alignment": 3, "Size": 100 }),
        );

        let mut document = content_header("Page", &id, item, ctx);
        insert(&mut document, "Page", json!({}));
        insert(&mut document, "AutoroutePart", autoroute(&item.link));
        insert(&mut document, "FlowPart", json!({ "Widgets": [widget] }));
        Ok(ContentNode::new(document))
    }
}

pub struct PostBuilder {
    ids: ContainerIds,
}

impl PostBuilder {
    pub fn new(ids: ContainerIds) -> Result<Self> {
        if ids.list_id.trim().is_empty() {
            bail!("TheBlog posts require a blog list id (theme.list_id)");
        }
        Ok(Self { ids })
    }
}

impl ContentBuilder for PostBuilder {
    fn name(&self) -> &str {
        "the-blog posts"
    }

    fn item_type(&self) -> ItemType {
        ItemType::Post
    }

    fn build_item(&self, item: &SourceItem, ctx: &BuildContext<'_>) -> Result<ContentNode> {
        let id = format!("wppost-{}", item.id);
        let categories = ctx.term_ids(TermKind::Category, &item.categories);
        let tags = ctx.term_ids(TermKind::Tag, &item.tags);

        let mut document = content_header("BlogPost", &id, item, ctx);
        insert(&mut document, "ContainedPart", contained_in(&self.ids.list_id));
        insert(
            &mut document,
            "MarkdownBodyPart",
            json!({ "Markdown": to_markdown(&item.body) }),
        );
        insert(&mut document, "AutoroutePart", autoroute(&item.link));
        insert(
            &mut document,
            "BlogPost",
            json!({
                "Subtitle": { "Text": null },
                "Categories": term_field(categories, &self.ids.categories_taxonomy_id),
                "Tags": term_field(tags, &self.ids.tags_taxonomy_id)
            }),
        );
        Ok(ContentNode::new(document))
    }
}
