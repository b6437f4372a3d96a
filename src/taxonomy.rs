//! Category and tag resolution.
//!
//! [`TaxonomyResolver`] answers two questions for the content builders:
//! which Orchard term id a post's category nice-name or tag slug refers to,
//! and how the flat category list nests into a forest via each category's
//! parent nice-name. Both are tolerant of bad input: unknown references
//! resolve to nothing, orphaned parents become roots, and parent cycles are
//! broken by visited tracking.

use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::models::{Category, Tag};
use crate::permalink::slugify;

pub const IMPORT_AUTHOR: &str = "WP Import";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Category,
    Tag,
}

impl TermKind {
    pub fn id_prefix(&self) -> &'static str {
        match self {
            TermKind::Category => "wpcat",
            TermKind::Tag => "wptag",
        }
    }

    fn route_prefix(&self) -> &'static str {
        match self {
            TermKind::Category => "category",
            TermKind::Tag => "tag",
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            TermKind::Category => "PostCategory",
            TermKind::Tag => "Tag",
        }
    }
}

pub fn term_id(kind: TermKind, id: u64) -> String {
    format!("{}-{}", kind.id_prefix(), id)
}

/// A category and its descendants, as indices into the category list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermNode {
    pub index: usize,
    pub children: Vec<TermNode>,
}

pub struct TaxonomyResolver<'a> {
    categories: &'a [Category],
    tags: &'a [Tag],
    category_ids: HashMap<&'a str, String>,
    tag_ids: HashMap<&'a str, String>,
}

impl<'a> TaxonomyResolver<'a> {
    pub fn new(categories: &'a [Category], tags: &'a [Tag]) -> Self {
        let mut category_ids = HashMap::new();
        for category in categories {
            category_ids
                .entry(category.nice_name.as_str())
                .or_insert_with(|| term_id(TermKind::Category, category.id));
        }

        let mut tag_ids = HashMap::new();
        for tag in tags {
            tag_ids
                .entry(tag.slug.as_str())
                .or_insert_with(|| term_id(TermKind::Tag, tag.id));
        }

        Self {
            categories,
            tags,
            category_ids,
            tag_ids,
        }
    }

    /// Term id for a category nice-name or tag slug; `None` when nothing
    /// matches. Duplicate keys resolve to the first term in source order.
    pub fn resolve(&self, kind: TermKind, key: &str) -> Option<&str> {
        let ids = match kind {
            TermKind::Category => &self.category_ids,
            TermKind::Tag => &self.tag_ids,
        };
        ids.get(key).map(String::as_str)
    }

    /// Resolves every reference, dropping the ones that match no term.
    pub fn term_ids(&self, kind: TermKind, keys: &[String]) -> Vec<String> {
        keys.iter()
            .filter_map(|key| match self.resolve(kind, key) {
                Some(id) => Some(id.to_string()),
                None => {
                    debug!(kind = ?kind, key = %key, "unresolved term reference");
                    None
                }
            })
            .collect()
    }

    /// Category forest. Roots are categories with no parent or a parent
    /// that does not exist; each root carries every descendant reachable
    /// through parent nice-names. Categories that only sit on a parent cycle
    /// are promoted to roots in source order, so every category appears
    /// exactly once.
    pub fn category_forest(&self) -> Vec<TermNode> {
        let names: HashSet<&str> = self
            .categories
            .iter()
            .map(|c| c.nice_name.as_str())
            .collect();

        let mut children_of: HashMap<&str, Vec<usize>> = HashMap::new();
        for (index, category) in self.categories.iter().enumerate() {
            if !category.parent.is_empty() {
                children_of
                    .entry(category.parent.as_str())
                    .or_default()
                    .push(index);
            }
        }

        let mut visited = vec![false; self.categories.len()];
        let mut forest = Vec::new();

        for (index, category) in self.categories.iter().enumerate() {
            let is_root = category.parent.is_empty() || !names.contains(category.parent.as_str());
            if is_root && !visited[index] {
                if !category.parent.is_empty() {
                    debug!(category = %category.nice_name, parent = %category.parent, "orphaned category placed at root");
                }
                visited[index] = true;
                forest.push(self.grow(index, &children_of, &mut visited));
            }
        }

        for index in 0..self.categories.len() {
            if !visited[index] {
                debug!(category = %self.categories[index].nice_name, "category on a parent cycle promoted to root");
                visited[index] = true;
                forest.push(self.grow(index, &children_of, &mut visited));
            }
        }

        forest
    }

    fn grow(
        &self,
        index: usize,
        children_of: &HashMap<&str, Vec<usize>>,
        visited: &mut [bool],
    ) -> TermNode {
        let mut children = Vec::new();
        if let Some(candidates) = children_of.get(self.categories[index].nice_name.as_str()) {
            for &child in candidates {
                if !visited[child] {
                    visited[child] = true;
                    children.push(self.grow(child, children_of, visited));
                }
            }
        }
        TermNode { index, children }
    }

    /// `PostCategory` content items, children nested under their parent's
    /// `Terms` array.
    pub fn category_items(&self, strip: &[String], modified_utc: &str) -> Vec<Value> {
        let mut slugs = SlugRegistry::default();
        self.category_forest()
            .iter()
            .map(|node| self.category_item(node, strip, modified_utc, &mut slugs))
            .collect()
    }

    fn category_item(
        &self,
        node: &TermNode,
        strip: &[String],
        modified_utc: &str,
        slugs: &mut SlugRegistry,
    ) -> Value {
        let category = &self.categories[node.index];
        let fallback = if category.nice_name.is_empty() {
            category.id.to_string()
        } else {
            category.nice_name.clone()
        };
        let slug = slugs.claim(slugify(&category.name, strip), &fallback, category.id);

        let mut item = term_item(
            TermKind::Category,
            category.id,
            &category.name,
            &slug,
            modified_utc,
        );
        if !node.children.is_empty() {
            let children: Vec<Value> = node
                .children
                .iter()
                .map(|child| self.category_item(child, strip, modified_utc, slugs))
                .collect();
            item["Terms"] = Value::Array(children);
        }
        item
    }

    /// `Tag` content items in source order.
    pub fn tag_items(&self, strip: &[String], modified_utc: &str) -> Vec<Value> {
        let mut slugs = SlugRegistry::default();
        self.tags
            .iter()
            .map(|tag| {
                let fallback = if tag.slug.is_empty() {
                    tag.id.to_string()
                } else {
                    tag.slug.clone()
                };
                let slug = slugs.claim(slugify(&tag.name, strip), &fallback, tag.id);
                term_item(TermKind::Tag, tag.id, &tag.name, &slug, modified_utc)
            })
            .collect()
    }
}

fn term_item(kind: TermKind, id: u64, name: &str, slug: &str, modified_utc: &str) -> Value {
    let mut item = json!({
        "ContentItemId": term_id(kind, id),
        "ContentItemVersionId": null,
        "ContentType": kind.content_type(),
        "DisplayText": name,
        "Latest": true,
        "Published": true,
        "ModifiedUtc": modified_utc,
        "PublishedUtc": null,
        "CreatedUtc": null,
        "Owner": null,
        "Author": IMPORT_AUTHOR,
        "TitlePart": { "Title": name },
        "AutoroutePart": {
            "Path": format!("{}/{}", kind.route_prefix(), slug),
            "SetHomepage": false
        }
    });
    item[kind.content_type()] = json!({});
    item
}

/// Keeps route slugs unique within one taxonomy kind.
#[derive(Default)]
struct SlugRegistry {
    taken: HashSet<String>,
}

impl SlugRegistry {
    fn claim(&mut self, slug: String, fallback: &str, id: u64) -> String {
        let slug = if slug.is_empty() { fallback.to_string() } else { slug };
        if self.taken.insert(slug.clone()) {
            return slug;
        }
        let base = format!("{}-{}", slug, id);
        let mut unique = base.clone();
        let mut n = 2;
        while !self.taken.insert(unique.clone()) {
            unique = format!("{}-{}", base, n);
            n += 1;
        }
        debug!(slug = %slug, unique = %unique, "duplicate term slug");
        unique
    }
}
