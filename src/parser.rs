//! Streaming WXR (WordPress eXtended RSS) reader.
//!
//! The export is consumed as a forward-only event stream with `quick-xml`;
//! the document is never materialized as a tree. The top level walks into
//! `<rss>` and `<channel>` and dispatches each recognized element to a
//! record parser that consumes exactly that element's subtree:
//!
//! | Element | Record |
//! |---------|--------|
//! | `<item>` | [`SourceItem`] |
//! | `<wp:category>` | [`Category`] |
//! | `<wp:tag>` | [`Tag`] |
//! | `<title>`, `<description>` | site metadata (first occurrence) |
//!
//! Everything else is skipped as a whole subtree, so unknown elements never
//! fail the run. Element names are compared in their qualified form because
//! WXR reuses local names across namespaces (`<category>` inside an item is
//! not `<wp:category>`).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::NaiveDateTime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::models::{Category, Export, ItemType, SourceItem, Tag};

/// Post metadata key holding the attachment id of the featured image.
const THUMBNAIL_META_KEY: &str = "_thumbnail_id";

const WP_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse_export_file(path: &Path) -> Result<Export, ParseError> {
    let file = File::open(path)?;
    ExportParser::new(BufReader::new(file)).parse()
}

pub fn parse_export_str(xml: &str) -> Result<Export, ParseError> {
    ExportParser::new(xml.as_bytes()).parse()
}

/// Recursive-descent reader over the `quick-xml` event stream.
pub struct ExportParser<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
}

impl<R: BufRead> ExportParser<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
        }
    }

    pub fn parse(mut self) -> Result<Export, ParseError> {
        let mut export = Export::default();
        let mut open_containers: Vec<String> = Vec::new();

        loop {
            match self.next_event()? {
                Event::Start(start) => {
                    let name = qualified_name(&start);
                    match name.as_str() {
                        "rss" | "channel" => open_containers.push(name),
                        "title" => {
                            let title = self.read_text(&name)?;
                            export.site_title.get_or_insert(title.trim().to_string());
                        }
                        "description" => {
                            let description = self.read_text(&name)?;
                            export
                                .site_description
                                .get_or_insert(description.trim().to_string());
                        }
                        "item" => export.items.push(self.parse_item()?),
                        "wp:category" => export.categories.push(self.parse_category()?),
                        "wp:tag" => export.tags.push(self.parse_tag()?),
                        _ => {
                            debug!(element = %name, "skipping element");
                            self.skip(&name)?;
                        }
                    }
                }
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    if open_containers.last() == Some(&name) {
                        open_containers.pop();
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(element) = open_containers.pop() {
            return Err(ParseError::Unterminated { element });
        }

        Ok(export)
    }

    fn parse_item(&mut self) -> Result<SourceItem, ParseError> {
        let mut item = SourceItem::default();
        let mut content: Option<String> = None;
        let mut description: Option<String> = None;

        loop {
            match self.next_event()? {
                Event::Start(start) => {
                    let name = qualified_name(&start);
                    match name.as_str() {
                        "title" => item.title = self.read_trimmed(&name)?,
                        "link" => item.link = self.read_trimmed(&name)?,
                        "wp:post_date" => {
                            item.published_at = parse_wp_date(&self.read_text(&name)?)
                        }
                        "dc:creator" => item.author = self.read_trimmed(&name)?,
                        "description" => description = Some(self.read_text(&name)?),
                        "content:encoded" => content = Some(self.read_text(&name)?),
                        "excerpt:encoded" => item.excerpt = self.read_text(&name)?,
                        "wp:post_id" => item.id = self.read_number(&name)?,
                        "wp:status" => item.status = self.read_trimmed(&name)?,
                        "wp:post_parent" => item.parent_id = self.read_number(&name)?,
                        "wp:post_type" => {
                            item.item_type = ItemType::from_wp(&self.read_text(&name)?)
                        }
                        "wp:attachment_url" => {
                            let url = self.read_trimmed(&name)?;
                            item.attachment_url = Some(url).filter(|u| !u.is_empty());
                        }
                        "category" => {
                            let label = self.read_trimmed(&name)?;
                            add_term_reference(&mut item, &start, &label);
                        }
                        "wp:postmeta" => {
                            if let Some(id) = self.parse_postmeta()? {
                                item.thumbnail_id = Some(id);
                            }
                        }
                        _ => self.skip(&name)?,
                    }
                }
                Event::Empty(start) => {
                    if start.name().as_ref() == b"category" {
                        add_term_reference(&mut item, &start, "");
                    }
                }
                Event::End(end) if end.name().as_ref() == b"item" => break,
                Event::Eof => {
                    return Err(ParseError::Unterminated {
                        element: "item".to_string(),
                    })
                }
                _ => {}
            }
        }

        item.body = content
            .filter(|c| !c.is_empty())
            .or(description)
            .unwrap_or_default();
        Ok(item)
    }

    /// Reads one `<wp:postmeta>` pair. Returns the thumbnail id when the key
    /// is the featured-image key, whatever order key and value appear in.
    fn parse_postmeta(&mut self) -> Result<Option<u64>, ParseError> {
        let mut key: Option<String> = None;
        let mut value: Option<String> = None;

        loop {
            match self.next_event()? {
                Event::Start(start) => {
                    let name = qualified_name(&start);
                    match name.as_str() {
                        "wp:meta_key" => key = Some(self.read_trimmed(&name)?),
                        "wp:meta_value" => value = Some(self.read_trimmed(&name)?),
                        _ => self.skip(&name)?,
                    }
                }
                Event::End(end) if end.name().as_ref() == b"wp:postmeta" => break,
                Event::Eof => {
                    return Err(ParseError::Unterminated {
                        element: "wp:postmeta".to_string(),
                    })
                }
                _ => {}
            }
        }

        if key.as_deref() != Some(THUMBNAIL_META_KEY) {
            return Ok(None);
        }
        let value = value.unwrap_or_default();
        match value.parse::<u64>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                warn!(value = %value, "ignoring non-numeric thumbnail id");
                Ok(None)
            }
        }
    }

    fn parse_category(&mut self) -> Result<Category, ParseError> {
        let mut category = Category::default();

        loop {
            match self.next_event()? {
                Event::Start(start) => {
                    let name = qualified_name(&start);
                    match name.as_str() {
                        "wp:term_id" => category.id = self.read_number(&name)?,
                        "wp:category_nicename" => category.nice_name = self.read_trimmed(&name)?,
                        "wp:category_parent" => category.parent = self.read_trimmed(&name)?,
                        "wp:cat_name" => category.name = self.read_trimmed(&name)?,
                        "wp:category_description" => {
                            category.description = self.read_trimmed(&name)?
                        }
                        _ => self.skip(&name)?,
                    }
                }
                Event::End(end) if end.name().as_ref() == b"wp:category" => break,
                Event::Eof => {
                    return Err(ParseError::Unterminated {
                        element: "wp:category".to_string(),
                    })
                }
                _ => {}
            }
        }

        Ok(category)
    }

    fn parse_tag(&mut self) -> Result<Tag, ParseError> {
        let mut tag = Tag::default();

        loop {
            match self.next_event()? {
                Event::Start(start) => {
                    let name = qualified_name(&start);
                    match name.as_str() {
                        "wp:term_id" => tag.id = self.read_number(&name)?,
                        "wp:tag_slug" => tag.slug = self.read_trimmed(&name)?,
                        "wp:tag_name" => tag.name = self.read_trimmed(&name)?,
                        "wp:tag_description" => tag.description = self.read_trimmed(&name)?,
                        _ => self.skip(&name)?,
                    }
                }
                Event::End(end) if end.name().as_ref() == b"wp:tag" => break,
                Event::Eof => {
                    return Err(ParseError::Unterminated {
                        element: "wp:tag".to_string(),
                    })
                }
                _ => {}
            }
        }

        Ok(tag)
    }

    /// Concatenated text and CDATA content of the current element, up to
    /// and including its closing tag.
    fn read_text(&mut self, element: &str) -> Result<String, ParseError> {
        let mut text = String::new();
        let mut depth = 0usize;

        loop {
            match self.next_event()? {
                Event::Text(t) => {
                    let unescaped = t.unescape().map_err(|e| self.xml_error(e))?;
                    text.push_str(&unescaped);
                }
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
                Event::Start(_) => depth += 1,
                Event::End(end) => {
                    if depth == 0 && end.name().as_ref() == element.as_bytes() {
                        break;
                    }
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => {
                    return Err(ParseError::Unterminated {
                        element: element.to_string(),
                    })
                }
                _ => {}
            }
        }

        Ok(text)
    }

    fn read_trimmed(&mut self, element: &str) -> Result<String, ParseError> {
        Ok(self.read_text(element)?.trim().to_string())
    }

    fn read_number(&mut self, element: &str) -> Result<u64, ParseError> {
        let value = self.read_trimmed(element)?;
        if value.is_empty() {
            return Ok(0);
        }
        value.parse().map_err(|_| ParseError::InvalidNumber {
            element: element.to_string(),
            value,
        })
    }

    /// Consumes the rest of the current element's subtree.
    fn skip(&mut self, element: &str) -> Result<(), ParseError> {
        self.buf.clear();
        match self
            .reader
            .read_to_end_into(QName(element.as_bytes()), &mut self.buf)
        {
            Ok(_) => Ok(()),
            Err(e) => Err(self.xml_error(e)),
        }
    }

    fn next_event(&mut self) -> Result<Event<'static>, ParseError> {
        self.buf.clear();
        let result = self.reader.read_event_into(&mut self.buf);
        match result {
            Ok(event) => Ok(event.into_owned()),
            Err(source) => Err(ParseError::Xml {
                position: self.reader.buffer_position() as u64,
                source,
            }),
        }
    }

    fn xml_error(&self, source: quick_xml::Error) -> ParseError {
        ParseError::Xml {
            position: self.reader.buffer_position() as u64,
            source,
        }
    }
}

fn qualified_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

fn attribute(start: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// `<category domain="category" nicename="news">` references a category,
/// `domain="post_tag"` a tag. Other domains (post formats, menus) are ignored.
fn add_term_reference(item: &mut SourceItem, start: &BytesStart<'_>, label: &str) {
    let nice_name = attribute(start, b"nicename").unwrap_or_else(|| label.to_string());
    if nice_name.is_empty() {
        return;
    }
    match attribute(start, b"domain").as_deref() {
        Some("category") => item.categories.push(nice_name),
        Some("post_tag") => item.tags.push(nice_name),
        other => debug!(domain = ?other, term = %nice_name, "ignoring term reference"),
    }
}

/// WordPress writes `0000-00-00 00:00:00` for never-published drafts.
fn parse_wp_date(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), WP_DATE_FORMAT).ok()
}
