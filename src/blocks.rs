//! HTML to editor.js block conversion.
//!
//! WordPress post bodies are mostly line-oriented: the classic editor
//! stores paragraphs as text separated by blank lines and only wraps
//! headings, embeds and media in tags. [`convert`] splits a body on line
//! boundaries and classifies each line into one editor.js block.

use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use url::Url;

pub const EDITOR_VERSION: &str = "2.15.0";

const EMBED_WIDTH: u32 = 580;
const EMBED_HEIGHT: u32 = 320;

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "youtu.be",
    "www.youtube-nocookie.com",
];

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r\n\r\n|\r\r|\n\n|\n").unwrap());
static IMG_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*>").unwrap());
static SIZE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s(?:width|height)\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).unwrap()
});
static EMPTY_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<p(?:\s[^>]*)?>(?:\s|&nbsp;|<br\s*/?>)*</p>").unwrap()
});
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^<h([1-6])\b").unwrap());
static PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^<p(?:\s[^>]*)?>(.*)</p>$").unwrap());
static OPEN_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<p[\s>]").unwrap());
static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockDocument {
    /// Capture time in milliseconds since the Unix epoch.
    pub time: i64,
    pub blocks: Vec<Block>,
    pub version: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Block {
    Header {
        text: String,
        level: u8,
    },
    Paragraph {
        text: String,
    },
    Raw {
        html: String,
    },
    Embed {
        service: String,
        source: String,
        embed: String,
        width: u32,
        height: u32,
        caption: String,
    },
}

pub fn convert(html: &str) -> BlockDocument {
    let cleaned = strip_image_sizes(html);
    let cleaned = EMPTY_PARAGRAPH.replace_all(&cleaned, "");

    let blocks = LINE_BREAK
        .split(&cleaned)
        .filter_map(classify)
        .collect();

    BlockDocument {
        time: Utc::now().timestamp_millis(),
        blocks,
        version: EDITOR_VERSION,
    }
}

fn strip_image_sizes(html: &str) -> String {
    IMG_TAG
        .replace_all(html, |caps: &regex::Captures| {
            SIZE_ATTR.replace_all(&caps[0], "").into_owned()
        })
        .into_owned()
}

fn classify(line: &str) -> Option<Block> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("<!--") {
        return None;
    }

    if let Some(caps) = HEADING.captures(line) {
        let level = caps[1].parse().unwrap_or(2);
        return Some(Block::Header {
            text: strip_tags(line),
            level,
        });
    }

    if let Some(id) = youtube_id(line) {
        return Some(Block::Embed {
            service: "youtube".to_string(),
            source: line.to_string(),
            embed: format!("https://www.youtube.com/embed/{}", id),
            width: EMBED_WIDTH,
            height: EMBED_HEIGHT,
            caption: String::new(),
        });
    }

    if let Some(caps) = PARAGRAPH.captures(line) {
        let inner = &caps[1];
        // `<p>a</p><p>b</p>` spans several elements and stays raw.
        if !OPEN_PARAGRAPH.is_match(inner) && !inner.to_ascii_lowercase().contains("</p>") {
            return Some(Block::Paragraph {
                text: inner.trim().to_string(),
            });
        }
    }

    if line.starts_with('<') {
        return Some(Block::Raw {
            html: line.to_string(),
        });
    }

    Some(Block::Paragraph {
        text: line.to_string(),
    })
}

/// Text content with tags removed and entities decoded.
fn strip_tags(html: &str) -> String {
    let fragment = scraper::Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    text.trim().to_string()
}

/// Video id of a line that consists of nothing but a YouTube URL.
fn youtube_id(line: &str) -> Option<String> {
    if line.contains(char::is_whitespace) || line.contains('<') {
        return None;
    }
    let url = Url::parse(line).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    if !YOUTUBE_HOSTS.contains(&host) {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let candidate = if host == "youtu.be" {
        segments.next().map(str::to_string)
    } else {
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some("embed") | Some("v") | Some("shorts") => segments.next().map(str::to_string),
            _ => None,
        }
    };

    candidate.filter(|id| VIDEO_ID.is_match(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_and_paragraph() {
        let doc = convert("<h2>Title</h2>\n\nSome text");
        assert_eq!(
            doc.blocks,
            vec![
                Block::Header {
                    text: "Title".to_string(),
                    level: 2
                },
                Block::Paragraph {
                    text: "Some text".to_string()
                },
            ]
        );
        assert_eq!(doc.version, EDITOR_VERSION);
    }

    #[test]
    fn bare_youtube_url_becomes_embed() {
        let doc = convert("https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(doc.blocks.len(), 1);
        match &doc.blocks[0] {
            Block::Embed { embed, service, width, height, .. } => {
                assert_eq!(service, "youtube");
                assert_eq!(embed, "https://www.youtube.com/embed/dQw4w9WgXcQ");
                assert_eq!((*width, *height), (580, 320));
            }
            other => panic!("expected embed, got {:?}", other),
        }
    }

    #[test]
    fn short_links_and_other_hosts() {
        assert_eq!(youtube_id("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(
            youtube_id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(youtube_id("https://vimeo.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(youtube_id("https://www.youtube.com/watch?v=short"), None);
        assert_eq!(youtube_id("see https://youtu.be/dQw4w9WgXcQ"), None);
    }

    #[test]
    fn comments_and_blank_lines_are_dropped() {
        let doc = convert("<!-- wp:paragraph -->\n\n   \n<p>Hello <em>there</em></p>\n<!-- /wp:paragraph -->");
        assert_eq!(
            doc.blocks,
            vec![Block::Paragraph {
                text: "Hello <em>there</em>".to_string()
            }]
        );
    }

    #[test]
    fn other_markup_is_raw_without_image_sizes() {
        let doc = convert(r#"<figure><img src="a.jpg" width="300" height="200" alt="A"></figure>"#);
        assert_eq!(
            doc.blocks,
            vec![Block::Raw {
                html: r#"<figure><img src="a.jpg" alt="A"></figure>"#.to_string()
            }]
        );
    }

    #[test]
    fn empty_paragraph_shells_are_removed() {
        let doc = convert("<p>&nbsp;</p>\n<p></p>\nText");
        assert_eq!(
            doc.blocks,
            vec![Block::Paragraph {
                text: "Text".to_string()
            }]
        );
    }

    #[test]
    fn header_text_is_decoded() {
        let doc = convert("<h3 id=\"x\"><a href=\"#\">Fish &amp; Chips</a></h3>");
        assert_eq!(
            doc.blocks,
            vec![Block::Header {
                text: "Fish & Chips".to_string(),
                level: 3
            }]
        );
    }

    #[test]
    fn serializes_editor_js_shape() {
        let doc = convert("<h1>A</h1>");
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["version"], "2.15.0");
        assert_eq!(value["blocks"][0]["type"], "header");
        assert_eq!(value["blocks"][0]["data"]["level"], 1);
        assert!(value["time"].as_i64().unwrap() > 1_600_000_000_000);
    }

    #[test]
    fn several_paragraphs_on_one_line_stay_raw() {
        let doc = convert("<p>a</p><p>b</p>");
        assert_eq!(
            doc.blocks,
            vec![Block::Raw {
                html: "<p>a</p><p>b</p>".to_string()
            }]
        );

        let doc = convert("<p class=\"lead\">Hello <em>there</em></p>");
        assert_eq!(
            doc.blocks,
            vec![Block::Paragraph {
                text: "Hello <em>there</em>".to_string()
            }]
        );
    }
}
