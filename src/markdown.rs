//! HTML to CommonMark conversion for Markdown-bodied posts.
//!
//! Walks the parsed fragment and writes Markdown directly. Elements without
//! a Markdown equivalent pass their children through; `script` and `style`
//! are dropped. Text outside any block element keeps WordPress's blank-line
//! paragraph breaks.

use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::sync::LazyLock;

static BLANK_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n[ \t]*\r?\n\s*").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static EXTRA_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

pub fn to_markdown(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut writer = MarkdownWriter::default();
    writer.children(fragment.root_element());
    finish(&writer.out)
}

fn finish(markdown: &str) -> String {
    EXTRA_NEWLINES
        .replace_all(markdown, "\n\n")
        .trim()
        .to_string()
}

/// Renders an element's children into a fresh writer.
fn render_detached(element: ElementRef<'_>) -> String {
    let mut writer = MarkdownWriter::default();
    writer.children(element);
    finish(&writer.out)
}

struct ListState {
    ordered: bool,
    next: usize,
}

#[derive(Default)]
struct MarkdownWriter {
    out: String,
    lists: Vec<ListState>,
}

impl MarkdownWriter {
    fn children(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.text(text),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.element(child);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();
        match name {
            "script" | "style" | "head" | "title" => {}
            "p" | "div" | "section" | "article" | "figure" | "figcaption" => {
                if self.lists.is_empty() {
                    self.block_break();
                    self.children(element);
                    self.block_break();
                } else {
                    self.children(element);
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let text = render_detached(element).replace('\n', " ");
                self.block_break();
                self.out.push_str(&"#".repeat(level));
                self.out.push(' ');
                self.out.push_str(text.trim());
                self.block_break();
            }
            "strong" | "b" => self.wrap_inline(element, "**"),
            "em" | "i" => self.wrap_inline(element, "*"),
            "code" => {
                let code: String = element.text().collect();
                self.inline("`");
                self.out.push_str(&code);
                self.out.push('`');
            }
            "pre" => {
                let code: String = element.text().collect();
                self.block_break();
                self.out.push_str("```\n");
                self.out.push_str(code.trim_end_matches('\n'));
                self.out.push_str("\n```");
                self.block_break();
            }
            "a" => match element.value().attr("href") {
                Some(href) => {
                    self.inline("[");
                    self.children(element);
                    self.out.push_str("](");
                    self.out.push_str(href);
                    self.out.push(')');
                }
                None => self.children(element),
            },
            "img" => {
                let src = element.value().attr("src").unwrap_or_default();
                let alt = element.value().attr("alt").unwrap_or_default();
                self.inline(&format!("![{}]({})", alt, src));
            }
            "br" => {
                self.trim_trailing_spaces();
                self.out.push_str("  \n");
            }
            "hr" => {
                self.block_break();
                self.out.push_str("---");
                self.block_break();
            }
            "blockquote" => {
                let quoted = render_detached(element);
                self.block_break();
                let lines: Vec<String> = quoted
                    .lines()
                    .map(|line| {
                        if line.is_empty() {
                            ">".to_string()
                        } else {
                            format!("> {}", line)
                        }
                    })
                    .collect();
                self.out.push_str(&lines.join("\n"));
                self.block_break();
            }
            "ul" | "ol" => {
                if self.lists.is_empty() {
                    self.block_break();
                } else {
                    self.newline();
                }
                let start = element
                    .value()
                    .attr("start")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1);
                self.lists.push(ListState {
                    ordered: name == "ol",
                    next: start,
                });
                self.children(element);
                self.lists.pop();
                if self.lists.is_empty() {
                    self.block_break();
                }
            }
            "li" => {
                self.newline();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(list) if list.ordered => {
                        let marker = format!("{}. ", list.next);
                        list.next += 1;
                        marker
                    }
                    _ => "- ".to_string(),
                };
                self.out.push_str(&"    ".repeat(depth));
                self.out.push_str(&marker);
                self.children(element);
            }
            _ => self.children(element),
        }
    }

    fn wrap_inline(&mut self, element: ElementRef<'_>, marker: &str) {
        let raw: String = element.text().collect();
        let inner = render_detached(element);
        let inner = inner.trim();
        if inner.is_empty() {
            if raw.contains(char::is_whitespace) {
                self.inline(" ");
            }
            return;
        }
        // Markers must hug the text, so edge whitespace moves outside them.
        if raw.starts_with(char::is_whitespace) {
            self.inline(" ");
        }
        self.inline(marker);
        self.out.push_str(inner);
        self.out.push_str(marker);
        if raw.ends_with(char::is_whitespace) {
            self.out.push(' ');
        }
    }

    fn text(&mut self, text: &str) {
        for (i, paragraph) in BLANK_LINE.split(text).enumerate() {
            if i > 0 && self.lists.is_empty() {
                self.block_break();
            }
            let collapsed = WHITESPACE.replace_all(paragraph, " ");
            self.inline(&collapsed);
        }
    }

    fn inline(&mut self, s: &str) {
        if self.at_line_start() || self.out.ends_with(' ') {
            self.out.push_str(s.trim_start());
        } else {
            self.out.push_str(s);
        }
    }

    fn at_line_start(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n') || self.ends_with_list_marker()
    }

    fn ends_with_list_marker(&self) -> bool {
        !self.lists.is_empty() && (self.out.ends_with("- ") || self.out.ends_with(". "))
    }

    fn trim_trailing_spaces(&mut self) {
        let len = self.out.trim_end_matches([' ', '\t']).len();
        self.out.truncate(len);
    }

    fn newline(&mut self) {
        self.trim_trailing_spaces();
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn block_break(&mut self) {
        self.trim_trailing_spaces();
        if self.out.is_empty() {
            return;
        }
        while !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }
}
