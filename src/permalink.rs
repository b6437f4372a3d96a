//! Permalink and slug normalization.
//!
//! Every post and page link is rewritten once, after parsing, with one of
//! two strategies chosen by [`RecipeConfig::create_redirects`]:
//!
//! - **Relative**: scheme and host are stripped from the original URL
//!   (`http://example.com/2020/01/post-title/` → `2020/01/post-title`).
//! - **Redirect**: the relative form of the original URL is kept as
//!   `old_link` and a new link is synthesized from a title slug, prefixed
//!   with the publish date for posts (`/2020/03/04/whats-new`).

use chrono::NaiveDateTime;

use crate::config::RecipeConfig;
use crate::models::{ItemType, SourceItem};

/// Strips everything up to the host's trailing `/`.
///
/// `http://example.com/2020/01/post-title/` becomes `2020/01/post-title/`,
/// or `2020/01/post-title` when `strip_trailing_slash` is set. A URL
/// without a path yields an empty string.
pub fn sanitize_relative_path(url: &str, strip_trailing_slash: bool) -> String {
    let without_scheme = match url.find("//") {
        Some(pos) => &url[pos + 2..],
        None => url,
    };
    let path = match without_scheme.find('/') {
        Some(pos) => &without_scheme[pos + 1..],
        None => "",
    };
    if strip_trailing_slash {
        path.trim_end_matches('/').to_string()
    } else {
        path.to_string()
    }
}

/// Lowercase, hyphen-separated slug. The `strip` sequences are removed
/// before slugification so `"What's New?"` becomes `whats-new` rather than
/// `what-s-new-`.
pub fn slugify(text: &str, strip: &[String]) -> String {
    let mut cleaned = text.to_string();
    for pattern in strip.iter().filter(|p| !p.is_empty()) {
        cleaned = cleaned.replace(pattern.as_str(), "");
    }

    let mut slug = String::with_capacity(cleaned.len());
    let mut pending_separator = false;
    for c in cleaned.chars() {
        if c.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_separator = true;
        }
    }
    slug
}

/// Date prefix for post permalinks, written with .NET-style tokens
/// (`yyyy/MM/dd`) and rendered through chrono.
#[derive(Debug, Clone)]
pub struct PermalinkPattern {
    format: String,
}

impl PermalinkPattern {
    pub fn parse(pattern: &str) -> Self {
        let chars: Vec<char> = pattern.chars().collect();
        let mut format = String::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let mut run = 1;
            while i + run < chars.len() && chars[i + run] == c {
                run += 1;
            }
            i += run;

            let mut remaining = run;
            while remaining > 0 {
                match token(c, remaining) {
                    Some((len, spec)) => {
                        format.push_str(spec);
                        remaining -= len;
                    }
                    None => {
                        if c == '%' {
                            format.push_str("%%");
                        } else {
                            format.push(c);
                        }
                        remaining -= 1;
                    }
                }
            }
        }

        Self { format }
    }

    pub fn render(&self, timestamp: &NaiveDateTime) -> String {
        timestamp.format(&self.format).to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.format.is_empty()
    }
}

/// Longest token of character `c` that fits in a run of `run` repeats.
fn token(c: char, run: usize) -> Option<(usize, &'static str)> {
    let candidates: &[(usize, &'static str)] = match c {
        'y' => &[(4, "%Y"), (2, "%y")],
        'M' => &[(2, "%m"), (1, "%-m")],
        'd' => &[(2, "%d"), (1, "%-d")],
        'H' => &[(2, "%H"), (1, "%-H")],
        'm' => &[(2, "%M")],
        's' => &[(2, "%S")],
        _ => &[],
    };
    candidates.iter().copied().find(|(len, _)| *len <= run)
}

/// How post and page links are rewritten.
#[derive(Debug, Clone)]
pub enum LinkStrategy {
    Relative {
        strip_trailing_slash: bool,
    },
    Redirect {
        pattern: PermalinkPattern,
        strip: Vec<String>,
    },
}

impl LinkStrategy {
    pub fn from_config(config: &RecipeConfig) -> Self {
        if config.create_redirects {
            LinkStrategy::Redirect {
                pattern: PermalinkPattern::parse(&config.permalink_structure),
                strip: config.slug_strip_chars.clone(),
            }
        } else {
            LinkStrategy::Relative {
                strip_trailing_slash: config.strip_trailing_slash,
            }
        }
    }

    /// Rewrites `link` (and `old_link` in redirect mode) for every post and
    /// page. Running it twice rewrites the already-rewritten links.
    pub fn apply(&self, items: &mut [SourceItem]) {
        for item in items.iter_mut().filter(|i| i.item_type.is_routable()) {
            match self {
                LinkStrategy::Relative {
                    strip_trailing_slash,
                } => {
                    item.link = sanitize_relative_path(&item.link, *strip_trailing_slash);
                }
                LinkStrategy::Redirect { pattern, strip } => {
                    let relative = sanitize_relative_path(&item.link, true);
                    item.old_link = Some(format!("/{}", relative.trim_matches('/')));
                    item.link = redirect_link(item, pattern, strip);
                }
            }
        }
    }
}

fn redirect_link(item: &SourceItem, pattern: &PermalinkPattern, strip: &[String]) -> String {
    let mut slug = slugify(&item.title, strip);
    if slug.is_empty() {
        slug = item.id.to_string();
    }

    match (&item.item_type, item.published_at) {
        (ItemType::Post, Some(ts)) if !pattern.is_empty() => {
            let prefix = pattern.render(&ts);
            let prefix = prefix.trim_matches('/');
            if prefix.is_empty() {
                format!("/{}", slug)
            } else {
                format!("/{}/{}", prefix, slug)
            }
        }
        _ => format!("/{}", slug),
    }
}
