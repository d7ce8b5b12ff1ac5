// Markdown to HTML rendering

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd};
use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_HEADING_PREFIX: &str = "heading-";
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("document is not valid UTF-8: {0}")]
    InvalidEncoding(String),

    #[error("document is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },
}

/// Renderer switches. The defaults are the fixed set documents are shown
/// with.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Render single newlines as `<br />`.
    pub hard_breaks: bool,
    /// Tables, strikethrough, task lists and footnotes.
    pub gfm: bool,
    /// Give every heading an `id` anchor.
    pub heading_ids: bool,
    /// Prefix of heading anchors, so they cannot clash with page anchors.
    pub heading_prefix: String,
    pub max_bytes: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            hard_breaks: true,
            gfm: true,
            heading_ids: true,
            heading_prefix: DEFAULT_HEADING_PREFIX.to_string(),
            max_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    options: RenderOptions,
}

impl MarkdownRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Render a fetched document body.
    pub fn render_bytes(&self, bytes: &[u8]) -> Result<String, RenderError> {
        if bytes.len() > self.options.max_bytes {
            return Err(RenderError::TooLarge {
                size: bytes.len(),
                limit: self.options.max_bytes,
            });
        }
        let text =
            std::str::from_utf8(bytes).map_err(|e| RenderError::InvalidEncoding(e.to_string()))?;
        Ok(self.render(text))
    }

    pub fn render(&self, text: &str) -> String {
        let mut options = Options::empty();
        if self.options.gfm {
            options.insert(Options::ENABLE_TABLES);
            options.insert(Options::ENABLE_STRIKETHROUGH);
            options.insert(Options::ENABLE_TASKLISTS);
            options.insert(Options::ENABLE_FOOTNOTES);
        }

        let hard_breaks = self.options.hard_breaks;
        let mut events: Vec<Event> = Parser::new_ext(text, options)
            .map(|event| match event {
                Event::SoftBreak if hard_breaks => Event::HardBreak,
                other => other,
            })
            .collect();

        if self.options.heading_ids {
            assign_heading_ids(&mut events, &self.options.heading_prefix);
        }

        let mut html = String::with_capacity(text.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut html, events.into_iter());
        html
    }
}

fn assign_heading_ids(events: &mut [Event], prefix: &str) {
    let mut slugger = Slugger::default();

    for start in 0..events.len() {
        if !matches!(events[start], Event::Start(Tag::Heading { id: None, .. })) {
            continue;
        }

        let mut text = String::new();
        for event in &events[start + 1..] {
            match event {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(t) | Event::Code(t) => text.push_str(t),
                _ => {}
            }
        }

        let anchor = format!("{}{}", prefix, slugger.slug(&text));
        if let Event::Start(Tag::Heading { id, .. }) = &mut events[start] {
            *id = Some(CowStr::from(anchor));
        }
    }
}

/// GitHub-style heading slugs; repeats get `-1`, `-2`, ...
#[derive(Debug, Default)]
struct Slugger {
    seen: HashMap<String, usize>,
}

impl Slugger {
    fn slug(&mut self, heading: &str) -> String {
        let base = slugify(heading);
        let mut slug = base.clone();

        if self.seen.contains_key(&slug) {
            loop {
                let count = self.seen.entry(base.clone()).or_insert(0);
                *count += 1;
                slug = format!("{}-{}", base, count);
                if !self.seen.contains_key(&slug) {
                    break;
                }
            }
        }

        self.seen.insert(slug.clone(), 0);
        slug
    }
}

fn slugify(heading: &str) -> String {
    heading
        .trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('-')
            } else if c == '-' || c == '_' {
                Some(c)
            } else if c.is_ascii_punctuation() || is_general_punctuation(c) {
                None
            } else {
                Some(c)
            }
        })
        .collect()
}

fn is_general_punctuation(c: char) -> bool {
    matches!(c, '\u{2000}'..='\u{206F}' | '\u{2E00}'..='\u{2E7F}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  What's LoRA?  "), "whats-lora");
        assert_eq!(slugify("snake_case & kebab-case"), "snake_case--kebab-case");
    }

    #[test]
    fn test_slugger_deduplicates() {
        let mut slugger = Slugger::default();
        assert_eq!(slugger.slug("Intro"), "intro");
        assert_eq!(slugger.slug("Intro"), "intro-1");
        assert_eq!(slugger.slug("Intro"), "intro-2");
        assert_eq!(slugger.slug("Intro 1"), "intro-1-1");
    }

    #[test]
    fn test_render_heading_anchors_are_prefixed() {
        let html = MarkdownRenderer::default().render("# Tokenization\n\n## Tokenization\n");
        assert!(html.contains(r#"<h1 id="heading-tokenization">"#));
        assert!(html.contains(r#"<h2 id="heading-tokenization-1">"#));
    }

    #[test]
    fn test_render_soft_breaks_become_hard_breaks() {
        let html = MarkdownRenderer::default().render("line one\nline two\n");
        assert!(html.contains("<br />"));

        let plain = MarkdownRenderer::new(RenderOptions {
            hard_breaks: false,
            ..RenderOptions::default()
        })
        .render("line one\nline two\n");
        assert!(!plain.contains("<br />"));
    }

    #[test]
    fn test_render_gfm_tables_and_strikethrough() {
        let html = MarkdownRenderer::default().render("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn test_render_bytes_rejects_invalid_input() {
        let renderer = MarkdownRenderer::default();
        assert!(matches!(
            renderer.render_bytes(&[0xff, 0xfe, 0x00]),
            Err(RenderError::InvalidEncoding(_))
        ));

        let small = MarkdownRenderer::new(RenderOptions {
            max_bytes: 4,
            ..RenderOptions::default()
        });
        assert!(matches!(
            small.render_bytes(b"# too long"),
            Err(RenderError::TooLarge { size: 10, limit: 4 })
        ));
    }
}
