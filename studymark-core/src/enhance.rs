// Link enhancement: turns the links of a rendered document into tracked
// checklist items

use crate::identity::derive_id;
use crate::progress::{LinkRecord, ProgressStore};
use ego_tree::NodeRef;
use scraper::node::{Element, Node};
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

/// Links to companion documents open inside the browser instead of leaving it.
///
/// A link is a companion link when its resolved URL contains `marker`. The
/// document opened is the last path segment of the URL, placed under
/// `directory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionRule {
    pub marker: String,
    pub directory: String,
}

impl Default for CompanionRule {
    fn default() -> Self {
        Self {
            marker: "_context.md".to_string(),
            directory: "content".to_string(),
        }
    }
}

impl CompanionRule {
    pub fn new(marker: impl Into<String>, directory: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            directory: directory.into(),
        }
    }

    /// A rule that never matches.
    pub fn disabled() -> Self {
        Self::new("", "")
    }

    /// Site-relative path of the companion document `url` points at.
    pub fn companion_path(&self, url: &str) -> Option<String> {
        if self.marker.is_empty() || !url.contains(&self.marker) {
            return None;
        }
        let filename = url.rsplit('/').next().filter(|name| !name.is_empty())?;
        let directory = self.directory.trim_end_matches('/');
        if directory.is_empty() {
            Some(filename.to_string())
        } else {
            Some(format!("{}/{}", directory, filename))
        }
    }
}

/// A link that received a checkbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedLink {
    pub id: String,
    /// Target resolved against the document URL.
    pub url: String,
    pub text: String,
    pub completed: bool,
    /// Document to open in place, for companion links.
    pub companion: Option<String>,
}

/// What the caller should do after a link was activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkActivation {
    /// Leave the browser for an external target.
    Navigate(String),
    /// Load this site-relative document and select it in the sidebar.
    OpenDocument(String),
}

#[derive(Debug, Clone)]
enum Segment {
    Markup(String),
    Control {
        index: usize,
        attrs: String,
        inner: String,
    },
}

/// A rendered document whose links have been wired to the progress store.
#[derive(Debug, Clone)]
pub struct EnhancedDocument {
    pub path: String,
    pub links: Vec<TrackedLink>,
    segments: Vec<Segment>,
}

impl EnhancedDocument {
    /// The enhanced HTML, decorated with the current completion state.
    pub fn html(&self) -> String {
        let mut html = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Markup(markup) => html.push_str(markup),
                Segment::Control {
                    index,
                    attrs,
                    inner,
                } => {
                    if let Some(link) = self.links.get(*index) {
                        write_control(&mut html, link, attrs, inner);
                    }
                }
            }
        }
        html
    }

    pub fn link(&self, index: usize) -> Option<&TrackedLink> {
        self.links.get(index)
    }

    /// Index of the link with `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.links.iter().position(|link| link.id == id)
    }

    pub fn completed_count(&self) -> usize {
        self.links.iter().filter(|link| link.completed).count()
    }

    /// Record for the progress registry of link `index`.
    pub fn record(&self, index: usize) -> Option<LinkRecord> {
        let link = self.links.get(index)?;
        Some(LinkRecord::new(
            link.url.clone(),
            link.text.clone(),
            self.path.clone(),
        ))
    }

    /// The checkbox of link `index` changed. Returns the new state.
    ///
    /// Repeats of the link elsewhere in the document share its id and follow
    /// the same state.
    pub fn on_checkbox_change(&mut self, index: usize, store: &mut ProgressStore) -> Option<bool> {
        let record = self.record(index)?;
        let id = self.links[index].id.clone();
        let completed = store.toggle(&id, &record);
        for link in self.links.iter_mut().filter(|link| link.id == id) {
            link.completed = completed;
        }
        Some(completed)
    }

    /// Link `index` was clicked.
    pub fn on_link_activated(&self, index: usize) -> Option<LinkActivation> {
        let link = self.links.get(index)?;
        match &link.companion {
            Some(path) => {
                info!("Opening companion document {}", path);
                Some(LinkActivation::OpenDocument(path.clone()))
            }
            None => Some(LinkActivation::Navigate(link.url.clone())),
        }
    }

    /// Re-read every link's state, e.g. after progress was cleared.
    pub fn sync_with(&mut self, store: &ProgressStore) {
        for link in &mut self.links {
            link.completed = store.is_completed(&link.id);
        }
    }
}

#[derive(Debug, Clone)]
struct PendingCheck {
    id: String,
    record: LinkRecord,
    due: Instant,
}

/// Activated links waiting to be checked off.
///
/// Entries carry everything needed to mark the link, so they survive the
/// document they were activated in being replaced.
#[derive(Debug, Clone)]
pub struct AutoCheckQueue {
    delay: Duration,
    pending: Vec<PendingCheck>,
}

impl AutoCheckQueue {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Vec::new(),
        }
    }

    /// Schedule link `index` of `document`. Links that are already checked
    /// or already waiting are left alone. Returns the time the check is due.
    pub fn schedule(
        &mut self,
        document: &EnhancedDocument,
        index: usize,
        now: Instant,
    ) -> Option<Instant> {
        let link = document.link(index)?;
        if link.completed {
            return None;
        }
        if let Some(pending) = self.pending.iter().find(|p| p.id == link.id) {
            return Some(pending.due);
        }

        debug!("Scheduling auto-check for {}", link.id);
        let due = now + self.delay;
        self.pending.push(PendingCheck {
            id: link.id.clone(),
            record: document.record(index)?,
            due,
        });
        Some(due)
    }

    /// Check off every entry due at `now`. Returns the ids that were checked.
    pub fn poll(&mut self, now: Instant, store: &mut ProgressStore) -> Vec<String> {
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|pending| pending.due <= now);
        self.pending = waiting;

        let mut checked = Vec::new();
        for pending in due {
            // the user may have ticked it in the meantime
            if store.is_completed(&pending.id) {
                continue;
            }
            if store.toggle(&pending.id, &pending.record) {
                checked.push(pending.id);
            }
        }
        checked
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Latest time any entry is due.
    pub fn last_due(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.due).max()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Rewrites rendered HTML so every qualifying link gets a checkbox.
#[derive(Debug, Clone, Default)]
pub struct LinkEnhancer {
    companion: CompanionRule,
}

impl LinkEnhancer {
    pub fn new(companion: CompanionRule) -> Self {
        Self { companion }
    }

    /// Enhance `html`, the rendered body of `document_path`.
    ///
    /// Every tracked link is registered in `store`. Links with an empty or
    /// fragment-only target, or without visible text, are left untouched.
    pub fn enhance(
        &self,
        html: &str,
        document_path: &str,
        base_url: &Url,
        store: &mut ProgressStore,
    ) -> EnhancedDocument {
        let fragment = Html::parse_fragment(html);
        let document_url = base_url.join(document_path).unwrap_or_else(|_| base_url.clone());
        let mut ctx = EnhanceContext::new(document_path, document_url, &self.companion, store);

        for child in fragment.root_element().children() {
            visit_node(child, &mut ctx);
        }

        let (segments, links) = ctx.into_output();
        info!(
            "Processed {} tracked links for {}",
            links.len(),
            document_path
        );

        EnhancedDocument {
            path: document_path.to_string(),
            links,
            segments,
        }
    }
}

/// Number of distinct links in `html` that would receive a checkbox.
///
/// Targets are resolved against `document_url` first, so `a.md` and `./a.md`
/// with the same text count once, as they share an id.
pub fn count_links(html: &str, document_url: &Url) -> usize {
    let fragment = Html::parse_fragment(html);
    fragment
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter_map(qualifying_link)
        .map(|(href, text)| (resolve(document_url, &href), text))
        .collect::<HashSet<_>>()
        .len()
}

fn resolve(document_url: &Url, href: &str) -> String {
    document_url
        .join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Raw href and trimmed visible text of a link that should be tracked.
fn qualifying_link(element: ElementRef) -> Option<(String, String)> {
    if !element.value().name().eq_ignore_ascii_case("a") {
        return None;
    }
    let href = element.value().attr("href")?.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let text = element.text().collect::<String>().trim().to_string();
    if text.is_empty() {
        return None;
    }
    Some((href.to_string(), text))
}

fn contains_tracked_link(element: ElementRef) -> bool {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .any(|el| qualifying_link(el).is_some())
}

struct EnhanceContext<'a> {
    document_path: &'a str,
    document_url: Url,
    companion: &'a CompanionRule,
    store: &'a mut ProgressStore,
    segments: Vec<Segment>,
    buffer: String,
    links: Vec<TrackedLink>,
}

impl<'a> EnhanceContext<'a> {
    fn new(
        document_path: &'a str,
        document_url: Url,
        companion: &'a CompanionRule,
        store: &'a mut ProgressStore,
    ) -> Self {
        Self {
            document_path,
            document_url,
            companion,
            store,
            segments: Vec::new(),
            buffer: String::new(),
            links: Vec::new(),
        }
    }

    fn track(&mut self, href: &str, text: String) -> usize {
        let url = resolve(&self.document_url, href);
        let id = derive_id(self.document_path, &url, &text);
        let completed = self.store.is_completed(&id);

        self.store
            .register_link(&id, &LinkRecord::new(url.clone(), text.clone(), self.document_path));
        debug!(
            "Link {}: \"{}\" | ID: {} | Completed: {}",
            self.links.len() + 1,
            text,
            id,
            completed
        );

        self.links.push(TrackedLink {
            companion: self.companion.companion_path(&url),
            id,
            url,
            text,
            completed,
        });
        self.links.len() - 1
    }

    fn push_control(&mut self, index: usize, attrs: String, inner: String) {
        if !self.buffer.is_empty() {
            self.segments
                .push(Segment::Markup(std::mem::take(&mut self.buffer)));
        }
        self.segments.push(Segment::Control {
            index,
            attrs,
            inner,
        });
    }

    fn into_output(mut self) -> (Vec<Segment>, Vec<TrackedLink>) {
        if !self.buffer.is_empty() {
            self.segments.push(Segment::Markup(self.buffer));
        }
        (self.segments, self.links)
    }
}

// Subtrees without a tracked link are copied through scraper's serializer.
// Only elements on the way to a tracked link are written here, and those
// never hold raw text.
fn visit_node(node: NodeRef<'_, Node>, ctx: &mut EnhanceContext) {
    match node.value() {
        Node::Text(text) => escape_text(text, &mut ctx.buffer),
        Node::Comment(comment) => {
            ctx.buffer.push_str("<!--");
            ctx.buffer.push_str(comment);
            ctx.buffer.push_str("-->");
        }
        Node::Element(element) => {
            let Some(el) = ElementRef::wrap(node) else {
                return;
            };
            if let Some((href, text)) = qualifying_link(el) {
                let index = ctx.track(&href, text);
                let attrs = attributes_without_class(element);
                ctx.push_control(index, attrs, el.inner_html());
            } else if contains_tracked_link(el) {
                visit_element(node, element, ctx);
            } else {
                ctx.buffer.push_str(&el.html());
            }
        }
        _ => {
            for child in node.children() {
                visit_node(child, ctx);
            }
        }
    }
}

fn visit_element(node: NodeRef<'_, Node>, element: &Element, ctx: &mut EnhanceContext) {
    let name = element.name();
    ctx.buffer.push('<');
    ctx.buffer.push_str(name);
    for (key, value) in element.attrs() {
        push_attr(&mut ctx.buffer, key, value);
    }
    ctx.buffer.push('>');
    for child in node.children() {
        visit_node(child, ctx);
    }
    ctx.buffer.push_str("</");
    ctx.buffer.push_str(name);
    ctx.buffer.push('>');
}

fn attributes_without_class(element: &Element) -> String {
    let mut attrs = String::new();
    for (key, value) in element.attrs().filter(|(key, _)| *key != "class") {
        push_attr(&mut attrs, key, value);
    }
    attrs
}

fn write_control(out: &mut String, link: &TrackedLink, attrs: &str, inner: &str) {
    let checkbox_id = format!("checkbox-{}", link.id);
    out.push_str(r#"<div class="study-link-wrapper">"#);
    out.push_str(r#"<input type="checkbox" class="study-checkbox""#);
    push_attr(out, "id", &checkbox_id);
    if link.completed {
        out.push_str(" checked");
    }
    out.push('>');
    out.push_str(r#"<label class="study-link-label""#);
    push_attr(out, "for", &checkbox_id);
    out.push('>');
    out.push_str("<a");
    push_attr(
        out,
        "class",
        if link.completed {
            "study-link completed"
        } else {
            "study-link"
        },
    );
    out.push_str(attrs);
    out.push('>');
    out.push_str(inner);
    out.push_str("</a></label></div>");
}

fn push_attr(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}
