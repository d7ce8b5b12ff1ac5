// Document viewer: fetch, render and enhance one document at a time

use crate::config::BrowserConfig;
use crate::enhance::{EnhancedDocument, LinkEnhancer};
use crate::progress::ProgressStore;
use crate::render::{MarkdownRenderer, RenderError};
use studymark_site::{SiteError, SiteSource};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Error loading file: {0}")]
    Fetch(#[from] SiteError),

    #[error("Error rendering file: {0}")]
    Render(#[from] RenderError),
}

/// Result of fetching a document, ready to be applied to a viewer.
#[derive(Debug)]
pub struct LoadOutcome {
    pub path: String,
    pub result: Result<Vec<u8>, SiteError>,
}

/// Fetch the raw bytes of `path`.
///
/// Kept apart from [`DocumentViewer::apply`] so several loads can be in
/// flight while the viewer stays owned by one task. Outcomes are applied in
/// arrival order; a slow early request can replace a later one.
pub async fn fetch_document(source: &dyn SiteSource, path: &str) -> LoadOutcome {
    debug!("Fetching {} from {}", path, source.describe());
    LoadOutcome {
        path: path.to_string(),
        result: source.fetch(path).await,
    }
}

#[derive(Debug, Clone, Default)]
pub enum ViewerContent {
    #[default]
    Welcome,
    Document(EnhancedDocument),
}

pub struct DocumentViewer {
    renderer: MarkdownRenderer,
    enhancer: LinkEnhancer,
    base_url: Url,
    content: ViewerContent,
    active: Option<String>,
    loading: Option<String>,
    error: Option<String>,
}

impl DocumentViewer {
    pub fn new(renderer: MarkdownRenderer, enhancer: LinkEnhancer, base_url: Url) -> Self {
        Self {
            renderer,
            enhancer,
            base_url,
            content: ViewerContent::Welcome,
            active: None,
            loading: None,
            error: None,
        }
    }

    pub fn from_config(config: &BrowserConfig, base_url: Url) -> Self {
        Self::new(
            MarkdownRenderer::new(config.render_options()),
            LinkEnhancer::new(config.companion.clone()),
            base_url,
        )
    }

    /// Mark `path` as loading. Content and selection stay as they are.
    pub fn begin_load(&mut self, path: &str) {
        debug!("Loading {}", path);
        self.loading = Some(path.to_string());
    }

    /// Apply a fetch outcome.
    ///
    /// On failure the error is kept for display and the previous document
    /// and selection are left in place.
    pub fn apply(&mut self, outcome: LoadOutcome, store: &mut ProgressStore) -> Result<(), LoadError> {
        if self.loading.as_deref() == Some(outcome.path.as_str()) {
            self.loading = None;
        }

        let rendered = outcome
            .result
            .map_err(LoadError::from)
            .and_then(|bytes| self.renderer.render_bytes(&bytes).map_err(LoadError::from));

        match rendered {
            Ok(html) => {
                let document = self
                    .enhancer
                    .enhance(&html, &outcome.path, &self.base_url, store);
                info!(
                    "Showing {} ({} tracked links)",
                    outcome.path,
                    document.links.len()
                );
                self.content = ViewerContent::Document(document);
                self.active = Some(outcome.path);
                self.error = None;
                Ok(())
            }
            Err(e) => {
                warn!("Could not show {}: {}", outcome.path, e);
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Fetch, render and show `path`.
    pub async fn open(
        &mut self,
        source: &dyn SiteSource,
        path: &str,
        store: &mut ProgressStore,
    ) -> Result<(), LoadError> {
        self.begin_load(path);
        let outcome = fetch_document(source, path).await;
        self.apply(outcome, store)
    }

    /// Back to the welcome screen. Progress is not touched.
    pub fn show_welcome(&mut self) {
        self.content = ViewerContent::Welcome;
        self.active = None;
        self.error = None;
    }

    pub fn content(&self) -> &ViewerContent {
        &self.content
    }

    pub fn document(&self) -> Option<&EnhancedDocument> {
        match &self.content {
            ViewerContent::Document(document) => Some(document),
            ViewerContent::Welcome => None,
        }
    }

    pub fn document_mut(&mut self) -> Option<&mut EnhancedDocument> {
        match &mut self.content {
            ViewerContent::Document(document) => Some(document),
            ViewerContent::Welcome => None,
        }
    }

    /// Path of the document on screen.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn loading(&self) -> Option<&str> {
        self.loading.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}
