use crate::error::{Result, SiteError};
use crate::manifest::{DocumentDescriptor, Manifest, default_documents, parse_file_list};
use crate::source::SiteSource;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MANIFEST_RESOURCE: &str = "manifest.json";
pub const FILE_LIST_RESOURCE: &str = "files.txt";

/// Which step of the fallback chain produced the document list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Manifest,
    FileList,
    Builtin,
    /// Every strategy failed; the document list is empty.
    Unavailable,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResolutionSource::Manifest => "manifest",
            ResolutionSource::FileList => "file list",
            ResolutionSource::Builtin => "built-in defaults",
            ResolutionSource::Unavailable => "unavailable",
        };
        f.write_str(label)
    }
}

/// What a single strategy yields on success.
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    pub documents: Vec<DocumentDescriptor>,
    pub total_links: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub reason: String,
}

/// Outcome of running the whole chain.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub documents: Vec<DocumentDescriptor>,
    pub total_links: Option<usize>,
    pub source: ResolutionSource,
    /// Failures of the strategies tried before the winning one.
    pub failures: Vec<StrategyFailure>,
}

impl Resolution {
    pub fn is_unavailable(&self) -> bool {
        self.source == ResolutionSource::Unavailable
    }

    pub fn find(&self, path: &str) -> Option<&DocumentDescriptor> {
        self.documents.iter().find(|d| d.path == path)
    }
}

/// One step of the discovery fallback chain.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn source(&self) -> ResolutionSource;

    async fn attempt(&self, site: &dyn SiteSource) -> Result<Resolved>;
}

/// Reads the structured manifest.
pub struct ManifestStrategy {
    resource: String,
}

impl ManifestStrategy {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
        }
    }
}

impl Default for ManifestStrategy {
    fn default() -> Self {
        Self::new(MANIFEST_RESOURCE)
    }
}

#[async_trait]
impl ResolutionStrategy for ManifestStrategy {
    fn name(&self) -> &'static str {
        "manifest"
    }

    fn source(&self) -> ResolutionSource {
        ResolutionSource::Manifest
    }

    async fn attempt(&self, site: &dyn SiteSource) -> Result<Resolved> {
        let text = site.fetch_text(&self.resource).await?;
        let manifest = Manifest::parse(&text)
            .map_err(|e| SiteError::ParseError(format!("{}: {}", self.resource, e)))?;

        if let Some(total) = manifest.declared_total() {
            info!("Manifest declares {} links in total", total);
        }

        Ok(Resolved {
            total_links: manifest.declared_total(),
            documents: manifest.files,
        })
    }
}

/// Reads the newline-delimited file listing.
pub struct FileListStrategy {
    resource: String,
}

impl FileListStrategy {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
        }
    }
}

impl Default for FileListStrategy {
    fn default() -> Self {
        Self::new(FILE_LIST_RESOURCE)
    }
}

#[async_trait]
impl ResolutionStrategy for FileListStrategy {
    fn name(&self) -> &'static str {
        "file list"
    }

    fn source(&self) -> ResolutionSource {
        ResolutionSource::FileList
    }

    async fn attempt(&self, site: &dyn SiteSource) -> Result<Resolved> {
        let text = site.fetch_text(&self.resource).await?;
        Ok(Resolved {
            documents: parse_file_list(&text),
            total_links: None,
        })
    }
}

/// Hands back a fixed document set without touching the site.
pub struct BuiltinStrategy {
    documents: Vec<DocumentDescriptor>,
}

impl BuiltinStrategy {
    pub fn new(documents: Vec<DocumentDescriptor>) -> Self {
        Self { documents }
    }
}

impl Default for BuiltinStrategy {
    fn default() -> Self {
        Self::new(default_documents())
    }
}

#[async_trait]
impl ResolutionStrategy for BuiltinStrategy {
    fn name(&self) -> &'static str {
        "built-in defaults"
    }

    fn source(&self) -> ResolutionSource {
        ResolutionSource::Builtin
    }

    async fn attempt(&self, _site: &dyn SiteSource) -> Result<Resolved> {
        if self.documents.is_empty() {
            return Err(SiteError::NotFound("built-in document set".to_string()));
        }
        Ok(Resolved {
            documents: self.documents.clone(),
            total_links: None,
        })
    }
}

/// Discovers the study documents by trying each strategy in order.
pub struct ManifestResolver {
    site: Arc<dyn SiteSource>,
    strategies: Vec<Box<dyn ResolutionStrategy>>,
}

impl ManifestResolver {
    /// Manifest, then file list, then the shipped defaults.
    pub fn new(site: Arc<dyn SiteSource>) -> Self {
        Self::with_strategies(
            site,
            vec![
                Box::new(ManifestStrategy::default()),
                Box::new(FileListStrategy::default()),
                Box::new(BuiltinStrategy::default()),
            ],
        )
    }

    pub fn with_strategies(
        site: Arc<dyn SiteSource>,
        strategies: Vec<Box<dyn ResolutionStrategy>>,
    ) -> Self {
        Self { site, strategies }
    }

    /// Never fails: the worst case is an empty `Unavailable` resolution.
    pub async fn resolve(&self) -> Resolution {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            debug!("Resolving documents via {}", strategy.name());
            match strategy.attempt(self.site.as_ref()).await {
                Ok(resolved) => {
                    info!(
                        "Resolved {} documents via {}",
                        resolved.documents.len(),
                        strategy.name()
                    );
                    return Resolution {
                        documents: resolved.documents,
                        total_links: resolved.total_links,
                        source: strategy.source(),
                        failures,
                    };
                }
                Err(e) => {
                    if e.is_missing() {
                        info!("No {} found ({}), trying next source", strategy.name(), e);
                    } else {
                        warn!("Could not use {}: {}", strategy.name(), e);
                    }
                    failures.push(StrategyFailure {
                        strategy: strategy.name(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        warn!("No document source succeeded; the document list is empty");
        Resolution {
            documents: Vec::new(),
            total_links: None,
            source: ResolutionSource::Unavailable,
            failures,
        }
    }
}
