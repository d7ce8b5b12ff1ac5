// Study session: wires config, site, progress store and viewer together

use crate::config::BrowserConfig;
use crate::data::{Database, KeyValueStore, MemoryStore};
use crate::enhance::{AutoCheckQueue, LinkActivation};
use crate::progress::{ProgressStore, StorageKeys};
use crate::stats::{ProgressAggregator, ProgressSnapshot};
use crate::viewer::{DocumentViewer, LoadError};
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use studymark_site::resolver::{
    BuiltinStrategy, FileListStrategy, ManifestStrategy, ResolutionStrategy,
};
use studymark_site::{DocumentDescriptor, ManifestResolver, Resolution, SiteError, SiteSource};
use tracing::{info, warn};

/// Open the progress database in the configured data directory, falling
/// back to process-local storage when that is not possible.
pub fn open_store(config: &BrowserConfig) -> ProgressStore {
    let keys = StorageKeys::for_namespace(&config.namespace);
    let backend: Box<dyn KeyValueStore> = match open_database(config) {
        Ok(db) => Box::new(db),
        Err(e) => {
            warn!(
                "Progress database unavailable ({}); progress will not be saved",
                e
            );
            Box::new(MemoryStore::new())
        }
    };
    ProgressStore::load(backend, keys)
}

fn open_database(config: &BrowserConfig) -> Result<Database, crate::data::StorageError> {
    fs::create_dir_all(&config.data_dir)?;
    Database::new(&config.database_path())
}

pub struct StudySession {
    config: BrowserConfig,
    source: Arc<dyn SiteSource>,
    resolution: Resolution,
    store: ProgressStore,
    aggregator: ProgressAggregator,
    viewer: DocumentViewer,
    auto_checks: AutoCheckQueue,
}

impl StudySession {
    /// Connect to the configured site, open the progress database and
    /// discover the documents.
    pub async fn start(config: BrowserConfig) -> Result<Self, SiteError> {
        let source = studymark_site::open_source(&config.site, config.request_timeout)?;
        let store = open_store(&config);
        Ok(Self::with_parts(config, source, store).await)
    }

    pub async fn with_parts(
        config: BrowserConfig,
        source: Arc<dyn SiteSource>,
        store: ProgressStore,
    ) -> Self {
        info!("Starting study session for {}", source.describe());

        let mut strategies: Vec<Box<dyn ResolutionStrategy>> = vec![
            Box::new(ManifestStrategy::new(config.manifest_name.clone())),
            Box::new(FileListStrategy::new(config.file_list_name.clone())),
        ];
        if config.builtin_documents {
            strategies.push(Box::new(BuiltinStrategy::default()));
        }
        let resolution = ManifestResolver::with_strategies(source.clone(), strategies)
            .resolve()
            .await;

        let aggregator = ProgressAggregator::new(resolution.total_links);
        let viewer = DocumentViewer::from_config(&config, source.base_url().clone());
        let auto_checks = AutoCheckQueue::new(config.auto_check_delay);

        Self {
            config,
            source,
            resolution,
            store,
            aggregator,
            viewer,
            auto_checks,
        }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    pub fn source(&self) -> Arc<dyn SiteSource> {
        self.source.clone()
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn documents(&self) -> &[DocumentDescriptor] {
        &self.resolution.documents
    }

    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    pub fn viewer(&self) -> &DocumentViewer {
        &self.viewer
    }

    /// Viewer and store together, for callers that apply load outcomes.
    pub fn viewer_and_store(&mut self) -> (&mut DocumentViewer, &mut ProgressStore) {
        (&mut self.viewer, &mut self.store)
    }

    pub fn aggregator(&self) -> &ProgressAggregator {
        &self.aggregator
    }

    pub fn global_stats(&self) -> ProgressSnapshot {
        self.aggregator.global_stats(&self.store)
    }

    pub fn file_stats(&self, path: &str) -> ProgressSnapshot {
        self.aggregator.file_stats(&self.store, path)
    }

    pub async fn open(&mut self, path: &str) -> Result<(), LoadError> {
        self.viewer
            .open(self.source.as_ref(), path, &mut self.store)
            .await
    }

    /// Flip link `index` of the document on screen.
    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        self.viewer
            .document_mut()?
            .on_checkbox_change(index, &mut self.store)
    }

    /// Follow link `index` of the document on screen. An unchecked link is
    /// checked off once the auto-check delay has passed, even if another
    /// document is on screen by then.
    pub fn activate(&mut self, index: usize, now: Instant) -> Option<LinkActivation> {
        let document = self.viewer.document()?;
        self.auto_checks.schedule(document, index, now);
        document.on_link_activated(index)
    }

    /// Apply every auto-check due at `now`. Returns the ids that were checked.
    pub fn poll_auto_checks(&mut self, now: Instant) -> Vec<String> {
        let checked = self.auto_checks.poll(now, &mut self.store);
        if !checked.is_empty()
            && let Some(document) = self.viewer.document_mut()
        {
            document.sync_with(&self.store);
        }
        checked
    }

    /// When the last scheduled auto-check falls due.
    pub fn auto_checks_due(&self) -> Option<Instant> {
        self.auto_checks.last_due()
    }

    /// Forget all progress and refresh the document on screen.
    pub fn reset_progress(&mut self) {
        self.auto_checks.clear();
        self.store.clear_all();
        if let Some(document) = self.viewer.document_mut() {
            document.sync_with(&self.store);
        }
    }

    pub fn show_welcome(&mut self) {
        self.viewer.show_welcome();
    }
}
