// Browser configuration

use crate::enhance::CompanionRule;
use crate::render::{DEFAULT_HEADING_PREFIX, DEFAULT_MAX_DOCUMENT_BYTES, RenderOptions};
use std::path::PathBuf;
use std::time::Duration;
use studymark_site::resolver::{FILE_LIST_RESOURCE, MANIFEST_RESOURCE};

pub const DEFAULT_DATA_DIR: &str = "~/.config/studymark/";
pub const DATABASE_FILE: &str = "studymark.db";
pub const DEFAULT_NAMESPACE: &str = "study";
pub const DEFAULT_AUTO_CHECK_DELAY: Duration = Duration::from_millis(100);

/// Everything a study session needs to know before it starts.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Site root: an http(s) URL or a local directory.
    pub site: String,
    pub data_dir: PathBuf,
    /// Prefix of the two storage keys.
    pub namespace: String,
    pub manifest_name: String,
    pub file_list_name: String,
    /// Fall back to the shipped document set when discovery fails.
    pub builtin_documents: bool,
    pub companion: CompanionRule,
    pub auto_check_delay: Duration,
    pub max_document_bytes: usize,
    pub request_timeout: Option<Duration>,
    pub heading_prefix: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            site: ".".to_string(),
            data_dir: expand_path(DEFAULT_DATA_DIR),
            namespace: DEFAULT_NAMESPACE.to_string(),
            manifest_name: MANIFEST_RESOURCE.to_string(),
            file_list_name: FILE_LIST_RESOURCE.to_string(),
            builtin_documents: true,
            companion: CompanionRule::default(),
            auto_check_delay: DEFAULT_AUTO_CHECK_DELAY,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            request_timeout: None,
            heading_prefix: DEFAULT_HEADING_PREFIX.to_string(),
        }
    }
}

impl BrowserConfig {
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            ..Self::default()
        }
    }

    /// Set the data directory; `~` and environment variables are expanded.
    pub fn with_data_dir(mut self, data_dir: &str) -> Self {
        self.data_dir = expand_path(data_dir);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    pub fn with_file_list_name(mut self, name: impl Into<String>) -> Self {
        self.file_list_name = name.into();
        self
    }

    pub fn with_builtin_documents(mut self, enabled: bool) -> Self {
        self.builtin_documents = enabled;
        self
    }

    pub fn with_companion(mut self, companion: CompanionRule) -> Self {
        self.companion = companion;
        self
    }

    pub fn with_auto_check_delay(mut self, delay: Duration) -> Self {
        self.auto_check_delay = delay;
        self
    }

    pub fn with_max_document_bytes(mut self, max_bytes: usize) -> Self {
        self.max_document_bytes = max_bytes;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            heading_prefix: self.heading_prefix.clone(),
            max_bytes: self.max_document_bytes,
            ..RenderOptions::default()
        }
    }
}

/// Expand `~` and `$VARS`; the raw string is used if expansion fails.
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(path),
    }
}
