use crate::error::{Result, SiteError};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Read access to a deployed study site.
///
/// Paths are relative to the site root (`content/01_tokenization.md`,
/// `manifest.json`). Implementations must reject anything that would escape
/// the root.
#[async_trait]
pub trait SiteSource: Send + Sync {
    /// Fetch the raw bytes stored at `path`.
    async fn fetch(&self, path: &str) -> Result<Vec<u8>>;

    /// Fetch `path` and decode it as UTF-8.
    async fn fetch_text(&self, path: &str) -> Result<String> {
        let bytes = self.fetch(path).await?;
        String::from_utf8(bytes)
            .map_err(|e| SiteError::ParseError(format!("{} is not valid UTF-8: {}", path, e)))
    }

    /// URL of the site root, used to resolve relative links in documents.
    fn base_url(&self) -> &Url;

    /// Human readable location, for log lines and status bars.
    fn describe(&self) -> String {
        self.base_url().to_string()
    }
}

/// Check that `path` is a plain relative path inside the site.
pub fn validate_relative(path: &str) -> Result<&str> {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed.starts_with('/') || trimmed.contains("://") {
        return Err(SiteError::InvalidPath(path.to_string()));
    }

    let escapes = Path::new(trimmed).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(SiteError::InvalidPath(path.to_string()));
    }

    Ok(trimmed)
}

/// A site served over HTTP(S).
pub struct HttpSource {
    client: Client,
    base: Url,
}

impl HttpSource {
    pub fn new(base: &str) -> Result<Self> {
        Self::with_timeout(base, None)
    }

    /// Requests never time out unless `timeout` is given.
    pub fn with_timeout(base: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut base = Url::parse(base)
            .map_err(|e| SiteError::InvalidSite(format!("{}: {}", base, e)))?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(SiteError::InvalidSite(format!(
                "unsupported scheme '{}'",
                base.scheme()
            )));
        }

        // Url::join drops the last segment unless the base ends with a slash
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        base.set_fragment(None);

        let mut builder = Client::builder()
            .user_agent(concat!("studymark/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base,
        })
    }
}

#[async_trait]
impl SiteSource for HttpSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let path = validate_relative(path)?;
        let url = self
            .base
            .join(path)
            .map_err(|e| SiteError::InvalidPath(format!("{}: {}", path, e)))?;

        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SiteError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        Ok(body.to_vec())
    }

    fn base_url(&self) -> &Url {
        &self.base
    }
}

/// A site checked out on the local filesystem.
pub struct DirectorySource {
    root: PathBuf,
    base: Url,
}

impl DirectorySource {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let given = root.as_ref();
        let root = std::fs::canonicalize(given)
            .map_err(|e| SiteError::InvalidSite(format!("{}: {}", given.display(), e)))?;

        if !root.is_dir() {
            return Err(SiteError::InvalidSite(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let base = Url::from_directory_path(&root)
            .map_err(|_| SiteError::InvalidSite(format!("{}", root.display())))?;

        Ok(Self { root, base })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl SiteSource for DirectorySource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let path = validate_relative(path)?;
        let full = self.root.join(path);

        debug!("Reading {}", full.display());
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SiteError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn base_url(&self) -> &Url {
        &self.base
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Pick a source for `site`: URLs with an http(s) scheme are fetched over
/// the network, anything else is treated as a directory.
pub fn open_source(site: &str, timeout: Option<Duration>) -> Result<Arc<dyn SiteSource>> {
    let lower = site.trim().to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(Arc::new(HttpSource::with_timeout(site.trim(), timeout)?))
    } else {
        Ok(Arc::new(DirectorySource::new(site.trim())?))
    }
}
