// Manifest generation for a local study site

use crate::enhance::count_links;
use crate::render::MarkdownRenderer;
use chrono::{SecondsFormat, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use studymark_site::manifest::is_document_file;
use studymark_site::resolver::{FILE_LIST_RESOURCE, MANIFEST_RESOURCE};
use studymark_site::{DocumentDescriptor, Manifest, format_title};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_CONTENT_DIR: &str = "content";

// Relative targets resolve the same under any site root.
const SITE_ROOT: &str = "file:///";

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid document path: {0}")]
    InvalidPath(#[from] url::ParseError),
}

/// Files written by [`ManifestGenerator::generate`].
#[derive(Debug, Clone)]
pub struct GeneratedManifest {
    pub manifest: Manifest,
    pub manifest_path: PathBuf,
    pub file_list_path: PathBuf,
}

/// Scans a site's content directory and writes `manifest.json` and
/// `files.txt` next to it.
pub struct ManifestGenerator {
    root: PathBuf,
    content_dir: String,
    renderer: MarkdownRenderer,
}

impl ManifestGenerator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            content_dir: DEFAULT_CONTENT_DIR.to_string(),
            renderer: MarkdownRenderer::default(),
        }
    }

    /// Directory below the root holding the documents; empty for the root
    /// itself.
    pub fn with_content_dir(mut self, content_dir: impl Into<String>) -> Self {
        self.content_dir = content_dir.into().trim_matches('/').to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build the manifest without writing anything.
    ///
    /// Documents are sorted by file name. Each carries the number of links
    /// it will track, and `totalLinks` is their sum.
    pub fn scan(&self) -> Result<Manifest, GenerateError> {
        let dir = if self.content_dir.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&self.content_dir)
        };
        if !dir.is_dir() {
            return Err(GenerateError::NotADirectory(dir));
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && is_document_file(name)
            {
                names.push(name.to_string());
            }
        }
        names.sort();

        let mut files = Vec::with_capacity(names.len());
        let mut total_links = 0;
        for name in names {
            let path = if self.content_dir.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", self.content_dir, name)
            };
            let link_count = self.count_document_links(&dir.join(&name), &path)?;
            total_links += link_count;

            debug!("{}: {} links", path, link_count);
            files.push(DocumentDescriptor::new(path, format_title(&name)).with_link_count(link_count));
        }

        Ok(Manifest {
            files,
            total_links: Some(total_links),
            generated: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        })
    }

    /// Scan and write both resources into the root directory.
    pub fn generate(&self) -> Result<GeneratedManifest, GenerateError> {
        let manifest = self.scan()?;

        let manifest_path = self.root.join(MANIFEST_RESOURCE);
        fs::write(&manifest_path, manifest.to_json()?)?;

        let file_list_path = self.root.join(FILE_LIST_RESOURCE);
        let listing = manifest
            .files
            .iter()
            .map(|doc| doc.path.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(&file_list_path, listing)?;

        info!(
            "Generated manifest for {} markdown files ({} links)",
            manifest.files.len(),
            manifest.total_links.unwrap_or(0)
        );

        Ok(GeneratedManifest {
            manifest,
            manifest_path,
            file_list_path,
        })
    }

    /// Links `file` will track once it is served as `document_path`.
    fn count_document_links(&self, file: &Path, document_path: &str) -> Result<usize, GenerateError> {
        let bytes = fs::read(file)?;
        let document_url = Url::parse(SITE_ROOT)?.join(document_path)?;
        match self.renderer.render_bytes(&bytes) {
            Ok(html) => Ok(count_links(&html, &document_url)),
            Err(e) => {
                warn!("Not counting links in {}: {}", file.display(), e);
                Ok(0)
            }
        }
    }
}
