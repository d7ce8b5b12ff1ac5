use serde::{Deserialize, Serialize};

/// Extension a file-list entry must carry to count as a study document.
pub const DOCUMENT_EXTENSION: &str = ".md";

/// One entry of the document sidebar.
///
/// Field names on the wire follow the manifest format: `name` (or `path`),
/// `title`, `fullTitle`, `linkCount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    #[serde(rename = "name", alias = "path")]
    pub path: String,
    #[serde(rename = "title")]
    pub short_title: String,
    #[serde(rename = "fullTitle", default, skip_serializing_if = "Option::is_none")]
    pub full_title: Option<String>,
    #[serde(rename = "linkCount", default, skip_serializing_if = "Option::is_none")]
    pub link_count: Option<usize>,
}

impl DocumentDescriptor {
    pub fn new(path: impl Into<String>, short_title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            short_title: short_title.into(),
            full_title: None,
            link_count: None,
        }
    }

    pub fn with_full_title(mut self, full_title: impl Into<String>) -> Self {
        self.full_title = Some(full_title.into());
        self
    }

    pub fn with_link_count(mut self, link_count: usize) -> Self {
        self.link_count = Some(link_count);
        self
    }

    /// Derive a descriptor from a bare path, titling it after the file name.
    pub fn from_path(path: &str) -> Self {
        let path = path.trim();
        Self::new(path, format_title(path))
    }

    /// Title for headers: the full title when the manifest has one.
    pub fn display_title(&self) -> &str {
        self.full_title.as_deref().unwrap_or(&self.short_title)
    }
}

/// The structured `manifest.json` resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub files: Vec<DocumentDescriptor>,
    #[serde(rename = "totalLinks", default, skip_serializing_if = "Option::is_none")]
    pub total_links: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,
}

impl Manifest {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// The authoritative link total, if the manifest declares a usable one.
    /// A zero total is treated as undeclared.
    pub fn declared_total(&self) -> Option<usize> {
        self.total_links.filter(|total| *total > 0)
    }
}

pub fn is_document_file(entry: &str) -> bool {
    entry.trim().ends_with(DOCUMENT_EXTENSION)
}

/// Parse a newline-delimited file listing, keeping document files in order.
pub fn parse_file_list(text: &str) -> Vec<DocumentDescriptor> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| is_document_file(line))
        .map(DocumentDescriptor::from_path)
        .collect()
}

/// Turn a document path into a display title.
///
/// `content/02_attention-mechanism.md` becomes
/// `Content/02 Attention Mechanism`: the first `.md` is dropped, `-` and `_`
/// become spaces and the first letter of every word is upper-cased.
pub fn format_title(path: &str) -> String {
    let stem = path.replacen(DOCUMENT_EXTENSION, "", 1);

    let mut title = String::with_capacity(stem.len());
    let mut previous_is_word = false;
    for ch in stem.chars() {
        let ch = if ch == '-' || ch == '_' { ' ' } else { ch };
        let is_word = ch.is_ascii_alphanumeric();
        if is_word && !previous_is_word {
            title.push(ch.to_ascii_uppercase());
        } else {
            title.push(ch);
        }
        previous_is_word = is_word;
    }
    title
}

/// The document set shipped with the study site, used when neither the
/// manifest nor the file list can be read.
pub fn default_documents() -> Vec<DocumentDescriptor> {
    vec![
        DocumentDescriptor::new("content/01_tokenization.md", "1 - Tokenization")
            .with_full_title("Question 1 - Tokenization"),
        DocumentDescriptor::new(
            "content/02_attention_mechanism.md",
            "2 - Attention Mechanism",
        )
        .with_full_title("Question 2 - Attention Mechanism"),
        DocumentDescriptor::new("content/03_context_window.md", "3 - Context Window")
            .with_full_title("Question 3 - Context Window"),
        DocumentDescriptor::new("content/04_lora_vs_qlora.md", "4 - Lora Vs Qlora")
            .with_full_title("Question 4 - Lora Vs Qlora"),
    ]
}
