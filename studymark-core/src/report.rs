// Progress report generation

use crate::progress::ProgressStore;
use crate::stats::{ProgressAggregator, ProgressSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use studymark_site::Resolution;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const BAR_WIDTH: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub site: String,
    /// Where the document list came from.
    pub discovery: String,
    pub global: ProgressSnapshot,
    /// `true` when the global total is the manifest's declared total.
    pub manifest_total: bool,
    pub documents: Vec<DocumentProgress>,
    pub completed_links: Vec<CompletedLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentProgress {
    pub path: String,
    pub title: String,
    pub progress: ProgressSnapshot,
    /// Listed by discovery, as opposed to only known from stored progress.
    pub listed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedLink {
    pub document_path: String,
    pub text: String,
    pub url: String,
}

pub fn gather_report_data(
    site: &str,
    resolution: &Resolution,
    store: &ProgressStore,
    aggregator: &ProgressAggregator,
) -> ReportData {
    let mut documents: Vec<DocumentProgress> = resolution
        .documents
        .iter()
        .map(|doc| DocumentProgress {
            path: doc.path.clone(),
            title: doc.display_title().to_string(),
            progress: aggregator.file_stats(store, &doc.path),
            listed: true,
        })
        .collect();

    // progress stored for documents the site no longer lists
    let unlisted: BTreeSet<&str> = store
        .registry()
        .values()
        .map(|record| record.document_path.as_str())
        .filter(|path| resolution.find(path).is_none())
        .collect();
    for path in unlisted {
        documents.push(DocumentProgress {
            path: path.to_string(),
            title: studymark_site::format_title(path.rsplit('/').next().unwrap_or(path)),
            progress: aggregator.file_stats(store, path),
            listed: false,
        });
    }

    let completed_links = store
        .registry()
        .iter()
        .filter(|(id, _)| store.is_completed(id))
        .map(|(_, record)| CompletedLink {
            document_path: record.document_path.clone(),
            text: record.text.clone(),
            url: record.url.clone(),
        })
        .collect();

    ReportData {
        site: site.to_string(),
        discovery: resolution.source.to_string(),
        global: aggregator.global_stats(store),
        manifest_total: aggregator.manifest_total().is_some(),
        documents,
        completed_links,
    }
}

pub fn generate_report(data: &ReportData, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => generate_json_report(data),
        ReportFormat::Markdown => Ok(generate_markdown_report(data)),
    }
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                          STUDYMARK PROGRESS REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Site:         {}\n", data.site));
    report.push_str(&format!("Documents:    {} (from {})\n", data.documents.len(), data.discovery));
    report.push_str(&format!(
        "Total links:  {} ({})\n",
        data.global.total,
        total_label(data)
    ));
    report.push_str(&format!("Completed:    {}\n", data.global.completed));
    report.push_str(&format!(
        "Progress:     {} {}%\n\n",
        progress_bar(&data.global, BAR_WIDTH),
        data.global.percentage
    ));

    if !data.documents.is_empty() {
        report.push_str(RULE);
        report.push_str("DOCUMENTS\n");
        report.push_str(RULE);
        report.push('\n');

        for doc in &data.documents {
            report.push_str(&format!(
                "{} {:>3}%  {:>3}/{:<3}  {}{}\n",
                progress_bar(&doc.progress, 10),
                doc.progress.percentage,
                doc.progress.completed,
                doc.progress.total,
                doc.title,
                if doc.listed { "" } else { "  (not listed)" }
            ));
        }
        report.push('\n');
    }

    if !data.completed_links.is_empty() {
        report.push_str(RULE);
        report.push_str("COMPLETED LINKS\n");
        report.push_str(RULE);
        report.push('\n');

        for link in &data.completed_links {
            report.push_str(&format!("  [x] {}\n", link.text));
            report.push_str(&format!("      {}  ({})\n", link.url, link.document_path));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("\nGenerated by studymark\n");

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "studymark",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "site": data.site,
            "discovery": data.discovery,
            "summary": {
                "completed": data.global.completed,
                "total": data.global.total,
                "percentage": data.global.percentage,
                "total_source": total_label(data)
            },
            "documents": data.documents,
            "completed_links": data.completed_links
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_markdown_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str("# Study Progress\n\n");
    report.push_str(&format!("**Site:** {}  \n", data.site));
    report.push_str(&format!(
        "**Progress:** {}% ({} of {} links, {})\n\n",
        data.global.percentage,
        data.global.completed,
        data.global.total,
        total_label(data)
    ));

    if !data.documents.is_empty() {
        report.push_str("## Documents\n\n");
        report.push_str("| Document | Completed | Progress |\n");
        report.push_str("|----------|-----------|----------|\n");
        for doc in &data.documents {
            report.push_str(&format!(
                "| {} | {}/{} | {}% |\n",
                escape_markdown_cell(&doc.title),
                doc.progress.completed,
                doc.progress.total,
                doc.progress.percentage
            ));
        }
        report.push('\n');
    }

    if !data.completed_links.is_empty() {
        report.push_str("## Completed Links\n\n");
        for link in &data.completed_links {
            report.push_str(&format!(
                "- [x] [{}]({}) ({})\n",
                link.text.replace(']', "\\]"),
                link.url,
                link.document_path
            ));
        }
        report.push('\n');
    }

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn total_label(data: &ReportData) -> &'static str {
    if data.manifest_total {
        "from manifest"
    } else {
        "discovered"
    }
}

fn progress_bar(snapshot: &ProgressSnapshot, width: usize) -> String {
    let filled = usize::from(snapshot.percentage) * width / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

fn escape_markdown_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
