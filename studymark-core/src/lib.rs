pub mod config;
pub mod data;
pub mod enhance;
pub mod generate;
pub mod identity;
pub mod progress;
pub mod render;
pub mod report;
pub mod session;
pub mod stats;
pub mod viewer;

use colored::Colorize;

pub use config::BrowserConfig;
pub use data::{Database, KeyValueStore, MemoryStore, StorageError};
pub use enhance::{
    AutoCheckQueue, CompanionRule, EnhancedDocument, LinkActivation, LinkEnhancer, TrackedLink,
};
pub use identity::derive_id;
pub use progress::{LinkRecord, ProgressStore, StorageKeys};
pub use render::{MarkdownRenderer, RenderError, RenderOptions};
pub use session::StudySession;
pub use stats::{ProgressAggregator, ProgressSnapshot};
pub use viewer::{DocumentViewer, LoadError, LoadOutcome, ViewerContent, fetch_document};

const BANNER: &str = r#"
     _             _                            _
 ___| |_ _   _  __| |_   _ _ __ ___   __ _ _ __| | __
/ __| __| | | |/ _` | | | | '_ ` _ \ / _` | '__| |/ /
\__ \ |_| |_| | (_| | |_| | | | | | | (_| | |  |   <
|___/\__|\__,_|\__,_|\__, |_| |_| |_|\__,_|_|  |_|\_\
                     |___/
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "markdown study browser".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
