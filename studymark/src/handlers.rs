use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use studymark_core::data::Database;
use studymark_core::generate::ManifestGenerator;
use studymark_core::report::{ReportFormat, gather_report_data, generate_report, save_report};
use studymark_core::session::open_store;
use studymark_core::{BrowserConfig, CompanionRule, EnhancedDocument, LinkActivation, StudySession};
use studymark_site::{DocumentDescriptor, ResolutionSource};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // a second init (tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Build the browser configuration from the global arguments.
pub fn build_config(matches: &ArgMatches) -> BrowserConfig {
    let mut config = BrowserConfig::new(
        matches
            .get_one::<String>("site")
            .map(String::as_str)
            .unwrap_or("."),
    );
    if let Some(data_dir) = matches.get_one::<String>("data-dir") {
        config = config.with_data_dir(data_dir);
    }
    if let Some(namespace) = matches.get_one::<String>("namespace") {
        config = config.with_namespace(namespace.as_str());
    }
    if let Some(name) = matches.get_one::<String>("manifest-name") {
        config = config.with_manifest_name(name.as_str());
    }
    if let Some(name) = matches.get_one::<String>("file-list-name") {
        config = config.with_file_list_name(name.as_str());
    }

    let marker = matches.get_one::<String>("companion-marker");
    let directory = matches.get_one::<String>("companion-dir");
    if marker.is_some() || directory.is_some() {
        let companion = CompanionRule::new(
            marker.cloned().unwrap_or_else(|| config.companion.marker.clone()),
            directory.cloned().unwrap_or_else(|| config.companion.directory.clone()),
        );
        config = config.with_companion(companion);
    }
    if let Some(millis) = matches.get_one::<u64>("auto-check-ms") {
        config = config.with_auto_check_delay(Duration::from_millis(*millis));
    }

    let timeout = matches.get_one::<u64>("timeout").map(|secs| Duration::from_secs(*secs));
    config.with_timeout(timeout)
}

/// Pick a document by 1-based number from the listing, else by path.
///
/// Unlisted paths are passed through so documents reachable only by links
/// can still be opened.
pub fn resolve_document(documents: &[DocumentDescriptor], selector: &str) -> String {
    if let Ok(number) = selector.parse::<usize>()
        && number >= 1
        && let Some(doc) = documents.get(number - 1)
    {
        return doc.path.clone();
    }
    selector.trim_start_matches("./").to_string()
}

/// Pick a link by 1-based checklist number or by id.
pub fn resolve_link(document: &EnhancedDocument, selector: &str) -> Option<usize> {
    if let Ok(number) = selector.parse::<usize>()
        && number >= 1
        && number <= document.links.len()
    {
        return Some(number - 1);
    }
    document.position(selector)
}

/// Checklist text for a document, one numbered line per link.
pub fn format_checklist(document: &EnhancedDocument) -> String {
    let mut out = String::new();
    for (idx, link) in document.links.iter().enumerate() {
        let marker = if link.completed { "[x]" } else { "[ ]" };
        out.push_str(&format!("{:>3}. {} {}\n", idx + 1, marker, link.text));
        out.push_str(&format!("       {}  ({})\n", link.url, link.id));
    }
    out
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn spinner(message: impl Into<String>, quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.into());
    Ok(spinner)
}

async fn start_session(config: &BrowserConfig, quiet: bool) -> Result<StudySession> {
    let spinner = spinner(format!("Reading {}", config.site), quiet)?;
    let session = StudySession::start(config.clone())
        .await
        .with_context(|| format!("cannot open site {}", config.site))?;
    spinner.finish_and_clear();

    if session.resolution().source == ResolutionSource::Unavailable {
        eprintln!("{} Unable to load file list", "✗".red().bold());
    }
    Ok(session)
}

/// Open `selector` in a fresh session; fails if the document cannot be shown.
async fn open_document(config: &BrowserConfig, selector: &str, quiet: bool) -> Result<StudySession> {
    let mut session = start_session(config, quiet).await?;
    let path = resolve_document(session.documents(), selector);

    let spinner = spinner(format!("Loading {}", path), quiet)?;
    let result = session.open(&path).await;
    spinner.finish_and_clear();
    result?;

    Ok(session)
}

fn warn_on_storage_error(session: &StudySession) {
    if let Some(error) = session.store().last_error() {
        eprintln!(
            "{} Progress could not be saved: {}",
            "⚠".yellow().bold(),
            error
        );
    }
}

pub fn handle_init(config: &BrowserConfig, force: bool) -> Result<()> {
    print_divider();
    println!("{}", "  STUDYMARK INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let db_path = config.database_path();
    println!(
        "{} Target: {}",
        "→".blue(),
        config.data_dir.display().to_string().bright_white()
    );
    println!();

    if Database::exists(&db_path) {
        let replace = if force {
            true
        } else {
            println!("{}", "⚠ WARNING".yellow().bold());
            println!("A progress database already exists at:");
            println!(
                "  {} {}",
                "•".yellow(),
                db_path.display().to_string().bright_white()
            );
            println!();
            let response = print_prompt("Replace it and lose all saved progress? [y/N]:")?;
            println!();
            response == "y" || response == "yes"
        };

        if replace {
            Database::drop(&db_path)?;
            println!("{} Existing database removed", "✓".green().bold());
        } else {
            println!("{} Keeping existing database", "→".blue());
        }
    }

    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("cannot create {}", config.data_dir.display()))?;
    Database::new(&db_path)?;

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!();
    Ok(())
}

pub async fn handle_list(config: &BrowserConfig, quiet: bool) -> Result<()> {
    let session = start_session(config, quiet).await?;
    let resolution = session.resolution();

    println!(
        "{} {} documents from {}",
        "→".blue(),
        resolution.documents.len().to_string().cyan(),
        resolution.source.to_string().bright_white()
    );
    for failure in &resolution.failures {
        debug!("{} skipped: {}", failure.strategy, failure.reason);
    }
    println!();

    for (idx, doc) in session.documents().iter().enumerate() {
        let stats = session.file_stats(&doc.path);
        let title = if stats.total > 0 && stats.completed == stats.total {
            doc.display_title().green().bold()
        } else {
            doc.display_title().bright_white()
        };
        println!(
            "{:>3}. {}  {}",
            idx + 1,
            title,
            format!("{}/{} ({}%)", stats.completed, stats.total, stats.percentage).dimmed()
        );
        println!("     {}", doc.path.dimmed());
    }

    println!();
    println!("{} Overall: {}", "✓".green().bold(), session.global_stats());
    Ok(())
}

pub async fn handle_open(
    config: &BrowserConfig,
    selector: &str,
    html: bool,
    output: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let session = open_document(config, selector, quiet).await?;
    let Some(document) = session.viewer().document() else {
        bail!("nothing to show for {}", selector);
    };

    let content = if html {
        document.html()
    } else {
        format_checklist(document)
    };

    match output {
        Some(path) => {
            fs::write(path, &content)
                .with_context(|| format!("cannot write {}", path.display()))?;
            println!(
                "{} Saved {} to {}",
                "✓".green().bold(),
                document.path,
                path.display().to_string().bright_white()
            );
        }
        None => {
            if !html {
                println!("{}", document.path.bright_white().bold());
                println!(
                    "{} of {} links done",
                    document.completed_count(),
                    document.links.len()
                );
                println!();
            }
            print!("{}", content);
        }
    }
    Ok(())
}

pub async fn handle_toggle(
    config: &BrowserConfig,
    selector: &str,
    link: &str,
    quiet: bool,
) -> Result<()> {
    let mut session = open_document(config, selector, quiet).await?;
    let index = session
        .viewer()
        .document()
        .and_then(|doc| resolve_link(doc, link))
        .with_context(|| format!("no link {} in {}", link, selector))?;

    let Some(completed) = session.toggle(index) else {
        bail!("no link {} in {}", link, selector);
    };
    warn_on_storage_error(&session);

    if let Some(tracked) = session.viewer().document().and_then(|doc| doc.link(index)) {
        let marker = if completed {
            "[x]".green().bold()
        } else {
            "[ ]".normal()
        };
        println!("{} {}", marker, tracked.text);
    }
    println!("{} {}", "→".blue(), session.file_stats(&session_path(&session)));
    Ok(())
}

pub async fn handle_visit(
    config: &BrowserConfig,
    selector: &str,
    link: &str,
    quiet: bool,
) -> Result<()> {
    let mut session = open_document(config, selector, quiet).await?;
    let index = session
        .viewer()
        .document()
        .and_then(|doc| resolve_link(doc, link))
        .with_context(|| format!("no link {} in {}", link, selector))?;

    let activation = session
        .activate(index, Instant::now())
        .with_context(|| format!("no link {} in {}", link, selector))?;
    match &activation {
        LinkActivation::Navigate(url) => {
            println!("{} {}", "→".blue(), url.bright_white().underline());
        }
        LinkActivation::OpenDocument(path) => {
            let spinner = spinner(format!("Loading {}", path), quiet)?;
            let result = session.open(path).await;
            spinner.finish_and_clear();
            result?;
        }
    }

    // the check applies whatever document is open by the time it is due
    if let Some(due) = session.auto_checks_due() {
        tokio::time::sleep_until(tokio::time::Instant::from_std(due)).await;
        if !session.poll_auto_checks(Instant::now()).is_empty() {
            warn_on_storage_error(&session);
            println!("{} Marked as done", "✓".green().bold());
        }
    }

    if let LinkActivation::OpenDocument(_) = activation
        && let Some(document) = session.viewer().document()
    {
        println!("{}", document.path.bright_white().bold());
        println!();
        print!("{}", format_checklist(document));
    }
    Ok(())
}

fn session_path(session: &StudySession) -> String {
    session.viewer().active().unwrap_or_default().to_string()
}

pub async fn handle_stats(
    config: &BrowserConfig,
    format: &str,
    output: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let format = ReportFormat::from_str(format)
        .with_context(|| format!("unknown report format {}", format))?;
    let session = start_session(config, quiet).await?;

    let data = gather_report_data(
        &config.site,
        session.resolution(),
        session.store(),
        session.aggregator(),
    );
    let report = generate_report(&data, format)?;

    match output {
        Some(path) => {
            save_report(&report, path)
                .with_context(|| format!("cannot write {}", path.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => println!("{}", report),
    }
    Ok(())
}

pub fn handle_reset(config: &BrowserConfig, force: bool) -> Result<()> {
    let mut store = open_store(config);
    let completed = store.completed_count();

    if !force {
        println!(
            "{} {} completed links in namespace {}",
            "⚠".yellow().bold(),
            completed.to_string().cyan(),
            config.namespace.bright_white()
        );
        let response = print_prompt("Clear all progress? [y/N]:")?;
        if response != "y" && response != "yes" {
            println!("{} Reset cancelled.", "✗".red().bold());
            return Ok(());
        }
    }

    store.clear_all();
    if let Some(error) = store.last_error() {
        bail!("progress could not be cleared: {}", error);
    }
    println!(
        "{} Cleared progress in {}",
        "✓".green().bold(),
        store.storage_description().bright_white()
    );
    Ok(())
}

pub fn handle_manifest(root: &Path, content_dir: &str) -> Result<()> {
    let root = PathBuf::from(shellexpand::tilde(&root.to_string_lossy()).as_ref());
    let generated = ManifestGenerator::new(&root)
        .with_content_dir(content_dir)
        .generate()?;

    println!(
        "{} {} documents, {} links",
        "✓".green().bold(),
        generated.manifest.files.len().to_string().cyan(),
        generated.manifest.total_links.unwrap_or(0).to_string().cyan()
    );
    println!(
        "  {} {}",
        "✓".green(),
        generated.manifest_path.display().to_string().bright_white()
    );
    println!(
        "  {} {}",
        "✓".green(),
        generated.file_list_path.display().to_string().bright_white()
    );
    Ok(())
}
