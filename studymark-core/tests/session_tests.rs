// Tests for study session wiring

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use studymark_core::config::BrowserConfig;
use studymark_core::enhance::LinkActivation;
use studymark_core::session::{StudySession, open_store};
use studymark_site::ResolutionSource;
use tempfile::TempDir;

const MANIFEST: &str = r#"{
  "files": [
    {"name": "content/01_intro.md", "title": "1 - Intro", "fullTitle": "Question 1 - Intro"},
    {"name": "content/01_intro_context.md", "title": "1 - Intro Context"}
  ],
  "totalLinks": 10
}"#;

fn write_site(root: &Path) {
    fs::create_dir_all(root.join("content")).unwrap();
    fs::write(root.join("manifest.json"), MANIFEST).unwrap();
    fs::write(
        root.join("content/01_intro.md"),
        "# Intro\n\n- [Paper](https://paper.example/)\n- [More context](01_intro_context.md)\n",
    )
    .unwrap();
    fs::write(
        root.join("content/01_intro_context.md"),
        "# Context\n\n[Slides](https://slides.example/)\n",
    )
    .unwrap();
}

fn config_for(site: &TempDir, data: &TempDir) -> BrowserConfig {
    BrowserConfig::new(site.path().to_string_lossy())
        .with_data_dir(&data.path().join("studymark").to_string_lossy())
}

#[tokio::test]
async fn test_start_resolves_manifest_and_opens_database() {
    let site = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_site(site.path());

    let config = config_for(&site, &data);
    let session = StudySession::start(config.clone()).await.unwrap();

    assert_eq!(session.resolution().source, ResolutionSource::Manifest);
    assert_eq!(session.documents().len(), 2);
    assert_eq!(session.aggregator().manifest_total(), Some(10));
    assert!(config.database_path().exists());
    assert!(session.store().storage_description().starts_with("sqlite:"));

    let stats = session.global_stats();
    assert_eq!((stats.completed, stats.total, stats.percentage), (0, 10, 0));
}

#[tokio::test]
async fn test_toggle_and_companion_navigation() {
    let site = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_site(site.path());

    let mut session = StudySession::start(config_for(&site, &data)).await.unwrap();
    session.open("content/01_intro.md").await.unwrap();

    assert_eq!(session.toggle(0), Some(true));
    assert_eq!(session.global_stats().percentage, 10);
    assert_eq!(session.file_stats("content/01_intro.md").total, 2);

    let now = Instant::now();
    let activation = session.activate(1, now);
    assert_eq!(
        activation,
        Some(LinkActivation::OpenDocument("content/01_intro_context.md".to_string()))
    );

    let id = session.viewer().document().unwrap().links[1].id.clone();
    assert_eq!(session.auto_checks_due(), Some(now + Duration::from_millis(100)));

    // the companion replaces the document before the check is due
    session.open("content/01_intro_context.md").await.unwrap();
    assert_eq!(session.viewer().active(), Some("content/01_intro_context.md"));
    assert!(session.poll_auto_checks(now + Duration::from_millis(50)).is_empty());

    assert_eq!(session.poll_auto_checks(now + Duration::from_millis(100)), vec![id.clone()]);
    assert!(session.store().is_completed(&id));
    assert_eq!(session.store().completed_count(), 2);
    assert_eq!(session.file_stats("content/01_intro.md").completed, 2);
    assert_eq!(session.auto_checks_due(), None);
}

#[tokio::test]
async fn test_auto_check_refreshes_open_document() {
    let site = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_site(site.path());

    let mut session = StudySession::start(config_for(&site, &data)).await.unwrap();
    session.open("content/01_intro.md").await.unwrap();
    let now = Instant::now();

    assert_eq!(
        session.activate(0, now),
        Some(LinkActivation::Navigate("https://paper.example/".to_string()))
    );
    session.poll_auto_checks(now + Duration::from_secs(1));

    let document = session.viewer().document().unwrap();
    assert!(document.links[0].completed);
    assert!(document.html().contains("study-link completed"));
}

#[tokio::test]
async fn test_reset_drops_pending_auto_checks() {
    let site = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_site(site.path());

    let mut session = StudySession::start(config_for(&site, &data)).await.unwrap();
    session.open("content/01_intro.md").await.unwrap();
    let now = Instant::now();
    session.activate(0, now);

    session.reset_progress();

    assert_eq!(session.auto_checks_due(), None);
    assert!(session.poll_auto_checks(now + Duration::from_secs(1)).is_empty());
    assert_eq!(session.store().completed_count(), 0);
}

#[tokio::test]
async fn test_progress_persists_between_sessions() {
    let site = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_site(site.path());

    {
        let mut session = StudySession::start(config_for(&site, &data)).await.unwrap();
        session.open("content/01_intro.md").await.unwrap();
        session.toggle(0);
    }

    let mut session = StudySession::start(config_for(&site, &data)).await.unwrap();
    assert_eq!(session.global_stats().completed, 1);

    session.open("content/01_intro.md").await.unwrap();
    assert!(session.viewer().document().unwrap().links[0].completed);
}

#[tokio::test]
async fn test_reset_progress_refreshes_open_document() {
    let site = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_site(site.path());

    let mut session = StudySession::start(config_for(&site, &data)).await.unwrap();
    session.open("content/01_intro.md").await.unwrap();
    session.toggle(0);

    session.reset_progress();

    assert_eq!(session.store().completed_count(), 0);
    assert!(session.store().registry().is_empty());
    assert_eq!(session.viewer().document().unwrap().completed_count(), 0);
    // the manifest total still applies
    assert_eq!(session.global_stats().total, 10);
}

#[tokio::test]
async fn test_builtin_documents_when_site_has_no_listing() {
    let site = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();

    let session = StudySession::start(config_for(&site, &data)).await.unwrap();
    assert_eq!(session.resolution().source, ResolutionSource::Builtin);
    assert_eq!(session.documents().len(), 4);
    assert_eq!(session.aggregator().manifest_total(), None);
}

#[tokio::test]
async fn test_unavailable_without_builtin_documents() {
    let site = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();

    let config = config_for(&site, &data).with_builtin_documents(false);
    let session = StudySession::start(config).await.unwrap();

    assert!(session.resolution().is_unavailable());
    assert!(session.documents().is_empty());
    assert_eq!(session.resolution().failures.len(), 2);
}

#[tokio::test]
async fn test_start_rejects_missing_site() {
    let data = TempDir::new().unwrap();
    let config = BrowserConfig::new("/definitely/not/a/site")
        .with_data_dir(&data.path().to_string_lossy());

    assert!(StudySession::start(config).await.is_err());
}

#[test]
fn test_open_store_falls_back_to_memory() {
    let data = TempDir::new().unwrap();
    let blocker = data.path().join("not-a-dir");
    fs::write(&blocker, "file in the way").unwrap();

    let config = BrowserConfig::default().with_data_dir(&blocker.to_string_lossy());
    let mut store = open_store(&config);

    assert_eq!(store.storage_description(), "memory");
    store.clear_all();
    assert!(store.last_error().is_none());
}
