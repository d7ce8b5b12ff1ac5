use std::fs;
use std::path::Path;
use studymark::commands::command_argument_builder;
use studymark::handlers::*;
use studymark_core::session::open_store;
use studymark_core::{BrowserConfig, CompanionRule, StudySession};
use studymark_site::{DocumentDescriptor, Manifest};
use tempfile::TempDir;

fn write_site(root: &Path) {
    fs::create_dir_all(root.join("content")).unwrap();
    fs::write(
        root.join("content/01_intro.md"),
        "# Intro\n\n- [Paper](https://paper.example/)\n- [Video](https://video.example/)\n",
    )
    .unwrap();
    fs::write(
        root.join("content/02_deeper.md"),
        "# Deeper\n\nSee [the book](https://book.example/).\n",
    )
    .unwrap();
}

fn config_for(site: &TempDir, data: &TempDir) -> BrowserConfig {
    BrowserConfig::new(site.path().to_string_lossy())
        .with_data_dir(&data.path().to_string_lossy())
}

#[test]
fn test_build_config_from_global_args() {
    let matches = command_argument_builder().get_matches_from([
        "studymark",
        "--site",
        "https://notes.example/",
        "--namespace",
        "course-b",
        "--timeout",
        "5",
        "list",
    ]);
    let config = build_config(&matches);

    assert_eq!(config.site, "https://notes.example/");
    assert_eq!(config.namespace, "course-b");
    assert_eq!(config.request_timeout, Some(std::time::Duration::from_secs(5)));
}

#[test]
fn test_build_config_defaults() {
    let matches = command_argument_builder().get_matches_from(["studymark", "list"]);
    let config = build_config(&matches);

    assert_eq!(config.site, ".");
    assert_eq!(config.namespace, "study");
    assert_eq!(config.request_timeout, None);
    assert!(!config.data_dir.to_string_lossy().contains('~'));
}

#[test]
fn test_build_config_companion_and_resource_flags() {
    let matches = command_argument_builder().get_matches_from([
        "studymark",
        "--manifest-name",
        "index.json",
        "--file-list-name",
        "listing.txt",
        "--companion-marker",
        "_notes.md",
        "--auto-check-ms",
        "250",
        "list",
    ]);
    let config = build_config(&matches);

    assert_eq!(config.manifest_name, "index.json");
    assert_eq!(config.file_list_name, "listing.txt");
    // unset parts of the rule keep their default
    assert_eq!(config.companion, CompanionRule::new("_notes.md", "content"));
    assert_eq!(config.auto_check_delay, std::time::Duration::from_millis(250));

    let matches = command_argument_builder().get_matches_from([
        "studymark",
        "--companion-marker",
        "",
        "list",
    ]);
    let config = build_config(&matches);
    assert_eq!(config.companion.companion_path("https://a.example/x_context.md"), None);
}

#[test]
fn test_stats_rejects_unknown_format() {
    let result = command_argument_builder().try_get_matches_from(["studymark", "stats", "-f", "csv"]);
    assert!(result.is_err());
}

#[test]
fn test_resolve_document_by_number_or_path() {
    let documents = vec![
        DocumentDescriptor::new("content/a.md", "A"),
        DocumentDescriptor::new("content/b.md", "B"),
    ];

    assert_eq!(resolve_document(&documents, "2"), "content/b.md");
    assert_eq!(resolve_document(&documents, "content/a.md"), "content/a.md");
    assert_eq!(resolve_document(&documents, "./content/x.md"), "content/x.md");
    // out of range numbers are taken as paths
    assert_eq!(resolve_document(&documents, "3"), "3");
}

#[test]
fn test_manifest_generation() {
    let site = TempDir::new().unwrap();
    write_site(site.path());

    handle_manifest(site.path(), "content").unwrap();

    let manifest =
        Manifest::parse(&fs::read_to_string(site.path().join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest.files.len(), 2);
    assert_eq!(manifest.total_links, Some(3));

    let listing = fs::read_to_string(site.path().join("files.txt")).unwrap();
    assert_eq!(listing, "content/01_intro.md\ncontent/02_deeper.md");
}

#[test]
fn test_manifest_missing_content_dir_fails() {
    let site = TempDir::new().unwrap();
    assert!(handle_manifest(site.path(), "content").is_err());
}

#[tokio::test]
async fn test_toggle_persists_and_resolves_links() {
    let site = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_site(site.path());
    handle_manifest(site.path(), "content").unwrap();
    let config = config_for(&site, &data);

    handle_toggle(&config, "1", "2", true).await.unwrap();

    let mut session = StudySession::start(config.clone()).await.unwrap();
    session.open("content/01_intro.md").await.unwrap();
    let document = session.viewer().document().unwrap();
    assert!(!document.links[0].completed);
    assert!(document.links[1].completed);
    assert_eq!(session.global_stats().completed, 1);
    assert_eq!(session.global_stats().total, 3);

    // by id, flipping back
    let id = document.links[1].id.clone();
    assert_eq!(resolve_link(document, &id), Some(1));
    assert_eq!(resolve_link(document, "9"), None);
    handle_toggle(&config, "content/01_intro.md", &id, true)
        .await
        .unwrap();
    assert_eq!(open_store(&config).completed_count(), 0);
}

#[tokio::test]
async fn test_toggle_unknown_link_fails() {
    let site = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_site(site.path());
    let config = config_for(&site, &data);

    assert!(handle_toggle(&config, "content/01_intro.md", "7", true).await.is_err());
}

#[tokio::test]
async fn test_open_missing_document_fails() {
    let site = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_site(site.path());
    let config = config_for(&site, &data);

    let result = handle_open(&config, "content/nope.md", false, None, true).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_open_writes_checklist() {
    let site = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_site(site.path());
    let config = config_for(&site, &data);
    let out = data.path().join("checklist.txt");

    handle_open(&config, "content/01_intro.md", false, Some(&out), true)
        .await
        .unwrap();

    let checklist = fs::read_to_string(&out).unwrap();
    assert!(checklist.contains("  1. [ ] Paper"));
    assert!(checklist.contains("  2. [ ] Video"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_visit_external_link_auto_checks() {
    let site = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_site(site.path());
    let config = config_for(&site, &data);

    handle_visit(&config, "content/02_deeper.md", "1", true)
        .await
        .unwrap();

    assert_eq!(open_store(&config).completed_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_visit_companion_link_auto_checks() {
    let site = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_site(site.path());
    fs::write(
        site.path().join("content/03_notes.md"),
        "# Notes\n\n- [Context](03_notes_context.md)\n",
    )
    .unwrap();
    fs::write(
        site.path().join("content/03_notes_context.md"),
        "# Context\n\n[Slides](https://slides.example/)\n",
    )
    .unwrap();
    let config = config_for(&site, &data);

    handle_visit(&config, "content/03_notes.md", "1", true)
        .await
        .unwrap();

    let store = open_store(&config);
    assert_eq!(store.completed_count(), 1);
    let (id, record) = store.registry().iter().find(|(_, r)| r.text == "Context").unwrap();
    assert!(store.is_completed(id));
    assert_eq!(record.document_path, "content/03_notes.md");
}

#[tokio::test]
async fn test_stats_report_saved() {
    let site = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_site(site.path());
    handle_manifest(site.path(), "content").unwrap();
    let config = config_for(&site, &data);
    handle_toggle(&config, "1", "1", true).await.unwrap();

    let out = data.path().join("report.json");
    handle_stats(&config, "json", Some(&out), true).await.unwrap();

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(report["report"]["summary"]["completed"], 1);
    assert_eq!(report["report"]["summary"]["total"], 3);
    assert_eq!(report["report"]["summary"]["percentage"], 33);
}

#[test]
fn test_forced_reset_clears_progress() {
    let data = TempDir::new().unwrap();
    let config = BrowserConfig::new(".").with_data_dir(&data.path().to_string_lossy());

    {
        let mut store = open_store(&config);
        let record = studymark_core::LinkRecord::new("https://a.example/", "A", "a.md");
        store.toggle("link-a", &record);
        assert_eq!(store.completed_count(), 1);
    }

    handle_reset(&config, true).unwrap();
    assert_eq!(open_store(&config).completed_count(), 0);
}

#[test]
fn test_forced_init_creates_database() {
    let data = TempDir::new().unwrap();
    let config = BrowserConfig::new(".")
        .with_data_dir(&data.path().join("nested/studymark").to_string_lossy());

    handle_init(&config, true).unwrap();
    assert!(config.database_path().exists());

    handle_init(&config, true).unwrap();
    assert!(config.database_path().exists());
}
