// Tests for the document viewer

use std::sync::Arc;
use std::time::Duration;
use studymark_core::config::BrowserConfig;
use studymark_core::progress::ProgressStore;
use studymark_core::viewer::{DocumentViewer, LoadError, ViewerContent, fetch_document};
use studymark_site::{DirectorySource, HttpSource, SiteSource};
use tempfile::TempDir;
use tokio::sync::mpsc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

async fn mount(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn viewer_for(source: &dyn SiteSource) -> DocumentViewer {
    DocumentViewer::from_config(&BrowserConfig::default(), source.base_url().clone())
}

fn active_html(viewer: &DocumentViewer) -> String {
    viewer.document().map(|doc| doc.html()).unwrap_or_default()
}

// ============================================================================
// Load Tests
// ============================================================================

#[tokio::test]
async fn test_open_renders_and_enhances() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/content/a.md",
        "# Alpha\n\nSee [the docs](https://docs.example/).\n",
    )
    .await;

    let source = HttpSource::new(&server.uri()).unwrap();
    let mut store = ProgressStore::in_memory();
    let mut viewer = viewer_for(&source);

    assert!(matches!(viewer.content(), ViewerContent::Welcome));
    viewer.open(&source, "content/a.md", &mut store).await.unwrap();

    assert_eq!(viewer.active(), Some("content/a.md"));
    assert!(viewer.error().is_none());
    assert!(!viewer.is_loading());

    let doc = viewer.document().unwrap();
    assert_eq!(doc.path, "content/a.md");
    assert_eq!(doc.links.len(), 1);
    assert!(doc.html().contains(r#"<h1 id="heading-alpha">Alpha</h1>"#));
    assert_eq!(store.registry().len(), 1);
}

#[tokio::test]
async fn test_fetch_failure_keeps_previous_document() {
    let server = MockServer::start().await;
    mount(&server, "/content/a.md", "# Alpha\n").await;
    Mock::given(method("GET"))
        .and(path("/content/missing.md"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = HttpSource::new(&server.uri()).unwrap();
    let mut store = ProgressStore::in_memory();
    let mut viewer = viewer_for(&source);

    viewer.open(&source, "content/a.md", &mut store).await.unwrap();
    let before = active_html(&viewer);

    let result = viewer.open(&source, "content/missing.md", &mut store).await;
    assert!(matches!(result, Err(LoadError::Fetch(_))));

    assert_eq!(viewer.active(), Some("content/a.md"));
    assert_eq!(active_html(&viewer), before);
    let error = viewer.error().unwrap();
    assert!(error.starts_with("Error loading file"));
    assert!(error.contains("404"));
    assert!(!viewer.is_loading());
}

#[tokio::test]
async fn test_fetch_failure_on_welcome_screen() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let source = HttpSource::new(&server.uri()).unwrap();
    let mut store = ProgressStore::in_memory();
    let mut viewer = viewer_for(&source);

    assert!(viewer.open(&source, "content/a.md", &mut store).await.is_err());
    assert!(matches!(viewer.content(), ViewerContent::Welcome));
    assert_eq!(viewer.active(), None);
    assert!(viewer.error().is_some());
}

#[tokio::test]
async fn test_render_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/content/binary.md"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xfe, 0xfd]))
        .mount(&server)
        .await;

    let source = HttpSource::new(&server.uri()).unwrap();
    let mut store = ProgressStore::in_memory();
    let mut viewer = viewer_for(&source);

    let result = viewer.open(&source, "content/binary.md", &mut store).await;
    assert!(matches!(result, Err(LoadError::Render(_))));
    assert!(viewer.error().unwrap().contains("UTF-8"));
    assert!(matches!(viewer.content(), ViewerContent::Welcome));
}

#[tokio::test]
async fn test_oversized_document_is_rejected() {
    let server = MockServer::start().await;
    mount(&server, "/content/big.md", &"word ".repeat(100)).await;

    let source = HttpSource::new(&server.uri()).unwrap();
    let mut store = ProgressStore::in_memory();
    let config = BrowserConfig::default().with_max_document_bytes(64);
    let mut viewer = DocumentViewer::from_config(&config, source.base_url().clone());

    let result = viewer.open(&source, "content/big.md", &mut store).await;
    assert!(matches!(result, Err(LoadError::Render(_))));
}

#[tokio::test]
async fn test_error_clears_on_next_success() {
    let server = MockServer::start().await;
    mount(&server, "/content/a.md", "# Alpha\n").await;

    let source = HttpSource::new(&server.uri()).unwrap();
    let mut store = ProgressStore::in_memory();
    let mut viewer = viewer_for(&source);

    let _ = viewer.open(&source, "content/missing.md", &mut store).await;
    assert!(viewer.error().is_some());

    viewer.open(&source, "content/a.md", &mut store).await.unwrap();
    assert!(viewer.error().is_none());
}

#[tokio::test]
async fn test_show_welcome_keeps_progress() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir(temp_dir.path().join("content")).unwrap();
    std::fs::write(
        temp_dir.path().join("content/a.md"),
        "[One](https://one.example/)\n",
    )
    .unwrap();

    let source = DirectorySource::new(temp_dir.path()).unwrap();
    let mut store = ProgressStore::in_memory();
    let mut viewer = viewer_for(&source);

    viewer.open(&source, "content/a.md", &mut store).await.unwrap();
    viewer.document_mut().unwrap().on_checkbox_change(0, &mut store);

    viewer.show_welcome();

    assert!(matches!(viewer.content(), ViewerContent::Welcome));
    assert_eq!(viewer.active(), None);
    assert_eq!(store.completed_count(), 1);
}

#[tokio::test]
async fn test_directory_source_links_resolve_to_files() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir(temp_dir.path().join("content")).unwrap();
    std::fs::write(
        temp_dir.path().join("content/a.md"),
        "[Context](a_context.md)\n",
    )
    .unwrap();

    let source = DirectorySource::new(temp_dir.path()).unwrap();
    let mut store = ProgressStore::in_memory();
    let mut viewer = viewer_for(&source);

    viewer.open(&source, "content/a.md", &mut store).await.unwrap();
    let link = &viewer.document().unwrap().links[0];
    assert!(link.url.starts_with("file://"));
    assert!(link.url.ends_with("/content/a_context.md"));
    assert_eq!(link.companion.as_deref(), Some("content/a_context.md"));
}

// ============================================================================
// Concurrent Load Tests
// ============================================================================

#[tokio::test]
async fn test_outcomes_apply_in_arrival_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/content/slow.md"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("# Slow\n")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount(&server, "/content/fast.md", "# Fast\n").await;

    let source: Arc<dyn SiteSource> = Arc::new(HttpSource::new(&server.uri()).unwrap());
    let mut store = ProgressStore::in_memory();
    let mut viewer = viewer_for(source.as_ref());
    let (tx, mut rx) = mpsc::unbounded_channel();

    // the slow document is requested first, the fast one second
    for document in ["content/slow.md", "content/fast.md"] {
        viewer.begin_load(document);
        let source = source.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let outcome = fetch_document(source.as_ref(), document).await;
            let _ = tx.send(outcome);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    drop(tx);

    let mut arrivals = Vec::new();
    while let Some(outcome) = rx.recv().await {
        arrivals.push(outcome.path.clone());
        viewer.apply(outcome, &mut store).unwrap();
    }

    assert_eq!(arrivals, vec!["content/fast.md", "content/slow.md"]);
    // no sequencing: the stale response wins
    assert_eq!(viewer.active(), Some("content/slow.md"));
    assert!(active_html(&viewer).contains("Slow"));
}

#[tokio::test]
async fn test_loading_indicator_tracks_latest_request() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("a.md"), "# A\n").unwrap();
    std::fs::write(temp_dir.path().join("b.md"), "# B\n").unwrap();

    let source = DirectorySource::new(temp_dir.path()).unwrap();
    let mut store = ProgressStore::in_memory();
    let mut viewer = viewer_for(&source);

    viewer.begin_load("a.md");
    viewer.begin_load("b.md");
    assert_eq!(viewer.loading(), Some("b.md"));

    let first = fetch_document(&source, "a.md").await;
    viewer.apply(first, &mut store).unwrap();
    assert_eq!(viewer.loading(), Some("b.md"));

    let second = fetch_document(&source, "b.md").await;
    viewer.apply(second, &mut store).unwrap();
    assert!(!viewer.is_loading());
}
