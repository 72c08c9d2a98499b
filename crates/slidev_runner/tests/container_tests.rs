//! Integration tests for the container session layer.
//!
//! These tests drive full sessions against the mock engine and client, so
//! they need no Docker or Podman installation.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use slidev_runner::{
    compress_image, presets, AttachOutcome, ContainerSession, EmbeddedArchive, ErrorCategory,
    ExportOptions, ImageReference, ImageResolver, ImageSource, MockClient, MockEngine, Progress,
    ProgressEvent, RunnerError, SessionState, SlideSource,
};

const TAG: &str = "nnynn/slidev:1-0.48.0-beta.26";

fn target() -> ImageReference {
    TAG.parse().unwrap()
}

fn write_deck(dir: &TempDir) -> SlideSource {
    let deck = dir.path().join("deck.md");
    std::fs::write(&deck, "# Title\n\n---\n\n# Second").unwrap();
    SlideSource::resolve(&deck).unwrap()
}

fn session(engine: &MockEngine, client: &MockClient, archive: EmbeddedArchive) -> ContainerSession {
    ContainerSession::new(
        Arc::new(engine.clone()),
        Arc::new(client.clone()),
        ImageResolver::standard(target(), archive),
    )
}

fn zstd_archive() -> EmbeddedArchive {
    EmbeddedArchive::from_bytes(zstd_bytes(b"fake docker save tarball"))
}

fn zstd_bytes(data: &[u8]) -> Vec<u8> {
    // Level 1 keeps the test fast; the archive format is level-independent.
    let mut out = Vec::new();
    let mut encoder = zstd::stream::write::Encoder::new(&mut out, 1).unwrap();
    std::io::Write::write_all(&mut encoder, data).unwrap();
    encoder.finish().unwrap();
    out
}

fn never() -> std::future::Pending<()> {
    std::future::pending()
}

/// Test a cached image is used without load or pull.
#[tokio::test]
async fn test_local_tag_skips_load_and_pull() {
    let dir = TempDir::new().unwrap();
    let source = write_deck(&dir);
    let engine = MockEngine::new().add_image(TAG);
    let client = MockClient::new();

    let outcome = session(&engine, &client, zstd_archive())
        .run_until(source.dir(), presets::run(&source).command, never())
        .await
        .unwrap();

    assert_eq!(outcome.image.source, ImageSource::LocalCache);
    assert!(!engine.was_called("load_image"));
    assert!(!engine.was_called("pull_image"));
}

/// Test without cache or archive the image is pulled exactly once.
#[tokio::test]
async fn test_no_archive_pulls_once() {
    let dir = TempDir::new().unwrap();
    let source = write_deck(&dir);
    let engine = MockEngine::new();
    let client = MockClient::new();

    let outcome = session(&engine, &client, EmbeddedArchive::none())
        .run_until(source.dir(), presets::run(&source).command, never())
        .await
        .unwrap();

    let pulls = engine.get_method_calls("pull_image");
    assert_eq!(pulls.len(), 1);
    assert_eq!(pulls[0].target.as_deref(), Some(TAG));
    assert_eq!(outcome.image.source, ImageSource::Registry);
    assert!(!engine.was_called("load_image"));
}

/// Test an embedded archive is loaded instead of pulling.
#[tokio::test]
async fn test_archive_loads_and_never_pulls() {
    let dir = TempDir::new().unwrap();
    let source = write_deck(&dir);
    let engine = MockEngine::new().archive_tag(TAG);
    let client = MockClient::new();

    let outcome = session(&engine, &client, zstd_archive())
        .run_until(source.dir(), presets::run(&source).command, never())
        .await
        .unwrap();

    assert_eq!(outcome.image.source, ImageSource::EmbeddedArchive);
    assert_eq!(outcome.image.reference, target());
    assert!(!engine.was_called("pull_image"));

    let loaded = engine.loaded_archives();
    assert_eq!(loaded.len(), 1);
    assert_eq!(&loaded[0][..], b"fake docker save tarball");
}

/// Test resolution failures abort before any container operation.
#[tokio::test]
async fn test_pull_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let source = write_deck(&dir);
    let engine = MockEngine::new().fail_on("pull_image", "manifest unknown");
    let client = MockClient::new();

    let err = session(&engine, &client, EmbeddedArchive::none())
        .run_until(source.dir(), presets::run(&source).command, never())
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Resolution);
    assert!(!engine.was_called("remove_container"));
    assert!(!engine.was_called("create_container"));
    assert!(!dir.path().join("package.json").exists());
}

/// Test a stale container is removed before the new one is created.
#[tokio::test]
async fn test_stale_container_removed_before_create() {
    let dir = TempDir::new().unwrap();
    let source = write_deck(&dir);
    let engine = MockEngine::new()
        .add_image(TAG)
        .add_container("slidev-container");
    let client = MockClient::new();

    session(&engine, &client, EmbeddedArchive::none())
        .run_until(source.dir(), presets::run(&source).command, never())
        .await
        .unwrap();

    let sequence = engine.call_sequence();
    let create = sequence.iter().position(|m| m == "create_container").unwrap();
    let removals_before: Vec<_> = sequence[..create]
        .iter()
        .filter(|m| *m == "remove_container")
        .collect();
    assert_eq!(removals_before.len(), 1);
    assert!(engine.containers().is_empty());
}

/// Test a fresh deck with nothing cached is served and leaves nothing behind.
#[tokio::test]
async fn test_full_session_on_fresh_deck() {
    let dir = TempDir::new().unwrap();
    let source = write_deck(&dir);
    let engine = MockEngine::new();

    let seen_during_attach = Arc::new(Mutex::new(Vec::new()));
    let seen = seen_during_attach.clone();
    let deck_dir = source.dir().to_path_buf();
    let client = MockClient::new().on_attach(Arc::new(move |_id| {
        let manifest = deck_dir.join("package.json");
        let vite = deck_dir.join("vite.config.js");
        seen.lock().push((manifest.exists(), vite.exists()));
    }));

    let outcome = session(&engine, &client, EmbeddedArchive::none())
        .run_until(source.dir(), presets::run(&source).command, never())
        .await
        .unwrap();

    assert!(engine.was_called("pull_image"));

    let creates = engine.get_method_calls("create_container");
    assert_eq!(creates.len(), 1);
    let spec = creates[0].spec.as_ref().unwrap();
    assert_eq!(spec.command, vec!["npx", "slidev", "deck.md", "--remote"]);
    assert_eq!(spec.image, target());
    assert_eq!(
        spec.mounts[0].bind_spec(),
        format!("{}:/slidev/slides:rw", source.dir().display())
    );
    assert_eq!(spec.ports[0].key(), "3030/tcp");
    assert_eq!(spec.env_list(), vec!["CHOKIDAR_USEPOLLING=true"]);

    assert_eq!(client.attached(), vec!["slidev-container".to_string()]);
    assert_eq!(*seen_during_attach.lock(), vec![(true, true)]);

    assert_eq!(outcome.attach, AttachOutcome::Exited(Some(0)));
    assert_eq!(outcome.created_files.len(), 2);
    assert!(!dir.path().join("package.json").exists());
    assert!(!dir.path().join("vite.config.js").exists());
    assert!(engine.containers().is_empty());
}

/// Test user files are neither overwritten nor removed.
#[tokio::test]
async fn test_existing_support_files_are_left_alone() {
    let dir = TempDir::new().unwrap();
    let source = write_deck(&dir);
    let manifest = dir.path().join("package.json");
    std::fs::write(&manifest, r#"{ "name": "my-talk", "private": true }"#).unwrap();

    let engine = MockEngine::new().add_image(TAG);
    let client = MockClient::new();

    let outcome = session(&engine, &client, EmbeddedArchive::none())
        .run_until(source.dir(), presets::run(&source).command, never())
        .await
        .unwrap();

    assert_eq!(outcome.created_files, vec![dir.path().join("vite.config.js")]);
    assert_eq!(
        std::fs::read_to_string(&manifest).unwrap(),
        r#"{ "name": "my-talk", "private": true }"#
    );
}

/// Test the export flags reach the container command unchanged.
#[tokio::test]
async fn test_export_session_command() {
    let dir = TempDir::new().unwrap();
    let source = write_deck(&dir);
    let engine = MockEngine::new().add_image(TAG);
    let client = MockClient::new();

    let options = ExportOptions {
        with_clicks: true,
        with_toc: true,
        timeout_ms: Some(30_000),
    };
    let prepared = presets::export(&source, &options);

    session(&engine, &client, EmbeddedArchive::none())
        .run_until(source.dir(), prepared.command, never())
        .await
        .unwrap();

    let creates = engine.get_method_calls("create_container");
    let spec = creates[0].spec.as_ref().unwrap();
    assert_eq!(
        spec.command.join(" "),
        "npx slidev export deck.md --format pdf --output deck.pdf --with-clicks --with-toc --timeout 30000"
    );
}

/// Test a non-markdown source is rejected before touching the engine.
#[tokio::test]
async fn test_non_markdown_rejected() {
    let dir = TempDir::new().unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "not slides").unwrap();

    let err = SlideSource::resolve(&notes).unwrap_err();
    assert!(matches!(err, RunnerError::NotMarkdown(_)));
    assert_eq!(err.category(), ErrorCategory::Usage);
}

/// Test create failure still cleans files and leaves no container.
#[tokio::test]
async fn test_create_failure_cleans_up() {
    let dir = TempDir::new().unwrap();
    let source = write_deck(&dir);
    let engine = MockEngine::new()
        .add_image(TAG)
        .fail_on("create_container", "port is already allocated");
    let client = MockClient::new();

    let err = session(&engine, &client, EmbeddedArchive::none())
        .run_until(source.dir(), presets::run(&source).command, never())
        .await
        .unwrap_err();

    assert!(matches!(err, RunnerError::CreateFailed(_)));
    assert_eq!(err.category(), ErrorCategory::Lifecycle);
    assert!(client.attached().is_empty());
    assert!(engine.containers().is_empty());
    assert!(!dir.path().join("package.json").exists());
    assert!(!dir.path().join("vite.config.js").exists());
}

/// Test start failure still removes the created container.
#[tokio::test]
async fn test_start_failure_removes_container() {
    let dir = TempDir::new().unwrap();
    let source = write_deck(&dir);
    let engine = MockEngine::new()
        .add_image(TAG)
        .fail_on("start_container", "OCI runtime create failed");
    let client = MockClient::new();
    let session = session(&engine, &client, EmbeddedArchive::none());

    let err = session
        .run_until(source.dir(), presets::run(&source).command, never())
        .await
        .unwrap_err();

    assert!(matches!(err, RunnerError::StartFailed(_)));
    assert_eq!(engine.get_method_calls("remove_container").len(), 2);
    assert_eq!(session.state(), SessionState::Removed);
    assert!(engine.containers().is_empty());
    assert!(!dir.path().join("package.json").exists());
}

/// Test attach failure is reported in the outcome and cleanup still runs.
#[tokio::test]
async fn test_attach_failure_still_removes_container() {
    let dir = TempDir::new().unwrap();
    let source = write_deck(&dir);
    let engine = MockEngine::new().add_image(TAG);
    let client = MockClient::new().simulate_failure("podman: executable not found");

    let outcome = session(&engine, &client, EmbeddedArchive::none())
        .run_until(source.dir(), presets::shell().command, never())
        .await
        .unwrap();

    assert!(matches!(outcome.attach, AttachOutcome::Failed(ref msg) if msg.contains("not found")));
    assert_eq!(outcome.container_id.as_deref(), Some("slidev-container"));
    assert_eq!(outcome.lifecycle.last(), Some(&SessionState::Removed));
    assert!(!outcome.lifecycle.contains(&SessionState::Attached));
    assert!(engine.containers().is_empty());
    assert!(!dir.path().join("vite.config.js").exists());
}

/// Test a failed final removal is only a warning and files are still removed.
#[tokio::test]
async fn test_final_removal_failure_keeps_result() {
    let dir = TempDir::new().unwrap();
    let source = write_deck(&dir);
    let engine = MockEngine::new()
        .add_image(TAG)
        .fail_on_call("remove_container", 2, "removal of container is already in progress");
    let client = MockClient::new().exit_code(0);

    let outcome = session(&engine, &client, EmbeddedArchive::none())
        .run_until(source.dir(), presets::run(&source).command, never())
        .await
        .unwrap();

    assert!(outcome.attach.is_success());
    assert_eq!(outcome.lifecycle.last(), Some(&SessionState::Attached));
    assert_eq!(engine.get_method_calls("remove_container").len(), 2);
    assert_eq!(engine.containers(), vec!["slidev-container".to_string()]);
    assert!(!dir.path().join("package.json").exists());
    assert!(!dir.path().join("vite.config.js").exists());
}

/// Test a support file that cannot be removed does not fail the session.
#[tokio::test]
async fn test_unremovable_support_file_is_a_warning() {
    let dir = TempDir::new().unwrap();
    let source = write_deck(&dir);
    let engine = MockEngine::new().add_image(TAG);

    // Swap the generated file for a non-empty directory while attached.
    let vite = dir.path().join("vite.config.js");
    let hook_path = vite.clone();
    let client = MockClient::new().on_attach(Arc::new(move |_: &str| {
        std::fs::remove_file(&hook_path).unwrap();
        std::fs::create_dir(&hook_path).unwrap();
        std::fs::write(hook_path.join("keep"), "x").unwrap();
    }));

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let progress = Progress::new(Arc::new(move |e: &ProgressEvent| sink.lock().push(e.clone())));

    let outcome = session(&engine, &client, EmbeddedArchive::none())
        .progress(progress)
        .run_until(source.dir(), presets::run(&source).command, never())
        .await
        .unwrap();

    assert!(outcome.attach.is_success());
    assert_eq!(outcome.lifecycle.last(), Some(&SessionState::Removed));
    assert!(vite.is_dir());
    assert!(!dir.path().join("package.json").exists());

    let removed: Vec<_> = events
        .lock()
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::TempFileRemoved { path } => Some(path.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(removed, vec![dir.path().join("package.json")]);
}

/// Test progress events arrive in lifecycle order and end with the reminder.
#[tokio::test]
async fn test_progress_reporting() {
    let dir = TempDir::new().unwrap();
    let source = write_deck(&dir);
    let engine = MockEngine::new().archive_tag(TAG);
    let client = MockClient::new();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let progress = Progress::new(Arc::new(move |e: &ProgressEvent| sink.lock().push(e.clone())));

    session(&engine, &client, zstd_archive())
        .progress(progress)
        .run_until(source.dir(), presets::run(&source).command, never())
        .await
        .unwrap();

    let events = events.lock();
    assert!(matches!(events.first(), Some(ProgressEvent::ResolvingImage { .. })));
    assert!(events.iter().any(|e| matches!(e, ProgressEvent::LoadingEmbeddedImage)));
    assert!(events.iter().any(|e| matches!(e, ProgressEvent::ImageLoaded { .. })));
    assert!(events.iter().any(|e| matches!(e, ProgressEvent::Attaching { .. })));
    assert_eq!(events.last(), Some(&ProgressEvent::ImageRetained));
}

/// Test the image archive is written zstd-compressed.
#[tokio::test]
async fn test_compress_image_roundtrip() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("image").join("slidev.tar.zst");
    let engine = MockEngine::new().saved_image(b"layer data".to_vec());

    let written = compress_image(&engine, &target(), &output).await.unwrap();
    assert_eq!(written, 10);

    let archive = EmbeddedArchive::from_bytes(std::fs::read(&output).unwrap());
    assert_eq!(&archive.decompress().await.unwrap()[..], b"layer data");
    assert_eq!(
        engine.get_method_calls("save_image")[0].target.as_deref(),
        Some(TAG)
    );
}

/// Test a save failure surfaces as a maintenance error.
#[tokio::test]
async fn test_compress_image_failure() {
    let dir = TempDir::new().unwrap();
    let engine = MockEngine::new().fail_on("save_image", "no such image");

    let err = compress_image(&engine, &target(), &dir.path().join("out.tar.zst"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Maintenance);
}

/// Test the mounted directory is the deck's absolute parent.
#[test]
fn test_source_dir_is_absolute_parent() {
    let dir = TempDir::new().unwrap();
    let source = write_deck(&dir);
    assert!(source.dir().is_absolute());
    assert_eq!(
        source.dir().canonicalize().unwrap(),
        Path::new(dir.path()).canonicalize().unwrap()
    );
}
