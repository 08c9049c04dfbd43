// SPDX-License-Identifier: AGPL-3.0
// Artify Core - Image library projection against the mock API

mod common;

use artify_core::{AppError, AppState, ClientSettings, ImageLibrary, MemorySecretStore, SecretStore, TOKEN_KEY};
use common::{image, MockServer};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_favorites_match_last_fetch() {
    let server = MockServer::start().await;
    server.state.seed(vec![
        image("a", "2024-01-01T00:00:00Z", true, 0),
        image("b", "2024-01-02T00:00:00Z", false, 0),
        image("c", "2024-01-03T00:00:00Z", true, 1),
    ]);
    let (_, gateway, _) = server.signed_in_client();
    let library = ImageLibrary::new(gateway);

    assert_eq!(library.refresh().await.unwrap(), 3);
    let ids: Vec<String> = library.favorites().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert_eq!(library.processed().len(), 1);
    assert_eq!(library.uploaded().len(), 2);
}

#[tokio::test]
async fn test_empty_list_gives_empty_recent() {
    let server = MockServer::start().await;
    let (_, gateway, _) = server.signed_in_client();
    let library = ImageLibrary::new(gateway);

    assert_eq!(library.refresh().await.unwrap(), 0);
    assert!(library.recent(5).is_empty());
}

#[tokio::test]
async fn test_recent_sorted_and_capped() {
    let server = MockServer::start().await;
    server.state.seed(vec![
        image("old", "2023-01-01T00:00:00Z", false, 0),
        image("newest", "2024-09-01T00:00:00Z", false, 0),
        image("mid", "2024-02-01T00:00:00Z", false, 1),
    ]);
    let (_, gateway, _) = server.signed_in_client();
    let library = ImageLibrary::new(gateway);
    library.refresh().await.unwrap();

    let ids: Vec<String> = library.recent(2).into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["newest", "mid"]);
}

#[tokio::test]
async fn test_refresh_drops_duplicate_ids() {
    let server = MockServer::start().await;
    server.state.seed(vec![
        image("a", "2024-01-01T00:00:00Z", false, 0),
        image("a", "2024-01-02T00:00:00Z", true, 0),
    ]);
    let (_, gateway, _) = server.signed_in_client();
    let library = ImageLibrary::new(gateway);

    library.refresh().await.unwrap();
    assert_eq!(library.len(), 1);
    assert!(!library.get("a").unwrap().is_favorite);
}

#[tokio::test]
async fn test_toggle_favorite_patches_projection() {
    let server = MockServer::start().await;
    server
        .state
        .seed(vec![image("a", "2024-01-01T00:00:00Z", false, 0)]);
    let (_, gateway, _) = server.signed_in_client();
    let library = ImageLibrary::new(gateway);
    library.refresh().await.unwrap();

    let updated = library.toggle_favorite("a").await.unwrap();
    assert!(updated.is_favorite);
    assert!(library.get("a").unwrap().is_favorite);
    assert_eq!(server.state.hits_for("PUT", "/images")[0].body["user_favorite"], true);

    library.toggle_favorite("a").await.unwrap();
    assert!(!library.get("a").unwrap().is_favorite);
    assert_eq!(server.state.hits_for("PUT", "/images")[1].body["user_favorite"], false);
}

#[tokio::test]
async fn test_refresh_overwrites_local_patch() {
    let server = MockServer::start().await;
    server
        .state
        .seed(vec![image("a", "2024-01-01T00:00:00Z", false, 0)]);
    let (_, gateway, _) = server.signed_in_client();
    let library = ImageLibrary::new(gateway);
    library.refresh().await.unwrap();

    library.apply_local_patch("a", |r| r.is_favorite = true);
    assert!(library.get("a").unwrap().is_favorite);

    library.refresh().await.unwrap();
    assert!(!library.get("a").unwrap().is_favorite);
}

#[tokio::test]
async fn test_double_delete_keeps_id_absent() {
    let server = MockServer::start().await;
    server.state.seed(vec![
        image("a", "2024-01-01T00:00:00Z", false, 0),
        image("b", "2024-01-01T00:00:00Z", false, 0),
    ]);
    let (_, gateway, _) = server.signed_in_client();
    let library = ImageLibrary::new(gateway.clone());
    library.refresh().await.unwrap();

    library.delete("a").await.unwrap();
    assert!(library.get("a").is_none());

    let err = library.delete("a").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(library.get("a").is_none());
    assert_eq!(library.len(), 1);

    // Gone on the server but still held locally: reconciled as removed
    server.state.seed(vec![]);
    library.delete("b").await.unwrap();
    assert!(library.is_empty());
    assert!(gateway.delete_by_id("b", artify_core::ImageKind::Uploaded).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_upload_then_refresh() {
    let server = MockServer::start().await;
    let (_, gateway, _) = server.signed_in_client();
    let library = ImageLibrary::new(gateway);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cat.png");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(b"png")
        .unwrap();

    let report = library
        .upload(&[path.to_string_lossy().into_owned()])
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(library.len(), 1);
    assert_eq!(library.get("up-0").unwrap().filename, "up-0.png");
}

#[tokio::test]
async fn test_apply_then_refresh_shows_output() {
    let server = MockServer::start().await;
    server
        .state
        .seed(vec![image("a", "2024-01-01T00:00:00Z", false, 0)]);
    let (_, gateway, _) = server.signed_in_client();
    let library = ImageLibrary::new(gateway);
    library.refresh().await.unwrap();

    let outcome = library.apply("blur", "a", &[5.0]).await.unwrap();
    assert_eq!(outcome.id, "proc-1");
    assert_eq!(library.processed().len(), 1);

    assert!(matches!(
        library.apply("no-such-filter", "a", &[]).await,
        Err(AppError::UnknownOperation(_))
    ));
}

#[tokio::test]
async fn test_app_state_restores_session() {
    let server = MockServer::start().await;
    server
        .state
        .seed(vec![image("a", "2024-01-01T00:00:00Z", false, 0)]);

    let secrets = Arc::new(MemorySecretStore::new());
    secrets.set(TOKEN_KEY, "tok-123").unwrap();
    let settings = ClientSettings {
        persist_library: false,
        ..ClientSettings::with_base_url(server.base_url.clone())
    };

    let state = AppState::new(settings, secrets.clone()).unwrap();
    assert_eq!(state.status(), artify_core::AuthStatus::Authenticated);
    state.library.refresh().await.unwrap();
    assert_eq!(state.library.len(), 1);

    state.logout().unwrap();
    assert!(state.library.is_empty());
    assert_eq!(secrets.get(TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_stale_refresh_does_not_undo_toggle() {
    let server = MockServer::start().await;
    server
        .state
        .seed(vec![image("a", "2024-01-01T00:00:00Z", false, 0)]);
    let (_, gateway, _) = server.signed_in_client();
    let library = Arc::new(ImageLibrary::new(gateway));
    library.refresh().await.unwrap();

    // This refresh captures favorite=false, then answers late
    *server.state.list_delay.lock().unwrap() = Some(Duration::from_millis(400));
    let slow = {
        let library = library.clone();
        tokio::spawn(async move { library.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let updated = library.toggle_favorite("a").await.unwrap();
    assert!(updated.is_favorite);
    assert!(library.get("a").unwrap().is_favorite);

    slow.await.unwrap().unwrap();
    assert!(library.get("a").unwrap().is_favorite);

    // A refresh issued after the toggle is authoritative again
    *server.state.list_delay.lock().unwrap() = None;
    library.refresh().await.unwrap();
    assert!(library.get("a").unwrap().is_favorite);
}
