//! Session manager and save/resume tests.
//!
//! Run with: `cargo test -p story-core --test sessions`

use std::sync::Arc;
use story_core::persist::save_path;
use story_core::testing::{assert_history_len, assert_scene_count, TestHarness};
use story_core::{
    EngineError, EngineStatus, Genre, ImageRef, InMemorySessionStore, SavedStory, SessionError,
    SessionId, SessionManager,
};
use tempfile::TempDir;

fn manager() -> (SessionManager, Arc<InMemorySessionStore>) {
    let harness = TestHarness::new();
    let store = Arc::new(InMemorySessionStore::new());
    (SessionManager::new(harness.engine, store.clone()), store)
}

// =============================================================================
// SESSIONS
// =============================================================================

#[tokio::test]
async fn test_sessions_are_independent() {
    let (manager, store) = manager();
    let (first, _) = manager
        .start(ImageRef::from("mock://first"), Some(Genre::Fantasy))
        .await
        .unwrap();
    let (second, _) = manager
        .start(ImageRef::from("mock://second"), None)
        .await
        .unwrap();
    assert_ne!(first, second);
    assert_eq!(store.len().await, 2);

    manager.advance(first, "1").await.unwrap();
    let state = manager.advance(first, "2").await.unwrap();
    assert_scene_count(&state, 2);

    let other = manager.state(second).await.unwrap();
    assert_scene_count(&other, 0);
    assert_history_len(&other, 1);
    assert_eq!(state.current_scene().genre, Genre::Fantasy);
}

#[tokio::test]
async fn test_session_rollback_is_stored() {
    let (manager, _) = manager();
    let (id, _) = manager.start(ImageRef::from("mock://start"), None).await.unwrap();
    manager.advance(id, "1").await.unwrap();
    manager.advance(id, "1").await.unwrap();

    manager.rollback(id, 0).await.unwrap();
    let state = manager.state(id).await.unwrap();
    assert_history_len(&state, 1);
    assert!(state.choice_history().is_empty());
}

#[tokio::test]
async fn test_failed_operation_keeps_stored_state() {
    let (manager, _) = manager();
    let (id, started) = manager.start(ImageRef::from("mock://start"), None).await.unwrap();

    let err = manager.advance(id, "nope").await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Engine(EngineError::InvalidChoice("nope".to_string()))
    );
    let err = manager.rollback(id, 7).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Engine(EngineError::InvalidRollbackTarget { target: 7, len: 1 })
    );
    assert_eq!(manager.state(id).await.unwrap(), started);
}

#[tokio::test]
async fn test_unknown_and_ended_sessions() {
    let (manager, store) = manager();
    let missing = SessionId::new();
    assert_eq!(
        manager.advance(missing, "1").await.unwrap_err(),
        SessionError::NotFound(missing)
    );
    assert_eq!(manager.end(missing).await.unwrap_err(), SessionError::NotFound(missing));

    let (id, _) = manager.start(ImageRef::from("mock://start"), None).await.unwrap();
    manager.end(id).await.unwrap();
    assert!(store.is_empty().await);
    assert_eq!(manager.state(id).await.unwrap_err(), SessionError::NotFound(id));
}

// =============================================================================
// SAVE AND RESUME
// =============================================================================

#[tokio::test]
async fn test_save_and_resume_keeps_history() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let mut harness = TestHarness::new();
    harness.start().await.unwrap();
    harness.play(&["1", "3", "2"]).await.unwrap();
    let state = harness.state().cloned().unwrap();

    let path = save_path(temp_dir.path(), state.theme());
    SavedStory::new(state.clone())
        .save_json(&path)
        .await
        .expect("Save should succeed");

    let loaded = SavedStory::load_json(&path).await.expect("Load should succeed");
    assert_eq!(loaded.state, state);

    let mut resumed = TestHarness::new();
    resumed.engine.resume(loaded.state);
    assert_eq!(resumed.engine.status(), EngineStatus::Active);

    let state = resumed.rollback(1).unwrap();
    assert_scene_count(state, 2);
    assert_eq!(state.choice_history(), ["1"]);

    let state = resumed.advance("1").await.unwrap();
    assert_scene_count(state, 3);
    assert_eq!(resumed.content.analyze_calls(), 0);
}

#[tokio::test]
async fn test_resume_completed_story() {
    let mut harness = TestHarness::with_max_scenes(2);
    harness.start().await.unwrap();
    harness.play(&["1", "1"]).await.unwrap();
    let state = harness.engine.into_state().unwrap();

    let mut resumed = TestHarness::with_max_scenes(2);
    resumed.engine.resume(state);
    assert_eq!(resumed.engine.status(), EngineStatus::Complete);
    assert_eq!(
        resumed.advance("1").await.unwrap_err(),
        EngineError::StoryComplete
    );
}
