//! Integration tests that call the real GRS AI API.
//!
//! These tests require GRS_AI_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p story-core --test api_integration -- --ignored`
//!
//! These are marked #[ignore] by default to avoid:
//! - API costs in CI
//! - Test failures when no API key is available
//! - Slow test runs (image generation takes tens of seconds)

use std::sync::Arc;
use story_core::providers::{GrsContentGenerator, GrsImageGenerator};
use story_core::{EngineConfig, GrsConfig, ImageRef, StoryEngine};

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("GRS_AI_API_KEY").is_ok()
}

fn opening_image() -> ImageRef {
    let url = std::env::var("STORY_TEST_IMAGE_URL").unwrap_or_else(|_| {
        "https://upload.wikimedia.org/wikipedia/commons/3/3f/Fronalpstock_big.jpg".to_string()
    });
    ImageRef::new(url)
}

fn engine(max_scenes: u32) -> StoryEngine {
    let grs = GrsConfig::from_env().expect("Failed to read GRS config");
    let content = GrsContentGenerator::new(grs.clone()).with_plan_steps(max_scenes);
    let images = GrsImageGenerator::new(&grs);
    StoryEngine::new(
        Arc::new(content),
        Arc::new(images),
        EngineConfig::new().with_max_scenes(max_scenes),
    )
}

#[tokio::test]
#[ignore] // Run with: cargo test -p story-core --test api_integration -- --ignored
async fn test_live_start_and_advance() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: GRS_AI_API_KEY not set");
        return;
    }

    let mut engine = engine(3);
    let state = engine
        .start(opening_image(), None)
        .await
        .expect("start should succeed");
    println!("Opening: {}", state.current_scene().text);
    assert!(!state.current_scene().text.is_empty());
    assert!(!state.current_scene().choices.is_empty());

    let first = state.current_scene().choices[0].id().to_string();
    let state = engine.advance(&first).await.expect("advance should succeed");
    println!("Step 1: {}", state.current_scene().text);
    assert_eq!(state.scene_count(), 1);
    assert_eq!(state.history().len(), 2);
}

#[tokio::test]
#[ignore]
async fn test_live_analysis() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: GRS_AI_API_KEY not set");
        return;
    }

    use story_core::ContentGenerator;
    let content = GrsContentGenerator::from_env().expect("Failed to create generator");
    let analysis = content
        .analyze(&opening_image())
        .await
        .expect("analysis should succeed");
    println!("Analysis: {analysis:?}");
    assert!(!analysis.scene_description.is_empty());
}
