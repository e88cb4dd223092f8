//! Branching interactive story engine.
//!
//! This crate provides:
//! - Stories started from an image and advanced one choice at a time
//! - Pacing guidance that adapts the number of choices to the scene
//! - Full-state snapshots for rolling back to any earlier step
//! - Pluggable content and image generators, with GRS AI providers
//! - Story persistence and a multi-session manager
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use story_core::{EngineConfig, GrsConfig, ImageRef, StoryEngine};
//! use story_core::providers::{GrsContentGenerator, GrsImageGenerator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let grs = GrsConfig::from_env()?;
//!     let config = EngineConfig::new().with_max_scenes(8);
//!     let content = GrsContentGenerator::new(grs.clone()).with_plan_steps(8);
//!     let images = GrsImageGenerator::new(&grs);
//!
//!     let mut engine = StoryEngine::new(Arc::new(content), Arc::new(images), config);
//!     let state = engine.start(ImageRef::from("https://example.com/harbour.png"), None).await?;
//!     println!("{}", state.current_scene().text);
//!
//!     engine.advance("1").await?;
//!     engine.rollback(0)?;
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod config;
pub mod engine;
pub mod generator;
pub mod genre;
pub mod history;
pub mod outline;
pub mod parse;
pub mod persist;
pub mod progress;
pub mod prompts;
pub mod providers;
pub mod retry;
pub mod scene;
pub mod session;
pub mod state;
pub mod testing;

// Primary public API
pub use analyzer::{ContextAnalyzer, Guidance, SceneContext};
pub use config::{EngineConfig, GrsConfig};
pub use engine::{EngineError, EngineStatus, StoryEngine};
pub use generator::{
    AnalysisResult, ContentGenerator, Continuation, ContinuationRequest, GeneratorError,
    ImageGenerator, StoryDraft,
};
pub use history::{History, HistoryEntry};
pub use outline::StoryOutline;
pub use persist::{PersistError, SavedStory};
pub use retry::RetryPolicy;
pub use scene::{Choice, ChoiceCategory, Genre, ImageRef, Necessity, Scene};
pub use session::{InMemorySessionStore, SessionError, SessionId, SessionManager, SessionStore};
pub use state::{StateDelta, StoryState, StorySummary};
pub use testing::{MockContentGenerator, MockImageGenerator, TestHarness};
