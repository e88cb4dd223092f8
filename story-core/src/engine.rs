//! The story engine: starts a story from an image, advances it on a choice
//! and rolls it back to any recorded step.
//!
//! Every generator round is all-or-nothing. Generator calls run first and
//! only once all of them have succeeded is the state touched, so a failed
//! `start` or `advance` leaves the engine exactly as it was.

use crate::analyzer::ContextAnalyzer;
use crate::config::EngineConfig;
use crate::generator::{
    ContentGenerator, ContinuationRequest, GeneratorError, ImageGenerator,
};
use crate::genre::{choose_genre, GenreClassifier, KeywordGenreClassifier};
use crate::history::HistoryError;
use crate::prompts;
use crate::scene::{Genre, ImageRef, Scene};
use crate::state::{RoundMetadata, StoryState};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

/// Ending label given to a scene that ends the story by reaching the step horizon.
pub const STEP_LIMIT_ENDING: &str = "step_limit";

/// Errors from engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("image analysis failed: {0}")]
    AnalysisFailed(#[source] GeneratorError),

    #[error("image generation failed: {0}")]
    ImageFailed(#[source] GeneratorError),

    #[error("opening story generation failed: {0}")]
    StoryGenFailed(#[source] GeneratorError),

    #[error("story continuation failed: {0}")]
    ContinuationFailed(#[source] GeneratorError),

    #[error("choice '{0}' is not offered by the current scene")]
    InvalidChoice(String),

    #[error("no story has been started")]
    NoActiveStory,

    #[error("rollback target {target} is outside the recorded history (0..{len})")]
    InvalidRollbackTarget { target: usize, len: usize },

    #[error("the story has ended; roll back to keep playing")]
    StoryComplete,
}

impl From<HistoryError> for EngineError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::OutOfRange { target, len } => {
                EngineError::InvalidRollbackTarget { target, len }
            }
        }
    }
}

/// Lifecycle of the engine's story.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Uninitialized,
    Active,
    Complete,
}

/// Orchestrates one story session over a content and an image generator.
///
/// Not reentrant: callers issue one operation at a time.
#[derive(Clone)]
pub struct StoryEngine {
    content: Arc<dyn ContentGenerator>,
    images: Arc<dyn ImageGenerator>,
    analyzer: ContextAnalyzer,
    genres: Arc<dyn GenreClassifier>,
    config: EngineConfig,
    state: Option<StoryState>,
}

impl StoryEngine {
    pub fn new(
        content: Arc<dyn ContentGenerator>,
        images: Arc<dyn ImageGenerator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            content,
            images,
            analyzer: ContextAnalyzer::default(),
            genres: Arc::new(KeywordGenreClassifier::default()),
            config,
            state: None,
        }
    }

    /// Replace the context analyzer.
    pub fn with_analyzer(mut self, analyzer: ContextAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Replace the genre classifier.
    pub fn with_genre_classifier(mut self, genres: Arc<dyn GenreClassifier>) -> Self {
        self.genres = genres;
        self
    }

    /// The same generators and settings with no story loaded.
    pub fn detached(&self) -> Self {
        Self {
            content: Arc::clone(&self.content),
            images: Arc::clone(&self.images),
            analyzer: self.analyzer.clone(),
            genres: Arc::clone(&self.genres),
            config: self.config.clone(),
            state: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> Option<&StoryState> {
        self.state.as_ref()
    }

    /// Take the story out of the engine, leaving it uninitialized.
    pub fn into_state(self) -> Option<StoryState> {
        self.state
    }

    pub fn status(&self) -> EngineStatus {
        match &self.state {
            None => EngineStatus::Uninitialized,
            Some(state) if state.is_complete() => EngineStatus::Complete,
            Some(_) => EngineStatus::Active,
        }
    }

    /// Continue a previously saved story.
    pub fn resume(&mut self, state: StoryState) -> &StoryState {
        info!(
            scene_count = state.scene_count(),
            max_scenes = state.max_scenes(),
            "resumed story"
        );
        self.state.insert(state)
    }

    /// Start a new story from an opening image.
    ///
    /// Analyzes the image, settles the genre, renders the opening scene and
    /// writes its text. Any failure aborts the whole start; a story already
    /// in the engine is only replaced once everything has succeeded.
    #[instrument(skip(self))]
    pub async fn start(
        &mut self,
        image: ImageRef,
        genre: Option<Genre>,
    ) -> Result<&StoryState, EngineError> {
        let retry = &self.config.retry;
        let content = &self.content;
        let images = &self.images;

        let source = &image;
        let analysis = retry
            .run("analyze", || async move { content.analyze(source).await })
            .await
            .map_err(EngineError::AnalysisFailed)?;

        let genre = choose_genre(
            genre,
            &analysis.genre_suggestion,
            self.genres.as_ref(),
            self.config.default_genre,
        );

        let prompt = prompts::opening_image_prompt(&analysis, genre);
        let prompt = prompt.as_str();
        let opening_image = retry
            .run("render_opening", || async move { images.render(prompt).await })
            .await
            .map_err(EngineError::ImageFailed)?;

        let seed = &analysis;
        let draft = retry
            .run("generate_initial", || async move {
                let draft = content.generate_initial(seed, genre).await?;
                if draft.choices.is_empty() {
                    return Err(GeneratorError::Malformed(
                        "opening offered no choices".to_string(),
                    ));
                }
                Ok(draft)
            })
            .await
            .map_err(EngineError::StoryGenFailed)?;

        let theme = analysis.theme();
        let scene = Scene::new(opening_image, draft.text, genre, draft.choices);
        let state = StoryState::new(scene, self.config.max_scenes, theme, analysis.outline);

        info!(
            %genre,
            max_scenes = state.max_scenes(),
            choices = state.current_scene().choices.len(),
            "story started"
        );
        Ok(self.state.insert(state))
    }

    /// Take choice `choice_id` on the current scene and generate the next one.
    #[instrument(skip(self))]
    pub async fn advance(&mut self, choice_id: &str) -> Result<&StoryState, EngineError> {
        let state = self.state.as_mut().ok_or(EngineError::NoActiveStory)?;
        if state.is_complete() {
            return Err(EngineError::StoryComplete);
        }
        let choice = state
            .current_scene()
            .choice(choice_id)
            .cloned()
            .ok_or_else(|| EngineError::InvalidChoice(choice_id.to_string()))?;

        let guidance = self.analyzer.guidance(state);
        let limit = guidance.context.natural_choice_count;
        let final_round = guidance.is_final_step();
        let genre = state.current_scene().genre;
        let request = ContinuationRequest {
            current_text: state.current_scene().text.clone(),
            choice_text: choice.text().to_string(),
            choice_category: choice.category(),
            genre,
            theme: state.theme().to_string(),
            guidance,
            outline: state.outline.clone(),
        };

        let retry = &self.config.retry;
        let content = &self.content;
        let images = &self.images;

        let request = &request;
        let mut continuation = retry
            .run("continue_story", || async move {
                let continuation = content.continue_story(request).await?;
                if continuation.choices.is_empty() && continuation.ending.is_none() && !final_round {
                    return Err(GeneratorError::Malformed(
                        "continuation offered no choices".to_string(),
                    ));
                }
                Ok(continuation)
            })
            .await
            .map_err(EngineError::ContinuationFailed)?;
        continuation.choices.truncate(limit);

        let prompt = prompts::scene_image_prompt(&continuation.text, choice.text(), genre);
        let prompt = prompt.as_str();
        let image = retry
            .run("render_scene", || async move { images.render(prompt).await })
            .await
            .map_err(EngineError::ImageFailed)?;

        // Commit
        let offered = continuation.choices.len();
        let mut scene = Scene::new(image, continuation.text, genre, continuation.choices);
        if let Some(kind) = continuation.ending {
            scene = scene.with_ending(kind);
        }
        state.current_scene = scene;
        state.record_advance();
        state.choice_history.push(choice.id().to_string());
        if let Some(delta) = &continuation.delta {
            state.apply_delta(delta);
        }
        state.metadata = RoundMetadata {
            last_choice_count: Some(offered),
            last_necessity: Some(continuation.necessity),
        };
        if state.is_complete() {
            let scene = &mut state.current_scene;
            scene.terminal = true;
            if scene.ending.is_none() {
                scene.ending = Some(STEP_LIMIT_ENDING.to_string());
            }
        }
        state.record_history(choice.text());

        info!(
            scene_count = state.scene_count(),
            progress = state.progress(),
            choices = offered,
            complete = state.is_complete(),
            "advanced story"
        );
        Ok(state)
    }

    /// Rewind to history step `target` without calling any generator.
    #[instrument(skip(self))]
    pub fn rollback(&mut self, target: usize) -> Result<&StoryState, EngineError> {
        let state = self.state.as_mut().ok_or(EngineError::NoActiveStory)?;
        state.rollback(target)?;
        info!(
            target,
            scene_count = state.scene_count(),
            history = state.history().len(),
            "rolled back story"
        );
        Ok(state)
    }
}

impl std::fmt::Debug for StoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryEngine")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockContentGenerator, MockImageGenerator};

    fn engine(content: MockContentGenerator) -> StoryEngine {
        StoryEngine::new(
            Arc::new(content),
            Arc::new(MockImageGenerator::new()),
            EngineConfig::new().with_retry(crate::retry::RetryPolicy::none()),
        )
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let mut engine = engine(MockContentGenerator::new());
        assert_eq!(engine.status(), EngineStatus::Uninitialized);
        assert_eq!(engine.rollback(0).unwrap_err(), EngineError::NoActiveStory);
        assert_eq!(engine.advance("1").await.unwrap_err(), EngineError::NoActiveStory);

        engine.start(ImageRef::from("mock://start"), None).await.unwrap();
        assert_eq!(engine.status(), EngineStatus::Active);
    }

    #[tokio::test]
    async fn test_explicit_genre_wins() {
        let mut engine = engine(MockContentGenerator::new().with_genre_suggestion("horror"));
        let state = engine
            .start(ImageRef::from("mock://start"), Some(Genre::Comedy))
            .await
            .unwrap();
        assert_eq!(state.current_scene().genre, Genre::Comedy);
    }

    #[tokio::test]
    async fn test_inferred_genre() {
        let mut engine = engine(MockContentGenerator::new().with_genre_suggestion("a gothic horror tale"));
        let state = engine.start(ImageRef::from("mock://start"), None).await.unwrap();
        assert_eq!(state.current_scene().genre, Genre::Horror);
    }

    #[tokio::test]
    async fn test_ending_scene_completes_story() {
        let content = MockContentGenerator::new();
        content.queue_ending("The tower collapses behind you.", "success");
        let mut engine = engine(content);
        engine.start(ImageRef::from("mock://start"), None).await.unwrap();

        let state = engine.advance("1").await.unwrap();
        assert!(state.is_complete());
        assert!(!state.is_terminal());
        assert_eq!(state.current_scene().ending.as_deref(), Some("success"));
        assert_eq!(engine.status(), EngineStatus::Complete);
    }
}
