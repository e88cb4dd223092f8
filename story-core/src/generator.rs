//! Interfaces to the external content and image generators.
//!
//! The engine only ever talks to these traits. `providers` implements them
//! against the GRS AI API; `testing` implements them with scripted mocks.

use crate::analyzer::Guidance;
use crate::outline::{Figure, StoryOutline};
use crate::scene::{Choice, ChoiceCategory, Genre, ImageRef, Necessity};
use crate::state::StateDelta;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Why a generator call produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("generator returned nothing")]
    Empty,

    #[error("generator timed out")]
    Timeout,
}

impl From<grsai::Error> for GeneratorError {
    fn from(err: grsai::Error) -> Self {
        match err {
            grsai::Error::Timeout => GeneratorError::Timeout,
            grsai::Error::Parse(msg) => GeneratorError::Malformed(msg),
            other => GeneratorError::Transport(other.to_string()),
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// What the content generator read out of the opening image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub scene_description: String,
    pub characters: Vec<Figure>,
    pub key_objects: Vec<String>,
    /// Visual style, including dominant colours when reported.
    pub style: String,
    pub story_elements: String,
    pub emotional_tone: String,
    /// Free text; mapped onto a `Genre` by the engine.
    pub genre_suggestion: String,
    pub outline: Option<StoryOutline>,
}

impl AnalysisResult {
    /// A one-line theme summary for the story state.
    pub fn theme(&self) -> String {
        [self.story_elements.as_str(), self.emotional_tone.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

/// Opening narrative and first choice set.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryDraft {
    pub text: String,
    pub choices: Vec<Choice>,
}

/// Everything the content generator gets to write the next scene.
#[derive(Debug, Clone)]
pub struct ContinuationRequest {
    pub current_text: String,
    pub choice_text: String,
    pub choice_category: ChoiceCategory,
    pub genre: Genre,
    pub theme: String,
    pub guidance: Guidance,
    pub outline: Option<Arc<StoryOutline>>,
}

/// The next scene as written by the content generator.
#[derive(Debug, Clone, PartialEq)]
pub struct Continuation {
    pub text: String,
    pub choices: Vec<Choice>,
    /// How many choices the generator says it offered.
    pub offered_count: usize,
    pub necessity: Necessity,
    /// Set when the generator ended the story with this scene.
    pub ending: Option<String>,
    pub delta: Option<StateDelta>,
}

impl Continuation {
    pub fn new(text: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self {
            text: text.into(),
            offered_count: choices.len(),
            choices,
            necessity: Necessity::Optional,
            ending: None,
            delta: None,
        }
    }

    pub fn with_necessity(mut self, necessity: Necessity) -> Self {
        self.necessity = necessity;
        self
    }

    pub fn with_ending(mut self, kind: impl Into<String>) -> Self {
        self.ending = Some(kind.into());
        self
    }

    pub fn with_delta(mut self, delta: StateDelta) -> Self {
        self.delta = Some(delta);
        self
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Writes narrative: analysis of the opening image, the opening scene and
/// every continuation.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn analyze(&self, image: &ImageRef) -> Result<AnalysisResult, GeneratorError>;

    async fn generate_initial(
        &self,
        analysis: &AnalysisResult,
        genre: Genre,
    ) -> Result<StoryDraft, GeneratorError>;

    async fn continue_story(
        &self,
        request: &ContinuationRequest,
    ) -> Result<Continuation, GeneratorError>;
}

/// Renders a scene image from a text prompt.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn render(&self, prompt: &str) -> Result<ImageRef, GeneratorError>;
}
