//! Generators backed by the GRS AI API.

use crate::config::{GrsConfig, Sampling};
use crate::generator::{
    AnalysisResult, ContentGenerator, Continuation, ContinuationRequest, GeneratorError,
    ImageGenerator, StoryDraft,
};
use crate::parse;
use crate::prompts;
use crate::scene::{Genre, ImageRef};
use async_trait::async_trait;
use grsai::{ChatRequest, DrawRequest, GrsAi, Message};

/// Content generator using GRS AI chat completions.
#[derive(Clone)]
pub struct GrsContentGenerator {
    client: GrsAi,
    config: GrsConfig,
    plan_steps: u32,
}

impl GrsContentGenerator {
    pub fn new(config: GrsConfig) -> Self {
        Self {
            client: config.client(),
            config,
            plan_steps: 10,
        }
    }

    pub fn from_env() -> Result<Self, GeneratorError> {
        Ok(Self::new(GrsConfig::from_env()?))
    }

    /// Number of steps the analysis should plan for; match the engine's
    /// `max_scenes`.
    pub fn with_plan_steps(mut self, steps: u32) -> Self {
        self.plan_steps = steps.max(1);
        self
    }

    async fn complete(&self, message: Message, sampling: Sampling) -> Result<String, GeneratorError> {
        let request = ChatRequest::new(vec![message])
            .with_temperature(sampling.temperature)
            .with_max_tokens(sampling.max_tokens);
        let response = self.client.chat(request).await?;
        if response.content.trim().is_empty() {
            return Err(GeneratorError::Empty);
        }
        tracing::debug!(
            model = %response.model,
            chars = response.content.len(),
            "chat completion received"
        );
        Ok(response.content)
    }
}

#[async_trait]
impl ContentGenerator for GrsContentGenerator {
    async fn analyze(&self, image: &ImageRef) -> Result<AnalysisResult, GeneratorError> {
        let message = Message::user_with_image(prompts::analysis_prompt(self.plan_steps), image.as_str());
        let content = self.complete(message, self.config.analysis).await?;
        parse::parse_analysis(&content)
    }

    async fn generate_initial(
        &self,
        analysis: &AnalysisResult,
        genre: Genre,
    ) -> Result<StoryDraft, GeneratorError> {
        let message = Message::user(prompts::opening_prompt(analysis, genre));
        let content = self.complete(message, self.config.opening).await?;
        parse::parse_draft(&content)
    }

    async fn continue_story(
        &self,
        request: &ContinuationRequest,
    ) -> Result<Continuation, GeneratorError> {
        let message = Message::user(prompts::continuation_prompt(request));
        let content = self.complete(message, self.config.continuation).await?;
        parse::parse_continuation(&content)
    }
}

/// Image generator using the GRS AI draw endpoint.
///
/// A failed draw is retried once with a neutral scene prompt, since most
/// failures are content refusals of the scene text.
#[derive(Clone)]
pub struct GrsImageGenerator {
    client: GrsAi,
    fallback_prompt: Option<String>,
}

impl GrsImageGenerator {
    pub fn new(config: &GrsConfig) -> Self {
        Self {
            client: config.client(),
            fallback_prompt: Some(prompts::FALLBACK_IMAGE_PROMPT.to_string()),
        }
    }

    pub fn from_env() -> Result<Self, GeneratorError> {
        Ok(Self::new(&GrsConfig::from_env()?))
    }

    /// Replace the fallback prompt, or disable the fallback with `None`.
    pub fn with_fallback_prompt(mut self, prompt: Option<String>) -> Self {
        self.fallback_prompt = prompt;
        self
    }

    async fn draw(&self, prompt: &str) -> Result<ImageRef, GeneratorError> {
        let url = self
            .client
            .draw_to_completion(DrawRequest::new(prompt))
            .await?;
        Ok(ImageRef::new(url))
    }
}

#[async_trait]
impl ImageGenerator for GrsImageGenerator {
    async fn render(&self, prompt: &str) -> Result<ImageRef, GeneratorError> {
        match self.draw(prompt).await {
            Ok(image) => Ok(image),
            Err(err) => match &self.fallback_prompt {
                Some(fallback) => {
                    tracing::warn!(error = %err, "draw failed, retrying with fallback prompt");
                    self.draw(fallback).await
                }
                None => Err(err),
            },
        }
    }
}
