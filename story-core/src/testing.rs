//! Testing utilities for the story engine.
//!
//! This module provides tools for integration testing:
//! - `MockContentGenerator` and `MockImageGenerator` for deterministic
//!   testing without API calls
//! - `TestHarness` for scripted story scenarios
//! - Assertion helpers for verifying story state

use crate::config::EngineConfig;
use crate::engine::{EngineError, StoryEngine};
use crate::generator::{
    AnalysisResult, ContentGenerator, Continuation, ContinuationRequest, GeneratorError,
    ImageGenerator, StoryDraft,
};
use crate::outline::StoryOutline;
use crate::progress::progress_percent;
use crate::retry::RetryPolicy;
use crate::scene::{Choice, ChoiceCategory, Genre, ImageRef};
use crate::state::{StateDelta, StoryState};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A scripted reply: either a value or an injected failure.
#[derive(Debug, Clone)]
pub enum MockReply<T> {
    Reply(T),
    Fail(GeneratorError),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn next_reply<T: Clone>(queue: &Mutex<VecDeque<MockReply<T>>>, default: impl FnOnce() -> T) -> Result<T, GeneratorError> {
    match lock(queue).pop_front() {
        Some(MockReply::Reply(value)) => Ok(value),
        Some(MockReply::Fail(err)) => Err(err),
        None => Ok(default()),
    }
}

// ============================================================================
// Mock content generator
// ============================================================================

/// A content generator that returns scripted replies.
///
/// When a queue runs dry it falls back to deterministic defaults: a calm
/// three-choice scene (action, dialogue, item) whose text names the step.
pub struct MockContentGenerator {
    analysis: AnalysisResult,
    continuation_delta: Option<StateDelta>,
    analyses: Mutex<VecDeque<MockReply<AnalysisResult>>>,
    openings: Mutex<VecDeque<MockReply<StoryDraft>>>,
    continuations: Mutex<VecDeque<MockReply<Continuation>>>,
    requests: Mutex<Vec<ContinuationRequest>>,
    analyze_calls: AtomicUsize,
    opening_calls: AtomicUsize,
    continue_calls: AtomicUsize,
}

impl MockContentGenerator {
    pub fn new() -> Self {
        Self {
            analysis: AnalysisResult {
                scene_description: "A harbour town at dawn, boats tied along the quay.".to_string(),
                key_objects: vec!["map".to_string(), "lantern".to_string()],
                story_elements: "a missing cartographer".to_string(),
                emotional_tone: "hopeful".to_string(),
                genre_suggestion: "adventure".to_string(),
                ..Default::default()
            },
            continuation_delta: None,
            analyses: Mutex::new(VecDeque::new()),
            openings: Mutex::new(VecDeque::new()),
            continuations: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            analyze_calls: AtomicUsize::new(0),
            opening_calls: AtomicUsize::new(0),
            continue_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_genre_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.analysis.genre_suggestion = suggestion.into();
        self
    }

    pub fn with_outline(mut self, outline: StoryOutline) -> Self {
        self.analysis.outline = Some(outline);
        self
    }

    /// Attach `delta` to every default continuation.
    pub fn with_continuation_delta(mut self, delta: StateDelta) -> Self {
        self.continuation_delta = Some(delta);
        self
    }

    pub fn queue_analysis(&self, reply: MockReply<AnalysisResult>) {
        lock(&self.analyses).push_back(reply);
    }

    pub fn queue_opening(&self, reply: MockReply<StoryDraft>) {
        lock(&self.openings).push_back(reply);
    }

    pub fn queue_continuation(&self, continuation: Continuation) {
        lock(&self.continuations).push_back(MockReply::Reply(continuation));
    }

    /// Queue a continuation that ends the story.
    pub fn queue_ending(&self, text: &str, kind: &str) {
        self.queue_continuation(Continuation::new(text, Vec::new()).with_ending(kind));
    }

    /// Make the next `count` continuation calls fail with `err`.
    pub fn fail_continuations(&self, count: usize, err: GeneratorError) {
        let mut queue = lock(&self.continuations);
        for _ in 0..count {
            queue.push_front(MockReply::Fail(err.clone()));
        }
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn opening_calls(&self) -> usize {
        self.opening_calls.load(Ordering::SeqCst)
    }

    pub fn continue_calls(&self) -> usize {
        self.continue_calls.load(Ordering::SeqCst)
    }

    /// Every continuation request received so far.
    pub fn requests(&self) -> Vec<ContinuationRequest> {
        lock(&self.requests).clone()
    }

    fn default_opening() -> StoryDraft {
        StoryDraft {
            text: "The cartographer's door stands open and her desk is bare.".to_string(),
            choices: vec![
                Choice::new("1", "Search the desk", ChoiceCategory::Action),
                Choice::new("2", "Ask the neighbour", ChoiceCategory::Dialogue),
                Choice::new("3", "Light the lantern", ChoiceCategory::Item),
            ],
        }
    }

    fn default_continuation(&self, step: usize, request: &ContinuationRequest) -> Continuation {
        let text = format!(
            "Step {step}. You chose to {}. The trail leads further along the coast.",
            request.choice_text.to_lowercase()
        );
        let choices = vec![
            Choice::new("1", "Follow the trail", ChoiceCategory::Action),
            Choice::new("2", "Talk to a fisherman", ChoiceCategory::Dialogue),
            Choice::new("3", "Check the map", ChoiceCategory::Item),
        ];
        let continuation = Continuation::new(text, choices);
        match &self.continuation_delta {
            Some(delta) => continuation.with_delta(delta.clone()),
            None => continuation,
        }
    }
}

impl Default for MockContentGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentGenerator for MockContentGenerator {
    async fn analyze(&self, _image: &ImageRef) -> Result<AnalysisResult, GeneratorError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        next_reply(&self.analyses, || self.analysis.clone())
    }

    async fn generate_initial(
        &self,
        _analysis: &AnalysisResult,
        _genre: Genre,
    ) -> Result<StoryDraft, GeneratorError> {
        self.opening_calls.fetch_add(1, Ordering::SeqCst);
        next_reply(&self.openings, Self::default_opening)
    }

    async fn continue_story(
        &self,
        request: &ContinuationRequest,
    ) -> Result<Continuation, GeneratorError> {
        let step = self.continue_calls.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.requests).push(request.clone());
        next_reply(&self.continuations, || self.default_continuation(step, request))
    }
}

// ============================================================================
// Mock image generator
// ============================================================================

/// An image generator that returns `mock://image/<n>` references.
pub struct MockImageGenerator {
    calls: AtomicUsize,
    failures_remaining: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockImageGenerator {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Make the next `count` renders fail.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

impl Default for MockImageGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn render(&self, prompt: &str) -> Result<ImageRef, GeneratorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.prompts).push(prompt.to_string());

        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(GeneratorError::Transport("render refused".to_string()));
        }
        Ok(ImageRef::new(format!("mock://image/{n}")))
    }
}

// ============================================================================
// Test harness
// ============================================================================

/// Test harness for running story scenarios against mock generators.
pub struct TestHarness {
    /// The mock content generator, shared with the engine.
    pub content: Arc<MockContentGenerator>,
    /// The mock image generator, shared with the engine.
    pub images: Arc<MockImageGenerator>,
    /// The engine under test.
    pub engine: StoryEngine,
}

impl TestHarness {
    /// A harness with a ten-step horizon and default mocks.
    pub fn new() -> Self {
        Self::with_content(MockContentGenerator::new(), 10)
    }

    pub fn with_max_scenes(max_scenes: u32) -> Self {
        Self::with_content(MockContentGenerator::new(), max_scenes)
    }

    /// A harness around a customised content generator.
    ///
    /// Generator calls are retried once, without backoff.
    pub fn with_content(content: MockContentGenerator, max_scenes: u32) -> Self {
        let content = Arc::new(content);
        let images = Arc::new(MockImageGenerator::new());
        let config = EngineConfig::new()
            .with_max_scenes(max_scenes)
            .with_retry(RetryPolicy::default().with_backoff(Duration::ZERO));
        let engine = StoryEngine::new(content.clone(), images.clone(), config);

        Self {
            content,
            images,
            engine,
        }
    }

    /// Start a story from a mock opening image.
    pub async fn start(&mut self) -> Result<&StoryState, EngineError> {
        self.engine.start(ImageRef::from("mock://opening"), None).await
    }

    pub async fn advance(&mut self, choice_id: &str) -> Result<&StoryState, EngineError> {
        self.engine.advance(choice_id).await
    }

    /// Take each choice in turn, stopping at the first error.
    pub async fn play(&mut self, choice_ids: &[&str]) -> Result<(), EngineError> {
        for id in choice_ids {
            self.engine.advance(id).await?;
        }
        Ok(())
    }

    pub fn rollback(&mut self, target: usize) -> Result<&StoryState, EngineError> {
        self.engine.rollback(target)
    }

    pub fn state(&self) -> Option<&StoryState> {
        self.engine.state()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that progress lies in [0, 100] and matches the step counters.
#[track_caller]
pub fn assert_progress_invariant(state: &StoryState) {
    let progress = state.progress();
    assert!(
        (0.0..=100.0).contains(&progress),
        "Expected progress within [0, 100], got {progress}"
    );
    let expected = progress_percent(state.scene_count(), state.max_scenes());
    assert_eq!(
        progress, expected,
        "Expected progress {expected} for {}/{} scenes, got {progress}",
        state.scene_count(),
        state.max_scenes()
    );
}

/// Assert the story has advanced exactly `expected` steps.
#[track_caller]
pub fn assert_scene_count(state: &StoryState, expected: u32) {
    assert_eq!(
        state.scene_count(),
        expected,
        "Expected scene_count {expected}, got {}",
        state.scene_count()
    );
}

/// Assert the history log holds `expected` entries.
#[track_caller]
pub fn assert_history_len(state: &StoryState, expected: usize) {
    assert_eq!(
        state.history().len(),
        expected,
        "Expected {expected} history entries, got {}",
        state.history().len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_defaults() {
        let mut harness = TestHarness::new();
        let state = harness.start().await.unwrap();

        assert_eq!(state.current_scene().choices.len(), 3);
        assert_eq!(state.current_scene().image.as_str(), "mock://image/1");
        assert_eq!(harness.content.analyze_calls(), 1);
        assert_eq!(harness.content.opening_calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_continuation() {
        let mut harness = TestHarness::new();
        harness.content.queue_continuation(Continuation::new(
            "A gull drops a key at your feet.",
            vec![Choice::new("k", "Pick it up", ChoiceCategory::Item)],
        ));
        harness.start().await.unwrap();

        let state = harness.advance("2").await.unwrap();
        assert_eq!(state.current_scene().text, "A gull drops a key at your feet.");
        assert_eq!(harness.content.requests()[0].choice_text, "Ask the neighbour");
    }

    #[tokio::test]
    async fn test_image_failures_count_down() {
        let images = MockImageGenerator::new();
        images.fail_next(1);
        assert!(images.render("a").await.is_err());
        assert!(images.render("b").await.is_ok());
        assert_eq!(images.calls(), 2);
        assert_eq!(images.prompts(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_harness_play() {
        let mut harness = TestHarness::with_max_scenes(5);
        harness.start().await.unwrap();
        harness.play(&["1", "2", "3"]).await.unwrap();

        let state = harness.state().unwrap();
        assert_scene_count(state, 3);
        assert_history_len(state, 4);
        assert_progress_invariant(state);
    }
}
