//! Context analysis: how many choices the next scene should offer and how
//! hard the plot must push forward.
//!
//! Everything here is advisory. The analyzer reads a `StoryState` and
//! produces guidance for the content generator; it never mutates state.

use crate::outline::PlanStep;
use crate::scene::{ChoiceCategory, Scene};
use crate::state::StoryState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Danger above this level leaves the reader with no resources.
pub const DANGER_THRESHOLD: i32 = 70;

/// How many trailing choice ids are inspected for an action streak.
pub const STREAK_WINDOW: usize = 5;

/// A trailing run of this many action choices forces plot advancement.
pub const STREAK_THRESHOLD: u32 = 2;

// ============================================================================
// Assessment types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

impl Urgency {
    pub fn name(&self) -> &'static str {
        match self {
            Urgency::High => "high",
            Urgency::Medium => "medium",
            Urgency::Low => "low",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the reader still has to work with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resources {
    Abundant,
    Limited,
    Zero,
}

impl Resources {
    pub fn name(&self) -> &'static str {
        match self {
            Resources::Abundant => "abundant",
            Resources::Limited => "limited",
            Resources::Zero => "zero",
        }
    }

    pub fn assess(consecutive_failures: u32, danger_level: i32) -> Resources {
        if danger_level > DANGER_THRESHOLD {
            Resources::Zero
        } else if consecutive_failures > 0 {
            Resources::Limited
        } else {
            Resources::Abundant
        }
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shape of the next scene as read from the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneContext {
    pub urgency: Urgency,
    pub resources: Resources,
    /// 1, 2 or 3.
    pub natural_choice_count: usize,
    pub must_advance: bool,
    pub reasoning: String,
}

/// Everything the content generator is told about pacing for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guidance {
    pub context: SceneContext,
    /// Trailing run of action choices in recent history.
    pub consecutive_actions: u32,
    pub push_progress: bool,
    /// Past the midpoint of the step horizon.
    pub climax_reached: bool,
    /// 1-based number of the step about to be generated.
    pub next_step: u32,
    pub max_scenes: u32,
    /// What the outline intends for the next step, if anything.
    pub plan_step: Option<PlanStep>,
}

impl Guidance {
    /// Either the scene or the reader's recent run demands the plot move on.
    pub fn must_advance(&self) -> bool {
        self.context.must_advance || self.push_progress
    }

    /// The round that reaches the step horizon.
    pub fn is_final_step(&self) -> bool {
        self.next_step >= self.max_scenes
    }
}

// ============================================================================
// Classifier seam
// ============================================================================

/// Text-to-label heuristics used by the analyzer.
///
/// Implement this to swap keyword matching for a better classifier without
/// touching the engine.
pub trait NarrativeClassifier: Send + Sync {
    fn urgency(&self, text: &str) -> Urgency;

    /// Whether the text contains a discourse marker for a sudden turn.
    fn has_sudden_turn(&self, text: &str) -> bool;
}

/// Keyword-presence classifier over English and Chinese vocabulary.
///
/// English keywords match word prefixes ("escape" matches "escaped"), turn
/// markers match whole words, and CJK keywords match anywhere.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    urgent: Vec<String>,
    calm: Vec<String>,
    turns: Vec<String>,
}

const URGENT_WORDS: &[&str] = &[
    "danger", "urgent", "immediately", "hurry", "quick", "escape", "flee", "rescue", "危险", "紧急",
    "立即", "快", "逃跑", "救援",
];

const CALM_WORDS: &[&str] = &[
    "rest", "observe", "think", "ponder", "quiet", "calm", "休息", "观察", "思考", "可以",
];

const TURN_WORDS: &[&str] = &["but", "however", "suddenly", "但是", "然而", "突然"];

impl KeywordClassifier {
    pub fn new(urgent: &[&str], calm: &[&str], turns: &[&str]) -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| w.to_lowercase()).collect();
        Self {
            urgent: owned(urgent),
            calm: owned(calm),
            turns: owned(turns),
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(URGENT_WORDS, CALM_WORDS, TURN_WORDS)
    }
}

impl NarrativeClassifier for KeywordClassifier {
    fn urgency(&self, text: &str) -> Urgency {
        let text = text.to_lowercase();
        let words = words(&text);
        let found = |keywords: &[String]| {
            keywords.iter().any(|k| {
                if is_cjk(k) {
                    text.contains(k.as_str())
                } else {
                    words.iter().any(|w| w.starts_with(k.as_str()))
                }
            })
        };

        if found(&self.urgent) {
            Urgency::High
        } else if found(&self.calm) {
            Urgency::Low
        } else {
            Urgency::Medium
        }
    }

    fn has_sudden_turn(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        let words = words(&text);
        self.turns.iter().any(|k| {
            if is_cjk(k) {
                text.contains(k.as_str())
            } else {
                words.contains(&k.as_str())
            }
        })
    }
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric() || is_cjk_char(c))
        .filter(|w| !w.is_empty())
        .collect()
}

fn is_cjk(keyword: &str) -> bool {
    keyword.chars().any(is_cjk_char)
}

fn is_cjk_char(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{30ff}' | '\u{3400}'..='\u{4dbf}' | '\u{4e00}'..='\u{9fff}')
}

// ============================================================================
// Analyzer
// ============================================================================

/// Produces pacing guidance from a story state.
#[derive(Clone)]
pub struct ContextAnalyzer {
    classifier: Arc<dyn NarrativeClassifier>,
}

impl ContextAnalyzer {
    pub fn new(classifier: Arc<dyn NarrativeClassifier>) -> Self {
        Self { classifier }
    }

    /// Urgency, resources and the natural choice count for the current scene.
    pub fn assess(&self, state: &StoryState) -> SceneContext {
        let text = &state.current_scene().text;
        let urgency = self.classifier.urgency(text);
        let resources = Resources::assess(state.consecutive_failures(), state.danger_level());

        let (natural_choice_count, must_advance) = if urgency == Urgency::High {
            (1, true)
        } else if self.classifier.has_sudden_turn(text) {
            (2, true)
        } else {
            (3, false)
        };

        let reasoning = format!(
            "urgency: {urgency}, consecutive failures: {}, danger: {}",
            state.consecutive_failures(),
            state.danger_level()
        );
        debug!(%urgency, %resources, natural_choice_count, must_advance, "assessed scene");

        SceneContext {
            urgency,
            resources,
            natural_choice_count,
            must_advance,
            reasoning,
        }
    }

    /// Full guidance for the round that follows the current scene.
    pub fn guidance(&self, state: &StoryState) -> Guidance {
        let context = self.assess(state);
        let consecutive_actions = action_streak(state.choice_history(), state.current_scene());
        let push_progress = consecutive_actions >= STREAK_THRESHOLD;
        let climax_reached = 2 * state.scene_count() >= state.max_scenes();
        let next_step = state.scene_count() + 1;
        let plan_step = state
            .outline()
            .and_then(|o| o.plan_for_step(next_step))
            .cloned();

        if push_progress {
            debug!(consecutive_actions, "action streak, pushing plot forward");
        }

        Guidance {
            context,
            consecutive_actions,
            push_progress,
            climax_reached,
            next_step,
            max_scenes: state.max_scenes(),
            plan_step,
        }
    }
}

impl Default for ContextAnalyzer {
    fn default() -> Self {
        Self::new(Arc::new(KeywordClassifier::default()))
    }
}

impl fmt::Debug for ContextAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextAnalyzer").finish_non_exhaustive()
    }
}

/// Length of the trailing run of action choices among the last
/// `STREAK_WINDOW` ids, resolved against the current scene's choices.
///
/// The scan stops at the first id the scene does not offer or that names a
/// non-action choice.
pub fn action_streak(choice_history: &[String], scene: &Scene) -> u32 {
    let start = choice_history.len().saturating_sub(STREAK_WINDOW);
    let mut streak = 0;
    for id in choice_history[start..].iter().rev() {
        match scene.choice(id) {
            Some(choice) if choice.category() == ChoiceCategory::Action => streak += 1,
            _ => break,
        }
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::StoryOutline;
    use crate::scene::{Choice, Genre, ImageRef};

    fn scene(text: &str) -> Scene {
        Scene::new(
            ImageRef::from("mock://scene"),
            text,
            Genre::Adventure,
            vec![
                Choice::new("1", "Charge", ChoiceCategory::Action),
                Choice::new("2", "Parley", ChoiceCategory::Dialogue),
                Choice::new("3", "Sprint", ChoiceCategory::Action),
            ],
        )
    }

    fn state_with(text: &str, history: &[&str]) -> StoryState {
        let mut state = StoryState::new(scene(text), 10, "", None);
        state.choice_history = history.iter().map(|s| s.to_string()).collect();
        state
    }

    #[test]
    fn test_urgent_text_forces_single_choice() {
        let analyzer = ContextAnalyzer::default();
        for history in [&[][..], &["1", "1"][..], &["2", "3", "9"][..]] {
            let state = state_with("You must escape before the roof falls!", history);
            let context = analyzer.assess(&state);
            assert_eq!(context.urgency, Urgency::High);
            assert_eq!(context.natural_choice_count, 1);
            assert!(context.must_advance);
        }
    }

    #[test]
    fn test_chinese_keywords() {
        let analyzer = ContextAnalyzer::default();
        let high = analyzer.assess(&state_with("前方有危险，必须立即离开", &[]));
        assert_eq!(high.natural_choice_count, 1);

        let turn = analyzer.assess(&state_with("一切都很平静，突然门开了", &[]));
        assert_eq!(turn.natural_choice_count, 2);
        assert!(turn.must_advance);

        let low = analyzer.assess(&state_with("你坐下来休息", &[]));
        assert_eq!(low.urgency, Urgency::Low);
        assert_eq!(low.natural_choice_count, 3);
    }

    #[test]
    fn test_turn_marker_needs_whole_word() {
        let analyzer = ContextAnalyzer::default();
        let context = analyzer.assess(&state_with("A butterfly lands on the sill.", &[]));
        assert_eq!(context.urgency, Urgency::Medium);
        assert_eq!(context.natural_choice_count, 3);
        assert!(!context.must_advance);

        let context = analyzer.assess(&state_with("The road is long. Suddenly, a rider.", &[]));
        assert_eq!(context.natural_choice_count, 2);
    }

    #[test]
    fn test_resources() {
        assert_eq!(Resources::assess(0, 0), Resources::Abundant);
        assert_eq!(Resources::assess(1, 10), Resources::Limited);
        assert_eq!(Resources::assess(3, 70), Resources::Limited);
        assert_eq!(Resources::assess(0, 71), Resources::Zero);
    }

    #[test]
    fn test_action_streak_stops_at_non_action() {
        let s = scene("calm");
        let ids = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(action_streak(&ids(&[]), &s), 0);
        assert_eq!(action_streak(&ids(&["2", "1", "3"]), &s), 2);
        assert_eq!(action_streak(&ids(&["1", "3", "2"]), &s), 0);
        assert_eq!(action_streak(&ids(&["1", "9", "1"]), &s), 1);
        assert_eq!(action_streak(&ids(&["1", "1", "1", "1", "1", "1", "1"]), &s), 5);
    }

    #[test]
    fn test_guidance_flags() {
        let analyzer = ContextAnalyzer::default();
        let mut state = state_with("The market hums.", &["2", "1", "1"]);
        state.scene_count = 5;

        let guidance = analyzer.guidance(&state);
        assert_eq!(guidance.consecutive_actions, 2);
        assert!(guidance.push_progress);
        assert!(guidance.must_advance());
        assert!(guidance.climax_reached);
        assert_eq!(guidance.next_step, 6);
        assert!(!guidance.is_final_step());
    }

    #[test]
    fn test_guidance_carries_plan_step() {
        let outline = StoryOutline {
            plan: vec![crate::outline::PlanStep {
                step: 1,
                description: "Find the map".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let state = StoryState::new(scene("quiet"), 10, "", Some(outline));
        let guidance = ContextAnalyzer::default().guidance(&state);
        assert_eq!(
            guidance.plan_step.map(|p| p.description),
            Some("Find the map".to_string())
        );
        assert!(!guidance.climax_reached);
    }
}
