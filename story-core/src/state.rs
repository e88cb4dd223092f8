//! Story state for one session.
//!
//! `StoryState` owns everything that changes while a story is played: the
//! current scene, the choice log, the step history with its snapshots and
//! the world-state counters. Progress is never stored; it is derived from
//! `scene_count` and `max_scenes` on every read.

use crate::history::{History, HistoryEntry};
use crate::outline::StoryOutline;
use crate::scene::{Necessity, Scene};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Open-ended world records (item states, NPC relations), keyed by name.
pub type RecordMap = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

// ============================================================================
// Attributes
// ============================================================================

/// The reader's tracked personal attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Courage,
    Wisdom,
    Kindness,
}

impl Attribute {
    pub const ALL: [Attribute; 3] = [Attribute::Courage, Attribute::Wisdom, Attribute::Kindness];

    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Courage => "courage",
            Attribute::Wisdom => "wisdom",
            Attribute::Kindness => "kindness",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Attribute {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Attribute::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

/// Attribute values, each kept within `[MIN, MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    courage: i32,
    wisdom: i32,
    kindness: i32,
}

impl Attributes {
    pub const MIN: i32 = 0;
    pub const MAX: i32 = 100;
    pub const DEFAULT: i32 = 50;

    pub fn get(&self, attribute: Attribute) -> i32 {
        match attribute {
            Attribute::Courage => self.courage,
            Attribute::Wisdom => self.wisdom,
            Attribute::Kindness => self.kindness,
        }
    }

    /// Add `delta` to one attribute, clamping the result. Returns the new value.
    pub fn adjust(&mut self, attribute: Attribute, delta: i32) -> i32 {
        let slot = match attribute {
            Attribute::Courage => &mut self.courage,
            Attribute::Wisdom => &mut self.wisdom,
            Attribute::Kindness => &mut self.kindness,
        };
        *slot = slot.saturating_add(delta).clamp(Self::MIN, Self::MAX);
        *slot
    }

    pub fn iter(&self) -> impl Iterator<Item = (Attribute, i32)> + '_ {
        Attribute::ALL.into_iter().map(|a| (a, self.get(a)))
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            courage: Self::DEFAULT,
            wisdom: Self::DEFAULT,
            kindness: Self::DEFAULT,
        }
    }
}

// ============================================================================
// World-state deltas
// ============================================================================

/// How the chosen action turned out, as judged by the content generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Neutral,
}

/// World-state changes reported alongside a continuation.
///
/// Applied only when the whole round commits.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateDelta {
    /// Attribute name to signed change. Unknown names are ignored.
    #[serde(default)]
    pub attributes: BTreeMap<String, i32>,
    #[serde(default)]
    pub danger: i32,
    #[serde(default)]
    pub outcome: Option<Outcome>,
    /// Records merged field by field into `item_states`.
    #[serde(default)]
    pub items: RecordMap,
    /// Records merged field by field into `npc_relations`.
    #[serde(default)]
    pub npcs: RecordMap,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
            && self.danger == 0
            && self.outcome.is_none()
            && self.items.is_empty()
            && self.npcs.is_empty()
    }
}

/// Diagnostics from the most recent successful round.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoundMetadata {
    pub last_choice_count: Option<usize>,
    pub last_necessity: Option<Necessity>,
}

// ============================================================================
// StoryState
// ============================================================================

/// Full mutable state of one story session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryState {
    pub(crate) current_scene: Scene,
    pub(crate) choice_history: Vec<String>,
    pub(crate) history: History,
    pub(crate) scene_count: u32,
    pub(crate) max_scenes: u32,
    pub(crate) terminal: bool,
    pub(crate) theme: String,
    pub(crate) outline: Option<Arc<StoryOutline>>,
    pub(crate) attributes: Attributes,
    pub(crate) item_states: RecordMap,
    pub(crate) npc_relations: RecordMap,
    pub(crate) danger_level: i32,
    pub(crate) consecutive_failures: u32,
    pub(crate) metadata: RoundMetadata,
}

impl StoryState {
    /// Create the state for a freshly started story.
    ///
    /// The opening scene is recorded as history entry 0. A `max_scenes` of
    /// zero is treated as 1 so the progress formula stays defined.
    pub fn new(
        opening: Scene,
        max_scenes: u32,
        theme: impl Into<String>,
        outline: Option<StoryOutline>,
    ) -> Self {
        let mut state = Self {
            current_scene: opening,
            choice_history: Vec::new(),
            history: History::new(),
            scene_count: 0,
            max_scenes: max_scenes.max(1),
            terminal: false,
            theme: theme.into(),
            outline: outline.map(Arc::new),
            attributes: Attributes::default(),
            item_states: RecordMap::new(),
            npc_relations: RecordMap::new(),
            danger_level: 0,
            consecutive_failures: 0,
            metadata: RoundMetadata::default(),
        };
        state.record_history(HistoryEntry::OPENING_CHOICE);
        state
    }

    pub fn current_scene(&self) -> &Scene {
        &self.current_scene
    }

    pub fn choice_history(&self) -> &[String] {
        &self.choice_history
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn scene_count(&self) -> u32 {
        self.scene_count
    }

    pub fn max_scenes(&self) -> u32 {
        self.max_scenes
    }

    /// Session-level terminal flag (step horizon reached).
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn outline(&self) -> Option<&StoryOutline> {
        self.outline.as_deref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn item_states(&self) -> &RecordMap {
        &self.item_states
    }

    pub fn npc_relations(&self) -> &RecordMap {
        &self.npc_relations
    }

    pub fn danger_level(&self) -> i32 {
        self.danger_level
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn metadata(&self) -> &RoundMetadata {
        &self.metadata
    }

    /// Apply a continuation's world-state changes.
    pub(crate) fn apply_delta(&mut self, delta: &StateDelta) {
        for (name, change) in &delta.attributes {
            self.adjust_attribute(name, *change);
        }

        self.danger_level = self.danger_level.saturating_add(delta.danger).max(0);

        match delta.outcome {
            Some(Outcome::Failure) => self.consecutive_failures += 1,
            Some(Outcome::Success) => self.consecutive_failures = 0,
            Some(Outcome::Neutral) | None => {}
        }

        merge_records(&mut self.item_states, &delta.items);
        merge_records(&mut self.npc_relations, &delta.npcs);
    }

    /// Append a history entry for the current scene with a snapshot of the
    /// state as it is right now.
    pub(crate) fn record_history(&mut self, arrived_by: &str) {
        let entry = HistoryEntry::capture(self.history.len(), self, arrived_by);
        self.history.append(entry);
    }

    /// A display-oriented view of where the story stands.
    pub fn summary(&self) -> StorySummary {
        StorySummary {
            step: self.scene_count + 1,
            max_scenes: self.max_scenes,
            progress: self.progress(),
            text: self.current_scene.text.clone(),
            image: self.current_scene.image.to_string(),
            choices: self
                .current_scene
                .choices
                .iter()
                .map(|c| (c.id().to_string(), c.text().to_string(), c.category().name()))
                .collect(),
            complete: self.is_complete(),
            ending: self.current_scene.ending.clone(),
        }
    }
}

fn merge_records(target: &mut RecordMap, updates: &RecordMap) {
    for (key, fields) in updates {
        let record = target.entry(key.clone()).or_default();
        for (field, value) in fields {
            record.insert(field.clone(), value.clone());
        }
    }
}

/// What a front end needs to render the current step.
#[derive(Debug, Clone, PartialEq)]
pub struct StorySummary {
    /// 1-based number of the step being shown.
    pub step: u32,
    pub max_scenes: u32,
    pub progress: f64,
    pub text: String,
    pub image: String,
    /// `(id, text, category)` in display order.
    pub choices: Vec<(String, String, &'static str)>,
    pub complete: bool,
    pub ending: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Choice, ChoiceCategory, Genre, ImageRef};
    use serde_json::json;

    fn opening() -> Scene {
        Scene::new(
            ImageRef::from("mock://0"),
            "The lighthouse keeper has vanished.",
            Genre::Mystery,
            vec![Choice::new("1", "Climb the stairs", ChoiceCategory::Action)],
        )
    }

    #[test]
    fn test_new_state_defaults() {
        let state = StoryState::new(opening(), 10, "a storm", None);
        assert_eq!(state.scene_count(), 0);
        assert_eq!(state.progress(), 0.0);
        assert!(!state.is_terminal());
        assert_eq!(state.history().len(), 1);
        assert_eq!(state.attributes().get(Attribute::Wisdom), 50);
        assert_eq!(state.danger_level(), 0);
    }

    #[test]
    fn test_zero_max_scenes_is_coerced() {
        let state = StoryState::new(opening(), 0, "", None);
        assert_eq!(state.max_scenes(), 1);
    }

    #[test]
    fn test_attribute_parse() {
        assert_eq!("Courage".parse::<Attribute>(), Ok(Attribute::Courage));
        assert!("luck".parse::<Attribute>().is_err());
    }

    #[test]
    fn test_apply_delta() {
        let mut state = StoryState::new(opening(), 10, "", None);
        let mut delta = StateDelta {
            danger: 25,
            outcome: Some(Outcome::Failure),
            ..Default::default()
        };
        delta.attributes.insert("courage".to_string(), 80);
        delta.attributes.insert("luck".to_string(), 5);
        delta
            .items
            .entry("lantern".to_string())
            .or_default()
            .insert("lit".to_string(), json!(true));

        state.apply_delta(&delta);
        state.apply_delta(&delta);

        assert_eq!(state.attributes().get(Attribute::Courage), 100);
        assert_eq!(state.danger_level(), 50);
        assert_eq!(state.consecutive_failures(), 2);
        assert_eq!(state.item_states()["lantern"]["lit"], json!(true));

        state.apply_delta(&StateDelta {
            danger: -80,
            outcome: Some(Outcome::Success),
            ..Default::default()
        });
        assert_eq!(state.danger_level(), 0);
        assert_eq!(state.consecutive_failures(), 0);
    }

    #[test]
    fn test_merge_records_keeps_existing_fields() {
        let mut state = StoryState::new(opening(), 10, "", None);
        let mut first = StateDelta::default();
        first
            .npcs
            .entry("keeper".to_string())
            .or_default()
            .insert("trust".to_string(), json!(10));
        let mut second = StateDelta::default();
        second
            .npcs
            .entry("keeper".to_string())
            .or_default()
            .insert("met".to_string(), json!(true));

        state.apply_delta(&first);
        state.apply_delta(&second);

        let keeper = &state.npc_relations()["keeper"];
        assert_eq!(keeper["trust"], json!(10));
        assert_eq!(keeper["met"], json!(true));
    }

    #[test]
    fn test_summary() {
        let state = StoryState::new(opening(), 10, "", None);
        let summary = state.summary();
        assert_eq!(summary.step, 1);
        assert_eq!(summary.choices[0].2, "action");
        assert!(!summary.complete);
    }
}
