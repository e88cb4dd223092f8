//! Step history and snapshot rollback.
//!
//! Every step of a story appends one `HistoryEntry` pairing the scene as it
//! was rendered with a `Snapshot` of the mutable state. Rolling back restores
//! a snapshot by value and discards every later entry; no generator is ever
//! called.

use crate::scene::{Choice, Genre, ImageRef, Scene};
use crate::state::{Attributes, RecordMap, StoryState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from history operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("step {target} is outside the recorded history (0..{len})")]
    OutOfRange { target: usize, len: usize },
}

/// A decoupled copy of the mutable parts of a `StoryState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub attributes: Attributes,
    pub choice_history: Vec<String>,
    pub item_states: RecordMap,
    pub npc_relations: RecordMap,
    pub danger_level: i32,
    pub consecutive_failures: u32,
}

impl Snapshot {
    pub fn capture(state: &StoryState) -> Self {
        Self {
            attributes: state.attributes,
            choice_history: state.choice_history.clone(),
            item_states: state.item_states.clone(),
            npc_relations: state.npc_relations.clone(),
            danger_level: state.danger_level,
            consecutive_failures: state.consecutive_failures,
        }
    }

    /// Copy every field back onto `state`. The state receives its own copies,
    /// so later play cannot reach into the stored snapshot.
    fn restore_into(&self, state: &mut StoryState) {
        state.attributes = self.attributes;
        state.choice_history = self.choice_history.clone();
        state.item_states = self.item_states.clone();
        state.npc_relations = self.npc_relations.clone();
        state.danger_level = self.danger_level;
        state.consecutive_failures = self.consecutive_failures;
    }
}

/// One recorded step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Position of this entry in the log.
    pub step: usize,
    pub scene_id: String,
    pub image: ImageRef,
    pub text: String,
    pub choices: Vec<Choice>,
    /// Text of the choice that led to this scene.
    pub arrived_by: String,
    pub snapshot: Snapshot,
}

impl HistoryEntry {
    /// `arrived_by` text of the opening entry.
    pub const OPENING_CHOICE: &'static str = "story began";

    pub(crate) fn capture(step: usize, state: &StoryState, arrived_by: &str) -> Self {
        let scene = &state.current_scene;
        Self {
            step,
            scene_id: scene.id.clone(),
            image: scene.image.clone(),
            text: scene.text.clone(),
            choices: scene.choices.clone(),
            arrived_by: arrived_by.to_string(),
            snapshot: Snapshot::capture(state),
        }
    }

    /// Rebuild the scene this entry recorded, reopened for play.
    fn to_scene(&self, genre: Genre) -> Scene {
        Scene {
            id: self.scene_id.clone(),
            image: self.image.clone(),
            text: self.text.clone(),
            genre,
            choices: self.choices.clone(),
            terminal: false,
            ending: None,
        }
    }
}

/// Append-only step log, truncated only by rollback.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// Discard every entry with an index greater than `step`.
    pub fn truncate_after(&mut self, step: usize) {
        self.entries.truncate(step + 1);
    }

    pub fn get(&self, step: usize) -> Option<&HistoryEntry> {
        self.entries.get(step)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.entries.len().checked_sub(1)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

impl StoryState {
    /// Rewind the story to history step `target`.
    ///
    /// Restores the snapshot stored at `target`, keeps entries `0..=target`
    /// and reopens the story. When a later entry existed and offers choices,
    /// its scene becomes the current scene again (the reader re-decides from
    /// there) and `scene_count` becomes `target + 1`. A later entry without
    /// choices is an ending and cannot be re-decided, so the scene recorded
    /// at `target` is restored instead with `scene_count = target`.
    ///
    /// Without a later entry the current scene is kept; `scene_count`
    /// becomes `target` unless the current scene is a re-decide scene
    /// restored by an earlier rollback, in which case the count it was given
    /// then is kept. A kept scene without choices stays an ending.
    ///
    /// Leaves the state untouched when `target` is out of range.
    pub fn rollback(&mut self, target: usize) -> Result<(), HistoryError> {
        let len = self.history.len();
        let Some(entry) = self.history.get(target) else {
            return Err(HistoryError::OutOfRange { target, len });
        };

        let snapshot = entry.snapshot.clone();
        let target_scene_id = entry.scene_id.clone();
        let genre = self.current_scene.genre;
        let reopened = match self.history.get(target + 1) {
            Some(next) if !next.choices.is_empty() => {
                Some((next.to_scene(genre), step_count(target + 1)))
            }
            Some(_) => Some((entry.to_scene(genre), step_count(target))),
            None => None,
        };

        snapshot.restore_into(self);
        self.history.truncate_after(target);

        match reopened {
            Some((scene, scene_count)) => {
                self.current_scene = scene;
                self.scene_count = scene_count;
            }
            None => {
                if self.current_scene.id == target_scene_id {
                    self.scene_count = step_count(target);
                }
            }
        }

        self.terminal = false;
        if self.current_scene.choices.is_empty() {
            self.current_scene.terminal = true;
        } else {
            self.current_scene.terminal = false;
            self.current_scene.ending = None;
        }

        Ok(())
    }
}

fn step_count(step: usize) -> u32 {
    u32::try_from(step).unwrap_or(u32::MAX)
}
