//! Progression tracking: step counting, completion and attribute bounds.

use crate::state::{Attribute, StoryState};

/// Completion percentage for a step count against a horizon.
///
/// `min(100, 100 * scene_count / max_scenes)`; a zero horizon counts as complete.
pub fn progress_percent(scene_count: u32, max_scenes: u32) -> f64 {
    if max_scenes == 0 {
        return 100.0;
    }
    (100.0 * f64::from(scene_count) / f64::from(max_scenes)).min(100.0)
}

impl StoryState {
    /// Completion percentage in `[0, 100]`.
    pub fn progress(&self) -> f64 {
        progress_percent(self.scene_count, self.max_scenes)
    }

    /// Count one committed advance.
    ///
    /// Must run exactly once per successful round; the engine guarantees it.
    pub(crate) fn record_advance(&mut self) {
        self.scene_count += 1;
        if self.scene_count >= self.max_scenes {
            self.terminal = true;
        }
    }

    /// Adjust a named attribute by `delta`, clamped to `[0, 100]`.
    ///
    /// Returns `false` and changes nothing when `name` is not a known attribute.
    pub fn adjust_attribute(&mut self, name: &str, delta: i32) -> bool {
        match name.parse::<Attribute>() {
            Ok(attribute) => {
                self.attributes.adjust(attribute, delta);
                true
            }
            Err(()) => false,
        }
    }

    /// True once the step horizon is reached or the current scene is an ending.
    pub fn is_complete(&self) -> bool {
        self.terminal || self.current_scene.terminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Choice, ChoiceCategory, Genre, ImageRef, Scene};

    fn state(max_scenes: u32) -> StoryState {
        let scene = Scene::new(
            ImageRef::from("mock://0"),
            "Dawn over the harbour.",
            Genre::Adventure,
            vec![Choice::new("1", "Set sail", ChoiceCategory::Action)],
        );
        StoryState::new(scene, max_scenes, "", None)
    }

    #[test]
    fn test_progress_formula() {
        assert_eq!(progress_percent(0, 10), 0.0);
        assert_eq!(progress_percent(3, 10), 30.0);
        assert_eq!(progress_percent(12, 10), 100.0);
        assert_eq!(progress_percent(1, 3), 100.0 / 3.0);
    }

    #[test]
    fn test_record_advance_reaches_horizon() {
        let mut state = state(2);
        state.record_advance();
        assert_eq!(state.scene_count(), 1);
        assert_eq!(state.progress(), 50.0);
        assert!(!state.is_complete());

        state.record_advance();
        assert!(state.is_terminal());
        assert!(state.is_complete());
        assert_eq!(state.progress(), 100.0);
    }

    #[test]
    fn test_scene_ending_completes_before_horizon() {
        let mut state = state(10);
        state.current_scene.terminal = true;
        assert!(!state.is_terminal());
        assert!(state.is_complete());
    }

    #[test]
    fn test_adjust_attribute_bounds() {
        let mut state = state(10);
        assert!(state.adjust_attribute("courage", 500));
        assert_eq!(state.attributes().get(Attribute::Courage), 100);
        assert!(state.adjust_attribute("courage", -1000));
        assert_eq!(state.attributes().get(Attribute::Courage), 0);
        assert!(state.adjust_attribute("kindness", i32::MAX));
        assert_eq!(state.attributes().get(Attribute::Kindness), 100);

        let before = *state.attributes();
        assert!(!state.adjust_attribute("charisma", 10));
        assert_eq!(state.attributes(), &before);
    }

    #[test]
    fn test_attributes_stay_bounded_under_many_adjustments() {
        let mut state = state(10);
        let deltas = [37, -90, 64, 13, -7, 120, -250, 49, 1, -3];
        for (i, delta) in deltas.iter().cycle().take(200).enumerate() {
            let attribute = Attribute::ALL[i % 3];
            state.adjust_attribute(attribute.name(), *delta);
            for (_, value) in state.attributes().iter() {
                assert!((0..=100).contains(&value));
            }
        }
    }
}
