//! Long-range story plan.
//!
//! The outline is produced once from the opening image analysis and is only
//! ever read afterwards. It steers the content generator; nothing in the
//! engine enforces it.

use serde::{Deserialize, Serialize};

/// A named participant or object in the outline.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Figure {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Narrative function, for supporting characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Figure {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            role: None,
        }
    }
}

/// One step of the intended path through the story.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanStep {
    /// 1-based step number; 0 when the plan is only ordered positionally.
    #[serde(default)]
    pub step: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirement: String,
    #[serde(default)]
    pub consequence: String,
}

/// The long-range plan for one story.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoryOutline {
    #[serde(default)]
    pub characters: Vec<Figure>,
    #[serde(default)]
    pub key_items: Vec<Figure>,
    #[serde(default)]
    pub npcs: Vec<Figure>,
    #[serde(default)]
    pub key_decisions: Vec<String>,
    #[serde(default)]
    pub success_conditions: String,
    #[serde(default)]
    pub failure_conditions: String,
    #[serde(default)]
    pub plot_threads: Vec<String>,
    /// Hidden synopsis of the whole arc.
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub plan: Vec<PlanStep>,
}

impl StoryOutline {
    /// The planned step with the given 1-based number, if the plan covers it.
    pub fn plan_for_step(&self, step: u32) -> Option<&PlanStep> {
        self.plan
            .iter()
            .find(|p| p.step == step)
            .or_else(|| match step {
                // Plans without explicit numbering are read positionally
                0 => None,
                n => self
                    .plan
                    .get(n as usize - 1)
                    .filter(|p| p.step == 0),
            })
    }

    /// Compact one-paragraph rendering for generation prompts.
    pub fn brief(&self) -> String {
        let join = |figures: &[Figure]| {
            figures
                .iter()
                .map(|f| {
                    if f.description.is_empty() {
                        f.name.clone()
                    } else {
                        format!("{}: {}", f.name, f.description)
                    }
                })
                .collect::<Vec<_>>()
                .join("; ")
        };

        let mut out = String::new();
        if !self.characters.is_empty() {
            out.push_str(&format!("Characters: {}\n", join(&self.characters)));
        }
        if !self.key_items.is_empty() {
            out.push_str(&format!("Key items: {}\n", join(&self.key_items)));
        }
        if !self.npcs.is_empty() {
            out.push_str(&format!("Supporting characters: {}\n", join(&self.npcs)));
        }
        if !self.plot_threads.is_empty() {
            out.push_str(&format!("Plot threads: {}\n", self.plot_threads.join("; ")));
        }
        if !self.success_conditions.is_empty() {
            out.push_str(&format!("Success: {}\n", self.success_conditions));
        }
        if !self.failure_conditions.is_empty() {
            out.push_str(&format!("Failure: {}\n", self.failure_conditions));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(step: u32, description: &str) -> PlanStep {
        PlanStep {
            step,
            description: description.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_lookup_by_number() {
        let outline = StoryOutline {
            plan: vec![step(1, "opening"), step(2, "complication"), step(3, "twist")],
            ..Default::default()
        };
        assert_eq!(outline.plan_for_step(2).map(|p| p.description.as_str()), Some("complication"));
        assert!(outline.plan_for_step(4).is_none());
        assert!(outline.plan_for_step(0).is_none());
    }

    #[test]
    fn test_plan_lookup_positional() {
        let outline = StoryOutline {
            plan: vec![step(0, "first"), step(0, "second")],
            ..Default::default()
        };
        assert_eq!(outline.plan_for_step(2).map(|p| p.description.as_str()), Some("second"));
    }

    #[test]
    fn test_brief_skips_empty_sections() {
        let outline = StoryOutline {
            characters: vec![Figure::new("Mira", "a nervous herbalist")],
            plot_threads: vec!["find the cure".to_string()],
            ..Default::default()
        };
        let brief = outline.brief();
        assert!(brief.contains("Mira: a nervous herbalist"));
        assert!(brief.contains("find the cure"));
        assert!(!brief.contains("Key items"));
    }
}
