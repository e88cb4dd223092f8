//! Decoding of content-generator payloads.
//!
//! Models wrap their JSON in markdown fences or a sentence of prose often
//! enough that every payload goes through `extract_json` first. A payload
//! that still does not decode is a `GeneratorError::Malformed`, which the
//! engine retries like any other generator failure.

use crate::generator::{AnalysisResult, Continuation, GeneratorError, StoryDraft};
use crate::outline::{Figure, PlanStep, StoryOutline};
use crate::scene::{Choice, ChoiceCategory, Necessity};
use crate::state::{Outcome, RecordMap, StateDelta};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

/// Offered-count assumed when a continuation does not state one.
const DEFAULT_CHOICE_COUNT: usize = 3;

/// Cut the outermost JSON object out of `content`.
pub fn extract_json(content: &str) -> Result<&str, GeneratorError> {
    let start = content.find('{');
    let end = content.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(&content[start..=end]),
        _ => Err(GeneratorError::Malformed(format!(
            "no JSON object in payload: {}",
            preview(content)
        ))),
    }
}

fn decode<T: DeserializeOwned>(content: &str) -> Result<T, GeneratorError> {
    if content.trim().is_empty() {
        return Err(GeneratorError::Empty);
    }
    let json = extract_json(content)?;
    serde_json::from_str(json).map_err(|e| GeneratorError::Malformed(e.to_string()))
}

fn preview(content: &str) -> String {
    content.chars().take(80).collect()
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    scene_description: String,
    #[serde(default)]
    characters: Vec<Figure>,
    #[serde(default)]
    key_objects: Vec<String>,
    #[serde(default)]
    color_style: Option<RawColorStyle>,
    #[serde(default)]
    story_elements: String,
    #[serde(default)]
    emotional_tone: String,
    #[serde(default)]
    genre_suggestion: String,
    #[serde(default)]
    story_outline: Option<RawOutline>,
}

#[derive(Debug, Default, Deserialize)]
struct RawColorStyle {
    #[serde(default)]
    dominant_colors: Vec<String>,
    #[serde(default)]
    style: String,
}

#[derive(Debug, Deserialize)]
struct RawOutline {
    #[serde(default)]
    characters: Vec<Figure>,
    #[serde(default)]
    key_items: Vec<Figure>,
    #[serde(default, alias = "npcs")]
    important_npcs: Vec<Figure>,
    #[serde(default)]
    key_decisions: Vec<String>,
    #[serde(default)]
    success_conditions: String,
    #[serde(default)]
    failure_conditions: String,
    #[serde(default)]
    plot_threads: Vec<String>,
    #[serde(default)]
    complete_story_plan: Option<RawPlan>,
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    story_summary: Option<String>,
    #[serde(default)]
    correct_path: Vec<PlanStep>,
}

#[derive(Debug, Deserialize)]
struct RawStory {
    #[serde(default)]
    story: String,
    #[serde(default)]
    choice_count: Option<usize>,
    #[serde(default)]
    choice_necessity: Option<String>,
    #[serde(default)]
    choices: Vec<RawChoice>,
    #[serde(default)]
    ending: Option<String>,
    #[serde(default)]
    state_changes: Option<RawDelta>,
}

#[derive(Debug, Deserialize)]
struct RawChoice {
    #[serde(default)]
    id: serde_json::Value,
    #[serde(default)]
    text: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default, alias = "reasoning")]
    rationale: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDelta {
    #[serde(default)]
    attributes: BTreeMap<String, i32>,
    #[serde(default)]
    danger: i32,
    #[serde(default)]
    outcome: Option<String>,
    #[serde(default)]
    items: RecordMap,
    #[serde(default)]
    npcs: RecordMap,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<RawOutline> for StoryOutline {
    fn from(raw: RawOutline) -> Self {
        let (summary, plan) = match raw.complete_story_plan {
            Some(p) => (p.story_summary.filter(|s| !s.is_empty()), p.correct_path),
            None => (None, Vec::new()),
        };
        StoryOutline {
            characters: raw.characters,
            key_items: raw.key_items,
            npcs: raw.important_npcs,
            key_decisions: raw.key_decisions,
            success_conditions: raw.success_conditions,
            failure_conditions: raw.failure_conditions,
            plot_threads: raw.plot_threads,
            summary,
            plan,
        }
    }
}

impl From<RawDelta> for StateDelta {
    fn from(raw: RawDelta) -> Self {
        let outcome = raw
            .outcome
            .as_deref()
            .and_then(|o| match o.trim().to_ascii_lowercase().as_str() {
                "success" => Some(Outcome::Success),
                "failure" | "fail" => Some(Outcome::Failure),
                "neutral" => Some(Outcome::Neutral),
                _ => None,
            });
        StateDelta {
            attributes: raw.attributes,
            danger: raw.danger,
            outcome,
            items: raw.items,
            npcs: raw.npcs,
        }
    }
}

fn choice_id(id: &serde_json::Value, position: usize) -> String {
    let id = match id {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    if id.is_empty() {
        (position + 1).to_string()
    } else {
        id
    }
}

/// Build choices in payload order, dropping any whose id repeats an earlier one.
fn choices(raw: Vec<RawChoice>, necessity: Option<Necessity>) -> Vec<Choice> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .enumerate()
        .filter_map(|(position, c)| {
            let id = choice_id(&c.id, position);
            if !seen.insert(id.clone()) {
                return None;
            }
            let category = c
                .kind
                .as_deref()
                .map(ChoiceCategory::from_label)
                .unwrap_or(ChoiceCategory::Unknown);
            let mut choice = Choice::new(id, c.text, category);
            if let Some(necessity) = necessity {
                choice = choice.with_necessity(necessity);
            }
            if let Some(rationale) = c.rationale.filter(|r| !r.is_empty()) {
                choice = choice.with_rationale(rationale);
            }
            Some(choice)
        })
        .collect()
}

fn story_text(raw: &RawStory) -> Result<String, GeneratorError> {
    let text = raw.story.trim();
    if text.is_empty() {
        Err(GeneratorError::Malformed("payload has no story text".to_string()))
    } else {
        Ok(text.to_string())
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Decode an image analysis payload.
pub fn parse_analysis(content: &str) -> Result<AnalysisResult, GeneratorError> {
    let raw: RawAnalysis = decode(content)?;
    if raw.scene_description.trim().is_empty() {
        return Err(GeneratorError::Malformed(
            "analysis has no scene description".to_string(),
        ));
    }

    let style = match raw.color_style {
        Some(cs) if cs.dominant_colors.is_empty() => cs.style,
        Some(cs) => format!("{} ({})", cs.style, cs.dominant_colors.join(", ")),
        None => String::new(),
    };

    Ok(AnalysisResult {
        scene_description: raw.scene_description,
        characters: raw.characters,
        key_objects: raw.key_objects,
        style: style.trim().to_string(),
        story_elements: raw.story_elements,
        emotional_tone: raw.emotional_tone,
        genre_suggestion: raw.genre_suggestion,
        outline: raw.story_outline.map(StoryOutline::from),
    })
}

/// Decode an opening-scene payload.
pub fn parse_draft(content: &str) -> Result<StoryDraft, GeneratorError> {
    let raw: RawStory = decode(content)?;
    let text = story_text(&raw)?;
    Ok(StoryDraft {
        text,
        choices: choices(raw.choices, None),
    })
}

/// Decode a continuation payload.
///
/// Choices are cut to `min(len, choice_count)`; `offered_count` reports the
/// number kept.
pub fn parse_continuation(content: &str) -> Result<Continuation, GeneratorError> {
    let raw: RawStory = decode(content)?;
    let text = story_text(&raw)?;

    let necessity = raw
        .choice_necessity
        .as_deref()
        .map(Necessity::from_label)
        .unwrap_or(Necessity::Optional);

    let mut choices = choices(raw.choices, Some(necessity));
    let limit = raw.choice_count.unwrap_or(DEFAULT_CHOICE_COUNT);
    choices.truncate(limit);

    Ok(Continuation {
        text,
        offered_count: choices.len(),
        choices,
        necessity,
        ending: raw
            .ending
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty()),
        delta: raw.state_changes.map(StateDelta::from),
    })
}
