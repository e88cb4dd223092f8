//! Scene and choice types.
//!
//! A scene is one rendered step of the story: narrative text, an image
//! reference and the ordered choices offered to the reader.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Image references
// ============================================================================

/// A retrievable reference to a rendered image (URL or path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ImageRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// Genre
// ============================================================================

/// Story genre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    #[default]
    Adventure,
    Mystery,
    Fantasy,
    Scifi,
    Romance,
    Horror,
    Comedy,
    Drama,
}

impl Genre {
    pub const ALL: [Genre; 8] = [
        Genre::Adventure,
        Genre::Mystery,
        Genre::Fantasy,
        Genre::Scifi,
        Genre::Romance,
        Genre::Horror,
        Genre::Comedy,
        Genre::Drama,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Genre::Adventure => "adventure",
            Genre::Mystery => "mystery",
            Genre::Fantasy => "fantasy",
            Genre::Scifi => "scifi",
            Genre::Romance => "romance",
            Genre::Horror => "horror",
            Genre::Comedy => "comedy",
            Genre::Drama => "drama",
        }
    }

    /// Parse an exact genre name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Genre> {
        let name = name.trim();
        Genre::ALL
            .into_iter()
            .find(|g| g.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Choices
// ============================================================================

/// What kind of move a choice represents.
///
/// Labels from the content generator that match none of the known kinds
/// land in `Unknown` rather than flowing into state as free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceCategory {
    Action,
    Dialogue,
    Item,
    Emotional,
    Unknown,
}

impl ChoiceCategory {
    pub fn name(&self) -> &'static str {
        match self {
            ChoiceCategory::Action => "action",
            ChoiceCategory::Dialogue => "dialogue",
            ChoiceCategory::Item => "item",
            ChoiceCategory::Emotional => "emotional",
            ChoiceCategory::Unknown => "unknown",
        }
    }

    pub fn from_label(label: &str) -> ChoiceCategory {
        match label.trim().to_ascii_lowercase().as_str() {
            "action" => ChoiceCategory::Action,
            "dialogue" | "dialog" => ChoiceCategory::Dialogue,
            "item" => ChoiceCategory::Item,
            "emotion" | "emotional" => ChoiceCategory::Emotional,
            _ => ChoiceCategory::Unknown,
        }
    }
}

impl fmt::Display for ChoiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How strongly the story needs this choice to be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Necessity {
    /// The only way forward (single offered choice).
    Mandatory,
    /// One of several real alternatives.
    Optional,
    /// The plot forces this step.
    ForcedAdvance,
    Unknown,
}

impl Necessity {
    pub fn name(&self) -> &'static str {
        match self {
            Necessity::Mandatory => "mandatory",
            Necessity::Optional => "optional",
            Necessity::ForcedAdvance => "forced",
            Necessity::Unknown => "unknown",
        }
    }

    pub fn from_label(label: &str) -> Necessity {
        match label.trim().to_ascii_lowercase().as_str() {
            "mandatory" => Necessity::Mandatory,
            "optional" => Necessity::Optional,
            "forced" | "forced_advance" | "forced-advance" => Necessity::ForcedAdvance,
            _ => Necessity::Unknown,
        }
    }
}

/// One option offered to the reader. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    id: String,
    text: String,
    category: ChoiceCategory,
    #[serde(default)]
    necessity: Option<Necessity>,
    #[serde(default)]
    rationale: Option<String>,
}

impl Choice {
    pub fn new(id: impl Into<String>, text: impl Into<String>, category: ChoiceCategory) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            category,
            necessity: None,
            rationale: None,
        }
    }

    pub fn with_necessity(mut self, necessity: Necessity) -> Self {
        self.necessity = Some(necessity);
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn category(&self) -> ChoiceCategory {
        self.category
    }

    pub fn necessity(&self) -> Option<Necessity> {
        self.necessity
    }

    pub fn rationale(&self) -> Option<&str> {
        self.rationale.as_deref()
    }
}

// ============================================================================
// Scene
// ============================================================================

/// One step of the story as shown to the reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub image: ImageRef,
    pub text: String,
    pub genre: Genre,
    /// Display order.
    pub choices: Vec<Choice>,
    /// Set when the narrative itself has reached an ending.
    #[serde(default)]
    pub terminal: bool,
    #[serde(default)]
    pub ending: Option<String>,
}

impl Scene {
    /// Create a scene with a fresh short identifier.
    pub fn new(image: ImageRef, text: impl Into<String>, genre: Genre, choices: Vec<Choice>) -> Self {
        Self {
            id: short_id(),
            image,
            text: text.into(),
            genre,
            choices,
            terminal: false,
            ending: None,
        }
    }

    /// Mark the scene as a narrative ending.
    pub fn with_ending(mut self, kind: impl Into<String>) -> Self {
        self.terminal = true;
        self.ending = Some(kind.into());
        self
    }

    pub fn choice(&self, id: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == id)
    }
}

/// Eight hex characters of a v4 UUID; enough to tell scenes of one story apart.
pub(crate) fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels() {
        assert_eq!(ChoiceCategory::from_label("Action"), ChoiceCategory::Action);
        assert_eq!(ChoiceCategory::from_label("emotion"), ChoiceCategory::Emotional);
        assert_eq!(ChoiceCategory::from_label("bribe"), ChoiceCategory::Unknown);
    }

    #[test]
    fn test_necessity_labels() {
        assert_eq!(Necessity::from_label("forced"), Necessity::ForcedAdvance);
        assert_eq!(Necessity::from_label(" OPTIONAL "), Necessity::Optional);
        assert_eq!(Necessity::from_label("maybe"), Necessity::Unknown);
    }

    #[test]
    fn test_genre_from_name() {
        assert_eq!(Genre::from_name("Horror"), Some(Genre::Horror));
        assert_eq!(Genre::from_name("western"), None);
        assert_eq!(Genre::default(), Genre::Adventure);
    }

    #[test]
    fn test_scene_choice_lookup() {
        let scene = Scene::new(
            ImageRef::from("img.png"),
            "A door creaks open.",
            Genre::Mystery,
            vec![
                Choice::new("1", "Step inside", ChoiceCategory::Action),
                Choice::new("2", "Call out", ChoiceCategory::Dialogue),
            ],
        );
        assert_eq!(scene.id.len(), 8);
        assert_eq!(scene.choice("2").map(Choice::text), Some("Call out"));
        assert!(scene.choice("3").is_none());
        assert!(!scene.terminal);
    }
}
