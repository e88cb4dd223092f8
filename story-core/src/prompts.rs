//! Prompt text for the content and image generators.

use crate::analyzer::Guidance;
use crate::generator::{AnalysisResult, ContinuationRequest};
use crate::scene::Genre;

/// Neutral scene used when a scene prompt is refused by the image model.
pub const FALLBACK_IMAGE_PROMPT: &str = include_str!("prompts/image_fallback.txt");

pub fn analysis_prompt(plan_steps: u32) -> String {
    let mut prompt = String::from(include_str!("prompts/analysis.txt"));
    prompt.push_str(&format!(
        "4. The correct path has exactly {plan_steps} steps, numbered 1 to {plan_steps}; step {plan_steps} is the ending.\n"
    ));
    prompt
}

pub fn opening_prompt(analysis: &AnalysisResult, genre: Genre) -> String {
    let mut prompt = String::from(include_str!("prompts/opening.txt"));

    prompt.push_str(&format!("\n## Genre\n{genre}\n"));
    prompt.push_str("\n## Image Analysis\n");
    prompt.push_str(&format!("Scene: {}\n", analysis.scene_description));
    if !analysis.characters.is_empty() {
        let names: Vec<_> = analysis.characters.iter().map(|c| c.name.as_str()).collect();
        prompt.push_str(&format!("Characters: {}\n", names.join(", ")));
    }
    if !analysis.key_objects.is_empty() {
        prompt.push_str(&format!("Objects: {}\n", analysis.key_objects.join(", ")));
    }
    if !analysis.emotional_tone.is_empty() {
        prompt.push_str(&format!("Mood: {}\n", analysis.emotional_tone));
    }
    if let Some(outline) = &analysis.outline {
        if let Some(step) = outline.plan_for_step(1) {
            prompt.push_str(&format!("\n## Planned First Step\n{}\n", step.description));
        }
    }
    prompt
}

pub fn continuation_prompt(request: &ContinuationRequest) -> String {
    let guidance = &request.guidance;
    let mut prompt = String::new();

    if let Some(outline) = &request.outline {
        prompt.push_str("## Story Framework\n");
        prompt.push_str(&outline.brief());
        if let Some(summary) = &outline.summary {
            prompt.push_str(&format!("Hidden synopsis: {summary}\n"));
        }
        if let Some(step) = &guidance.plan_step {
            prompt.push_str(&format!(
                "\n## Plan For Step {}\n- Description: {}\n- Requirement: {}\n- Consequence: {}\n",
                guidance.next_step, step.description, step.requirement, step.consequence
            ));
            prompt.push_str(
                "Follow the plan when the reader's choice fits it; if the choice strays, continue plausibly (the quest may fail).\n",
            );
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!("## Genre\n{}\n", request.genre));
    if !request.theme.is_empty() {
        prompt.push_str(&format!("Theme: {}\n", request.theme));
    }
    prompt.push_str(&format!("\n## Story So Far\n{}\n", request.current_text));
    prompt.push_str(&format!(
        "\n## Reader's Choice\n{} ({})\n",
        request.choice_text, request.choice_category
    ));
    prompt.push_str(&pacing(guidance));
    prompt.push('\n');
    prompt.push_str(include_str!("prompts/continuation.txt"));
    prompt
}

fn pacing(guidance: &Guidance) -> String {
    let context = &guidance.context;
    let mut out = format!(
        "\n## Pacing\nThis is step {} of {}. Urgency: {}. Resources: {}.\n",
        guidance.next_step, guidance.max_scenes, context.urgency, context.resources
    );
    out.push_str(&format!(
        "Offer at most {} choice(s).\n",
        context.natural_choice_count
    ));
    if guidance.must_advance() {
        out.push_str("The plot must move forward decisively in this scene.\n");
    }
    if guidance.push_progress {
        out.push_str(&format!(
            "The reader has taken {} action choices in a row; bring about a turning point.\n",
            guidance.consecutive_actions
        ));
    }
    if guidance.climax_reached {
        out.push_str("The story is past its midpoint; build toward the climax.\n");
    }
    if guidance.is_final_step() {
        out.push_str(
            "This is the final step: write the ending, resolve every open thread and set \"ending\".\n",
        );
    }
    out
}

/// Image prompt for the opening scene.
pub fn opening_image_prompt(analysis: &AnalysisResult, genre: Genre) -> String {
    let mut prompt = format!("A {genre} story scene. {}\n", analysis.scene_description);
    if !analysis.key_objects.is_empty() {
        prompt.push_str(&format!("Featuring: {}.\n", analysis.key_objects.join(", ")));
    }
    if !analysis.emotional_tone.is_empty() {
        prompt.push_str(&format!("Mood: {}.\n", analysis.emotional_tone));
    }
    if !analysis.style.is_empty() {
        prompt.push_str(&format!("Visual style: {}.\n", analysis.style));
    }
    prompt.push_str("Cinematic composition, rich detail, high quality rendering.");
    prompt
}

/// Image prompt for a scene reached by taking `choice_text`.
pub fn scene_image_prompt(text: &str, choice_text: &str, genre: Genre) -> String {
    format!(
        "A {genre} story illustration.\nThe reader chose: {choice_text}\nScene: {text}\nWarm tones, rich detail, cinematic lighting, no graphic violence."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Resources, SceneContext, Urgency};
    use crate::outline::{PlanStep, StoryOutline};
    use crate::scene::ChoiceCategory;
    use std::sync::Arc;

    fn guidance(next_step: u32, max_scenes: u32) -> Guidance {
        Guidance {
            context: SceneContext {
                urgency: Urgency::High,
                resources: Resources::Limited,
                natural_choice_count: 1,
                must_advance: true,
                reasoning: String::new(),
            },
            consecutive_actions: 0,
            push_progress: false,
            climax_reached: false,
            next_step,
            max_scenes,
            plan_step: None,
        }
    }

    fn request(guidance: Guidance) -> ContinuationRequest {
        ContinuationRequest {
            current_text: "The cellar floods.".to_string(),
            choice_text: "Swim for the stairs".to_string(),
            choice_category: ChoiceCategory::Action,
            genre: Genre::Horror,
            theme: String::new(),
            guidance,
            outline: None,
        }
    }

    #[test]
    fn test_continuation_prompt_pacing() {
        let prompt = continuation_prompt(&request(guidance(3, 10)));
        assert!(prompt.contains("step 3 of 10"));
        assert!(prompt.contains("at most 1 choice"));
        assert!(prompt.contains("must move forward"));
        assert!(prompt.contains("Swim for the stairs (action)"));
        assert!(!prompt.contains("final step"));
    }

    #[test]
    fn test_final_step_asks_for_ending() {
        let prompt = continuation_prompt(&request(guidance(10, 10)));
        assert!(prompt.contains("final step"));
    }

    #[test]
    fn test_plan_step_included() {
        let mut g = guidance(2, 10);
        g.plan_step = Some(PlanStep {
            step: 2,
            description: "Meet the ferryman".to_string(),
            requirement: "a coin".to_string(),
            consequence: "safe passage".to_string(),
        });
        let mut req = request(g);
        req.outline = Some(Arc::new(StoryOutline::default()));
        let prompt = continuation_prompt(&req);
        assert!(prompt.contains("Plan For Step 2"));
        assert!(prompt.contains("Meet the ferryman"));
    }

    #[test]
    fn test_analysis_prompt_step_count() {
        assert!(analysis_prompt(8).contains("exactly 8 steps"));
    }
}
