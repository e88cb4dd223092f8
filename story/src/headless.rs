//! Line-oriented play loop.
//!
//! Protocol:
//! - A bare line is a choice id taken on the current scene
//! - Lines starting with `#` are commands (back, save, load, status, history, quit)
//! - Everything printed is story output; logs go to stderr

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use story_core::persist::save_path;
use story_core::providers::{GrsContentGenerator, GrsImageGenerator};
use story_core::{
    EngineConfig, Genre, GrsConfig, ImageRef, SavedStory, StoryEngine, StoryState,
};

/// Command-line options for a play session.
#[derive(Debug, Clone)]
pub struct Options {
    pub image: Option<String>,
    pub genre: Option<Genre>,
    pub max_scenes: u32,
    pub load: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            image: None,
            genre: None,
            max_scenes: 10,
            load: None,
        }
    }
}

fn build_engine(max_scenes: u32) -> Result<StoryEngine, Box<dyn std::error::Error>> {
    let grs = GrsConfig::from_env()?;
    let content = GrsContentGenerator::new(grs.clone()).with_plan_steps(max_scenes);
    let images = GrsImageGenerator::new(&grs);
    let config = EngineConfig::new().with_max_scenes(max_scenes);
    Ok(StoryEngine::new(Arc::new(content), Arc::new(images), config))
}

/// Play a story until the input ends or the reader quits.
pub async fn run_headless(options: Options) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = build_engine(options.max_scenes)?;
    let mut stdout = io::stdout();

    println!("=== Story ===");
    if let Some(path) = &options.load {
        let saved = SavedStory::load_json(path).await?;
        println!("[LOADED] Story saved at {} from {}", saved.saved_at, path.display());
        engine.resume(saved.state);
    } else if let Some(image) = &options.image {
        print!("[STARTING] Reading the picture and writing the opening...");
        stdout.flush().ok();
        let started = engine.start(ImageRef::new(image.as_str()), options.genre).await;
        println!();
        started?;
    }
    print_help();

    if let Some(state) = engine.state() {
        print_scene(state);
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            let parts: Vec<&str> = command.split_whitespace().collect();
            match parts.first().copied() {
                Some("quit") | Some("exit") => {
                    println!("Goodbye!");
                    break;
                }
                Some("back") => match parts.get(1).map(|s| s.parse::<usize>()) {
                    Some(Ok(step)) => match engine.rollback(step) {
                        Ok(state) => {
                            println!("[ROLLED BACK] to step {step}");
                            print_scene(state);
                        }
                        Err(e) => println!("[ERROR] {e}"),
                    },
                    _ => println!("[ERROR] Usage: #back <step>"),
                },
                Some("save") => match engine.state() {
                    Some(state) => {
                        let path = parts
                            .get(1)
                            .map(PathBuf::from)
                            .unwrap_or_else(|| save_path(".", state.theme()));
                        match SavedStory::new(state.clone()).save_json(&path).await {
                            Ok(()) => println!("[SAVED] Story saved to {}", path.display()),
                            Err(e) => println!("[ERROR] Save failed: {e}"),
                        }
                    }
                    None => println!("[ERROR] Nothing to save yet"),
                },
                Some("load") => match parts.get(1) {
                    Some(path) => match SavedStory::load_json(path).await {
                        Ok(saved) => {
                            println!("[LOADED] Story loaded from {path}");
                            print_scene(engine.resume(saved.state));
                        }
                        Err(e) => println!("[ERROR] Load failed: {e}"),
                    },
                    None => println!("[ERROR] Usage: #load <path>"),
                },
                Some("status") => match engine.state() {
                    Some(state) => print_status(state),
                    None => println!("[ERROR] No story loaded"),
                },
                Some("history") => match engine.state() {
                    Some(state) => print_history(state),
                    None => println!("[ERROR] No story loaded"),
                },
                Some("help") => print_help(),
                _ => println!("[ERROR] Unknown command. Type #help for help."),
            }
            stdout.flush().ok();
            continue;
        }

        print!("[WRITING]");
        stdout.flush().ok();

        let result = engine.advance(line).await;
        print!("\r         \r");
        stdout.flush().ok();

        match result {
            Ok(state) => print_scene(state),
            Err(e) => println!("[ERROR] {e}"),
        }
    }

    Ok(())
}

fn print_scene(state: &StoryState) {
    let summary = state.summary();
    println!();
    println!(
        "[STEP {}/{}] {:.0}% complete",
        summary.step.min(summary.max_scenes),
        summary.max_scenes,
        summary.progress
    );
    println!("[IMAGE] {}", summary.image);
    for para in summary.text.split("\n\n") {
        println!("{para}");
    }
    println!();

    if summary.complete {
        println!(
            "[THE END] {}",
            summary.ending.as_deref().unwrap_or("the story is over")
        );
        println!("Use #back <step> to return to an earlier step and choose differently.");
    } else {
        println!("[CHOICES]");
        for (id, text, category) in &summary.choices {
            println!("  {id}. {text} ({category})");
        }
    }
    println!();
}

fn print_status(state: &StoryState) {
    println!("[STATUS]");
    println!("  Theme: {}", state.theme());
    println!("  Genre: {}", state.current_scene().genre);
    println!("  Steps taken: {}/{}", state.scene_count(), state.max_scenes());
    println!("  Progress: {:.0}%", state.progress());
    let attributes: Vec<String> = state
        .attributes()
        .iter()
        .map(|(attribute, value)| format!("{attribute} {value}"))
        .collect();
    println!("  Attributes: {}", attributes.join(", "));
    println!("  Danger: {}", state.danger_level());
    if !state.item_states().is_empty() {
        let items: Vec<&str> = state.item_states().keys().map(String::as_str).collect();
        println!("  Items: {}", items.join(", "));
    }
}

fn print_history(state: &StoryState) {
    println!("[HISTORY]");
    for entry in state.history().iter() {
        let opening: String = entry.text.chars().take(60).collect();
        println!("  {}. ({}) {}...", entry.step, entry.arrived_by, opening);
    }
}

fn print_help() {
    println!("Commands:");
    println!("  <id>          - Take the choice with that id");
    println!("  #back <step>  - Roll back to an earlier step");
    println!("  #history      - List the steps so far");
    println!("  #save [path]  - Save the story");
    println!("  #load <path>  - Load a saved story");
    println!("  #status       - Show the story's state");
    println!("  #help         - Show this help");
    println!("  #quit         - Exit");
}
