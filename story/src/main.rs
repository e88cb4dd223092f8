//! Interactive picture-story player.
//!
//! Starts a branching story from an image and plays it on the terminal,
//! one choice per line.
//!
//! ```bash
//! cargo run -p story -- --image https://example.com/harbour.png --genre mystery
//! cargo run -p story -- --load saves/harbour_1718000000.json
//! ```

mod headless;

use headless::Options;
use story_core::Genre;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    if std::env::var("GRS_AI_API_KEY").is_err() {
        eprintln!("Error: GRS_AI_API_KEY environment variable not set.");
        eprintln!("Please set it in .env file or with: export GRS_AI_API_KEY=your_key_here");
        std::process::exit(1);
    }

    let options = parse_options(&args);
    if options.image.is_none() && options.load.is_none() {
        eprintln!("Error: either --image or --load is required. See --help.");
        std::process::exit(1);
    }

    headless::run_headless(options).await
}

fn parse_options(args: &[String]) -> Options {
    let mut options = Options::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--image" => {
                if let Some(image) = args.get(i + 1) {
                    options.image = Some(image.clone());
                    i += 1;
                }
            }
            "--genre" => {
                if let Some(name) = args.get(i + 1) {
                    options.genre = Genre::from_name(name);
                    if options.genre.is_none() {
                        eprintln!("Unknown genre '{name}', it will be inferred from the image.");
                    }
                    i += 1;
                }
            }
            "--max-scenes" => {
                if let Some(n) = args.get(i + 1) {
                    match n.parse() {
                        Ok(n) => options.max_scenes = n,
                        Err(_) => eprintln!("Invalid --max-scenes '{n}', using {}.", options.max_scenes),
                    }
                    i += 1;
                }
            }
            "--load" => {
                if let Some(path) = args.get(i + 1) {
                    options.load = Some(path.into());
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    options
}

fn print_help() {
    println!("Story - branching picture stories with an AI narrator");
    println!();
    println!("USAGE:");
    println!("  story [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help            Show this help message");
    println!("  --image <URL>         Opening image to build the story from");
    println!("  --genre <GENRE>       Story genre (default: inferred from the image)");
    println!("  --max-scenes <N>      Number of steps before the story ends (default: 10)");
    println!("  --load <PATH>         Resume a saved story instead of starting one");
    println!();
    println!("GENRES:");
    println!("  adventure, mystery, fantasy, scifi, romance, horror, comedy, drama");
    println!();
    println!("ENVIRONMENT:");
    println!("  GRS_AI_API_KEY        API key (required)");
    println!("  GRS_AI_BASE_URL       API base URL");
    println!("  GRS_AI_CHAT_MODEL     Chat model for story text");
    println!("  GRS_AI_DRAW_MODEL     Image model for scene pictures");
    println!("  RUST_LOG              Log filter, logs go to stderr (default: warn)");
    println!();
    println!("EXAMPLES:");
    println!("  story --image https://example.com/harbour.png");
    println!("  story --image https://example.com/castle.jpg --genre fantasy --max-scenes 6");
    println!("  story --load story_1718000000.json");
}
