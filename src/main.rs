use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use image_story::config::settings_io;
use image_story::logging;
use image_story::{
    Backend, ChoiceSet, CompletionClient, HttpCompletionClient, ModelSelection, Settings,
    StoryEngine, DEFAULT_CHOICE_COUNT,
};

#[derive(Parser, Debug)]
#[command(
    name = "image-story",
    version,
    about = "Interactive branching stories from an image, told by a local LLM"
)]
struct Cli {
    /// Image to build the story around (asked for when omitted)
    image: Option<PathBuf>,

    /// Write one complete short story instead of playing interactively
    #[arg(long)]
    quick: bool,

    /// Model server dialect
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// Model server address
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Multimodal model that looks at the image
    #[arg(long, value_name = "MODEL")]
    vision_model: Option<String>,

    /// Model that writes the story
    #[arg(long, value_name = "MODEL")]
    text_model: Option<String>,

    /// Choices offered at each decision point
    #[arg(long, default_value_t = DEFAULT_CHOICE_COUNT)]
    choices: usize,

    /// Store the effective settings in the config file
    #[arg(long)]
    save_settings: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply_overrides(&self, mut settings: Settings) -> Settings {
        if let Some(backend) = self.backend {
            settings.backend = backend;
        }
        if let Some(url) = &self.base_url {
            settings.base_url = Some(url.clone());
        }
        if let Some(model) = &self.vision_model {
            settings.vision_model = model.clone();
        }
        if let Some(model) = &self.text_model {
            settings.text_model = model.clone();
        }
        settings
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let settings = cli.apply_overrides(settings_io::load_settings());
    if cli.save_settings {
        let path = settings_io::save_settings(&settings).context("save settings")?;
        info!(path = %path.display(), "settings saved");
    }

    let client = HttpCompletionClient::new(&settings).context("build HTTP client")?;
    match client.check_connection() {
        Ok(status) => info!("{status}"),
        Err(err) => warn!(
            error = %err,
            "model server at {} unreachable; is it running with `{}` pulled?",
            client.base_url(),
            settings.vision_model
        ),
    }

    let mut engine = StoryEngine::new(client, ModelSelection::from(&settings));

    let stdin = io::stdin();
    let mut input = stdin.lock();

    let image = match cli.image {
        Some(path) => path,
        None => prompt_image_path(&mut input)?,
    };

    if cli.quick {
        run_quick(&mut engine, &image)
    } else {
        run_interactive(&mut engine, &image, cli.choices, &mut input)
    }
}

fn prompt_image_path(input: &mut impl BufRead) -> Result<PathBuf> {
    print!("Enter image path (or drag and drop file): ");
    io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line).context("read image path")?;

    // Drag and drop usually wraps the path in quotes.
    let path = line.trim().trim_matches(|c: char| c == '\'' || c == '"');
    if path.is_empty() {
        bail!("no image path given");
    }
    Ok(PathBuf::from(path))
}

fn run_quick<C: CompletionClient>(engine: &mut StoryEngine<C>, image: &Path) -> Result<()> {
    println!("Analyzing image and creating story...\n");
    let story = engine.quick_story(image).context("write story")?;

    println!("=== YOUR STORY ===\n");
    println!("{story}");
    Ok(())
}

fn run_interactive<C: CompletionClient>(
    engine: &mut StoryEngine<C>,
    image: &Path,
    count: usize,
    input: &mut impl BufRead,
) -> Result<()> {
    println!("Analyzing image and writing the opening...");
    let opening = engine.analyze_image(image).context("start story")?;

    println!("\n=== IMAGE ANALYSIS ===\n{}", opening.analysis);
    println!("\n=== STORY BEGINS ===\n{}", opening.narrative);

    let mut current = opening.narrative;
    loop {
        let choices = engine
            .generate_choices(&current, count)
            .context("generate choices")?;
        print_choices(&choices);

        let Some(action) = read_choice(&choices, input)? else {
            break;
        };

        println!("\nYou chose: {action}\n");
        current = engine
            .continue_story(&action, &current)
            .context("continue story")?;
        println!("{current}");
    }

    println!("\n=== THE END ===");
    Ok(())
}

fn print_choices(choices: &ChoiceSet) {
    println!("\n=== YOUR OPTIONS ===");
    for (i, (_, choice)) in choices.iter().enumerate() {
        println!("{}. {}", i + 1, choice.action());
        if let Some(hint) = choice.hint() {
            println!("   hint: {hint}");
        }
    }
}

/// `None` when the player quits or stdin closes.
fn read_choice(choices: &ChoiceSet, input: &mut impl BufRead) -> Result<Option<String>> {
    loop {
        print!("\nChoose (1-{}) or 'q' to quit: ", choices.len());
        io::stdout().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line).context("read choice")? == 0 {
            return Ok(None);
        }

        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            return Ok(None);
        }

        match line.parse::<usize>().ok().and_then(|n| choices.get_by_number(n)) {
            Some(choice) => return Ok(Some(choice.action().to_string())),
            None => println!("Invalid choice!"),
        }
    }
}
