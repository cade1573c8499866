//! opportunity-bot is a CLI tool run by GitHub Actions to maintain a list of
//! underclassmen opportunities from approved issues.
//!
//! The tool has three commands:
//! 1. `approve` - Applies an approved new/edit/close issue to the listings
//! 2. `extract` - Adds an opportunity from a URL using an LLM model
//! 3. `render` - Regenerates the README tables from the listings

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::{LevelFilter, error, info};

use opportunity_bot::{
    HandlerConfig, IssueEvent, Storage, TextBy,
    constants::{DEFAULT_LISTINGS_PATH, DEFAULT_MODEL, DEFAULT_README_PATH, MODEL_API_KEY_ENV_NAME},
    contribution::{DuplicatePolicy, EditMode, ReviewPolicy, auto_extract, process_approved},
    compose::update_readme,
    extract::{ExtractContext, build_model},
    outputs::{OutputSink, Outputs},
};

/// A CLI tool maintaining underclassmen opportunity listings
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The command to execute (approve, extract or render)
    #[command(subcommand)]
    command: Command,

    #[arg(long, short, action = clap::ArgAction::Count, help = "Output v(v...)erbosity: error (0), warn (1), info (2), debug (3), trace (4)", global = true, default_value_t = 2)]
    verbose: u8,

    /// File receiving workflow outputs; stdout in the legacy format if unset
    #[arg(long, env = "GITHUB_OUTPUT", global = true)]
    github_output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply an approved new, edit or close opportunity issue to the listings
    Approve {
        /// Path to the GitHub event payload
        event: PathBuf,
        /// Path to the listings document
        #[arg(long, short, default_value = DEFAULT_LISTINGS_PATH)]
        listings: PathBuf,
        /// Edit handling: "disabled" (default) or "bump"
        #[arg(long, default_value = "disabled")]
        edit_mode: EditMode,
        /// Duplicate handling: "reject" (default) or "flag"
        #[arg(long, default_value = "reject")]
        duplicates: DuplicatePolicy,
    },
    /// Add an opportunity by extracting its details from the submitted URL
    Extract {
        /// Path to the GitHub event payload
        event: PathBuf,
        /// Path to the listings document
        #[arg(long, short, default_value = DEFAULT_LISTINGS_PATH)]
        listings: PathBuf,
        /// URL of the LLM model to use, e.g. openai://gpt-4o-mini
        #[arg(long, short, default_value = DEFAULT_MODEL)]
        model: String,
        /// Path to the file with a prompt template
        #[arg(long, short = 'p')]
        prompt_file: Option<PathBuf>,
        /// Text extraction method: "visible" (default), "readability" or "markdown"
        #[arg(long, default_value = "visible")]
        text_by: TextBy,
        /// Duplicate handling: "flag" (default) or "reject"
        #[arg(long, default_value = "flag")]
        duplicates: DuplicatePolicy,
        /// Unconfirmed underclassmen targeting: "hold" (default) or "warn"
        #[arg(long, default_value = "hold")]
        review: ReviewPolicy,
    },
    /// Validate the listings and regenerate the README tables
    Render {
        /// Path to the listings document
        #[arg(long, short, default_value = DEFAULT_LISTINGS_PATH)]
        listings: PathBuf,
        /// Path to the README with table markers
        #[arg(long, short, default_value = DEFAULT_README_PATH)]
        readme: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    Builder::new()
        .filter_level(match cli.verbose {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .init();

    let sink = OutputSink::new(
        cli.github_output
            .filter(|path| !path.as_os_str().is_empty()),
    );

    let outputs = match run(cli.command).await {
        Ok(outputs) => outputs,
        Err(err) => {
            let message = format!("{err:#}");
            error!("Error: {message}");
            let mut outputs = Outputs::new();
            outputs.set("error_message", message);
            if let Err(emit_error) = sink.emit(&outputs) {
                error!("Failed to write outputs: {emit_error:#}");
            }
            return ExitCode::FAILURE;
        }
    };

    match sink.emit(&outputs) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Failed to write outputs: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<Outputs> {
    let now = chrono::Utc::now();

    match command {
        Command::Approve {
            event,
            listings,
            edit_mode,
            duplicates,
        } => {
            let config = HandlerConfig {
                edit_mode,
                duplicates,
                ..HandlerConfig::default()
            };
            let event = IssueEvent::from_file(&event)?;
            let storage = open_storage(listings);
            process_approved(&event, &storage, &config, now.timestamp())
        }
        Command::Extract {
            event,
            listings,
            model,
            prompt_file,
            text_by,
            duplicates,
            review,
        } => {
            let config = HandlerConfig {
                duplicates,
                review,
                ..HandlerConfig::default()
            };
            handle_extract_command(event, listings, model, prompt_file, text_by, config).await
        }
        Command::Render { listings, readme } => {
            let storage = open_storage(listings);
            update_readme(&storage, &readme, now)
        }
    }
}

fn open_storage(listings: PathBuf) -> Storage {
    let storage = Storage::new(listings);
    if storage.new {
        info!("No listings at {}, starting empty", storage.path().display());
    }
    storage
}

async fn handle_extract_command(
    event: PathBuf,
    listings: PathBuf,
    model: String,
    prompt_file: Option<PathBuf>,
    text_by: TextBy,
    config: HandlerConfig,
) -> Result<Outputs> {
    let event = IssueEvent::from_file(&event)?;
    let model = build_model(&model, std::env::var(MODEL_API_KEY_ENV_NAME).ok())?;

    let prompt_template = match prompt_file {
        Some(file) => {
            let content = fs::read_to_string(&file)
                .context(format!("Failed to read prompt file: {}", file.display()))?;
            Some(content)
        }
        None => None,
    };

    let ctx = ExtractContext {
        model: model.as_ref(),
        prompt_template: prompt_template.as_deref(),
    };

    let storage = open_storage(listings);
    auto_extract(
        &event,
        &storage,
        &ctx,
        text_by,
        &config,
        chrono::Utc::now().timestamp(),
    )
    .await
}
