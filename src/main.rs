// ABOUTME: Main entry point for the deckfit program.
// ABOUTME: Provides CLI interface and executes commands from the library.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use deckfit::{Config, LessonFormat, ResourceMap, Tolerance};
use log::info;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a slide deck from a Markdown or JSON lesson
    Build(BuildArgs),

    /// Check rendered decks for slides that exceed their height budget
    Audit(AuditArgs),

    /// Apply partial slide updates to an existing deck
    Patch(PatchArgs),

    /// Print the height table and slide budgets
    Estimate,
}

#[derive(Args)]
struct BuildArgs {
    /// Path to the lesson file (.md or .json)
    #[arg(short, long)]
    input: PathBuf,

    /// Path to output HTML file
    #[arg(short, long)]
    output: PathBuf,

    /// Deck title (defaults to the first slide title)
    #[arg(long)]
    title: Option<String>,

    /// JSON object mapping image references to local paths or URLs
    #[arg(long)]
    resources: Option<PathBuf>,

    /// Write the build report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args)]
struct AuditArgs {
    /// Glob pattern of markup files to audit
    #[arg(short, long)]
    pattern: String,

    /// Allowed overflow in percent of the budget (exact when omitted)
    #[arg(long)]
    tolerance: Option<f64>,

    /// Write annotated markup back to each audited file
    #[arg(long)]
    write: bool,

    /// Exit with an error if any slide overflows
    #[arg(long)]
    fail_on_overflow: bool,
}

#[derive(Args)]
struct PatchArgs {
    /// Path to the existing markup
    #[arg(short, long)]
    input: PathBuf,

    /// Path to a JSON array of slide updates
    #[arg(short, long)]
    updates: PathBuf,

    /// Path to output HTML file
    #[arg(short, long)]
    output: PathBuf,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = Config::from_env()
        .context("Failed to load configuration")
        .and_then(|config| match &cli.command {
            Some(Commands::Build(args)) => run_build(&config, args),
            Some(Commands::Audit(args)) => run_audit(&config, args),
            Some(Commands::Patch(args)) => run_patch(args),
            Some(Commands::Estimate) => run_estimate(&config),
            None => {
                println!("No command specified. Use --help for usage information.");
                Ok(())
            }
        });

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_build(config: &Config, args: &BuildArgs) -> anyhow::Result<()> {
    println!("Executing build command...");

    let content = deckfit::utils::read_text_file(&args.input)
        .with_context(|| format!("Failed to read lesson {:?}", args.input))?;
    let lessons = deckfit::parse_lesson(&content, LessonFormat::from_path(&args.input))?;
    let resources = match &args.resources {
        Some(path) => load_resources(path)?,
        None => ResourceMap::new(),
    };

    let report = deckfit::build_deck(
        &lessons,
        &config.preprocessor(),
        config.packer(),
        &resources,
    );
    let title = args
        .title
        .clone()
        .unwrap_or_else(|| lessons[0].title.clone());
    let html = deckfit::generate_html(&report.deck, &title);
    deckfit::write_html_to_file(&html, &args.output)?;

    for failure in &report.failures {
        eprintln!(
            "Warning: could not place {} block on '{}': {}",
            failure.block_kind, failure.slide_title, failure.message
        );
    }
    if let Some(path) = &args.report {
        write_json(path, &report)?;
    }

    println!(
        "Deck generated successfully: {:?} ({} slides)",
        args.output,
        report.deck.len()
    );
    Ok(())
}

fn run_audit(config: &Config, args: &AuditArgs) -> anyhow::Result<()> {
    let tolerance = match args.tolerance {
        Some(percent) if !percent.is_finite() || percent < 0.0 => {
            anyhow::bail!("--tolerance must be a non-negative percentage")
        }
        Some(percent) => Tolerance::from_percent(percent),
        None => config.audit_tolerance,
    };
    let auditor = config.auditor_with(tolerance);

    let mut overflowing = 0;
    for path in deckfit::utils::expand_pattern(&args.pattern)? {
        info!("Auditing {:?}", path);
        let markup = deckfit::utils::read_text_file(&path)?;
        let report = auditor
            .audit(&markup)
            .with_context(|| format!("Failed to audit {:?}", path))?;

        for slide in report.overflowing() {
            println!(
                "{}: slide {} overflows by {}px ({}px of {}px)",
                path.display(),
                slide.index,
                slide.excess,
                slide.estimated_height,
                slide.budget
            );
        }
        overflowing += report.overflowing().count();

        if args.write && report.markup != markup {
            fs::write(&path, &report.markup)
                .with_context(|| format!("Failed to write {:?}", path))?;
        }
    }

    println!("{} overflowing slides", overflowing);
    if args.fail_on_overflow && overflowing > 0 {
        anyhow::bail!("{} slides overflow their height budget", overflowing);
    }
    Ok(())
}

fn run_patch(args: &PatchArgs) -> anyhow::Result<()> {
    println!("Executing patch command...");

    let markup = deckfit::utils::read_text_file(&args.input)?;
    let updates = deckfit::utils::read_text_file(&args.updates)?;
    let report = deckfit::apply_patch_json(&markup, &updates)
        .with_context(|| format!("Failed to apply updates {:?}", args.updates))?;
    deckfit::write_html_to_file(&report.markup, &args.output)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_estimate(config: &Config) -> anyhow::Result<()> {
    let table = config.height_table();
    println!("{}", serde_json::to_string_pretty(table.as_ref())?);
    println!("Budget without subtitle: {}px", table.budget(false));
    println!("Budget with subtitle: {}px", table.budget(true));
    Ok(())
}

fn load_resources(path: &Path) -> anyhow::Result<ResourceMap> {
    let raw: BTreeMap<String, String> = serde_json::from_str(&deckfit::utils::read_text_file(path)?)
        .with_context(|| format!("Failed to parse resources {:?}", path))?;
    let mut resources = ResourceMap::new();
    for (reference, source) in &raw {
        resources.insert(reference, source);
    }
    Ok(resources)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    deckfit::utils::ensure_parent_directory_exists(path)?;
    fs::write(path, serde_json::to_string_pretty(value)?)
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}
