//! # Marko Lens
//!
//! Command-line front end for the Marko editing aids: tag matching,
//! completion and jump-to-definition over a template file and a cursor
//! position. Every command prints JSON.
//!
//! ## Quick Start
//!
//! ```bash
//! # Which tag pair is highlighted with the cursor on line 3, column 5
//! cargo run -- match src/components/app/index.marko 3:5
//!
//! # Suggestions at the end of line 10
//! cargo run -- complete page.marko 10:12
//!
//! # Where clicking a tag name leads
//! cargo run -- goto page.marko 4:3 --project .
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marko_assist::{Assistant, ClickInspection, NavigationTarget, Suggestion};
use marko_buffer::{Position, Range};
use marko_core::{Config, Document, Editor};
use marko_syntax::{GrammarRegistry, MarkoScopeClassifier, ScopeChain, ScopeClassifier, ScopeKind, Token};

/// Marko Lens - tag matching, completion and navigation for Marko templates
#[derive(Parser, Debug)]
#[command(name = "marko-lens")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Project directory used when no package.json is found
    #[arg(short, long, value_name = "DIR", global = true)]
    project: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Scopes, token and region at a position
    Scopes(Target),
    /// The tag pair highlighted with the cursor at a position
    Match(Target),
    /// Completion suggestions at a position
    Complete(Target),
    /// Where clicking a position leads
    Goto(Target),
}

#[derive(clap::Args, Debug, PartialEq)]
struct Target {
    /// Template file
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Cursor as LINE:COLUMN, both starting at 1
    #[arg(value_name = "LINE:COLUMN", value_parser = parse_position)]
    position: Position,
}

fn parse_position(value: &str) -> Result<Position, String> {
    let (line, column) = value
        .split_once(':')
        .ok_or_else(|| format!("expected LINE:COLUMN, got {value:?}"))?;
    let parse = |part: &str, what: &str| -> Result<usize, String> {
        match part.trim().parse::<usize>() {
            Ok(0) | Err(_) => Err(format!("{what} must be a number starting at 1")),
            Ok(n) => Ok(n - 1),
        }
    };
    Ok(Position::new(parse(line, "line")?, parse(column, "column")?))
}

// ==================== Output ====================

#[derive(Serialize)]
struct ScopesOutput {
    scopes: ScopeChain,
    token: Option<Token>,
    region: Option<ScopeKind>,
}

#[derive(Serialize)]
struct TagOutput {
    name: Option<String>,
    range: Option<Range>,
}

#[derive(Serialize)]
struct MatchOutput {
    open: Option<TagOutput>,
    close: Option<TagOutput>,
    highlighted: Vec<Range>,
}

#[derive(Serialize)]
struct GotoOutput {
    inspection: ClickInspection,
    target: NavigationTarget,
    /// Landing position in the target file, when found
    landing: Option<Position>,
}

// ==================== Commands ====================

fn open(file: &Path) -> anyhow::Result<Document> {
    Document::from_file(file, &GrammarRegistry::new())
        .with_context(|| format!("Failed to open {}", file.display()))
}

fn scopes(target: &Target) -> anyhow::Result<ScopesOutput> {
    let doc = open(&target.file)?;
    let scopes = doc.scopes_at(target.position);
    let classifier = MarkoScopeClassifier;
    Ok(ScopesOutput {
        token: classifier.token_for(&scopes),
        region: classifier.region_for(&scopes),
        scopes,
    })
}

fn matched(target: &Target, config: Config) -> anyhow::Result<MatchOutput> {
    let mut editor = Editor::with_config(open(&target.file)?, config);
    editor.move_cursor(target.position);

    let doc = editor.document();
    let describe = |tag: &marko_core::Tag| TagOutput {
        name: tag.name(doc),
        range: tag.range(doc),
    };
    let matched = editor.matcher().matched();
    Ok(MatchOutput {
        open: matched.map(|m| describe(m.open())),
        close: matched.and_then(|m| m.close()).map(describe),
        highlighted: editor.highlighted_ranges(),
    })
}

fn complete(target: &Target, assistant: &mut Assistant) -> anyhow::Result<Vec<Suggestion>> {
    let doc = open(&target.file)?;
    Ok(assistant.suggestions(&doc, target.position)?)
}

fn goto(target: &Target, assistant: &mut Assistant) -> anyhow::Result<Option<GotoOutput>> {
    let doc = open(&target.file)?;
    let Some((inspection, target)) = assistant.navigate(&doc, target.position)? else {
        return Ok(None);
    };
    let landing = target.locate_file()?;
    Ok(Some(GotoOutput {
        inspection,
        target,
        landing,
    }))
}

/// Runs one command and renders its JSON.
fn run(args: &Args) -> anyhow::Result<String> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load(),
    };

    let json = match &args.command {
        Command::Scopes(target) => serde_json::to_string_pretty(&scopes(target)?)?,
        Command::Match(target) => serde_json::to_string_pretty(&matched(target, config)?)?,
        Command::Complete(target) => {
            let mut assistant = Assistant::new(config, args.project.clone());
            serde_json::to_string_pretty(&complete(target, &mut assistant)?)?
        }
        Command::Goto(target) => {
            let mut assistant = Assistant::new(config, args.project.clone());
            serde_json::to_string_pretty(&goto(target, &mut assistant)?)?
        }
    };
    Ok(json)
}

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting Marko Lens v{}", env!("CARGO_PKG_VERSION"));

    println!("{}", run(&args)?);
    Ok(())
}
