use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use stylematrix_contracts::catalogue::{cell_label, StyleCatalogue};
use stylematrix_contracts::events::EventWriter;
use stylematrix_contracts::now_utc_iso;
use stylematrix_contracts::phase::Stage;
use stylematrix_contracts::records::{GenerationStatus, SessionSnapshot};
use stylematrix_contracts::runs::summary::{write_summary, SessionSummary};
use stylematrix_contracts::themes::ThemePalette;
use stylematrix_engine::{
    default_client_registry, DrainOutcome, ProgressUpdate, ReferenceImage, SessionConfig,
    StageController,
};

#[derive(Debug, Parser)]
#[command(
    name = "stylematrix",
    version,
    about = "Render a reference image across a matrix of art styles"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the style catalogue.
    Styles,
    /// List the colour themes.
    Themes,
    /// Preview every style, then upgrade a selection to high resolution.
    Run(RunArgs),
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    theme: Option<usize>,
    /// `gemini` or `dryrun`; defaults to gemini when a key is configured.
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    model: Option<String>,
    /// Style ids to upgrade, comma separated. Prompted on stdin when omitted.
    #[arg(long)]
    select: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("stylematrix error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Styles => {
            list_styles(&StyleCatalogue::reference());
            Ok(0)
        }
        Command::Themes => {
            list_themes(&ThemePalette::reference());
            Ok(0)
        }
        Command::Run(args) => run_matrix(args),
    }
}

fn list_styles(catalogue: &StyleCatalogue) {
    for (position, style) in catalogue.iter().enumerate() {
        println!("{}  {:>3}  {}", cell_label(position), style.id, style.name);
    }
}

fn list_themes(palette: &ThemePalette) {
    for (index, theme) in palette.iter().enumerate() {
        println!(
            "{index}  {:<16} ink {}  paper {}",
            theme.name, theme.ink_hex, theme.paper_hex
        );
    }
}

fn run_matrix(args: RunArgs) -> Result<i32> {
    let mut config = SessionConfig::from_env();
    if let Some(theme) = args.theme {
        config = config.with_theme(theme);
    }
    if let Some(model) = args.model.as_deref() {
        config = config.with_model(model);
    }
    let catalogue = StyleCatalogue::reference();
    let palette = ThemePalette::reference();

    let clients = default_client_registry(&config, &palette)?;
    let provider = match args.provider.as_deref() {
        Some(name) => name.trim().to_string(),
        None if config.credential.is_some() => "gemini".to_string(),
        None => {
            eprintln!("No GEMINI_API_KEY/GOOGLE_API_KEY set; using the dryrun provider.");
            "dryrun".to_string()
        }
    };
    let Some(client) = clients.get(&provider) else {
        bail!(
            "unknown or unconfigured provider '{provider}' (available: {})",
            clients.names().join(", ")
        );
    };

    let session_id = uuid::Uuid::new_v4().to_string();
    let started_at = now_utc_iso();
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let events = EventWriter::new(&events_path, session_id.clone());

    let session = StageController::new(&config, client, catalogue, palette, events)?;
    session.set_progress_observer(Arc::new(print_progress));
    let reference = ReferenceImage::from_path(&args.image)
        .with_context(|| format!("failed to load reference image {}", args.image.display()))?;
    session.load_image(reference)?;

    let theme = session.theme()?;
    println!(
        "Session {session_id}: {} styles, theme {}, provider {provider}",
        session.catalogue().count(),
        theme.name
    );

    report_drain(session.run_previews()?);
    print_review(&session.snapshot(), session.catalogue());

    let requested = match args.select.as_deref() {
        Some(raw) => parse_selection(raw)?,
        None => prompt_selection()?,
    };
    for style_id in requested {
        if let Err(err) = session.set_selected(style_id, true) {
            eprintln!("Skipping style {style_id}: {err}");
        }
    }
    if session.selected_ids().is_empty() {
        println!("No styles selected; skipping upgrades.");
    } else {
        report_drain(session.run_upgrades()?);
    }

    let report = session.export(&args.out)?;
    for warning in &report.manifest.warnings {
        eprintln!("Export warning: {warning}");
    }
    println!(
        "Exported {} images to {}",
        report.files.len(),
        args.out.display()
    );

    let summary = SessionSummary::from_snapshot(
        &session_id,
        &started_at,
        &theme.name,
        &session.snapshot(),
        session.remote_calls(),
    );
    let mut extra = Map::new();
    extra.insert("provider".to_string(), Value::String(provider));
    extra.insert("model".to_string(), Value::String(config.model.clone()));
    extra.insert(
        "events".to_string(),
        json!(events_path.display().to_string()),
    );
    write_summary(&args.out.join("summary.json"), &summary, Some(&extra))?;
    Ok(0)
}

fn print_progress(update: &ProgressUpdate) {
    let step = format!("{}/{}", update.index + 1, update.total);
    match update.status {
        GenerationStatus::Processing | GenerationStatus::Upgrading => {
            println!("[{} {step}] {} ...", update.stage, update.style_name);
        }
        GenerationStatus::Error => println!(
            "[{} {step}] {} failed: {}",
            update.stage,
            update.style_name,
            update.error.as_deref().unwrap_or("unknown error")
        ),
        status => println!("[{} {step}] {} {}", update.stage, update.style_name, status.as_str()),
    }
}

fn report_drain(outcome: DrainOutcome) {
    match outcome {
        DrainOutcome::Exhausted { stage, processed } => {
            println!("{} finished: {processed} jobs.", stage.title());
        }
        DrainOutcome::Halted { stage, processed } => {
            eprintln!("{} halted after {processed} jobs.", stage.title());
        }
    }
}

fn print_review(snapshot: &SessionSnapshot, catalogue: &StyleCatalogue) {
    println!("\n{} review ({})", Stage::Preview.title(), snapshot.phase);
    for record in &snapshot.records {
        let label = catalogue
            .position(record.style_id)
            .map(cell_label)
            .unwrap_or_else(|_| "--".to_string());
        let name = catalogue
            .get(record.style_id)
            .map(|style| style.name.as_str())
            .unwrap_or("?");
        match record.error.as_deref() {
            Some(error) => println!(
                "{label}  {:>3}  {:<10} {name}: {error}",
                record.style_id,
                record.status.as_str()
            ),
            None => println!(
                "{label}  {:>3}  {:<10} {name}",
                record.style_id,
                record.status.as_str()
            ),
        }
    }
}

fn prompt_selection() -> Result<Vec<u32>> {
    print!("Style ids to upgrade (comma separated, empty to skip): ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read selection from stdin")?;
    parse_selection(&line)
}

/// Parses `3, 7 12` style id lists; duplicates keep their first position.
fn parse_selection(raw: &str) -> Result<Vec<u32>> {
    let mut ids = Vec::new();
    for token in raw
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|token| !token.is_empty())
    {
        let id: u32 = token
            .parse()
            .with_context(|| format!("invalid style id '{token}'"))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}
