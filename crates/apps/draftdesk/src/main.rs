//! draftdesk - Gmail draft builder for video-check and shooting-plan requests

mod app;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use drafts::templates::{ShootingPlan, VideoCheck, VideoLinks};
use drafts::{DraftResult, EmailContent, TitleLookupOutcome};
use log::{error, warn};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::app::App;

/// Build Gmail drafts for production requests
#[derive(Parser)]
#[command(name = "draftdesk")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Print the sign-in URL instead of opening a browser
    #[arg(long, global = true)]
    no_browser: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask reviewers to check an edited video
    VideoCheck(VideoCheckArgs),

    /// Share the project list for the next shoot
    ShootingPlan(ShootingPlanArgs),
}

#[derive(Args)]
struct VideoCheckArgs {
    /// YouTube link to the edited video
    #[arg(long)]
    video_url: String,

    /// Google Docs link to the editing instructions
    #[arg(long)]
    instruction_url: String,

    /// Instruction document name (looked up on Drive when omitted)
    #[arg(long)]
    title: Option<String>,

    /// Render the draft without signing in
    #[arg(long)]
    preview: bool,
}

#[derive(Args)]
struct ShootingPlanArgs {
    /// Shoot date (YYYY-MM-DD)
    #[arg(long)]
    date: NaiveDate,

    /// Start time (HH:MM)
    #[arg(long, value_parser = parse_time)]
    time: NaiveTime,

    /// Project title; repeat for each project
    #[arg(long = "project")]
    projects: Vec<String>,

    /// File with one project title per line
    #[arg(long, conflicts_with = "projects")]
    projects_file: Option<PathBuf>,

    /// Closing signature
    #[arg(long, env = "DRAFTDESK_SIGNATURE")]
    signature: Option<String>,

    /// Render the draft without signing in
    #[arg(long)]
    preview: bool,
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| format!("expected HH:MM ({})", e))
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Command::VideoCheck(args) => video_check(args, !cli.no_browser),
        Command::ShootingPlan(args) => shooting_plan(args, !cli.no_browser),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn video_check(args: VideoCheckArgs, open_browser: bool) -> Result<()> {
    let links = VideoLinks::parse(&args.video_url, &args.instruction_url)?;
    let today = Local::now().date_naive();

    if args.preview {
        let title = match args.title {
            Some(title) => title,
            None => prompt("Document title")?,
        };
        show(&VideoCheck::new(links, &title, today)?.render());
        return Ok(());
    }

    let app = App::new(open_browser)?;
    app.sign_in()?;

    let title = match args.title {
        Some(title) => title,
        None => document_title(&app, &links)?,
    };
    let content = VideoCheck::new(links, &title, today)?.render();
    show(&content);

    report(app.create_draft(content)?);
    Ok(())
}

/// Title from Drive, or typed in when the lookup does not resolve
fn document_title(app: &App, links: &VideoLinks) -> Result<String> {
    let outcome = match links.document_id() {
        Some(id) => app.resolve_title(id)?,
        None => TitleLookupOutcome::NotFound,
    };

    match outcome {
        TitleLookupOutcome::Resolved(title) => {
            println!("Document title: {}", title);
            Ok(title)
        }
        outcome => {
            warn!("Title lookup did not resolve: {:?}", outcome);
            println!("{}", outcome.explanation());
            prompt("Document title")
        }
    }
}

fn shooting_plan(args: ShootingPlanArgs, open_browser: bool) -> Result<()> {
    let scheduled_at = args.date.and_time(args.time);
    let plan = match &args.projects_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            ShootingPlan::from_lines(scheduled_at, &text)?
        }
        None => ShootingPlan::new(scheduled_at, &args.projects)?,
    };

    let content = plan.render(args.signature.as_deref());
    show(&content);
    if args.preview {
        return Ok(());
    }

    let app = App::new(open_browser)?;
    app.sign_in()?;
    report(app.create_draft(content)?);
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim();
    if value.is_empty() {
        bail!("{} is required", label);
    }
    Ok(value.to_string())
}

fn show(content: &EmailContent) {
    println!("\n=== Draft preview ===");
    println!("Subject: {}", content.subject);
    println!();
    println!("{}", content.body);
    println!("=====================\n");
}

fn report(result: DraftResult) {
    println!("Gmail draft created. Add any supplementary notes before sending.");
    println!("Open in Gmail: {}", result.url());
}
