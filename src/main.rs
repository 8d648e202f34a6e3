// src/main.rs

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use coderecall::config::TrainerConfig;
use coderecall::format::{
    format_challenge_count, format_duration, format_interval, format_percentage, truncate,
};
use coderecall::models::{
    ChallengeDocument, ChallengeFilter, DueQuery, IngestResult, Rating, ReviewSubmission,
};
use coderecall::{scheduler, Trainer, TrainerError};
use log::{debug, info};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "coderecall", about = "Spaced-repetition trainer for coding challenges", version)]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest challenge documents
    Add {
        files: Vec<PathBuf>,
        /// Report what would happen without writing
        #[arg(long)]
        verify: bool,
    },

    /// List current challenges
    List {
        /// Only challenges due now
        #[arg(long)]
        due: bool,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        pattern: Option<String>,
        /// Maximum results (with --due)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show one challenge with its progress
    Show {
        #[arg(required_unless_present = "path")]
        id: Option<String>,
        /// Look the challenge up by the file path it was ingested from
        #[arg(long, conflicts_with = "id")]
        path: Option<String>,
    },

    /// Record a review: again, hard, good, easy or 1-4
    Review {
        id: String,
        rating: String,
        #[arg(long)]
        response_time_ms: Option<i64>,
    },

    /// Review log of a challenge
    History { id: String },

    /// Summary statistics
    Stats,

    /// Write a full snapshot as JSON
    Export {
        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let data_dir = config.data_dir()?;
    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data dir {:?}", data_dir))?;
    }
    let db_path = config.db_path()?;
    debug!("Database path: {:?}", db_path);
    let trainer = Trainer::open(&db_path, config).context("failed to open database")?;
    let user_id = trainer.config().user_id.as_str();
    let json = matches!(cli.format, OutputFormat::Json);

    match cli.command {
        Command::Add { files, verify } => run_add(&trainer, &files, verify, json),
        Command::List {
            due,
            tag,
            pattern,
            limit,
        } => run_list(&trainer, user_id, due, tag, pattern, limit, json),
        Command::Show { id, path } => {
            run_show(&trainer, user_id, id.as_deref(), path.as_deref(), json)
        }
        Command::Review {
            id,
            rating,
            response_time_ms,
        } => run_review(&trainer, user_id, &id, &rating, response_time_ms, json),
        Command::History { id } => run_history(&trainer, user_id, &id, json),
        Command::Stats => run_stats(&trainer, user_id, json),
        Command::Export { output } => run_export(&trainer, output),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<TrainerConfig> {
    let path = match path {
        Some(p) => p.clone(),
        None => match TrainerConfig::default_config_path() {
            Some(p) => p,
            None => return Ok(TrainerConfig::default()),
        },
    };
    info!("Loading config from {:?}", path);
    TrainerConfig::load_or_default(&path)
        .with_context(|| format!("failed to load config {:?}", path))
}

fn run_add(trainer: &Trainer, files: &[PathBuf], verify: bool, json: bool) -> Result<()> {
    let now = Utc::now();
    let mut results = Vec::new();
    for file in files {
        let raw = fs::read_to_string(file).with_context(|| format!("failed to read {:?}", file))?;
        let doc = ChallengeDocument::new(file.to_string_lossy(), raw);
        let outcome = if verify {
            trainer.verify(&doc, now)
        } else {
            trainer.ingest(&doc, now)
        };
        let result = outcome.with_context(|| format!("failed to ingest {:?}", file))?;
        results.push((file.clone(), result));
    }

    if json {
        let output: Vec<_> = results
            .iter()
            .map(|(file, result)| serde_json::json!({ "file": file, "result": result }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let prefix = if verify { "[verify] " } else { "" };
    for (file, result) in &results {
        match result {
            IngestResult::Created { id, .. } => {
                println!("{}created  {}  {}", prefix, id, file.display())
            }
            IngestResult::Updated { id, version, .. } => {
                println!("{}updated  {}  {} (v{})", prefix, id, file.display(), version)
            }
            IngestResult::Duplicate { id } => {
                println!("{}duplicate {}  {}", prefix, id, file.display())
            }
        }
    }
    Ok(())
}

fn run_list(
    trainer: &Trainer,
    user_id: &str,
    due: bool,
    tag: Option<String>,
    pattern: Option<String>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let challenges = if due {
        let query = DueQuery {
            tag,
            pattern,
            limit,
            after: None,
        };
        trainer.list_due_page(user_id, Utc::now(), &query)?.challenges
    } else {
        trainer.list(&ChallengeFilter { tag, pattern })?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&challenges)?);
        return Ok(());
    }

    println!("{}", format_challenge_count(challenges.len()));
    for challenge in &challenges {
        let tags: Vec<_> = challenge.tags.iter().map(|t| format!("#{}", t)).collect();
        println!(
            "  {}  {:<40} {}",
            challenge.id,
            truncate(&challenge.title, 40),
            tags.join(" ")
        );
    }
    Ok(())
}

fn run_show(
    trainer: &Trainer,
    user_id: &str,
    id: Option<&str>,
    path: Option<&str>,
    json: bool,
) -> Result<()> {
    let challenge = match (id, path) {
        (_, Some(path)) => trainer.get_by_path(path)?,
        (Some(id), None) => trainer.get(id)?,
        (None, None) => anyhow::bail!("a challenge id or --path is required"),
    };
    let progress = match trainer.progress(&challenge.id, user_id) {
        Ok(progress) => Some(progress),
        Err(TrainerError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    if json {
        let output = serde_json::json!({ "challenge": challenge, "progress": progress });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{} (v{})", challenge.title, challenge.version);
    println!("  File: {}", challenge.file_path);
    if let Some(pattern) = &challenge.pattern {
        println!("  Pattern: {}", pattern);
    }
    if let Some(superseded_by) = &challenge.superseded_by {
        println!("  Superseded by: {}", superseded_by);
    }
    println!("  State: {:?}", scheduler::memory_state(progress.as_ref()));
    if let Some(p) = &progress {
        let now = Utc::now();
        let due = if p.is_due(now) {
            "now".to_string()
        } else {
            p.due_date.format("%Y-%m-%d").to_string()
        };
        println!("  Interval: {}  Due: {}", format_interval(p.interval_days), due);
        println!(
            "  Recall now: {}",
            format_percentage(scheduler::retrievability(p, now))
        );
        println!(
            "  Stability: {:.1}d  Difficulty: {:.1}  Ease: {:.2}",
            p.stability, p.difficulty, p.ease_factor
        );
    }
    Ok(())
}

fn run_review(
    trainer: &Trainer,
    user_id: &str,
    id: &str,
    rating: &str,
    response_time_ms: Option<i64>,
    json: bool,
) -> Result<()> {
    let rating: Rating = rating.parse()?;
    let mut submission = ReviewSubmission::new(id, user_id, rating.value())
        .with_review_id(uuid::Uuid::new_v4().to_string());
    if let Some(ms) = response_time_ms {
        submission = submission.with_response_time(ms);
    }
    let progress = trainer.review(&submission, Utc::now())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
        return Ok(());
    }
    println!(
        "Rated {}. Next review in {} ({})",
        rating,
        format_interval(progress.interval_days),
        progress.due_date.format("%Y-%m-%d")
    );
    Ok(())
}

fn run_history(trainer: &Trainer, user_id: &str, id: &str, json: bool) -> Result<()> {
    let records = trainer.history(id, user_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    for record in &records {
        let took = record
            .response_time_ms
            .map(format_duration)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}  {:<5}  {:>8}  after {}",
            record.review_date.format("%Y-%m-%d %H:%M"),
            record.rating,
            took,
            format_interval(record.previous_interval)
        );
    }
    Ok(())
}

fn run_stats(trainer: &Trainer, user_id: &str, json: bool) -> Result<()> {
    let stats = trainer.stats(user_id, Utc::now())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    println!("Challenges:      {}", stats.total_challenges);
    println!("Due today:       {}", stats.due_today);
    println!("Learning/Review: {}/{}", stats.learning_count, stats.review_count);
    println!("Total reviews:   {}", stats.total_reviews);
    println!("Average rating:  {:.2}", stats.average_rating);
    println!(
        "Streak:          {} days (longest {})",
        stats.current_streak, stats.longest_streak
    );
    Ok(())
}

fn run_export(trainer: &Trainer, output: Option<PathBuf>) -> Result<()> {
    let snapshot = trainer.snapshot(Utc::now())?;
    let body = serde_json::to_string_pretty(&snapshot)?;
    match output {
        Some(path) => {
            fs::write(&path, body).with_context(|| format!("failed to write {:?}", path))?;
            info!(
                "Exported {} challenges and {} reviews to {:?}",
                snapshot.challenges.len(),
                snapshot.reviews.len(),
                path
            );
        }
        None => println!("{}", body),
    }
    Ok(())
}
