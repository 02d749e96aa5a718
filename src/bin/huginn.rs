//! huginn: interactive story demo.
//!
//! Plays a choose-your-own-adventure against an OpenAI-compatible endpoint,
//! prefetching every offered choice while the reader decides, and prints
//! the cache report on exit.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use huginn::{Config, Huginn, StyleParams};

/// Interactive story demo for the huginn continuation cache.
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version)]
#[command(about = "Choose-your-own-adventure with speculative prefetching")]
struct Args {
    /// Path to configuration file (default: ~/.huginn/config.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Story genre.
    #[arg(long, default_value = "Fantasy")]
    genre: String,

    /// Author whose style to imitate.
    #[arg(long, default_value = "Roald Dahl")]
    author: String,

    /// Target reading level.
    #[arg(long, default_value = "Early Reader")]
    level: String,

    /// Story idea for the opening segment.
    #[arg(long, default_value = "Begin the story")]
    idea: String,

    /// Model override.
    #[arg(short, long, env = "HUGINN_MODEL")]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    // A missing default config file is fine; an explicit one must exist.
    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) if args.config.is_some() => return Err(e.into()),
        Err(_) => Config::default(),
    };
    if let Some(model) = args.model {
        config.provider.model = model;
    }

    let session = Huginn::builder().from_config(&config).build()?;
    let style = StyleParams::new(args.genre, args.author, args.level);
    info!(model = %config.provider.model, "starting story");

    let mut history: Vec<String> = Vec::new();
    let mut choice = args.idea;
    let stdin = io::stdin();

    loop {
        let step = session.continue_story(&history, &choice, &style).await?;
        println!("\n{}\n", step.text);
        history.push(step.text);

        if step.next_choices.is_empty() {
            println!("The end.");
            break;
        }
        let summary = session.prefetch(&history, &step.next_choices, &style);
        info!(
            launched = summary.launched,
            skipped = summary.skipped,
            "prefetching"
        );

        for (i, option) in step.next_choices.iter().enumerate() {
            println!("  {}) {option}", i + 1);
        }
        print!("\nChoose 1-{} (q to quit): ", step.next_choices.len());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            break;
        }
        choice = match line.parse::<usize>() {
            Ok(n) if (1..=step.next_choices.len()).contains(&n) => step.next_choices[n - 1].clone(),
            // Anything else is taken as a free-text choice.
            _ if !line.is_empty() => line.to_string(),
            _ => step.next_choices[0].clone(),
        };
    }

    session.shutdown();
    println!("\n{}", session.snapshot());
    Ok(())
}
