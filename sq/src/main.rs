use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::info;

use stagequeue::cli::{Cli, Command, OutputFormat};
use stagequeue::config::Config;
use stagequeue::harness::{self, ReplayOptions, ReplayReport};

fn setup_logging(verbose: bool) -> Result<()> {
    // Logs go to stderr so replay output stays pipeable
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose).context("Failed to setup logging")?;

    match cli.command {
        Command::Replay {
            stage,
            iterations,
            partitions,
            len,
            depth,
            seed,
            tensors,
            format,
        } => {
            let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
            let opts = ReplayOptions {
                stage,
                iterations,
                partitions,
                len,
                depth,
                seed,
                tensors,
            };
            let report = harness::run(&config, &opts).context("Replay failed")?;
            match format {
                OutputFormat::Text => print_report(&report),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }
        Command::Check { path } => {
            let config = Config::load_from_file(&path).context(format!("Invalid config {}", path.display()))?;
            println!(
                "{} {} is valid (strategy: {})",
                "✓".green(),
                path.display(),
                config.queue.strategy.to_string().cyan()
            );
        }
    }

    Ok(())
}

fn print_report(report: &ReplayReport) {
    let mut iteration = None;
    for emission in &report.emissions {
        if iteration != Some(emission.iteration) {
            iteration = Some(emission.iteration);
            println!("{}", format!("iteration {}", emission.iteration).bold());
        }
        println!(
            "  {:>4} {} priority={} key={}",
            emission.seq.to_string().dimmed(),
            emission.name.yellow(),
            emission.priority,
            emission.key
        );
    }

    let stats = &report.state.stats;
    println!(
        "{} stage={} dispatched={} barrier_blocks={} window_rolls={} iterations={}",
        "stats".cyan(),
        report.state.stage,
        stats.total_dispatched,
        stats.barrier_blocks,
        stats.window_rolls,
        stats.iterations
    );
}
