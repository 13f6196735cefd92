// svgbatch-cli/src/main.rs

mod report;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use svgbatch_common::common_config::CONFIG;
use svgbatch_common::{plan_jobs, sort_results, SortCriterion};
use svgbatch_coordinator::{CommandInvoker, Coordinator, CoordinatorEvent};

use crate::report::{print_job_line, print_json, print_results, print_stats, Outcome};

#[derive(Parser)]
#[command(name = "svgbatch")]
#[command(about = "svgbatch: run an SVG cleaner over a directory tree in parallel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean every SVG under a directory into a mirrored output tree
    Clean {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Cleaner program, invoked as `PROG [ARGS...] <input> <output>`
        #[arg(short, long)]
        cleaner: PathBuf,

        /// Worker threads (defaults to the logical CPU count)
        #[arg(short, long)]
        threads: Option<usize>,

        #[arg(short, long, default_value_t = SortCriterion::Name)]
        sort: SortCriterion,

        #[arg(long)]
        json: bool,

        /// Extra arguments passed to the cleaner before the file paths
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// List the jobs a clean run would dispatch
    Plan {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show the detected worker configuration
    Config,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Clean {
            input,
            output,
            cleaner,
            threads,
            sort,
            json,
            args,
        } => {
            clean(input, output, CommandInvoker::new(cleaner, args), threads, sort, json)?;
        }

        Commands::Plan { input, output } => {
            let jobs = plan_jobs(&input, &output)?;
            for job in &jobs {
                println!("{} -> {}", job.input.display(), job.output.display());
            }
            println!("\n📁 Antal jobb: {}", jobs.len());
        }

        Commands::Config => {
            println!("🧵 Ideal antal trådar:   {}", CONFIG.ideal_worker_count);
            println!("🔝 Max antal trådar:     {}", CONFIG.max_worker_count);
            match CONFIG.physical_cores {
                Some(n) => println!("🖥️  Fysiska kärnor:      {}", n),
                None => println!("🖥️  Fysiska kärnor:      okänt"),
            }
        }
    }

    Ok(())
}

fn clean(
    input: PathBuf,
    output: PathBuf,
    invoker: CommandInvoker,
    threads: Option<usize>,
    sort: SortCriterion,
    json: bool,
) -> Result<()> {
    let jobs = plan_jobs(&input, &output)
        .with_context(|| format!("could not plan jobs for {:?}", input))?;
    if jobs.is_empty() {
        println!("Inga SVG-filer hittades under {}", input.display());
        return Ok(());
    }
    let total = jobs.len();
    let workers = CONFIG.worker_count_or_ideal(threads);
    info!(
        "[cli] cleaning {} files with {:?} on {} workers",
        total,
        invoker.program(),
        workers
    );

    let coordinator = Arc::new(Coordinator::new(Arc::new(invoker))?);
    let events = coordinator.subscribe();
    coordinator.start_batch(jobs, workers)?;
    spawn_control(Arc::downgrade(&coordinator)).context("could not start stdin control")?;

    let mut results = Vec::with_capacity(total);
    let mut failure = None;
    let outcome = loop {
        let Ok(event) = events.recv() else {
            bail!("coordinator went away mid-batch");
        };
        match event {
            CoordinatorEvent::JobCompleted(record) => {
                if !json {
                    print_job_line(&record, results.len() + 1, total);
                }
                results.push(record);
            }
            CoordinatorEvent::BatchFinished => break Outcome::Finished,
            CoordinatorEvent::BatchFailed(message) => {
                // in-flight jobs still drain, BatchStopped follows
                failure = Some(message);
            }
            CoordinatorEvent::BatchStopped => match failure.take() {
                Some(message) => break Outcome::Failed(message),
                None => break Outcome::Stopped,
            },
        }
    };

    let stats = coordinator.snapshot();
    let progress = coordinator.progress();
    sort_results(&mut results, sort);

    if json {
        print_json(&outcome, &stats, &progress, &results, sort)?;
    } else {
        print_stats(&outcome, &stats, &progress);
        print_results(&results, sort);
    }

    if let Outcome::Failed(message) = outcome {
        bail!("batch failed: {}", message);
    }
    Ok(())
}

/// Reads `pause`, `resume` and `stop` lines from stdin for the lifetime of the batch.
fn spawn_control(coordinator: Weak<Coordinator>) -> io::Result<()> {
    thread::Builder::new()
        .name("svgbatch-control".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let Some(live) = coordinator.upgrade() else {
                    break;
                };
                let command = line.trim();
                let result = match command {
                    "pause" => live.pause(),
                    "resume" => live.resume(),
                    "stop" => live.stop(),
                    "" => continue,
                    other => {
                        warn!("[control] unknown command '{}'", other);
                        continue;
                    }
                };
                match result {
                    Ok(()) => eprintln!("⏯️  {}", command),
                    Err(e) => eprintln!("⚠️  {}", e),
                }
            }
        })?;
    Ok(())
}
