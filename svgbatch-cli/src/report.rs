use anyhow::Result;
use serde::Serialize;

use svgbatch_common::{prepare_percent, prepare_size, prepare_time, SortCriterion};
use svgbatch_coordinator::{AggregateStats, BatchProgress, ResultRecord};

pub enum Outcome {
    Finished,
    Stopped,
    Failed(String),
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::Finished => "finished",
            Outcome::Stopped => "stopped",
            Outcome::Failed(_) => "failed",
        }
    }
}

pub fn print_job_line(record: &ResultRecord, done: usize, total: usize) {
    if record.crashed {
        println!("[{}/{}] 💥 {}", done, total, record.input.display());
        return;
    }
    println!(
        "[{}/{}] {} {} -> {} ({:.2}%, {})",
        done,
        total,
        record.output.display(),
        prepare_size(record.input_bytes),
        prepare_size(record.output_bytes),
        record.compress_ratio,
        prepare_time(record.elapsed_ms)
    );
}

pub fn print_stats(outcome: &Outcome, stats: &AggregateStats, progress: &BatchProgress) {
    match outcome {
        Outcome::Finished => println!("\n✅ Rensning klar:"),
        Outcome::Stopped => println!("\n⏹️  Rensning stoppad:"),
        Outcome::Failed(message) => println!("\n❌ Rensning misslyckades: {}", message),
    }
    println!("📁 Bearbetade filer:       {}/{}", stats.processed(), progress.total);
    println!("🧹 Rensade filer:          {}", stats.completed_count);
    println!("💥 Kraschade filer:        {}", stats.crashed_count);
    println!("📥 Storlek före:           {}", prepare_size(stats.input_bytes_total));
    println!("📤 Storlek efter:          {}", prepare_size(stats.output_bytes_total));
    println!("📊 Snittkomprimering:      {}", prepare_percent(stats.average_compression()));
    println!("📉 Bästa minskning:        {}", prepare_percent(stats.best_reduction()));
    println!("📈 Sämsta minskning:       {}", prepare_percent(stats.worst_reduction()));
    println!(
        "⏱️  Total tid:              {}",
        prepare_time(progress.elapsed.as_millis() as u64)
    );
    println!("⏱️  Summerad jobbtid:       {}", prepare_time(stats.time_total));
    println!(
        "⏱️  Min / max / snitt:      {} / {} / {}",
        optional_time(stats.time_min),
        optional_time(stats.time_max),
        optional_time(stats.average_time_ms())
    );
}

pub fn print_results(results: &[ResultRecord], sort: SortCriterion) {
    if results.is_empty() {
        return;
    }
    println!("\n📃 Resultat (sorterat på {}):", sort);
    for record in results {
        if record.crashed {
            println!("{:>8}  {:>11}  {:>11}  {}", "💥", "-", "-", record.input.display());
            continue;
        }
        println!(
            "{:>7.2}%  {:>11}  {:>11}  {}",
            record.compress_ratio,
            prepare_size(record.output_bytes),
            prepare_time(record.elapsed_ms),
            record.output.display()
        );
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    outcome: &'static str,
    failure: Option<&'a str>,
    sort: SortCriterion,
    total: usize,
    elapsed_ms: u64,
    stats: &'a AggregateStats,
    results: &'a [ResultRecord],
}

pub fn print_json(
    outcome: &Outcome,
    stats: &AggregateStats,
    progress: &BatchProgress,
    results: &[ResultRecord],
    sort: SortCriterion,
) -> Result<()> {
    println!("{}", json_report(outcome, stats, progress, results, sort)?);
    Ok(())
}

fn json_report(
    outcome: &Outcome,
    stats: &AggregateStats,
    progress: &BatchProgress,
    results: &[ResultRecord],
    sort: SortCriterion,
) -> Result<String> {
    let report = JsonReport {
        outcome: outcome.as_str(),
        failure: match outcome {
            Outcome::Failed(message) => Some(message.as_str()),
            _ => None,
        },
        sort,
        total: progress.total,
        elapsed_ms: progress.elapsed.as_millis() as u64,
        stats,
        results,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn optional_time(ms: Option<u64>) -> String {
    ms.map_or_else(|| "-".to_string(), prepare_time)
}
