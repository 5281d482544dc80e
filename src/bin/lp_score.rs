use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use plate_track::score::{self, Evaluation, ScoringRecord};
use plate_track::text;
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Scores recognized plate strings against ground truth.
///
/// Every input line is `ground_truth<TAB>candidate<TAB>candidate...`.
/// Candidates are canonicalized and the best one is kept per line.
#[derive(Parser, Debug)]
#[command(name = "lp_score")]
struct Args {
    /// Tab separated input file
    input: PathBuf,

    /// Also print the record of every scored line
    #[arg(long)]
    records: bool,

    /// Score lines without candidates as an empty reading instead of skipping them
    #[arg(long)]
    count_missing: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let content = fs::read_to_string(&args.input)
        .with_context(|| format!("cannot read {}", args.input.display()))?;

    let mut eval = Evaluation::new();
    let mut skipped = 0usize;

    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split('\t');
        let gt = score::canonical_ground_truth(fields.next().unwrap_or_default());
        if gt.is_empty() {
            warn!(line = lineno + 1, "empty ground truth, line skipped");
            skipped += 1;
            continue;
        }

        let mut candidates: Vec<String> = fields.map(text::canonicalize).collect();
        if candidates.is_empty() && args.count_missing {
            candidates.push(String::new());
        }

        match ScoringRecord::best_of(&gt, &candidates)
            .with_context(|| format!("line {}", lineno + 1))?
        {
            Some(record) => {
                debug!(line = lineno + 1, cer = record.character_error_rate, "scored");
                eval.push(record);
            }
            None => skipped += 1,
        }
    }

    if eval.is_empty() {
        warn!("no line could be scored");
    }
    info!(scored = eval.len(), skipped, "scoring done");

    let output = if args.records {
        json!({
            "summary": eval.summary(),
            "skipped": skipped,
            "records": eval.records(),
        })
    } else {
        json!({
            "summary": eval.summary(),
            "skipped": skipped,
        })
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
