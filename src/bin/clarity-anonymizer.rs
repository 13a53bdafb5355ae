// Command-line front end for the anonymization pipeline.
// Run with: cargo run --bin clarity-anonymizer -- --roster hr.csv --export export.zip --out anonymized.zip

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};

use clarity_anonymizer::{anonymize, export as assembler, ingest, PipelineConfig};

struct Args {
    roster: PathBuf,
    export: PathBuf,
    out: PathBuf,
    config: PipelineConfig,
    as_of: NaiveDate,
}

const USAGE: &str = "usage: clarity-anonymizer --roster <csv> --export <zip|dir> --out <zip|dir> \
[--k <n>] [--granularity <secs>] [--as-of <YYYY-MM-DD>]";

fn parse_args() -> Result<Args> {
    let mut roster = None;
    let mut export = None;
    let mut out = None;
    let mut config = PipelineConfig::default();
    let mut as_of = Utc::now().date_naive();

    let mut argv = std::env::args().skip(1);
    while let Some(flag) = argv.next() {
        let mut value = || argv.next().with_context(|| format!("{flag} needs a value"));
        match flag.as_str() {
            "--roster" => roster = Some(PathBuf::from(value()?)),
            "--export" => export = Some(PathBuf::from(value()?)),
            "--out" => out = Some(PathBuf::from(value()?)),
            "--k" => config.k_threshold = value()?.parse().context("--k must be an integer")?,
            "--granularity" => {
                config.rounding_granularity_secs =
                    value()?.parse().context("--granularity must be seconds")?;
            }
            "--as-of" => {
                as_of = NaiveDate::parse_from_str(&value()?, "%Y-%m-%d")
                    .context("--as-of must be YYYY-MM-DD")?;
            }
            "--help" | "-h" => bail!("{USAGE}"),
            other => bail!("unknown flag {other}\n{USAGE}"),
        }
    }

    Ok(Args {
        roster: roster.with_context(|| format!("--roster is required\n{USAGE}"))?,
        export: export.with_context(|| format!("--export is required\n{USAGE}"))?,
        out: out.with_context(|| format!("--out is required\n{USAGE}"))?,
        config,
        as_of,
    })
}

fn run() -> Result<()> {
    let args = parse_args()?;

    let roster_file = fs::File::open(&args.roster).context("could not open the roster file")?;
    let roster = ingest::parse_roster(roster_file)?;
    let workspace = ingest::load_workspace(&args.export)?;

    let (anonymized, report) = anonymize(&roster, &workspace, &args.config, args.as_of)?;

    let is_zip = args
        .out
        .extension()
        .map(|e| e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);
    if is_zip {
        assembler::write_zip(&anonymized, &args.out)?;
    } else {
        assembler::write_dir(&anonymized, &args.out)?;
    }

    println!(
        "done: {} users, {} conversations, {} messages ({} dropped, {} partitions skipped)",
        anonymized.users.len(),
        anonymized.conversations.len(),
        report.messages_emitted,
        report.messages_dropped,
        report.partitions_skipped
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
