use anyhow::Result;
use clap::Parser;
use mindreader_core::thoughts::{build_thoughts, write_thoughts, ThoughtOptions};
use std::path::PathBuf;

/// Build the per-emotion caption bank from a labeled CSV dataset.
#[derive(Parser)]
#[command(name = "build-thoughts")]
struct Args {
    /// CSV of (text, label) rows, with or without a header
    #[arg(long, default_value = "backend/train.csv")]
    input: PathBuf,
    /// Where to write the thoughts JSON
    #[arg(long, default_value = "frontend/public/thoughts.json")]
    output: PathBuf,
    /// Maximum captions kept per emotion
    #[arg(long = "maxPerLabel", alias = "max-per-label", default_value_t = 60)]
    max_per_label: usize,
    /// Longest accepted caption, in characters
    #[arg(long = "maxLength", alias = "max-length", default_value_t = 140)]
    max_length: usize,
    /// Shuffle seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let options = ThoughtOptions {
        max_per_label: args.max_per_label,
        max_length: args.max_length,
        seed: args.seed,
    };

    let bank = build_thoughts(&args.input, &options)?;
    write_thoughts(&bank, &args.output)?;
    println!("Wrote {}", args.output.display());
    Ok(())
}
