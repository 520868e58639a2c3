//! tzshift CLI - timezone conversion for Excel timestamp columns
//!
//! A command-line tool for converting a timestamp column between IANA
//! timezones inside an xlsx workbook, and for one-off value
//! conversions.

use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use tzshift::{ConversionOutcome, ConversionRequest};

/// Convert timestamp columns in Excel workbooks between timezones
#[derive(Parser)]
#[command(
    name = "tzshift",
    author = "iyulab",
    version,
    about = "Convert Excel timestamp columns between timezones",
    long_about = "tzshift - timezone conversion for Excel workbooks.\n\n\
                  Locates a named column across all worksheets, parses each cell\n\
                  as a date-time, and rewrites it from the source timezone into\n\
                  the target timezone. Unparseable cells are skipped and counted."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a workbook's timestamp column
    Convert {
        /// Input workbook path
        input: PathBuf,

        /// Output workbook path (default: <input>-converted.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Header name of the column to convert
        #[arg(short, long)]
        column: String,

        /// Source IANA timezone id (e.g. UTC)
        #[arg(long)]
        from: String,

        /// Target IANA timezone id (e.g. Europe/London)
        #[arg(long)]
        to: String,

        /// Maximum input size in bytes
        #[arg(long, default_value_t = tzshift::DEFAULT_MAX_FILE_SIZE)]
        max_size: usize,
    },

    /// Inspect a workbook's columns, sheets, and row counts
    Analyze {
        /// Input workbook path
        input: PathBuf,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert a single date-time value
    Value {
        /// The date-time to convert (e.g. "2024-01-15 12:00:00")
        datetime: String,

        /// Source IANA timezone id
        #[arg(long)]
        from: String,

        /// Target IANA timezone id
        #[arg(long)]
        to: String,
    },

    /// List known IANA timezone ids
    Zones {
        /// Case-insensitive substring filter
        filter: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Convert {
            input,
            output,
            column,
            from,
            to,
            max_size,
        } => {
            let bytes = fs::read(&input)?;
            let request = ConversionRequest::new(bytes, &column, &from, &to)
                .with_max_file_size(max_size);

            let pb = create_progress_bar();
            let outcome = tzshift::convert_file(
                request,
                Some(&|progress| {
                    pb.set_position(progress.percent.round() as u64);
                    pb.set_message(progress.label.clone());
                }),
            )?;
            pb.finish_and_clear();

            match outcome {
                ConversionOutcome::Completed { bytes, statistics } => {
                    let output = output.unwrap_or_else(|| default_output_path(&input));
                    fs::write(&output, bytes)?;

                    println!(
                        "{} Converted {} -> {}",
                        "✓".green().bold(),
                        statistics.source_zone,
                        statistics.target_zone
                    );
                    println!("{}", "─".repeat(40));
                    println!("{}: {}", "Output".bold(), output.display());
                    println!("{}: {}", "Rows".bold(), statistics.rows_processed);
                    println!(
                        "{}: {}",
                        "Converted".bold(),
                        statistics.successful_conversions
                    );
                    println!("{}: {}", "Errors".bold(), statistics.error_count);
                    println!("{}: {} ms", "Elapsed".bold(), statistics.elapsed_ms);

                    if !statistics.warnings.is_empty() {
                        println!("\n{}", "Warnings".yellow().bold());
                        for warning in &statistics.warnings {
                            println!("  {warning}");
                        }
                    }
                }
                ConversionOutcome::Cancelled => {
                    println!("{} Conversion cancelled", "!".yellow().bold());
                }
            }
        }

        Commands::Analyze { input, json } => {
            let bytes = fs::read(&input)?;
            let report = tzshift::analyze(&bytes)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if !report.is_valid {
                println!("{} Not a valid workbook", "✗".red().bold());
            } else {
                println!("{}", "Workbook".cyan().bold());
                println!("{}", "─".repeat(40));
                println!("{}: {}", "Worksheets".bold(), report.worksheet_count);
                println!("{}: {}", "Data rows".bold(), report.row_count);
                println!("{}: {}", "Columns".bold(), report.columns.join(", "));
            }
        }

        Commands::Value { datetime, from, to } => {
            let parsed = tzshift::parse_datetime(&datetime)
                .ok_or_else(|| format!("could not parse \"{datetime}\" as a date-time"))?;
            let converted = tzshift::convert_value(parsed, &from, &to)?;
            println!(
                "{} {} -> {} {}",
                parsed.format("%Y-%m-%d %H:%M:%S"),
                from.bold(),
                converted.format("%Y-%m-%d %H:%M:%S"),
                to.bold()
            );
        }

        Commands::Zones { filter } => {
            let needle = filter.map(|f| f.to_lowercase());
            for zone in tzshift::list_timezones() {
                let matched = needle
                    .as_deref()
                    .map(|n| zone.to_lowercase().contains(n))
                    .unwrap_or(true);
                if matched {
                    println!("{zone}");
                }
            }
        }
    }

    Ok(())
}

fn default_output_path(input: &PathBuf) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook".to_string());
    input.with_file_name(format!("{stem}-converted.xlsx"))
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}
