use anyhow::{Context, Result};
use clap::parser::ValueSource;
use clap::{CommandFactory, FromArgMatches, Parser};
use colored::*;
use herald_rs::gate::{EntryPointGate, Invocation};
use herald_rs::harness::{Harness, ScriptReport, SetupContext};
use herald_rs::record::OutputRecord;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Builds a category record, or inspects a script for define-only loading.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Category to build a record for (Hero or Champion).
    /// Without it the program is define-only and exits without output.
    #[arg(env = "HERALD_CATEGORY")]
    category: Option<String>,

    /// Output raw JSON.
    #[arg(long)]
    json: bool,

    /// Inspect a Python script instead of building a record.
    /// Cannot be combined with a category.
    #[arg(long, value_name = "SCRIPT", conflicts_with = "category")]
    inspect: Option<PathBuf>,

    /// Callable unit the inspected script must define. Repeatable.
    #[arg(long = "expect", value_name = "NAME", requires = "inspect")]
    expected: Vec<String>,

    /// Tolerate test scaffolding flags in the inspected script.
    #[arg(long, requires = "inspect")]
    test_mode: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

/// Installs the `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise only this crate logs, at `warn`
/// or at `debug` with `--verbose`. Output goes to stderr so stdout stays
/// clean for records and JSON.
fn init_logging(verbose: bool) {
    let default = if verbose { "herald_rs=debug" } else { "herald_rs=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// The category the caller actually supplied.
///
/// A blank `HERALD_CATEGORY` is an unset variable, not an argument, so it
/// leaves the gate on the define-only path. A blank command-line argument
/// is still passed on and rejected by the builder.
fn supplied_category(category: Option<String>, source: Option<ValueSource>) -> Option<String> {
    match source {
        Some(ValueSource::EnvVariable) => category.filter(|c| !c.trim().is_empty()),
        _ => category,
    }
}

/// Main entry point of the application.
///
/// This is the one place the entry-point gate is evaluated. Tests and other
/// crates link the library and call `herald_rs::build` directly instead.
fn main() -> Result<()> {
    // Parse through `ArgMatches` so we can tell where the category came from.
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    init_logging(cli.verbose);

    // Harness mode: load the script without running it and report.
    if let Some(script) = &cli.inspect {
        let context = SetupContext::new(script)
            .with_test_mode(cli.test_mode)
            .expect_units(cli.expected.iter().cloned());
        let harness = Harness::setup(context)
            .with_context(|| format!("Failed to set up harness for {}", script.display()))?;
        return print_harness(&harness, cli.json);
    }

    // Gate mode: build a record only when a category was supplied.
    let category = supplied_category(cli.category, matches.value_source("category"));
    let mut gate = EntryPointGate::new();
    let record = gate.evaluate(&Invocation::from_cli(category))?;

    if let Some(record) = record {
        if cli.json {
            println!("{}", record.to_json()?);
        } else {
            print_record(&record);
        }
    }

    Ok(())
}

/// Prints a record as an indented, colored summary.
fn print_record(record: &OutputRecord) {
    println!("{}", record.text.bold());
    println!(" * Timestamp: {}", record.timestamp);
    println!(" * Category:  {}", record.category);
    println!(" * Name:      {}", record.detail.name.green());
    println!(" * Power:     {}", record.detail.power);
    println!(" * Level:     {}", record.detail.level);
}

/// Prints the harness report, or the loaded units alone when analysis failed.
fn print_harness(harness: &Harness, json: bool) -> Result<()> {
    let Some(report) = &harness.report else {
        // Analysis failed and was logged; the load itself still succeeded.
        if json {
            println!("{}", serde_json::to_string_pretty(&harness.script.units)?);
        } else {
            println!(
                "Loaded {} callable units from {}",
                harness.script.units.len(),
                harness.script.path.display()
            );
        }
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_report(report);
    }
    Ok(())
}

/// Prints the structural report in the same list layout as records.
fn print_report(report: &ScriptReport) {
    println!("\n{}", format!("Script: {}", report.file.display()).bold());
    println!("===================================\n");

    println!(" - Callable Units");
    for (i, unit) in report.callable_units.iter().enumerate() {
        println!(" {}. {} ({:?})", i + 1, unit.name, unit.kind);
        println!("    └─ line {}", unit.line);
    }

    if report.has_main_guard {
        println!("\n - Main guard calls: {}", report.guarded_calls.join(", "));
    } else {
        println!("\n - No main guard");
    }

    if report.define_only_safe {
        println!("\n{}", "Define-only load is safe".green());
    } else {
        println!("\n{}", "Loading this script runs code:".red());
        for effect in &report.load_side_effects {
            println!("    └─ line {}: {}", effect.line, effect.description);
        }
    }
}
