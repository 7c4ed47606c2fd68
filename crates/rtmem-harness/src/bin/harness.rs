//! CLI entrypoint for the rtmem harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rtmem_core::{Context, FormatArg, GrowPolicy, HeapBackend};
use rtmem_harness::grow_trace::{live_trace, plan_trace};
use rtmem_harness::{FixtureSet, RunSummary, TestRunner, VerifyReport};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Verification tooling for rtmem.
#[derive(Debug, Parser)]
#[command(name = "harness")]
#[command(about = "Render, verify and trace the rtmem memory substrate")]
struct Cli {
    /// Log at debug level and turn on memory call-site tracing.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render a format string and print the result.
    Render {
        /// Format string.
        #[arg(long)]
        format: String,
        /// Argument as KIND:VALUE (int, uint, ptr, char, wchar, str, wstr, null, wnull).
        #[arg(long = "arg")]
        args: Vec<String>,
    },
    /// Verify against fixture files.
    Verify {
        /// Fixture JSON file, or a directory of them.
        #[arg(long)]
        fixture: PathBuf,
        /// Output report path (markdown); a JSON twin is written next to it.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Optional fixed timestamp string for deterministic report generation.
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// Print the capacity trace for a sequence of growth targets as JSON.
    GrowTrace {
        /// Element size in bytes.
        #[arg(long)]
        element_size: usize,
        /// Target length in elements; repeat for a sequence.
        #[arg(long = "target", required = true)]
        targets: Vec<usize>,
        /// Trace a text buffer (opaque allocation path).
        #[arg(long)]
        text: bool,
        #[arg(long, default_value_t = GrowPolicy::INITIAL_BYTES)]
        initial_bytes: usize,
        #[arg(long, default_value_t = GrowPolicy::MAXIMUM_BYTES)]
        maximum_bytes: usize,
        /// Run the targets through a real buffer instead of the planner.
        #[arg(long)]
        live: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init();
    if verbose {
        rtmem_core::trace::set_enabled(true);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Render { format, args } => {
            let values = rtmem_harness::args::parse_args(&args)?;
            let args: Vec<FormatArg<'_>> = values.iter().map(|v| v.as_format_arg()).collect();
            let heap = Arc::new(HeapBackend::new());
            let ctx = Context::new(Arc::new(heap.install()))?;
            let rendered = rtmem_core::fatal::run(|| rtmem_core::render_format(&ctx, &format, &args));
            println!("{rendered}");
        }
        Command::Verify {
            fixture,
            report,
            timestamp,
        } => {
            eprintln!("Verifying against fixtures in {}", fixture.display());
            let mut fixture_sets = Vec::new();
            for path in rtmem_harness::fixtures::fixture_paths(&fixture)? {
                match FixtureSet::from_file(&path) {
                    Ok(set) => fixture_sets.push(set),
                    Err(err) => eprintln!("Skipping {}: {}", path.display(), err),
                }
            }
            if fixture_sets.is_empty() {
                return Err(format!("No fixture JSON files found in {}", fixture.display()).into());
            }

            let runner = TestRunner::new("fixture-verify");
            let mut results = Vec::new();
            for set in &fixture_sets {
                results.extend(runner.run(set));
            }
            let report_doc = VerifyReport {
                title: String::from("rtmem Verification Report"),
                timestamp: timestamp
                    .unwrap_or_else(|| format!("{:?}", std::time::SystemTime::now())),
                summary: RunSummary::collect(results),
            };

            for failed in report_doc.summary.failures() {
                eprintln!("FAIL {}", failed.label());
                if let Some(diff) = &failed.diff {
                    eprintln!("{diff}");
                }
            }
            for (function, tally) in &report_doc.summary.by_function {
                eprintln!("{function}: passed={}, failed={}", tally.passed, tally.failed);
            }
            let overall = report_doc.summary.overall;
            eprintln!(
                "Verification complete: total={}, passed={}, failed={}",
                overall.total(),
                overall.passed,
                overall.failed
            );

            if let Some(report_path) = report {
                eprintln!("Writing report to {}", report_path.display());
                std::fs::write(&report_path, report_doc.to_markdown())?;
                let json_path = report_path.with_extension("json");
                std::fs::write(&json_path, report_doc.to_json()?)?;
            }

            if !report_doc.summary.clean() {
                return Err("Fixture verification failed".into());
            }
        }
        Command::GrowTrace {
            element_size,
            targets,
            text,
            initial_bytes,
            maximum_bytes,
            live,
        } => {
            let policy = GrowPolicy {
                initial_bytes,
                maximum_bytes,
            };
            let trace = if live {
                live_trace(&policy, element_size, &targets, text)?
            } else {
                plan_trace(&policy, element_size, &targets, text)?
            };
            println!("{}", trace.to_json());
        }
    }
    Ok(())
}
