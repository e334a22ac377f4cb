//! One-shot verification of a mirror against its source tree.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use verify::{Verifier, VerifyMethod};

/// Compares a source tree against its mirror and reports every divergence.
#[derive(Debug, Parser)]
#[command(name = "fsmirror-check", version, about)]
struct Args {
    /// Authoritative directory.
    source: PathBuf,

    /// Mirror directory.
    dest: PathBuf,

    /// Use SHA-256 instead of the MD5 default.
    #[arg(long)]
    strong: bool,

    /// Compare file contents byte by byte.
    #[arg(long, conflicts_with = "strong")]
    full: bool,

    /// Verification worker count.
    #[arg(long, default_value_t = 4)]
    threads: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let method = if args.full {
        VerifyMethod::FullCompare
    } else if args.strong {
        VerifyMethod::StrongHash
    } else {
        VerifyMethod::FastHash
    };

    let verifier = Verifier::new();
    let results =
        verifier.verify_directory(&args.source, &args.dest, method, args.threads > 1, args.threads);

    let total = results.len();
    let mut mismatches = 0usize;
    for (relative, outcome) in results {
        if outcome.matches {
            continue;
        }
        mismatches += 1;
        if relative.as_os_str().is_empty() {
            eprintln!("error: {}", outcome.error_message);
        } else {
            println!("{}: {}", relative.display(), outcome.error_message);
        }
    }

    println!("{total} files checked, {mismatches} mismatched");
    if mismatches == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
