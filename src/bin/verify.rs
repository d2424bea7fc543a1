//! rules-vm-verify - Replay a completed document against a base document.
//!
//! # Usage
//!
//! ```bash
//! rules-vm-verify --base base.json completed.json
//! ```

use clap::Parser;
use colored::Colorize;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use rules_vm::{verify, Document, VerifyOptions};

/// Replay a completed document against its base to check for tampering.
#[derive(Parser, Debug)]
#[command(name = "rules-vm-verify")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Completed document path, or `-` to read from stdin.
    path: PathBuf,

    /// Base document path the completed document was derived from.
    #[arg(long)]
    base: PathBuf,

    /// Maximum fixed-point iterations before reporting convergence_failed.
    #[arg(long, default_value = "100")]
    max_iterations: usize,

    /// Print the full issue list as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let completed_source = match read_input(&args.path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    let base_source = match std::fs::read_to_string(&args.base) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{} failed to read {}: {e}", "error:".red().bold(), args.base.display());
            return ExitCode::FAILURE;
        }
    };

    let completed = match Document::parse(&completed_source) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{} could not parse completed document: {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    let base = match Document::parse(&base_source) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{} could not parse base document: {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let options = VerifyOptions {
        max_iterations: args.max_iterations,
    };
    let outcome = verify(&completed, &base, options);

    if args.json {
        let issues: Vec<_> = outcome
            .issues
            .iter()
            .map(|i| format!("{:?}: {}", i.code, i.message))
            .collect();
        println!(
            "{}",
            serde_json::json!({ "valid": outcome.valid, "issues": issues })
        );
    } else if outcome.valid {
        println!("{}", "valid".green().bold());
    } else {
        println!("{}", "invalid".red().bold());
        for issue in &outcome.issues {
            println!("  {} {}", format!("[{:?}]", issue.code).yellow(), issue.message);
        }
    }

    if outcome.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn read_input(path: &PathBuf) -> Result<String, String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("failed to read stdin: {e}"))?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))
    }
}
