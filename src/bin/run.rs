//! rules-vm-run - Evaluate a document against an effective instant.
//!
//! # Usage
//!
//! ```bash
//! rules-vm-run document.json
//! rules-vm-run --instant 2025-06-01 document.json
//! cat document.json | rules-vm-run -
//! ```

use clap::Parser;
use colored::Colorize;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use rules_vm::{evaluate, Document, Status};

/// Evaluate a rules-vm document.
#[derive(Parser, Debug)]
#[command(name = "rules-vm-run")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Document path, or `-` to read from stdin.
    path: PathBuf,

    /// Effective instant (RFC3339, date-time, or date-only); defaults to now.
    #[arg(long)]
    instant: Option<String>,

    /// Print the full result document instead of a summary.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let source = match read_input(&args.path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let document = match Document::parse(&source) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{} could not parse document: {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let instant = match resolve_instant(args.instant.as_deref()) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let result = evaluate(&document, instant);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result).unwrap());
    } else {
        print_summary(&result);
    }

    match result.status {
        Some(Status::Ready) => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

fn print_summary(result: &Document) {
    let status_label = match result.status {
        Some(Status::Ready) => "READY".green().bold(),
        Some(Status::Incomplete) => "INCOMPLETE".yellow().bold(),
        Some(Status::Invalid) => "INVALID".red().bold(),
        None => "UNKNOWN".normal(),
    };
    println!("{}", status_label);

    for error in &result.errors {
        let tag = format!("{:?}", error.kind).to_lowercase();
        println!("  {} {}", format!("[{tag}]").yellow(), error.message);
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

fn resolve_instant(raw: Option<&str>) -> Result<chrono::DateTime<chrono::Utc>, String> {
    match raw {
        None => Ok(chrono::Utc::now()),
        Some(s) => rules_vm::value::as_date(&serde_json::Value::String(s.to_string()))
            .ok_or_else(|| format!("could not parse instant '{s}'")),
    }
}
