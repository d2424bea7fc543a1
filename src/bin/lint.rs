//! rules-vm-lint - Statically analyze a document without executing it.
//!
//! # Usage
//!
//! ```bash
//! rules-vm-lint document.json
//! rules-vm-lint --strict document.json
//! ```

use clap::Parser;
use colored::Colorize;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use rules_vm::analyze::{analyze, AnalyzeOptions, Severity};
use rules_vm::Document;

/// Lint a rules-vm document for structural and referential problems.
#[derive(Parser, Debug)]
#[command(name = "rules-vm-lint")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Document path, or `-` to read from stdin.
    path: PathBuf,

    /// Treat warnings as errors for the exit code.
    #[arg(long)]
    strict: bool,

    /// Print machine-readable JSON instead of a human report.
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

    let outcome = analyze(&document, AnalyzeOptions::default());
    let has_warnings = outcome.issues.iter().any(|i| i.severity == Severity::Warning);

    if args.json {
        let issues: Vec<_> = outcome
            .issues
            .iter()
            .map(|i| {
                serde_json::json!({
                    "severity": if i.severity == Severity::Error { "error" } else { "warning" },
                    "code": format!("{:?}", i.code),
                    "field_id": i.field_id,
                    "rule_id": i.rule_id,
                    "message": i.message,
                })
            })
            .collect();
        println!("{}", serde_json::json!({ "valid": outcome.valid, "issues": issues }));
    } else {
        for issue in &outcome.issues {
            let tag = if issue.severity == Severity::Error {
                "error".red().bold()
            } else {
                "warning".yellow().bold()
            };
            println!("{tag} [{:?}] {}", issue.code, issue.message);
        }
        if outcome.issues.is_empty() {
            println!("{}", "no issues found".green());
        }
    }

    if !outcome.valid || (args.strict && has_warnings) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
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
