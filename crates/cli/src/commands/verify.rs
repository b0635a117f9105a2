//! `tarsum verify`

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tarsum::{digest_reader, ParsedDigest, TarSumOptions};

use crate::commands::input;
use crate::output::{print_error, print_item, print_success, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct VerifyArgs {
    /// Archive to check (.tar or .tar.gz), or `-` for stdin
    pub path: PathBuf,

    /// Expected checksum, e.g. tarsum.v1+sha256:<hex>
    pub expected: String,

    /// Treat PATH as a directory and archive it first
    #[arg(long)]
    pub dir: bool,

    /// Extra data the expected checksum was salted with
    #[arg(long)]
    pub salt: Option<String>,
}

/// Result of `tarsum verify`
#[derive(Debug, Serialize)]
pub struct VerifyReport {
    pub path: String,
    pub expected: ParsedDigest,
    pub actual: String,
    pub matched: bool,
}

impl TableDisplay for VerifyReport {
    fn headers() -> Vec<&'static str> {
        vec!["Path", "Expected", "Actual", "Match"]
    }

    fn row(&self) -> Vec<String> {
        let status = if self.matched {
            "yes".green().to_string()
        } else {
            "NO".red().bold().to_string()
        };
        vec![
            self.path.clone(),
            self.expected.to_string(),
            self.actual.clone(),
            status,
        ]
    }
}

pub fn execute(args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let expected: ParsedDigest = match args.expected.parse() {
        Ok(digest) => digest,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(2);
        }
    };

    // Recompute with the version and algorithm the expected checksum names
    let options = TarSumOptions {
        version: expected.version(),
        hash: expected.algorithm(),
        compress: false,
    };
    let source = input::open(&args.path, args.dir)?;
    let actual = digest_reader(source, &options, args.salt.as_deref().map(str::as_bytes))?;

    let report = VerifyReport {
        path: args.path.display().to_string(),
        matched: expected.matches(&actual),
        expected,
        actual,
    };

    match format {
        OutputFormat::Plain => {
            if report.matched {
                print_success(&format!("{}: {}", report.path, report.actual));
            } else {
                print_error(&format!(
                    "{}: expected {}, got {}",
                    report.path, report.expected, report.actual
                ));
            }
        }
        _ => print_item(&report, format),
    }

    if !report.matched {
        std::process::exit(1);
    }

    Ok(())
}
