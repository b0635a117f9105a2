//! `tarsum sum`

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tarsum::{EntrySum, StandardHash, TarSum, TarSumOptions, Version};
use tracing::warn;

use crate::commands::input;
use crate::config::CliConfig;
use crate::output::{print_item, print_list, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct SumArgs {
    /// Archive to checksum (.tar or .tar.gz), or `-` for stdin
    pub path: PathBuf,

    /// Treat PATH as a directory and archive it first
    #[arg(long)]
    pub dir: bool,

    /// Checksum version label (tarsum, tarsum.v1, tarsum.dev)
    #[arg(long = "version", value_name = "LABEL")]
    pub tarsum_version: Option<Version>,

    /// Hash algorithm
    #[arg(long)]
    pub hash: Option<StandardHash>,

    /// Write the normalized archive uncompressed
    #[arg(long)]
    pub no_compress: bool,

    /// Extra data hashed ahead of the entry digests
    #[arg(long)]
    pub salt: Option<String>,

    /// Write the normalized archive to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// List per-entry digests
    #[arg(long)]
    pub entries: bool,
}

impl SumArgs {
    /// Configured options with command-line overrides applied
    fn options(&self, config: &CliConfig) -> TarSumOptions {
        let mut options = config.tarsum;
        if let Some(version) = self.tarsum_version {
            options.version = version;
        }
        if let Some(hash) = self.hash {
            options.hash = hash;
        }
        if self.no_compress {
            options.compress = false;
        }
        options
    }
}

/// Result of `tarsum sum`
#[derive(Debug, Serialize)]
pub struct SumReport {
    pub path: String,
    pub checksum: String,
    pub entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl TableDisplay for SumReport {
    fn headers() -> Vec<&'static str> {
        vec!["Path", "Checksum", "Entries"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.path.clone(),
            self.checksum.clone(),
            self.entries.to_string(),
        ]
    }
}

impl TableDisplay for EntrySum {
    fn headers() -> Vec<&'static str> {
        vec!["#", "Name", "Digest"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.position.to_string(),
            self.name.clone(),
            self.digest.clone(),
        ]
    }
}

pub fn execute(args: SumArgs, config: &CliConfig, format: OutputFormat) -> anyhow::Result<()> {
    let options = args.options(config);
    tracing::debug!(
        "Summing {} with {} ({}, compress: {})",
        args.path.display(),
        options.version,
        options.hash,
        options.compress
    );

    let source = input::open(&args.path, args.dir)?;
    let mut tarsum = TarSum::with_options(source, &options);

    match &args.output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            io::copy(&mut tarsum, &mut writer)
                .map_err(tarsum::Error::from)
                .with_context(|| format!("reading {}", args.path.display()))?;
            writer.flush()?;
        }
        None => {
            io::copy(&mut tarsum, &mut io::sink())
                .map_err(tarsum::Error::from)
                .with_context(|| format!("reading {}", args.path.display()))?;
        }
    }

    for duplicate in tarsum.sums().duplicate_paths() {
        warn!("Path {} appears more than once in the archive", duplicate.name);
    }

    let entries: Vec<EntrySum> = tarsum.sums().iter().cloned().collect();
    let checksum = tarsum.sum(args.salt.as_deref().map(str::as_bytes))?;

    if args.entries {
        print_list(&entries, format);
    }

    let report = SumReport {
        path: args.path.display().to_string(),
        checksum,
        entries: entries.len(),
        output: args.output.as_ref().map(|p| p.display().to_string()),
    };
    match format {
        OutputFormat::Plain if !args.entries => println!("{}", report.checksum),
        _ => print_item(&report, format),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SumArgs {
        SumArgs {
            path: PathBuf::from("-"),
            dir: false,
            tarsum_version: None,
            hash: None,
            no_compress: false,
            salt: None,
            output: None,
            entries: false,
        }
    }

    #[test]
    fn test_options_default_to_config() {
        let mut config = CliConfig::default();
        config.tarsum.version = Version::V0;
        let options = args().options(&config);
        assert_eq!(options.version, Version::V0);
        assert!(options.compress);
    }

    #[test]
    fn test_flags_override_config() {
        let config = CliConfig::default();
        let args = SumArgs {
            tarsum_version: Some(Version::Dev),
            hash: Some(StandardHash::Sha512),
            no_compress: true,
            ..args()
        };
        let options = args.options(&config);
        assert_eq!(options.version, Version::Dev);
        assert_eq!(options.hash, StandardHash::Sha512);
        assert!(!options.compress);
    }
}
