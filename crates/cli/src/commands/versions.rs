//! `tarsum versions`

use serde::Serialize;
use tarsum::{StandardHash, TarSumOptions, Version};

use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Debug, Serialize)]
pub struct VersionInfo {
    pub label: &'static str,
    pub kind: &'static str,
    pub default: bool,
    pub notes: &'static str,
}

impl TableDisplay for VersionInfo {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Kind", "Default", "Notes"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.label.to_string(),
            self.kind.to_string(),
            if self.default { "*".to_string() } else { String::new() },
            self.notes.to_string(),
        ]
    }
}

fn notes(version: Version) -> &'static str {
    match version {
        Version::V0 => "header fields including mtime",
        Version::V1 => "header fields without mtime, plus xattrs",
        Version::Dev => "same fields as tarsum.v1; unstable",
    }
}

pub fn catalog() -> Vec<VersionInfo> {
    let defaults = TarSumOptions::default();
    let versions = Version::ALL.into_iter().map(|v| VersionInfo {
        label: v.label(),
        kind: "version",
        default: v == defaults.version,
        notes: notes(v),
    });
    let hashes = StandardHash::ALL.into_iter().map(|h| VersionInfo {
        label: h.as_str(),
        kind: "hash",
        default: h == defaults.hash,
        notes: "",
    });
    versions.chain(hashes).collect()
}

pub fn execute(format: OutputFormat) {
    print_list(&catalog(), format);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lists_everything_once() {
        let catalog = catalog();
        assert_eq!(catalog.len(), Version::ALL.len() + StandardHash::ALL.len());
        let defaults: Vec<_> = catalog.iter().filter(|i| i.default).map(|i| i.label).collect();
        assert_eq!(defaults, vec!["tarsum.v1", "sha256"]);
    }
}
