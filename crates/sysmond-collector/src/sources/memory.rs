// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Memory usage read from `/proc/meminfo`.
//!
//! All values are reported in kB exactly as the kernel prints them.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::constants::ERROR_PREFIX;
use crate::source::{Reading, Source, Values};

pub const MEMORY_SOURCE_ID: &str = "sys.mem";
const PROC_MEMINFO_PATH: &str = "/proc/meminfo";

/// `/proc/meminfo` field to reported key.
const FIELDS: [(&str, &str); 7] = [
    ("MemTotal", "total"),
    ("MemFree", "free"),
    ("MemAvailable", "available"),
    ("Active", "active"),
    ("Inactive", "inactive"),
    ("SwapTotal", "swap.total"),
    ("SwapFree", "swap.free"),
];

#[derive(Debug, Clone)]
pub struct MemorySource {
    path: PathBuf,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::with_path(PROC_MEMINFO_PATH)
    }

    /// Reads from another file in `/proc/meminfo` format.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        MemorySource { path: path.into() }
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for MemorySource {
    fn id(&self) -> &str {
        MEMORY_SOURCE_ID
    }

    async fn retrieve(&self) -> Reading {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Reading::Values(parse_meminfo(&contents)),
            Err(e) => {
                debug!("Could not read {}: {e}", self.path.display());
                Reading::error_values(format!("cannot read memory information: {e}"))
            }
        }
    }
}

/// Extracts the reported fields; fields absent from `contents` are reported
/// as `"error: not found"`.
fn parse_meminfo(contents: &str) -> Values {
    let mut values: Values = FIELDS
        .iter()
        .map(|(_, key)| ((*key).to_string(), format!("{ERROR_PREFIX}not found")))
        .collect();

    for line in contents.lines() {
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        let Some((_, key)) = FIELDS.iter().find(|(field, _)| *field == name) else {
            continue;
        };
        if let Some(amount) = rest.split_whitespace().next() {
            values.insert((*key).to_string(), amount.to_string());
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "\
MemTotal:       16318116 kB
MemFree:         1052724 kB
MemAvailable:    9611412 kB
Buffers:          569116 kB
Cached:          7855452 kB
SwapCached:        12884 kB
Active:          8021212 kB
Inactive:        5596220 kB
Active(anon):    4904612 kB
Inactive(anon):   621660 kB
SwapTotal:       2097148 kB
SwapFree:        1969404 kB
";

    #[test]
    fn test_parse_meminfo() {
        let values = parse_meminfo(MEMINFO);
        assert_eq!(values.len(), 7);
        assert_eq!(values["total"], "16318116");
        assert_eq!(values["free"], "1052724");
        assert_eq!(values["available"], "9611412");
        assert_eq!(values["active"], "8021212");
        assert_eq!(values["inactive"], "5596220");
        assert_eq!(values["swap.total"], "2097148");
        assert_eq!(values["swap.free"], "1969404");
    }

    #[test]
    fn test_parse_meminfo_missing_fields() {
        let values = parse_meminfo("MemTotal: 1024 kB\nActive(anon): 12 kB\n");
        assert_eq!(values["total"], "1024");
        assert_eq!(values["active"], "error: not found");
        assert_eq!(values["swap.free"], "error: not found");
    }

    #[tokio::test]
    async fn test_retrieve_from_file() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/proc/meminfo/valid_meminfo");
        let source = MemorySource::with_path(path);
        assert_eq!(source.id(), "sys.mem");
        let Reading::Values(values) = source.retrieve().await else {
            panic!("expected multi-value reading");
        };
        assert_eq!(values["total"], "16318116");
        assert_eq!(values["swap.free"], "1969404");
    }

    #[tokio::test]
    async fn test_retrieve_unreadable_file() {
        let source = MemorySource::with_path("/nonexistent/sysmond/meminfo");
        let Reading::Values(values) = source.retrieve().await else {
            panic!("expected multi-value reading");
        };
        assert_eq!(values.len(), 1);
        assert!(values["all"].starts_with("error: cannot read memory information: "));
    }
}
