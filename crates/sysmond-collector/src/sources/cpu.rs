// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-core CPU times read from `/proc/stat`.
//!
//! `/proc/stat` reports times in clock ticks (`USER_HZ`). Each `cpuN` line is
//! converted to seconds and reported as `N.user`, `N.system` and `N.idle`
//! with three decimals. The aggregate `cpu` line is ignored.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::source::{Reading, Source, Values};

pub const CPU_SOURCE_ID: &str = "sys.cpu";
const PROC_STAT_PATH: &str = "/proc/stat";

#[derive(Debug, Clone)]
pub struct CpuSource {
    path: PathBuf,
}

impl CpuSource {
    #[must_use]
    pub fn new() -> Self {
        Self::with_path(PROC_STAT_PATH)
    }

    /// Reads from another file in `/proc/stat` format.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        CpuSource { path: path.into() }
    }

    async fn read_times(&self) -> Result<Values, io::Error> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        parse_stat(&contents, get_clk_tck()?)
    }
}

impl Default for CpuSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for CpuSource {
    fn id(&self) -> &str {
        CPU_SOURCE_ID
    }

    async fn retrieve(&self) -> Reading {
        match self.read_times().await {
            Ok(values) => Reading::Values(values),
            Err(e) => {
                debug!("Could not read CPU times from {}: {e}", self.path.display());
                Reading::error_values("cannot retrieve CPU times statistics")
            }
        }
    }
}

#[allow(clippy::cast_sign_loss)]
#[cfg(unix)]
fn get_clk_tck() -> Result<u64, io::Error> {
    use nix::unistd::{sysconf, SysconfVar};

    match sysconf(SysconfVar::CLK_TCK) {
        Ok(Some(clk_tck)) if clk_tck > 0 => Ok(clk_tck as u64),
        _ => Err(io::Error::new(
            io::ErrorKind::NotFound,
            "could not find system clock ticks per second",
        )),
    }
}

#[cfg(not(unix))]
fn get_clk_tck() -> Result<u64, io::Error> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "clock ticks are only available on unix",
    ))
}

/// Converts the per-core lines of `contents` into values.
///
/// Fails on a malformed core line or when no core line is present.
#[allow(clippy::cast_precision_loss)]
fn parse_stat(contents: &str, clk_tck: u64) -> Result<Values, io::Error> {
    let clk_tck = clk_tck as f64;
    let mut values = Values::new();

    for line in contents.lines() {
        let mut fields = line.split_whitespace();
        let Some(core) = fields
            .next()
            .and_then(|label| label.strip_prefix("cpu"))
            .filter(|core| !core.is_empty())
        else {
            continue;
        };
        if !core.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid_data(format!("unexpected cpu label cpu{core}")));
        }

        // user nice system idle ...
        let ticks: Vec<u64> = fields
            .take(4)
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|e| invalid_data(format!("failed to parse times of cpu{core}: {e}")))?;
        let [user, _nice, system, idle] = ticks[..] else {
            return Err(invalid_data(format!("missing times for cpu{core}")));
        };

        for (name, ticks) in [("user", user), ("system", system), ("idle", idle)] {
            values.insert(
                format!("{core}.{name}"),
                format!("{:.3}", ticks as f64 / clk_tck),
            );
        }
    }

    if values.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "per-core CPU data not found",
        ));
    }
    Ok(values)
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_from_root(file: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(file)
    }

    #[test]
    fn test_parse_stat() {
        let contents = std::fs::read_to_string(path_from_root("tests/proc/stat/valid_stat"))
            .expect("read fixture");
        let values = parse_stat(&contents, 100).expect("valid stat");
        assert_eq!(values.len(), 6);
        assert_eq!(values["0.user"], "12.030");
        assert_eq!(values["0.system"], "0.970");
        assert_eq!(values["0.idle"], "91.880");
        assert_eq!(values["1.user"], "11.340");
        assert_eq!(values["1.system"], "0.910");
        assert_eq!(values["1.idle"], "86.490");
    }

    #[test]
    fn test_parse_stat_invalid() {
        for fixture in [
            "tests/proc/stat/invalid_stat_non_numerical_value",
            "tests/proc/stat/invalid_stat_missing_cpun_data",
        ] {
            let contents = std::fs::read_to_string(path_from_root(fixture)).expect("read fixture");
            assert!(parse_stat(&contents, 100).is_err(), "{fixture}");
        }
        assert!(parse_stat("cpu0 1 2\n", 100).is_err());
    }

    #[tokio::test]
    async fn test_retrieve_from_file() {
        let source = CpuSource::with_path(path_from_root("tests/proc/stat/valid_stat"));
        assert_eq!(source.id(), "sys.cpu");
        let Reading::Values(values) = source.retrieve().await else {
            panic!("expected multi-value reading");
        };
        assert_eq!(values.len(), 6);
        assert!(values.contains_key("1.idle"));
    }

    #[tokio::test]
    async fn test_retrieve_unreadable_file() {
        let source = CpuSource::with_path("/nonexistent/sysmond/stat");
        assert_eq!(
            source.retrieve().await,
            Reading::error_values("cannot retrieve CPU times statistics")
        );
    }
}
