// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Disk space of a mounted filesystem, via `statfs(2)`.
//!
//! Reported values follow `df -Pk`: `total`, `used` and `available` in kB,
//! where `used` counts all non-free blocks and `available` only the blocks
//! usable by unprivileged users.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nix::sys::statfs::statfs;
use tracing::debug;

use crate::source::{Reading, Source, Values};

pub const DISK_SOURCE_PREFIX: &str = "sys.disk";
const KB: u64 = 1024;

#[derive(Debug, Clone)]
pub struct DiskSource {
    id: String,
    mount: PathBuf,
}

impl DiskSource {
    /// Creates the source `sys.disk.{name}` for the filesystem mounted at
    /// `mount`.
    pub fn new(name: &str, mount: impl Into<PathBuf>) -> Self {
        DiskSource {
            id: format!("{DISK_SOURCE_PREFIX}.{name}"),
            mount: mount.into(),
        }
    }

    #[must_use]
    pub fn mount(&self) -> &Path {
        &self.mount
    }
}

#[async_trait]
impl Source for DiskSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn retrieve(&self) -> Reading {
        let mount = self.mount.clone();
        // statfs can hang on unresponsive network mounts.
        let stats = tokio::task::spawn_blocking(move || statfs_info(&mount)).await;

        match stats {
            Ok(Ok(stats)) => Reading::Values(stats.to_values()),
            Ok(Err(e)) => {
                debug!("statfs failed for {}: {e}", self.mount.display());
                Reading::error_values("cannot retrieve disk space")
            }
            Err(e) => {
                debug!("statfs task failed for {}: {e}", self.mount.display());
                Reading::error_values("cannot retrieve disk space")
            }
        }
    }
}

/// Raw block counts of one filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DiskStats {
    block_size: u64,
    blocks: u64,
    blocks_free: u64,
    blocks_available: u64,
}

impl DiskStats {
    fn kilobytes(&self, blocks: u64) -> u64 {
        u64::try_from(u128::from(blocks) * u128::from(self.block_size) / u128::from(KB))
            .unwrap_or(u64::MAX)
    }

    fn to_values(self) -> Values {
        let used = self.blocks.saturating_sub(self.blocks_free);
        Values::from([
            ("total".to_string(), self.kilobytes(self.blocks).to_string()),
            ("used".to_string(), self.kilobytes(used).to_string()),
            (
                "available".to_string(),
                self.kilobytes(self.blocks_available).to_string(),
            ),
        ])
    }
}

#[allow(clippy::useless_conversion)]
fn statfs_info(mount: &Path) -> Result<DiskStats, io::Error> {
    let stat = statfs(mount).map_err(io::Error::from)?;
    let block_size = u64::try_from(stat.block_size())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "negative block size"))?;
    Ok(DiskStats {
        block_size,
        blocks: u64::from(stat.blocks()),
        blocks_free: u64::from(stat.blocks_free()),
        blocks_available: u64::from(stat.blocks_available()),
    })
}
