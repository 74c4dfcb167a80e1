// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Builds the collector from the configured sources.

use std::convert::Infallible;
use std::sync::Arc;

use sysmond_collector::sources::{CommandSource, CpuSource, GenericSource, MemorySource};
use sysmond_collector::{Collector, Source, Values};
use tracing::{debug, error};

use crate::config::Config;

pub const VERSION_SOURCE_ID: &str = "version";

/// Reports the daemon version as `version.sysmond`.
fn version_source() -> impl Source {
    GenericSource::new(VERSION_SOURCE_ID, || {
        Ok::<_, Infallible>(Values::from([(
            "sysmond".to_string(),
            format!("v{}", env!("CARGO_PKG_VERSION")),
        )]))
    })
}

fn configured_sources(config: &Config) -> Vec<Arc<dyn Source>> {
    let mut sources: Vec<Arc<dyn Source>> = vec![
        Arc::new(MemorySource::new()),
        Arc::new(CpuSource::new()),
        Arc::new(version_source()),
    ];

    #[cfg(unix)]
    sources.extend(config.disks.iter().map(|disk| {
        Arc::new(sysmond_collector::sources::DiskSource::new(
            &disk.name,
            disk.mount.clone(),
        )) as Arc<dyn Source>
    }));
    #[cfg(not(unix))]
    {
        if !config.disks.is_empty() {
            error!("Disk sources are only supported on unix, ignoring {} disks", config.disks.len());
        }
    }

    sources.extend(config.commands.iter().map(|command| {
        Arc::new(CommandSource::new(
            command.id.clone(),
            command.program.clone(),
            command.args.clone(),
        )) as Arc<dyn Source>
    }));
    sources
}

/// Registers every configured source. Sources with an id already taken are
/// skipped and reported; the others are still registered.
pub fn build_collector(config: &Config) -> Collector {
    let mut collector = Collector::new();
    if let Err(e) = collector.register(configured_sources(config)) {
        error!("Some sources were not registered: {e}");
    }
    debug!("Registered sources: {}", collector.ids().join(", "));
    collector
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CommandConfig, DiskConfig};
    use sysmond_collector::Reading;

    #[tokio::test]
    async fn test_version_source() {
        let source = version_source();
        assert_eq!(source.id(), "version");
        let Reading::Values(values) = source.retrieve().await else {
            panic!("expected multi-value reading");
        };
        assert_eq!(values["sysmond"], format!("v{}", env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_build_default_collector() {
        let collector = build_collector(&Config::default());
        assert!(collector.contains("sys.mem"));
        assert!(collector.contains("sys.cpu"));
        assert!(collector.contains("version"));
        #[cfg(unix)]
        assert!(collector.contains("sys.disk.root"));
    }

    #[test]
    fn test_build_collector_skips_duplicates() {
        let config = Config {
            disks: vec![],
            commands: vec![
                CommandConfig {
                    id: "kernel".to_string(),
                    program: "uname".to_string(),
                    args: vec!["-r".to_string()],
                },
                CommandConfig {
                    id: "version".to_string(),
                    program: "echo".to_string(),
                    args: vec![],
                },
                CommandConfig {
                    id: "kernel".to_string(),
                    program: "uname".to_string(),
                    args: vec!["-v".to_string()],
                },
            ],
            ..Default::default()
        };

        let collector = build_collector(&config);
        assert_eq!(
            collector.ids(),
            vec!["kernel", "sys.cpu", "sys.mem", "version"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_build_collector_with_disks() {
        let config = Config {
            disks: vec![
                DiskConfig {
                    name: "root".to_string(),
                    mount: "/".into(),
                },
                DiskConfig {
                    name: "tmp".to_string(),
                    mount: "/tmp".into(),
                },
            ],
            ..Default::default()
        };
        let collector = build_collector(&config);
        assert_eq!(collector.len(), 5);
        assert!(collector.contains("sys.disk.tmp"));
    }
}
