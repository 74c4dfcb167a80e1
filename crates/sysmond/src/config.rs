// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

const ADDRESS_VAR: &str = "SYSMOND_ADDRESS";
const INTERVAL_VAR: &str = "SYSMOND_INTERVAL_SECS";
const TIMEOUT_VAR: &str = "SYSMOND_TIMEOUT_SECS";
pub const LOG_LEVEL_VAR: &str = "SYSMOND_LOG_LEVEL";
const DISKS_VAR: &str = "SYSMOND_DISKS";
const COMMANDS_VAR: &str = "SYSMOND_COMMANDS";
const RUN_FOR_VAR: &str = "SYSMOND_RUN_FOR_SECS";

const DEFAULT_ADDRESS: SocketAddr =
    SocketAddr::V4(std::net::SocketAddrV4::new(std::net::Ipv4Addr::UNSPECIFIED, 1984));
const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
const MAX_INTERVAL: Duration = Duration::from_secs(86_400);
pub const DEFAULT_LOG_LEVEL: &str = "info";
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A filesystem reported as `sys.disk.{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskConfig {
    pub name: String,
    pub mount: PathBuf,
}

/// An external program reported under `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConfig {
    pub id: String,
    pub program: String,
    pub args: Vec<String>,
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the metrics endpoint listens on
    pub address: SocketAddr,
    /// Time between two collection cycles
    pub interval: Duration,
    /// Per-source retrieval timeout, at most `interval`
    pub timeout: Duration,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    pub disks: Vec<DiskConfig>,
    pub commands: Vec<CommandConfig>,
    /// Stop on its own after this long
    pub run_for: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_INTERVAL,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            disks: vec![DiskConfig {
                name: "root".to_string(),
                mount: PathBuf::from("/"),
            }],
            commands: Vec::new(),
            run_for: None,
        }
    }
}

impl Config {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Create configuration from variables returned by `lookup`.
    ///
    /// Unparsable scalar values fall back to their defaults; malformed list
    /// entries are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let address = lookup(ADDRESS_VAR)
            .and_then(|val| val.trim().parse::<SocketAddr>().ok())
            .unwrap_or(defaults.address);
        let interval = lookup(INTERVAL_VAR)
            .and_then(|val| val.trim().parse::<u64>().ok())
            .map_or(defaults.interval, Duration::from_secs);
        let timeout = lookup(TIMEOUT_VAR)
            .and_then(|val| val.trim().parse::<u64>().ok())
            .map_or(interval, Duration::from_secs);
        let log_level = lookup(LOG_LEVEL_VAR)
            .map(|val| val.trim().to_lowercase())
            .unwrap_or(defaults.log_level);
        let disks = match lookup(DISKS_VAR) {
            Some(val) => parse_disks(&val)?,
            None => defaults.disks,
        };
        let commands = match lookup(COMMANDS_VAR) {
            Some(val) => parse_commands(&val)?,
            None => defaults.commands,
        };
        let run_for = lookup(RUN_FOR_VAR)
            .and_then(|val| val.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let config = Self {
            address,
            interval,
            timeout,
            log_level,
            disks,
            commands,
            run_for,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() || self.interval > MAX_INTERVAL {
            return Err(ConfigError::InvalidConfig(format!(
                "{INTERVAL_VAR} must be greater than 0 and at most {}",
                MAX_INTERVAL.as_secs()
            )));
        }

        if self.timeout.is_zero() || self.timeout > self.interval {
            return Err(ConfigError::InvalidConfig(format!(
                "{TIMEOUT_VAR} must be greater than 0 and at most the interval ({}s)",
                self.interval.as_secs()
            )));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        if self.run_for.is_some_and(|run_for| run_for.is_zero()) {
            return Err(ConfigError::InvalidConfig(format!(
                "{RUN_FOR_VAR} must be greater than 0"
            )));
        }

        Ok(())
    }
}

/// Parses `name=mount,...`.
fn parse_disks(val: &str) -> Result<Vec<DiskConfig>, ConfigError> {
    entries(val)
        .map(|entry| match entry.split_once('=') {
            Some((name, mount)) if !name.trim().is_empty() && !mount.trim().is_empty() => {
                Ok(DiskConfig {
                    name: name.trim().to_string(),
                    mount: PathBuf::from(mount.trim()),
                })
            }
            _ => Err(ConfigError::InvalidEntry {
                variable: DISKS_VAR,
                entry: entry.to_string(),
                expected: "name=mount",
            }),
        })
        .collect()
}

/// Parses `id=program arg...,...`.
fn parse_commands(val: &str) -> Result<Vec<CommandConfig>, ConfigError> {
    entries(val)
        .map(|entry| {
            let invalid = || ConfigError::InvalidEntry {
                variable: COMMANDS_VAR,
                entry: entry.to_string(),
                expected: "id=program arg...",
            };
            let (id, command_line) = entry.split_once('=').ok_or_else(invalid)?;
            let mut words = command_line.split_whitespace();
            let program = words.next().ok_or_else(invalid)?;
            if id.trim().is_empty() {
                return Err(invalid());
            }
            Ok(CommandConfig {
                id: id.trim().to_string(),
                program: program.to_string(),
                args: words.map(str::to_string).collect(),
            })
        })
        .collect()
}

fn entries(val: &str) -> impl Iterator<Item = &str> {
    val.split(',').map(str::trim).filter(|entry| !entry.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.address.to_string(), "0.0.0.0:1984");
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.timeout, config.interval);
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.log_level, "info");
        assert_eq!(
            config.disks,
            vec![DiskConfig {
                name: "root".to_string(),
                mount: PathBuf::from("/"),
            }]
        );
        assert!(config.commands.is_empty());
        assert_eq!(config.run_for, None);
    }

    #[test]
    fn test_from_vars() {
        let config = from_vars(&[
            ("SYSMOND_ADDRESS", "127.0.0.1:9000"),
            ("SYSMOND_INTERVAL_SECS", "5"),
            ("SYSMOND_TIMEOUT_SECS", "2"),
            ("SYSMOND_LOG_LEVEL", "DEBUG"),
            ("SYSMOND_DISKS", "root=/, data=/var/lib"),
            ("SYSMOND_COMMANDS", "uptime=uptime -p,kernel=uname -r"),
            ("SYSMOND_RUN_FOR_SECS", "300"),
        ])
        .unwrap();

        assert_eq!(config.address.to_string(), "127.0.0.1:9000");
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.disks.len(), 2);
        assert_eq!(config.disks[1].name, "data");
        assert_eq!(config.disks[1].mount, PathBuf::from("/var/lib"));
        assert_eq!(
            config.commands,
            vec![
                CommandConfig {
                    id: "uptime".to_string(),
                    program: "uptime".to_string(),
                    args: vec!["-p".to_string()],
                },
                CommandConfig {
                    id: "kernel".to_string(),
                    program: "uname".to_string(),
                    args: vec!["-r".to_string()],
                },
            ]
        );
        assert_eq!(config.run_for, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = from_vars(&[
            ("SYSMOND_ADDRESS", "not an address"),
            ("SYSMOND_INTERVAL_SECS", "soon"),
        ])
        .unwrap();
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.interval, DEFAULT_INTERVAL);
    }

    #[test]
    fn test_timeout_defaults_to_interval() {
        let config = from_vars(&[("SYSMOND_INTERVAL_SECS", "3")]).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_validate_invalid_interval() {
        assert!(from_vars(&[("SYSMOND_INTERVAL_SECS", "0")]).is_err());
    }

    #[test]
    fn test_validate_interval_too_long() {
        assert!(from_vars(&[("SYSMOND_INTERVAL_SECS", "18446744073709551615")]).is_err());
        assert!(from_vars(&[("SYSMOND_INTERVAL_SECS", "86401")]).is_err());
        assert!(from_vars(&[("SYSMOND_INTERVAL_SECS", "86400")]).is_ok());
        assert!(from_vars(&[
            ("SYSMOND_INTERVAL_SECS", "86400"),
            ("SYSMOND_TIMEOUT_SECS", "18446744073709551615"),
        ])
        .is_err());
    }

    #[test]
    fn test_validate_invalid_timeout() {
        assert!(from_vars(&[("SYSMOND_TIMEOUT_SECS", "0")]).is_err());
        assert!(from_vars(&[("SYSMOND_INTERVAL_SECS", "5"), ("SYSMOND_TIMEOUT_SECS", "6")]).is_err());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = Config {
            log_level: "invalid".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_log_levels() {
        for level in VALID_LOG_LEVELS {
            let config = Config {
                log_level: level.to_string(),
                ..Default::default()
            };
            assert!(
                config.validate().is_ok(),
                "Log level '{}' should be valid",
                level
            );
        }
    }

    #[test]
    fn test_validate_zero_run_for() {
        assert!(from_vars(&[("SYSMOND_RUN_FOR_SECS", "0")]).is_err());
    }

    #[test]
    fn test_malformed_disks() {
        let err = from_vars(&[("SYSMOND_DISKS", "root")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEntry { variable: "SYSMOND_DISKS", .. }
        ));
        assert!(from_vars(&[("SYSMOND_DISKS", "=/")]).is_err());
    }

    #[test]
    fn test_empty_disks_disables_disk_sources() {
        let config = from_vars(&[("SYSMOND_DISKS", "")]).unwrap();
        assert!(config.disks.is_empty());
    }

    #[test]
    fn test_malformed_commands() {
        assert!(from_vars(&[("SYSMOND_COMMANDS", "uptime")]).is_err());
        assert!(from_vars(&[("SYSMOND_COMMANDS", "uptime=  ")]).is_err());
        assert!(from_vars(&[("SYSMOND_COMMANDS", "=uptime")]).is_err());
    }
}
