// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while reading the daemon configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid entry '{entry}' in {variable}: expected {expected}")]
    InvalidEntry {
        variable: &'static str,
        entry: String,
        expected: &'static str,
    },
}
