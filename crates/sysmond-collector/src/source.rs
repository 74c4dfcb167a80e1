// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The capability every metric source implements.
//!
//! A source is identified by a stable id and produces exactly one [`Reading`]
//! per invocation of [`Source::retrieve`]. Sources never fail out-of-band:
//! internal failures are reported as values starting with `"error: "` (see
//! [`Reading::error`]), so downstream consumers can treat them as ordinary data.

use std::collections::HashMap;
use std::fmt::Display;

use async_trait::async_trait;

use crate::constants::{ALL_KEY, ERROR_PREFIX};

/// Sub-metric name to value, as produced by a multi-value source.
pub type Values = HashMap<String, String>;

/// One result of a source retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
    /// A single value, recorded directly under the source id.
    Value(String),
    /// Several values, recorded under `<source id>.<key>`.
    Values(Values),
}

impl Reading {
    /// Builds a single-value reading holding an in-band error.
    pub fn error(message: impl Display) -> Self {
        Reading::Value(format!("{ERROR_PREFIX}{message}"))
    }

    /// Builds a multi-value reading whose `all` key holds an in-band error.
    ///
    /// Used by multi-value sources that failed before producing any key.
    pub fn error_values(message: impl Display) -> Self {
        Reading::Values(Values::from([(
            ALL_KEY.to_string(),
            format!("{ERROR_PREFIX}{message}"),
        )]))
    }

    /// Returns true if any value of the reading is an in-band error.
    #[must_use]
    pub fn has_error(&self) -> bool {
        match self {
            Reading::Value(value) => value.starts_with(ERROR_PREFIX),
            Reading::Values(values) => values.values().any(|v| v.starts_with(ERROR_PREFIX)),
        }
    }
}

impl From<String> for Reading {
    fn from(value: String) -> Self {
        Reading::Value(value)
    }
}

impl From<&str> for Reading {
    fn from(value: &str) -> Self {
        Reading::Value(value.to_string())
    }
}

impl From<Values> for Reading {
    fn from(values: Values) -> Self {
        Reading::Values(values)
    }
}

/// A named metric source polled by a [`crate::Collector`].
#[async_trait]
pub trait Source: Send + Sync {
    /// Stable identifier of the source, also the stem of its values.
    fn id(&self) -> &str;

    /// Produces one reading. Failures must be encoded in the reading.
    async fn retrieve(&self) -> Reading;
}
