// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Prefix every in-band error value starts with.
pub const ERROR_PREFIX: &str = "error: ";

/// Recorded for a source whose retrieval lost the race against cancellation.
pub const CANCELLED: &str = "error: cancelled";

/// Recorded for a source whose retrieval lost the race against the deadline.
pub const TIMEOUT: &str = "error: timeout";

/// Separator between a source id and its sub-metric keys.
pub const STEM_SEPARATOR: char = '.';

/// Key used by multi-value sources to report a failure of the whole reading.
pub const ALL_KEY: &str = "all";

/// Stand-in for "never" when a deadline would overflow [`std::time::Instant`].
pub const FAR_FUTURE: std::time::Duration = std::time::Duration::from_secs(86_400 * 365 * 30);
