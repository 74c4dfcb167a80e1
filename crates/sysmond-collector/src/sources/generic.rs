// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

use async_trait::async_trait;

use crate::source::{Reading, Source};

/// Source backed by a closure.
///
/// `Ok` results are reported as-is, `Err(e)` becomes `"error: {e}"`. The
/// closure runs on the retrieval task and should not block for long.
pub struct GenericSource<F> {
    id: String,
    retrieve: F,
}

impl<F, R, E> GenericSource<F>
where
    F: Fn() -> Result<R, E> + Send + Sync,
    R: Into<Reading>,
    E: Display,
{
    pub fn new(id: impl Into<String>, retrieve: F) -> Self {
        GenericSource {
            id: id.into(),
            retrieve,
        }
    }
}

#[async_trait]
impl<F, R, E> Source for GenericSource<F>
where
    F: Fn() -> Result<R, E> + Send + Sync,
    R: Into<Reading>,
    E: Display,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn retrieve(&self) -> Reading {
        match (self.retrieve)() {
            Ok(reading) => reading.into(),
            Err(e) => Reading::error(e),
        }
    }
}
