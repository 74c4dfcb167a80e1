// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::source::{Reading, Source};

/// Source reporting the first line printed by an external program.
#[derive(Debug, Clone)]
pub struct CommandSource {
    id: String,
    program: String,
    args: Vec<String>,
}

impl CommandSource {
    pub fn new<I, S>(id: impl Into<String>, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSource {
            id: id.into(),
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl Source for CommandSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn retrieve(&self) -> Reading {
        // The child is killed if the retrieval task is aborted.
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                debug!("Failed to execute {} for source {}: {e}", self.program, self.id);
                return Reading::error(format!("cannot execute command: {e}"));
            }
        };
        if !output.status.success() {
            return Reading::error(format!("command exited with {}", output.status));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Reading::Value(first_line(&stdout).to_string())
    }
}

fn first_line(stdout: &str) -> &str {
    stdout.lines().next().unwrap_or_default().trim()
}
