/*
 * SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: Apache-2.0
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Running external commands.
//!
//! Short-lived commands (`ip`, `ovs-vsctl`, `netplan apply`) go through
//! [`CommandExecutor::run`] and are awaited to completion. The DHCP server is
//! long-running and goes through [`CommandExecutor::spawn`], which hands back a
//! [`ChildProcess`] the caller polls for liveness.
//!
//! Commands are not killed when the awaiting future is dropped: once a network
//! change has been issued it is allowed to finish.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command as TokioCommand};

use crate::error::ProvisionerError;

/// Captured result of a command that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Observed state of a spawned process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Exit code, `None` if killed by a signal.
    Exited(Option<i32>),
}

pub trait ChildProcess: Send + Sync {
    fn pid(&self) -> Option<u32>;

    /// Non-blocking liveness check. Reaps the process if it has exited.
    fn state(&mut self) -> Result<ProcessState, ProvisionerError>;
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` to completion. A non-zero exit is an error.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, ProvisionerError>;

    /// Start `program` in the background and return without waiting for it.
    fn spawn(
        &self,
        program: &str,
        args: &[String],
    ) -> Result<Box<dyn ChildProcess>, ProvisionerError>;
}

/// Human readable form of a command line, for logs and errors.
pub fn pretty_cmd(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        return program.to_string();
    }
    format!("{} {}", program, args.join(" "))
}

/// [`CommandExecutor`] backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandExecutor;

#[async_trait]
impl CommandExecutor for TokioCommandExecutor {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, ProvisionerError> {
        let cmd_str = pretty_cmd(program, args);
        tracing::trace!("running: {cmd_str}");

        let out = TokioCommand::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ProvisionerError::Spawn {
                command: cmd_str.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&out.stdout).to_string();
        let stderr = String::from_utf8_lossy(&out.stderr).to_string();
        if !out.status.success() {
            tracing::debug!("STDERR {cmd_str}: {stderr}");
            return Err(ProvisionerError::Command {
                command: cmd_str,
                status: out.status.to_string(), // includes the string "exit status"
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(CommandOutput { stdout, stderr })
    }

    fn spawn(
        &self,
        program: &str,
        args: &[String],
    ) -> Result<Box<dyn ChildProcess>, ProvisionerError> {
        let cmd_str = pretty_cmd(program, args);
        // Output is inherited so the child's logs end up next to ours.
        let child = TokioCommand::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| ProvisionerError::Spawn {
                command: cmd_str.clone(),
                source,
            })?;
        tracing::info!(pid = ?child.id(), "started: {cmd_str}");
        Ok(Box::new(TokioChild {
            child,
            command: cmd_str,
        }))
    }
}

struct TokioChild {
    child: Child,
    command: String,
}

impl ChildProcess for TokioChild {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn state(&mut self) -> Result<ProcessState, ProvisionerError> {
        match self.child.try_wait() {
            Ok(None) => Ok(ProcessState::Running),
            Ok(Some(status)) => Ok(ProcessState::Exited(status.code())),
            Err(err) => Err(ProvisionerError::Command {
                command: self.command.clone(),
                status: "wait failed".to_string(),
                stderr: err.to_string(),
            }),
        }
    }
}
