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

//! Error types for the provisioner.

use std::path::PathBuf;

use ipnetwork::Ipv4Network;
use thiserror::Error;

/// Error type for a provisioning pass.
#[derive(Error, Debug)]
pub enum ProvisionerError {
    #[error("Kubernetes client error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Node '{0}' not found")]
    NodeNotFound(String),

    #[error("Node '{node}' is missing label '{label}'")]
    MissingNodeLabel { node: String, label: &'static str },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Expected exactly 1 IPv4 address on {interface}, found {count}")]
    UnexpectedAddressCount { interface: String, count: usize },

    /// The overlay bridge has not obtained its address over DHCP yet. A later
    /// pass is expected to succeed.
    #[error("No IPv4 address on {interface} yet, waiting for DHCP")]
    NoBridgeAddress { interface: String },

    #[error("No gateway found for {destination}")]
    NoGateway { destination: Ipv4Network },

    #[error("{status} for cmd '{command}': {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("DHCP server exited unexpectedly: {0}")]
    DhcpServerExited(String),

    #[error("{context} {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {what}: {details}")]
    Parse { what: &'static str, details: String },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ProvisionerError {
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }

    pub fn parse(what: &'static str, details: impl Into<String>) -> Self {
        Self::Parse {
            what,
            details: details.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// True for conditions expected to clear up on their own on a later pass.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NoBridgeAddress { .. })
    }

    /// True for conditions no later pass can recover from. The agent must
    /// exit so its supervisor restarts it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DhcpServerExited(_))
    }
}
