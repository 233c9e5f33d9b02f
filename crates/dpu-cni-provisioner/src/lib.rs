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

//! DPU CNI provisioner.
//!
//! Prepares the networking of a DPU so that OVN-Kubernetes can use it as the
//! offloaded data path of its host:
//!
//! - Addresses the `br-ovn` overlay bridge, either from static configuration
//!   (internal IPAM, where we also serve DHCP to the host PF) or through a
//!   DHCP client driven by netplan (external IPAM)
//! - Routes to the host and VTEP networks, plus policy rules steering
//!   pod network and out-of-band traffic to the VTEPs
//! - The gateway options ovnkube-node reads from `ovn_k8s.conf`
//! - OVS `external_ids` identifying the chassis
//! - The OVN zone label on the DPU's Kubernetes Node
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use dpu_cni_provisioner::{AgentConfig, DpuCniProvisioner, KubeNodeRepository};
//!
//! let config = AgentConfig::load(None)?.provisioner_config()?;
//! let exec = Arc::new(TokioCommandExecutor);
//! let mut provisioner = DpuCniProvisioner::new(
//!     config,
//!     Arc::new(IpCommandNetworkHelper::new(TokioCommandExecutor, "/sys")),
//!     Arc::new(VsctlOvsClient::new(TokioCommandExecutor)),
//!     exec,
//!     Arc::new(SystemClock),
//!     Arc::new(KubeNodeRepository::new(cancel).await?),
//! );
//! provisioner.run_once().await?;
//! ```
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod dhcp;
pub mod error;
pub mod exec;
pub mod network;
pub mod ovs;
pub mod provisioner;
pub mod render;
pub mod repository;
pub mod throttle;

#[cfg(test)]
mod test;

/// Field manager for server-side apply.
pub const FIELD_MANAGER: &str = "dpu-cni-provisioner";

// Re-exports for convenience
pub use clock::{Clock, SystemClock};
pub use config::{AgentConfig, IpamMode, ProvisionerConfig};
pub use error::ProvisionerError;
pub use exec::{CommandExecutor, TokioCommandExecutor};
pub use network::{IpCommandNetworkHelper, NetworkHelper};
pub use ovs::{OvsClient, VsctlOvsClient};
pub use provisioner::DpuCniProvisioner;
pub use repository::{KubeNodeRepository, NodeRepository};
