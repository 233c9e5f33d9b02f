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

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use crate::dhcp::MAX_OVERLAY_MTU;
use crate::error::ProvisionerError;

/// Environment variables with this prefix override the config file,
/// e.g. `DPU_CNI_PROVISIONER__VTEP_CIDR=192.168.0.0/16`.
pub const ENV_PREFIX: &str = "DPU_CNI_PROVISIONER__";

pub const DEFAULT_APPLY_COOLDOWN: Duration = Duration::from_secs(120);

/// Smallest MTU an IPv4 link may have.
pub const MIN_MTU: u32 = 68;

/// How the overlay bridge gets its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpamMode {
    /// Addresses are handed to us. We assign the bridge address and run a
    /// DHCP server for the host PF.
    Internal(InternalIpam),
    /// The bridge address comes from a DHCP server elsewhere in the fabric.
    External(ExternalIpam),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalIpam {
    pub vtep_ip: Ipv4Network,
    pub gateway: Ipv4Addr,
    /// Address the host PF gets from our DHCP server.
    pub pf_ip: Ipv4Network,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIpam {
    /// Looking up the route to this network tells us the fabric gateway.
    pub gateway_discovery_network: Ipv4Network,
}

/// Everything a provisioning pass needs to know. Fixed for the life of the
/// process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerConfig {
    pub mode: IpamMode,
    /// Subnet spanning the VTEPs of all DPUs.
    pub vtep_cidr: Ipv4Network,
    /// Subnet of the hosts.
    pub host_cidr: Ipv4Network,
    /// Name of the Kubernetes Node this DPU runs as.
    pub node_name: String,
    pub mtu: u32,
    /// Minimum time between two `netplan apply` runs.
    pub apply_cooldown: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IpamModeKind {
    #[default]
    Internal,
    External,
}

/// On-disk / environment form of the configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub ipam_mode: IpamModeKind,

    /// Internal mode only.
    pub vtep_ip: Option<Ipv4Network>,
    /// Internal mode only.
    pub gateway: Option<Ipv4Addr>,
    /// Internal mode only.
    pub pf_ip: Option<Ipv4Network>,

    /// External mode only.
    pub gateway_discovery_network: Option<Ipv4Network>,

    pub vtep_cidr: Option<Ipv4Network>,
    pub host_cidr: Option<Ipv4Network>,
    pub node_name: Option<String>,
    pub mtu: u32,

    pub apply_cooldown_secs: u64,
    /// Time between two provisioning passes.
    pub run_interval_secs: u64,

    /// Prefix for every file we write. Only changed in development.
    pub filesystem_root: PathBuf,
    pub sysfs_root: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            ipam_mode: IpamModeKind::Internal,
            vtep_ip: None,
            gateway: None,
            pf_ip: None,
            gateway_discovery_network: None,
            vtep_cidr: None,
            host_cidr: None,
            node_name: None,
            mtu: 1500,
            apply_cooldown_secs: DEFAULT_APPLY_COOLDOWN.as_secs(),
            run_interval_secs: 30,
            filesystem_root: PathBuf::from("/"),
            sysfs_root: PathBuf::from("/sys"),
        }
    }
}

impl AgentConfig {
    /// Load configuration from optional path, then the environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ProvisionerError> {
        let mut figment = Figment::new().merge(Serialized::defaults(AgentConfig::default()));

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment
            .extract()
            .map_err(|e| ProvisionerError::config(format!("Failed to load configuration: {e}")))
    }

    pub fn run_interval(&self) -> Duration {
        Duration::from_secs(self.run_interval_secs)
    }

    /// Validate and convert into the form the provisioner runs with.
    pub fn provisioner_config(&self) -> Result<ProvisionerConfig, ProvisionerError> {
        let mode = match self.ipam_mode {
            IpamModeKind::Internal => {
                if self.gateway_discovery_network.is_some() {
                    return Err(ProvisionerError::config(
                        "gateway_discovery_network is only valid in external IPAM mode",
                    ));
                }
                IpamMode::Internal(InternalIpam {
                    vtep_ip: required(self.vtep_ip, "vtep_ip")?,
                    gateway: required(self.gateway, "gateway")?,
                    pf_ip: required(self.pf_ip, "pf_ip")?,
                })
            }
            IpamModeKind::External => {
                for (set, name) in [
                    (self.vtep_ip.is_some(), "vtep_ip"),
                    (self.gateway.is_some(), "gateway"),
                    (self.pf_ip.is_some(), "pf_ip"),
                ] {
                    if set {
                        return Err(ProvisionerError::config(format!(
                            "{name} is only valid in internal IPAM mode"
                        )));
                    }
                }
                IpamMode::External(ExternalIpam {
                    gateway_discovery_network: required(
                        self.gateway_discovery_network,
                        "gateway_discovery_network",
                    )?,
                })
            }
        };

        let node_name = self
            .node_name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ProvisionerError::config("node_name is required"))?;

        if !(MIN_MTU..=MAX_OVERLAY_MTU).contains(&self.mtu) {
            return Err(ProvisionerError::config(format!(
                "mtu {} is outside {MIN_MTU}..={MAX_OVERLAY_MTU}",
                self.mtu
            )));
        }

        Ok(ProvisionerConfig {
            mode,
            vtep_cidr: required(self.vtep_cidr, "vtep_cidr")?,
            host_cidr: required(self.host_cidr, "host_cidr")?,
            node_name,
            mtu: self.mtu,
            apply_cooldown: Duration::from_secs(self.apply_cooldown_secs),
        })
    }
}

fn required<T>(value: Option<T>, name: &str) -> Result<T, ProvisionerError> {
    value.ok_or_else(|| ProvisionerError::config(format!("{name} is required")))
}
