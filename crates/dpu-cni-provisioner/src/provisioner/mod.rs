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

//! The convergence pass.
//!
//! [`DpuCniProvisioner::run_once`] brings the DPU's networking in line with
//! its [`ProvisionerConfig`]. Every change is preceded by a check of the
//! current state, so a pass can be repeated forever. A failed pass leaves
//! whatever it already did in place and the next pass picks up from there.

mod external;
mod internal;
mod routing;

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use ipnetwork::Ipv4Network;

use crate::clock::Clock;
use crate::config::{IpamMode, ProvisionerConfig};
use crate::error::ProvisionerError;
use crate::exec::{ChildProcess, CommandExecutor};
use crate::network::NetworkHelper;
use crate::ovs::OvsClient;
use crate::render::{self, FileWriter};
use crate::repository::NodeRepository;
use crate::throttle::ApplyThrottle;

/// Bridge carrying the encapsulated overlay traffic.
pub const BR_OVN: &str = "br-ovn";
/// Flannel bridge of the DPU cluster's pod network.
pub const POD_NETWORK_INTERFACE: &str = "cni0";
/// Out-of-band management bridge.
pub const OOB_INTERFACE: &str = "br-comm-ch";

/// Set by the DPF provisioning controller to the name of the host Node this
/// DPU belongs to.
pub const DPU_NODE_NAME_LABEL: &str = "provisioning.dpu.nvidia.com/dpunode-name";
/// OVN interconnect zone. The DPU joins its host's zone.
pub const OVN_ZONE_LABEL: &str = "k8s.ovn.org/zone-name";

pub struct DpuCniProvisioner {
    config: ProvisionerConfig,
    network: Arc<dyn NetworkHelper>,
    ovs: Arc<dyn OvsClient>,
    exec: Arc<dyn CommandExecutor>,
    clock: Arc<dyn Clock>,
    nodes: Arc<dyn NodeRepository>,
    files: FileWriter,

    netplan_throttle: ApplyThrottle,
    dhcp_server: Option<Box<dyn ChildProcess>>,
}

impl DpuCniProvisioner {
    pub fn new(
        config: ProvisionerConfig,
        network: Arc<dyn NetworkHelper>,
        ovs: Arc<dyn OvsClient>,
        exec: Arc<dyn CommandExecutor>,
        clock: Arc<dyn Clock>,
        nodes: Arc<dyn NodeRepository>,
    ) -> Self {
        let netplan_throttle = ApplyThrottle::new(config.apply_cooldown);
        Self {
            config,
            network,
            ovs,
            exec,
            clock,
            nodes,
            files: FileWriter::default(),
            netplan_throttle,
            dhcp_server: None,
        }
    }

    /// Write files under `root` instead of `/`.
    pub fn with_filesystem_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.files = FileWriter::new(root);
        self
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// One convergence pass. Stops at the first error.
    pub async fn run_once(&mut self) -> Result<(), ProvisionerError> {
        let host_node_name = self.ensure_node_labels().await?;

        let encap_ip = match self.config.mode.clone() {
            IpamMode::Internal(ipam) => self.configure_internal_ipam(&ipam).await?,
            IpamMode::External(ipam) => self.configure_external_ipam(&ipam).await?,
        };

        self.configure_policy_routing().await?;

        self.configure_ovs(encap_ip, &host_node_name).await?;
        Ok(())
    }

    /// Label the local Node with the OVN zone of its host, and return the
    /// host's Node name.
    async fn ensure_node_labels(&self) -> Result<String, ProvisionerError> {
        let node_name = &self.config.node_name;
        let node = self
            .nodes
            .get(node_name)
            .await?
            .ok_or_else(|| ProvisionerError::NodeNotFound(node_name.clone()))?;

        let host_node_name = node
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(DPU_NODE_NAME_LABEL))
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| ProvisionerError::MissingNodeLabel {
                node: node_name.clone(),
                label: DPU_NODE_NAME_LABEL,
            })?;

        let labels = BTreeMap::from([(OVN_ZONE_LABEL.to_string(), host_node_name.clone())]);
        self.nodes.apply_labels(node_name, labels).await?;
        tracing::debug!(host_node_name, "Node labels applied");

        Ok(host_node_name)
    }

    async fn configure_ovs(
        &self,
        encap_ip: Ipv4Addr,
        host_node_name: &str,
    ) -> Result<(), ProvisionerError> {
        self.ovs.set_ovn_encap_ip(encap_ip).await?;
        self.ovs
            .set_kubernetes_host_node_name(host_node_name)
            .await?;
        self.ovs.set_host_name(host_node_name).await?;
        Ok(())
    }

    fn write_ovn_gateway_stanza(
        &self,
        next_hop: Ipv4Addr,
        router_subnet: Ipv4Network,
    ) -> Result<(), ProvisionerError> {
        let stanza = render::ovn_gateway_stanza(next_hop, router_subnet);
        if self.files.write(render::OVN_K8S_CONF_PATH, &stanza)? {
            tracing::info!(%next_hop, %router_subnet, "Updated OVN gateway options");
        }
        Ok(())
    }
}
