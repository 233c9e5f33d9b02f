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

//! OVS chassis identity, as read by ovnkube running on the DPU.

use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::error::ProvisionerError;
use crate::exec::CommandExecutor;

const OVS_VSCTL: &str = "ovs-vsctl";

#[async_trait]
pub trait OvsClient: Send + Sync {
    /// Tunnel endpoint other chassis use to reach this one.
    async fn set_ovn_encap_ip(&self, ip: Ipv4Addr) -> Result<(), ProvisionerError>;

    /// Kubernetes Node name of the host this DPU serves.
    async fn set_kubernetes_host_node_name(&self, name: &str) -> Result<(), ProvisionerError>;

    /// Chassis hostname.
    async fn set_host_name(&self, name: &str) -> Result<(), ProvisionerError>;
}

/// [`OvsClient`] that writes `external_ids` on the `Open_vSwitch` table.
pub struct VsctlOvsClient<E> {
    exec: E,
}

impl<E: CommandExecutor> VsctlOvsClient<E> {
    pub fn new(exec: E) -> Self {
        Self { exec }
    }

    async fn set_external_id(&self, key: &str, value: &str) -> Result<(), ProvisionerError> {
        // table: Open_vSwitch
        // record: .
        // column: external_ids
        let args = vec![
            "set".to_string(),
            "Open_vSwitch".to_string(),
            ".".to_string(),
            format!("external_ids:{key}={value}"),
        ];
        self.exec.run(OVS_VSCTL, &args).await?;
        Ok(())
    }
}

#[async_trait]
impl<E: CommandExecutor> OvsClient for VsctlOvsClient<E> {
    async fn set_ovn_encap_ip(&self, ip: Ipv4Addr) -> Result<(), ProvisionerError> {
        self.set_external_id("ovn-encap-ip", &ip.to_string()).await
    }

    async fn set_kubernetes_host_node_name(&self, name: &str) -> Result<(), ProvisionerError> {
        self.set_external_id("host-k8s-nodename", name).await
    }

    async fn set_host_name(&self, name: &str) -> Result<(), ProvisionerError> {
        self.set_external_id("hostname", name).await
    }
}
