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

//! Routes and policy rules common to both IPAM modes.
//!
//! Traffic sourced from the DPU cluster's pod network and from the out-of-band
//! bridge must reach the other DPUs' VTEPs over the out-of-band network, not
//! over the overlay. Both sources are steered into [`POLICY_TABLE`], which
//! holds a single route for the VTEP CIDR via the out-of-band default gateway.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use super::{DpuCniProvisioner, OOB_INTERFACE, POD_NETWORK_INTERFACE};
use crate::error::ProvisionerError;
use crate::network::{containing_network, default_route, host_network};

pub const POLICY_TABLE: u32 = 60;
pub const POD_NETWORK_RULE_PRIORITY: u32 = 31000;
pub const OOB_RULE_PRIORITY: u32 = 32000;

/// Metric of the route to the host CIDR over the overlay bridge. High so that
/// any more specific management route wins.
pub const HOST_CIDR_ROUTE_METRIC: u32 = 10000;

impl DpuCniProvisioner {
    pub(super) async fn configure_policy_routing(&self) -> Result<(), ProvisionerError> {
        // Read both before touching anything
        let pod_network_ip = self.single_link_address(POD_NETWORK_INTERFACE).await?;
        let oob_ip = self.single_link_address(OOB_INTERFACE).await?;

        self.ensure_rule(
            containing_network(pod_network_ip),
            POLICY_TABLE,
            POD_NETWORK_RULE_PRIORITY,
        )
        .await?;
        self.ensure_rule(host_network(oob_ip), POLICY_TABLE, OOB_RULE_PRIORITY)
            .await?;

        let default_gateway = self.network.get_gateway(default_route()).await?;
        self.ensure_route(
            self.config.vtep_cidr,
            default_gateway,
            OOB_INTERFACE,
            None,
            Some(POLICY_TABLE),
        )
        .await?;
        Ok(())
    }

    /// The only address on `link`. Anything else is ambiguous.
    pub(super) async fn single_link_address(
        &self,
        link: &str,
    ) -> Result<Ipv4Network, ProvisionerError> {
        let addresses = self.network.get_link_ip_addresses(link).await?;
        match addresses.as_slice() {
            [address] => Ok(*address),
            _ => Err(ProvisionerError::UnexpectedAddressCount {
                interface: link.to_string(),
                count: addresses.len(),
            }),
        }
    }

    pub(super) async fn ensure_route(
        &self,
        destination: Ipv4Network,
        gateway: Ipv4Addr,
        device: &str,
        metric: Option<u32>,
        table: Option<u32>,
    ) -> Result<(), ProvisionerError> {
        if self
            .network
            .route_exists(destination, gateway, device, table)
            .await?
        {
            return Ok(());
        }
        self.network
            .add_route(destination, gateway, device, metric, table)
            .await?;
        tracing::info!(%destination, %gateway, device, ?metric, ?table, "Added route");
        Ok(())
    }

    async fn ensure_rule(
        &self,
        source: Ipv4Network,
        table: u32,
        priority: u32,
    ) -> Result<(), ProvisionerError> {
        if self.network.rule_exists(source, table, priority).await? {
            return Ok(());
        }
        self.network.add_rule(source, table, priority).await?;
        tracing::info!(%source, table, priority, "Added policy rule");
        Ok(())
    }
}
