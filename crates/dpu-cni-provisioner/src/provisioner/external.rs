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

//! External IPAM: netplan runs a DHCP client on the overlay bridge and we
//! work with whatever address it got.

use std::net::Ipv4Addr;

use super::routing::HOST_CIDR_ROUTE_METRIC;
use super::{BR_OVN, DpuCniProvisioner};
use crate::config::ExternalIpam;
use crate::error::ProvisionerError;
use crate::network::containing_network;
use crate::render;

pub const NETPLAN: &str = "netplan";

impl DpuCniProvisioner {
    /// Returns the OVN encapsulation IP.
    pub(super) async fn configure_external_ipam(
        &mut self,
        ipam: &ExternalIpam,
    ) -> Result<Ipv4Addr, ProvisionerError> {
        if self
            .files
            .write(render::NETPLAN_BR_OVN_PATH, render::netplan_br_ovn())?
        {
            tracing::info!(interface = BR_OVN, "Updated netplan config");
        }
        self.netplan_apply().await?;

        let addresses = self.network.get_link_ip_addresses(BR_OVN).await?;
        let vtep_ip = match addresses.as_slice() {
            [] => {
                return Err(ProvisionerError::NoBridgeAddress {
                    interface: BR_OVN.to_string(),
                });
            }
            [address] => *address,
            _ => {
                return Err(ProvisionerError::UnexpectedAddressCount {
                    interface: BR_OVN.to_string(),
                    count: addresses.len(),
                });
            }
        };

        let gateway = self
            .network
            .get_gateway(ipam.gateway_discovery_network)
            .await?;
        self.ensure_route(
            self.config.host_cidr,
            gateway,
            BR_OVN,
            Some(HOST_CIDR_ROUTE_METRIC),
            None,
        )
        .await?;

        self.write_ovn_gateway_stanza(gateway, containing_network(vtep_ip))?;

        Ok(vtep_ip.ip())
    }

    /// `netplan apply` bounces the bridge, which restarts its DHCP client.
    /// Running it every pass would mean never keeping a lease, so it is
    /// limited to once per cooldown.
    async fn netplan_apply(&mut self) -> Result<(), ProvisionerError> {
        let now = self.clock.now();
        if !self.netplan_throttle.is_ready(now) {
            tracing::debug!(
                remaining = ?self.netplan_throttle.remaining(now),
                "Skipping netplan apply, cooling down"
            );
            return Ok(());
        }

        // Recorded before running so a failing apply is throttled too
        self.netplan_throttle.record(now);
        self.exec.run(NETPLAN, &["apply".to_string()]).await?;
        tracing::info!("Applied netplan config");
        Ok(())
    }
}
