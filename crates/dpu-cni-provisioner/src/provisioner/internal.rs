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

//! Internal IPAM: the VTEP address is assigned by us and the host PF gets
//! its address from our dnsmasq.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use mac_address::MacAddress;

use super::routing::HOST_CIDR_ROUTE_METRIC;
use super::{BR_OVN, DpuCniProvisioner};
use crate::config::InternalIpam;
use crate::dhcp::{DNSMASQ, DnsmasqOptions, dnsmasq_args, vtep_cidr_is_wider};
use crate::error::ProvisionerError;
use crate::exec::ProcessState;
use crate::network::containing_network;

/// The host PF whose MAC gets the static DHCP lease.
const HOST_PF_INDEX: u32 = 0;

impl DpuCniProvisioner {
    /// Returns the OVN encapsulation IP.
    pub(super) async fn configure_internal_ipam(
        &mut self,
        ipam: &InternalIpam,
    ) -> Result<Ipv4Addr, ProvisionerError> {
        self.ensure_vtep_address(ipam.vtep_ip).await?;
        self.network.set_link_up(BR_OVN).await?;

        // When the VTEP CIDR is the VTEP's own network the connected route
        // already covers it.
        if vtep_cidr_is_wider(ipam.vtep_ip, self.config.vtep_cidr) {
            self.ensure_route(self.config.vtep_cidr, ipam.gateway, BR_OVN, None, None)
                .await?;
        }
        self.ensure_route(
            self.config.host_cidr,
            ipam.gateway,
            BR_OVN,
            Some(HOST_CIDR_ROUTE_METRIC),
            None,
        )
        .await?;

        let pf_mac = self.network.get_host_pf_mac_address(HOST_PF_INDEX).await?;
        self.ensure_dhcp_server(ipam, pf_mac)?;

        // ovnkube routes to the other VTEPs itself, so the router subnet is
        // always our own network and never the wider VTEP CIDR.
        self.write_ovn_gateway_stanza(ipam.gateway, containing_network(ipam.vtep_ip))?;

        Ok(ipam.vtep_ip.ip())
    }

    async fn ensure_vtep_address(&self, vtep_ip: Ipv4Network) -> Result<(), ProvisionerError> {
        if self.network.link_ip_address_exists(BR_OVN, vtep_ip).await? {
            tracing::debug!(interface = BR_OVN, %vtep_ip, "VTEP address already set");
            return Ok(());
        }
        self.network.set_link_ip_address(BR_OVN, vtep_ip).await?;
        tracing::info!(interface = BR_OVN, %vtep_ip, "Set VTEP address");
        Ok(())
    }

    /// Start dnsmasq unless we already did. It is started once per process
    /// and never restarted: if it died, the pass fails with a fatal error and
    /// the agent exits.
    fn ensure_dhcp_server(
        &mut self,
        ipam: &InternalIpam,
        pf_mac: MacAddress,
    ) -> Result<(), ProvisionerError> {
        if let Some(server) = self.dhcp_server.as_mut() {
            return match server.state()? {
                ProcessState::Running => Ok(()),
                ProcessState::Exited(code) => Err(ProvisionerError::DhcpServerExited(
                    match code {
                        Some(code) => format!("exit status: {code}"),
                        None => "killed by signal".to_string(),
                    },
                )),
            };
        }

        let args = dnsmasq_args(&DnsmasqOptions {
            interface: BR_OVN,
            mtu: self.config.mtu,
            vtep_ip: ipam.vtep_ip,
            vtep_cidr: self.config.vtep_cidr,
            gateway: ipam.gateway,
            pf_mac,
            pf_ip: ipam.pf_ip,
        })?;
        let server = self.exec.spawn(DNSMASQ, &args)?;
        tracing::info!(pid = ?server.pid(), %pf_mac, pf_ip = %ipam.pf_ip.ip(), "Started DHCP server");
        self.dhcp_server = Some(server);
        Ok(())
    }
}
