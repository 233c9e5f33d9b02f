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

//! The dnsmasq instance that hands the host PF its address on the overlay bridge.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use mac_address::MacAddress;

use crate::error::ProvisionerError;

pub const DNSMASQ: &str = "dnsmasq";

/// Geneve header overhead. The host PF carries encapsulated traffic, so its
/// MTU is the overlay MTU plus this.
pub const GENEVE_OVERHEAD: u32 = 60;

/// Largest overlay MTU whose encapsulated size still fits an IPv4 packet.
pub const MAX_OVERLAY_MTU: u32 = 65535 - GENEVE_OVERHEAD;

#[derive(Debug, Clone)]
pub struct DnsmasqOptions<'a> {
    pub interface: &'a str,
    /// Overlay MTU, before encapsulation overhead.
    pub mtu: u32,
    /// This DPU's VTEP address, its prefix defines the served range.
    pub vtep_ip: Ipv4Network,
    /// Subnet spanning the VTEPs of all DPUs.
    pub vtep_cidr: Ipv4Network,
    pub gateway: Ipv4Addr,
    pub pf_mac: MacAddress,
    pub pf_ip: Ipv4Network,
}

/// True if `vtep_cidr` covers more than this DPU's own VTEP network, in which
/// case the rest of it is reached through the gateway.
pub fn vtep_cidr_is_wider(vtep_ip: Ipv4Network, vtep_cidr: Ipv4Network) -> bool {
    vtep_cidr.prefix() < vtep_ip.prefix()
}

pub fn dnsmasq_args(opts: &DnsmasqOptions<'_>) -> Result<Vec<String>, ProvisionerError> {
    let pf_mtu = opts
        .mtu
        .checked_add(GENEVE_OVERHEAD)
        .filter(|_| opts.mtu <= MAX_OVERLAY_MTU)
        .ok_or_else(|| ProvisionerError::config(format!("mtu {} is too large", opts.mtu)))?;

    let mut args = vec![
        "--keep-in-foreground".to_string(),
        "--port=0".to_string(), // no DNS
        "--log-facility=-".to_string(),
        format!("--interface={}", opts.interface),
        // Empty router option, the PF must not get a default route from us
        "--dhcp-option=option:router".to_string(),
        format!("--dhcp-option=option:mtu,{pf_mtu}"),
        format!("--dhcp-range={},static", opts.vtep_ip.network()),
        format!(
            "--dhcp-host={},{}",
            mac_lowercase(opts.pf_mac),
            opts.pf_ip.ip()
        ),
    ];
    if vtep_cidr_is_wider(opts.vtep_ip, opts.vtep_cidr) {
        args.push(format!(
            "--dhcp-option=option:classless-static-route,{},{}",
            opts.vtep_cidr, opts.gateway
        ));
    }
    Ok(args)
}

fn mac_lowercase(mac: MacAddress) -> String {
    mac.to_string().to_lowercase()
}
