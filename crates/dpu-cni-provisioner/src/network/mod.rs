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

//! Host network primitives.
//!
//! Everything the provisioner does to addresses, routes and policy rules goes
//! through [`NetworkHelper`], so the convergence logic can run against a fake.

mod ip_command;

use std::net::Ipv4Addr;

use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use mac_address::MacAddress;

pub use self::ip_command::IpCommandNetworkHelper;
use crate::error::ProvisionerError;

#[async_trait]
pub trait NetworkHelper: Send + Sync {
    /// Whether `addr` (address and prefix) is assigned to `link`.
    async fn link_ip_address_exists(
        &self,
        link: &str,
        addr: Ipv4Network,
    ) -> Result<bool, ProvisionerError>;

    async fn set_link_ip_address(
        &self,
        link: &str,
        addr: Ipv4Network,
    ) -> Result<(), ProvisionerError>;

    async fn set_link_up(&self, link: &str) -> Result<(), ProvisionerError>;

    /// Whether a route to `dst` via `gateway` out of `device` exists in `table`
    /// (the main table when `None`).
    async fn route_exists(
        &self,
        dst: Ipv4Network,
        gateway: Ipv4Addr,
        device: &str,
        table: Option<u32>,
    ) -> Result<bool, ProvisionerError>;

    async fn add_route(
        &self,
        dst: Ipv4Network,
        gateway: Ipv4Addr,
        device: &str,
        metric: Option<u32>,
        table: Option<u32>,
    ) -> Result<(), ProvisionerError>;

    /// Whether a rule sending traffic sourced from `src` to `table` exists at
    /// `priority`.
    async fn rule_exists(
        &self,
        src: Ipv4Network,
        table: u32,
        priority: u32,
    ) -> Result<bool, ProvisionerError>;

    async fn add_rule(
        &self,
        src: Ipv4Network,
        table: u32,
        priority: u32,
    ) -> Result<(), ProvisionerError>;

    /// Gateway the kernel would use to reach `dst`.
    async fn get_gateway(&self, dst: Ipv4Network) -> Result<Ipv4Addr, ProvisionerError>;

    /// IPv4 addresses currently assigned to `link`.
    async fn get_link_ip_addresses(&self, link: &str)
    -> Result<Vec<Ipv4Network>, ProvisionerError>;

    /// MAC address of host physical function `pf_index` as seen from the DPU.
    async fn get_host_pf_mac_address(&self, pf_index: u32)
    -> Result<MacAddress, ProvisionerError>;
}

/// The network an address belongs to, e.g. `192.168.1.1/24` -> `192.168.1.0/24`.
pub fn containing_network(addr: Ipv4Network) -> Ipv4Network {
    // Prefix is already known to be valid.
    Ipv4Network::new(addr.network(), addr.prefix()).unwrap_or(addr)
}

/// `0.0.0.0/0`
pub fn default_route() -> Ipv4Network {
    Ipv4Network::new(Ipv4Addr::UNSPECIFIED, 0)
        .unwrap_or_else(|_| Ipv4Network::from(Ipv4Addr::UNSPECIFIED))
}

/// The address alone, as a /32.
pub fn host_network(addr: Ipv4Network) -> Ipv4Network {
    Ipv4Network::from(addr.ip())
}
