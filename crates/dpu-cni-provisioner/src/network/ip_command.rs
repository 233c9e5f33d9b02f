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

//! [`NetworkHelper`] implemented with iproute2's JSON output.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use mac_address::MacAddress;
use serde::Deserialize;

use super::{NetworkHelper, containing_network};
use crate::error::ProvisionerError;
use crate::exec::CommandExecutor;

const IP: &str = "ip";

pub struct IpCommandNetworkHelper<E> {
    exec: E,
    sysfs_root: PathBuf,
}

impl<E: CommandExecutor> IpCommandNetworkHelper<E> {
    pub fn new(exec: E, sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            exec,
            sysfs_root: sysfs_root.into(),
        }
    }

    async fn ip<I, S>(&self, args: I) -> Result<String, ProvisionerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        Ok(self.exec.run(IP, &args).await?.stdout)
    }

    fn pf_config_path(&self, pf_index: u32) -> PathBuf {
        self.sysfs_root
            .join("class/net")
            .join(format!("p{pf_index}"))
            .join("smart_nic/pf/config")
    }
}

// These have many more fields, only parse the ones we check

#[derive(Deserialize, Debug)]
struct IpAddrShow {
    #[serde(default)]
    addr_info: Vec<AddrInfo>,
}

#[derive(Deserialize, Debug)]
struct AddrInfo {
    family: String,
    local: String,
    prefixlen: u8,
}

#[derive(Deserialize, Debug)]
struct IpRoute {
    gateway: Option<String>,
    dev: Option<String>,
}

#[derive(Deserialize, Debug)]
struct IpRule {
    priority: u32,
    src: Option<String>,
    srclen: Option<u8>,
    table: Option<String>,
}

fn parse_addresses(json: &str) -> Result<Vec<Ipv4Network>, ProvisionerError> {
    let links: Vec<IpAddrShow> = serde_json::from_str(json)?;
    links
        .iter()
        .flat_map(|l| l.addr_info.iter())
        .filter(|a| a.family == "inet")
        .map(|a| {
            let ip = Ipv4Addr::from_str(&a.local).map_err(|e| {
                ProvisionerError::parse("interface address", format!("{}: {e}", a.local))
            })?;
            Ipv4Network::new(ip, a.prefixlen)
                .map_err(|e| ProvisionerError::parse("interface address", e.to_string()))
        })
        .collect()
}

fn parse_routes(json: &str) -> Result<Vec<IpRoute>, ProvisionerError> {
    Ok(serde_json::from_str(json)?)
}

fn parse_rules(json: &str) -> Result<Vec<IpRule>, ProvisionerError> {
    Ok(serde_json::from_str(json)?)
}

fn route_matches(route: &IpRoute, gateway: Ipv4Addr, device: &str) -> bool {
    route.gateway.as_deref() == Some(gateway.to_string().as_str())
        && route.dev.as_deref() == Some(device)
}

fn rule_matches(rule: &IpRule, src: Ipv4Network, table: u32, priority: u32) -> bool {
    // iproute2 leaves out srclen for host routes
    rule.priority == priority
        && rule.table.as_deref() == Some(table.to_string().as_str())
        && rule.src.as_deref() == Some(src.network().to_string().as_str())
        && rule.srclen.unwrap_or(32) == src.prefix()
}

fn first_gateway(routes: &[IpRoute], dst: Ipv4Network) -> Result<Ipv4Addr, ProvisionerError> {
    let gateway = routes
        .iter()
        .find_map(|r| r.gateway.as_deref())
        .ok_or(ProvisionerError::NoGateway { destination: dst })?;
    Ipv4Addr::from_str(gateway)
        .map_err(|e| ProvisionerError::parse("gateway", format!("{gateway}: {e}")))
}

fn parse_pf_mac(config: &str) -> Result<MacAddress, ProvisionerError> {
    // Lines look like "MAC        : 0c:42:a1:d1:d0:6c"
    let mac = config
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim() == "MAC")
        .map(|(_, v)| v.trim())
        .ok_or_else(|| ProvisionerError::parse("PF config", "no MAC line"))?;
    MacAddress::from_str(mac).map_err(|e| ProvisionerError::parse("PF MAC", format!("{mac}: {e}")))
}

/// Network-address form of `dst`, which is what the kernel accepts and reports.
fn prefix_arg(dst: Ipv4Network) -> String {
    containing_network(dst).to_string()
}

#[async_trait]
impl<E: CommandExecutor> NetworkHelper for IpCommandNetworkHelper<E> {
    async fn link_ip_address_exists(
        &self,
        link: &str,
        addr: Ipv4Network,
    ) -> Result<bool, ProvisionerError> {
        Ok(self.get_link_ip_addresses(link).await?.contains(&addr))
    }

    async fn set_link_ip_address(
        &self,
        link: &str,
        addr: Ipv4Network,
    ) -> Result<(), ProvisionerError> {
        self.ip(["addr", "add", &addr.to_string(), "dev", link])
            .await?;
        Ok(())
    }

    async fn set_link_up(&self, link: &str) -> Result<(), ProvisionerError> {
        self.ip(["link", "set", "dev", link, "up"]).await?;
        Ok(())
    }

    async fn route_exists(
        &self,
        dst: Ipv4Network,
        gateway: Ipv4Addr,
        device: &str,
        table: Option<u32>,
    ) -> Result<bool, ProvisionerError> {
        let mut args = vec!["-4".to_string(), "-j".into(), "route".into(), "show".into()];
        if let Some(table) = table {
            args.extend(["table".to_string(), table.to_string()]);
        }
        args.extend(["exact".to_string(), prefix_arg(dst)]);

        let routes = parse_routes(&self.ip(args).await?)?;
        Ok(routes.iter().any(|r| route_matches(r, gateway, device)))
    }

    async fn add_route(
        &self,
        dst: Ipv4Network,
        gateway: Ipv4Addr,
        device: &str,
        metric: Option<u32>,
        table: Option<u32>,
    ) -> Result<(), ProvisionerError> {
        let mut args = vec![
            "route".to_string(),
            "add".into(),
            prefix_arg(dst),
            "via".into(),
            gateway.to_string(),
            "dev".into(),
            device.into(),
        ];
        if let Some(metric) = metric {
            args.extend(["metric".to_string(), metric.to_string()]);
        }
        if let Some(table) = table {
            args.extend(["table".to_string(), table.to_string()]);
        }
        self.ip(args).await?;
        Ok(())
    }

    async fn rule_exists(
        &self,
        src: Ipv4Network,
        table: u32,
        priority: u32,
    ) -> Result<bool, ProvisionerError> {
        let rules = parse_rules(&self.ip(["-4", "-j", "rule", "show"]).await?)?;
        Ok(rules
            .iter()
            .any(|r| rule_matches(r, containing_network(src), table, priority)))
    }

    async fn add_rule(
        &self,
        src: Ipv4Network,
        table: u32,
        priority: u32,
    ) -> Result<(), ProvisionerError> {
        self.ip([
            "rule".to_string(),
            "add".into(),
            "from".into(),
            prefix_arg(src),
            "table".into(),
            table.to_string(),
            "priority".into(),
            priority.to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn get_gateway(&self, dst: Ipv4Network) -> Result<Ipv4Addr, ProvisionerError> {
        // `ip route get 0.0.0.0` answers with the local route, so the default
        // route is looked up directly.
        let json = if dst.prefix() == 0 {
            self.ip(["-4", "-j", "route", "show", "default"]).await?
        } else {
            self.ip([
                "-4".to_string(),
                "-j".into(),
                "route".into(),
                "get".into(),
                dst.network().to_string(),
            ])
            .await?
        };
        first_gateway(&parse_routes(&json)?, dst)
    }

    async fn get_link_ip_addresses(
        &self,
        link: &str,
    ) -> Result<Vec<Ipv4Network>, ProvisionerError> {
        parse_addresses(&self.ip(["-4", "-j", "addr", "show", "dev", link]).await?)
    }

    async fn get_host_pf_mac_address(
        &self,
        pf_index: u32,
    ) -> Result<MacAddress, ProvisionerError> {
        let path = self.pf_config_path(pf_index);
        let config = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ProvisionerError::io("reading", &path, e))?;
        parse_pf_mac(&config)
    }
}
