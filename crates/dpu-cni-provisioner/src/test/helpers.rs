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

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use k8s_openapi::api::core::v1::Node;
use kube::core::ObjectMeta;
use mac_address::MacAddress;
use temp_dir::TempDir;

use crate::clock::Clock;
use crate::config::{ExternalIpam, InternalIpam, IpamMode, ProvisionerConfig};
use crate::error::ProvisionerError;
use crate::exec::{ChildProcess, CommandExecutor, CommandOutput, ProcessState, pretty_cmd};
use crate::network::NetworkHelper;
use crate::ovs::OvsClient;
use crate::provisioner::{DPU_NODE_NAME_LABEL, DpuCniProvisioner};
use crate::repository::NodeRepository;

pub(crate) const DPU_NODE: &str = "dpu-node-1";
pub(crate) const HOST_NODE: &str = "host-node-1";

pub(crate) fn net(s: &str) -> Ipv4Network {
    s.parse().unwrap()
}

pub(crate) fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FakeRoute {
    pub dst: Ipv4Network,
    pub gateway: Ipv4Addr,
    pub device: String,
    pub metric: Option<u32>,
    pub table: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FakeRule {
    pub src: Ipv4Network,
    pub table: u32,
    pub priority: u32,
}

#[derive(Default)]
pub(crate) struct NetworkState {
    pub addresses: BTreeMap<String, Vec<Ipv4Network>>,
    pub links_up: Vec<String>,
    pub routes: Vec<FakeRoute>,
    pub rules: Vec<FakeRule>,
    /// Destination -> gateway the kernel would pick.
    pub gateways: BTreeMap<Ipv4Network, Ipv4Addr>,
    pub pf_macs: BTreeMap<u32, MacAddress>,
    /// Mutating calls, in order.
    pub mutations: Vec<String>,
}

/// Kernel stand-in. Mutations change the state later queries see.
#[derive(Clone, Default)]
pub(crate) struct FakeNetwork {
    pub state: Arc<Mutex<NetworkState>>,
}

impl FakeNetwork {
    pub fn with_address(self, link: &str, addr: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .addresses
            .entry(link.to_string())
            .or_default()
            .push(net(addr));
        self
    }

    pub fn with_gateway(self, dst: &str, gateway: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .gateways
            .insert(net(dst), ip(gateway));
        self
    }

    pub fn with_pf_mac(self, pf_index: u32, mac: [u8; 6]) -> Self {
        self.state
            .lock()
            .unwrap()
            .pf_macs
            .insert(pf_index, MacAddress::new(mac));
        self
    }

    pub fn set_addresses(&self, link: &str, addrs: &[&str]) {
        self.state
            .lock()
            .unwrap()
            .addresses
            .insert(link.to_string(), addrs.iter().map(|a| net(a)).collect());
    }

    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn routes(&self) -> Vec<FakeRoute> {
        self.state.lock().unwrap().routes.clone()
    }

    pub fn rules(&self) -> Vec<FakeRule> {
        self.state.lock().unwrap().rules.clone()
    }

    pub fn addresses(&self, link: &str) -> Vec<Ipv4Network> {
        self.state
            .lock()
            .unwrap()
            .addresses
            .get(link)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl NetworkHelper for FakeNetwork {
    async fn link_ip_address_exists(
        &self,
        link: &str,
        addr: Ipv4Network,
    ) -> Result<bool, ProvisionerError> {
        Ok(self.addresses(link).contains(&addr))
    }

    async fn set_link_ip_address(
        &self,
        link: &str,
        addr: Ipv4Network,
    ) -> Result<(), ProvisionerError> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(format!("addr add {addr} dev {link}"));
        state
            .addresses
            .entry(link.to_string())
            .or_default()
            .push(addr);
        Ok(())
    }

    async fn set_link_up(&self, link: &str) -> Result<(), ProvisionerError> {
        // Idempotent in the kernel too, not counted as a mutation
        let mut state = self.state.lock().unwrap();
        if !state.links_up.iter().any(|l| l == link) {
            state.links_up.push(link.to_string());
        }
        Ok(())
    }

    async fn route_exists(
        &self,
        dst: Ipv4Network,
        gateway: Ipv4Addr,
        device: &str,
        table: Option<u32>,
    ) -> Result<bool, ProvisionerError> {
        Ok(self.state.lock().unwrap().routes.iter().any(|r| {
            r.dst == dst && r.gateway == gateway && r.device == device && r.table == table
        }))
    }

    async fn add_route(
        &self,
        dst: Ipv4Network,
        gateway: Ipv4Addr,
        device: &str,
        metric: Option<u32>,
        table: Option<u32>,
    ) -> Result<(), ProvisionerError> {
        let mut state = self.state.lock().unwrap();
        state
            .mutations
            .push(format!("route add {dst} via {gateway} dev {device}"));
        state.routes.push(FakeRoute {
            dst,
            gateway,
            device: device.to_string(),
            metric,
            table,
        });
        Ok(())
    }

    async fn rule_exists(
        &self,
        src: Ipv4Network,
        table: u32,
        priority: u32,
    ) -> Result<bool, ProvisionerError> {
        let wanted = FakeRule {
            src,
            table,
            priority,
        };
        Ok(self.state.lock().unwrap().rules.contains(&wanted))
    }

    async fn add_rule(
        &self,
        src: Ipv4Network,
        table: u32,
        priority: u32,
    ) -> Result<(), ProvisionerError> {
        let mut state = self.state.lock().unwrap();
        state
            .mutations
            .push(format!("rule add from {src} table {table} priority {priority}"));
        state.rules.push(FakeRule {
            src,
            table,
            priority,
        });
        Ok(())
    }

    async fn get_gateway(&self, dst: Ipv4Network) -> Result<Ipv4Addr, ProvisionerError> {
        self.state
            .lock()
            .unwrap()
            .gateways
            .get(&dst)
            .copied()
            .ok_or(ProvisionerError::NoGateway { destination: dst })
    }

    async fn get_link_ip_addresses(
        &self,
        link: &str,
    ) -> Result<Vec<Ipv4Network>, ProvisionerError> {
        Ok(self.addresses(link))
    }

    async fn get_host_pf_mac_address(
        &self,
        pf_index: u32,
    ) -> Result<MacAddress, ProvisionerError> {
        self.state
            .lock()
            .unwrap()
            .pf_macs
            .get(&pf_index)
            .copied()
            .ok_or_else(|| ProvisionerError::parse("PF config", format!("no PF {pf_index}")))
    }
}

/// Records `external_ids` the way OVSDB would hold them.
#[derive(Clone, Default)]
pub(crate) struct FakeOvs {
    pub external_ids: Arc<Mutex<BTreeMap<String, String>>>,
    pub calls: Arc<Mutex<usize>>,
}

impl FakeOvs {
    fn set(&self, key: &str, value: String) {
        *self.calls.lock().unwrap() += 1;
        self.external_ids
            .lock()
            .unwrap()
            .insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.external_ids.lock().unwrap().get(key).cloned()
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl OvsClient for FakeOvs {
    async fn set_ovn_encap_ip(&self, ip: Ipv4Addr) -> Result<(), ProvisionerError> {
        self.set("ovn-encap-ip", ip.to_string());
        Ok(())
    }

    async fn set_kubernetes_host_node_name(&self, name: &str) -> Result<(), ProvisionerError> {
        self.set("host-k8s-nodename", name.to_string());
        Ok(())
    }

    async fn set_host_name(&self, name: &str) -> Result<(), ProvisionerError> {
        self.set("hostname", name.to_string());
        Ok(())
    }
}

/// Records commands. Spawned children stay alive until [`FakeExecutor::kill_all`].
#[derive(Clone, Default)]
pub(crate) struct FakeExecutor {
    pub runs: Arc<Mutex<Vec<String>>>,
    pub spawns: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    children_alive: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl FakeExecutor {
    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }

    pub fn spawns(&self) -> Vec<(String, Vec<String>)> {
        self.spawns.lock().unwrap().clone()
    }

    pub fn kill_all(&self) {
        for alive in self.children_alive.lock().unwrap().iter() {
            alive.store(false, Ordering::SeqCst);
        }
    }
}

struct FakeChild {
    pid: u32,
    alive: Arc<AtomicBool>,
}

impl ChildProcess for FakeChild {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn state(&mut self) -> Result<ProcessState, ProvisionerError> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(ProcessState::Running)
        } else {
            Ok(ProcessState::Exited(Some(1)))
        }
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, ProvisionerError> {
        self.runs.lock().unwrap().push(pretty_cmd(program, args));
        Ok(CommandOutput::default())
    }

    fn spawn(
        &self,
        program: &str,
        args: &[String],
    ) -> Result<Box<dyn ChildProcess>, ProvisionerError> {
        let mut spawns = self.spawns.lock().unwrap();
        spawns.push((program.to_string(), args.to_vec()));
        let alive = Arc::new(AtomicBool::new(true));
        self.children_alive.lock().unwrap().push(alive.clone());
        Ok(Box::new(FakeChild {
            pid: 1000 + spawns.len() as u32,
            alive,
        }))
    }
}

/// Time only moves when told to.
#[derive(Clone)]
pub(crate) struct FakeClock {
    now: Arc<Mutex<Instant>>,
}

impl Default for FakeClock {
    fn default() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }
}

impl FakeClock {
    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

/// Nodes by name. `apply_labels` merges like server-side apply does for a
/// single field manager.
#[derive(Clone, Default)]
pub(crate) struct MemoryNodeRepository {
    pub nodes: Arc<RwLock<BTreeMap<String, Node>>>,
    pub applies: Arc<Mutex<Vec<(String, BTreeMap<String, String>)>>>,
}

impl MemoryNodeRepository {
    pub fn with_node(self, name: &str, labels: &[(&str, &str)]) -> Self {
        let node = Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            ..Default::default()
        };
        self.nodes.write().unwrap().insert(name.to_string(), node);
        self
    }

    pub fn label(&self, node: &str, key: &str) -> Option<String> {
        self.nodes
            .read()
            .unwrap()
            .get(node)
            .and_then(|n| n.metadata.labels.as_ref())
            .and_then(|l| l.get(key))
            .cloned()
    }

    pub fn applies(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.applies.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeRepository for MemoryNodeRepository {
    async fn get(&self, name: &str) -> Result<Option<Node>, ProvisionerError> {
        Ok(self.nodes.read().unwrap().get(name).cloned())
    }

    async fn apply_labels(
        &self,
        name: &str,
        labels: BTreeMap<String, String>,
    ) -> Result<(), ProvisionerError> {
        self.applies
            .lock()
            .unwrap()
            .push((name.to_string(), labels.clone()));
        if let Some(node) = self.nodes.write().unwrap().get_mut(name) {
            node.metadata
                .labels
                .get_or_insert_with(BTreeMap::new)
                .extend(labels);
        }
        Ok(())
    }
}

pub(crate) fn internal_config(vtep_cidr: &str, mtu: u32) -> ProvisionerConfig {
    ProvisionerConfig {
        mode: IpamMode::Internal(InternalIpam {
            vtep_ip: net("192.168.1.1/24"),
            gateway: ip("192.168.1.10"),
            pf_ip: net("192.168.1.2/24"),
        }),
        vtep_cidr: net(vtep_cidr),
        host_cidr: net("10.0.100.0/24"),
        node_name: DPU_NODE.to_string(),
        mtu,
        apply_cooldown: Duration::from_secs(120),
    }
}

pub(crate) fn external_config() -> ProvisionerConfig {
    ProvisionerConfig {
        mode: IpamMode::External(ExternalIpam {
            gateway_discovery_network: net("169.254.99.100/32"),
        }),
        vtep_cidr: net("192.168.1.0/23"),
        host_cidr: net("10.0.100.0/24"),
        node_name: DPU_NODE.to_string(),
        mtu: 1500,
        apply_cooldown: Duration::from_secs(120),
    }
}

/// A DPU with its pod network and out-of-band bridges addressed, as the
/// provisioner finds it after boot.
pub(crate) fn booted_dpu_network() -> FakeNetwork {
    FakeNetwork::default()
        .with_address("cni0", "10.244.6.1/24")
        .with_address("br-comm-ch", "10.0.120.7/22")
        .with_gateway("0.0.0.0/0", "10.0.120.1")
        .with_pf_mac(0, [0, 0, 0, 0, 0, 1])
}

pub(crate) fn labeled_node() -> MemoryNodeRepository {
    MemoryNodeRepository::default().with_node(DPU_NODE, &[(DPU_NODE_NAME_LABEL, HOST_NODE)])
}

/// The provisioner wired to fakes, writing under a temporary root.
pub(crate) struct Harness {
    pub provisioner: DpuCniProvisioner,
    pub network: FakeNetwork,
    pub ovs: FakeOvs,
    pub exec: FakeExecutor,
    pub clock: FakeClock,
    pub nodes: MemoryNodeRepository,
    pub root: TempDir,
}

impl Harness {
    pub fn new(
        config: ProvisionerConfig,
        network: FakeNetwork,
        nodes: MemoryNodeRepository,
    ) -> Self {
        let root = TempDir::with_prefix("dpu-cni-provisioner").unwrap();
        let ovs = FakeOvs::default();
        let exec = FakeExecutor::default();
        let clock = FakeClock::default();
        let provisioner = DpuCniProvisioner::new(
            config,
            Arc::new(network.clone()),
            Arc::new(ovs.clone()),
            Arc::new(exec.clone()),
            Arc::new(clock.clone()),
            Arc::new(nodes.clone()),
        )
        .with_filesystem_root(root.path());
        Self {
            provisioner,
            network,
            ovs,
            exec,
            clock,
            nodes,
            root,
        }
    }

    pub fn read_file(&self, relative: &str) -> String {
        std::fs::read_to_string(self.root.path().join(relative)).unwrap()
    }

    pub fn file_exists(&self, relative: &str) -> bool {
        self.root.path().join(relative).exists()
    }
}
