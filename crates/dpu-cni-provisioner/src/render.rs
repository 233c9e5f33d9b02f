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

//! Config files the provisioner owns on the DPU filesystem.

use std::fs;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use ipnetwork::Ipv4Network;

use crate::error::ProvisionerError;

/// Gateway options read by ovnkube-node.
pub const OVN_K8S_CONF_PATH: &str = "etc/openvswitch/ovn_k8s.conf";

/// Netplan definition of the overlay bridge, used when its address comes from
/// an external DHCP server.
pub const NETPLAN_BR_OVN_PATH: &str = "etc/netplan/80-br-ovn.yaml";

const NETPLAN_BR_OVN: &str = r#"
network:
  renderer: networkd
  version: 2
  bridges:
    br-ovn:
      dhcp4: yes
      dhcp4-overrides:
        use-dns: no
      openvswitch: {}
"#;

pub fn ovn_gateway_stanza(next_hop: Ipv4Addr, router_subnet: Ipv4Network) -> String {
    format!("[Gateway]\nnext-hop={next_hop}\nrouter-subnet={router_subnet}\n")
}

pub fn netplan_br_ovn() -> &'static str {
    NETPLAN_BR_OVN
}

/// Writes files relative to a root directory, `/` outside of tests.
#[derive(Debug, Clone)]
pub struct FileWriter {
    root: PathBuf,
}

impl Default for FileWriter {
    fn default() -> Self {
        Self::new("/")
    }
}

impl FileWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Replace the file at `relative` with `contents`.
    /// Returns true if the file has changes, false otherwise.
    pub fn write(&self, relative: &str, contents: &str) -> Result<bool, ProvisionerError> {
        let path = self.path(relative);

        if let Ok(current) = fs::read_to_string(&path)
            && current == contents
        {
            return Ok(false);
        }

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| ProvisionerError::io("fs::create_dir_all", dir, e))?;
        }

        // Readers never see a half written file
        let mut path_tmp = path.clone().into_os_string();
        path_tmp.push(".TMP");
        let path_tmp = PathBuf::from(path_tmp);
        fs::write(&path_tmp, contents)
            .map_err(|e| ProvisionerError::io("fs::write", &path_tmp, e))?;
        fs::rename(&path_tmp, &path).map_err(|e| ProvisionerError::io("fs::rename", &path, e))?;

        tracing::debug!(path = %path.display(), "Wrote new config");
        Ok(true)
    }
}
