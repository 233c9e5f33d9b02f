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

use std::sync::Arc;

use dpu_cni_provisioner::{
    AgentConfig, DpuCniProvisioner, IpCommandNetworkHelper, KubeNodeRepository, SystemClock,
    TokioCommandExecutor, VsctlOvsClient,
};
use eyre::WrapErr;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::prelude::*;

use crate::command_line::Options;
use crate::main_loop::MainLoop;

mod command_line;
mod main_loop;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let options = Options::load();
    if options.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
        .add_directive("kube=warn".parse()?)
        .add_directive("tower=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("rustls=warn".parse()?);

    tracing_subscriber::registry()
        .with(Layer::default().compact())
        .with(env_filter)
        .init();

    let agent_config = AgentConfig::load(options.config_path.as_deref())?;
    let config = agent_config
        .provisioner_config()
        .wrap_err("invalid provisioner configuration")?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        node = %config.node_name,
        mode = ?agent_config.ipam_mode,
        "Starting"
    );

    let cancel = CancellationToken::new();
    let nodes = KubeNodeRepository::new(cancel.clone())
        .await
        .wrap_err("failed to create Kubernetes client")?;

    let provisioner = DpuCniProvisioner::new(
        config,
        Arc::new(IpCommandNetworkHelper::new(
            TokioCommandExecutor,
            &agent_config.sysfs_root,
        )),
        Arc::new(VsctlOvsClient::new(TokioCommandExecutor)),
        Arc::new(TokioCommandExecutor),
        Arc::new(SystemClock),
        Arc::new(nodes),
    )
    .with_filesystem_root(&agent_config.filesystem_root);

    let mut main_loop = MainLoop::new(provisioner, agent_config.run_interval(), cancel);
    if options.once {
        main_loop.run_single_pass().await?;
        return Ok(());
    }
    main_loop.run().await
}
