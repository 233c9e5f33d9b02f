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

use std::time::{Duration, Instant};

use dpu_cni_provisioner::{DpuCniProvisioner, ProvisionerError};
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub struct MainLoop {
    provisioner: DpuCniProvisioner,
    run_interval: Duration,
    cancel: CancellationToken,
    pass: u64,
}

impl MainLoop {
    pub fn new(
        provisioner: DpuCniProvisioner,
        run_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provisioner,
            run_interval,
            cancel,
            pass: 0,
        }
    }

    /// Runs a pass every `run_interval` until TERM or INT, or until a pass
    /// fails in a way only a restart fixes. The signal also cancels any
    /// Kubernetes call of the pass in flight.
    pub async fn run(&mut self) -> Result<(), eyre::Report> {
        let mut term_signal = signal(SignalKind::terminate())?;
        let mut int_signal = signal(SignalKind::interrupt())?;
        let cancel = self.cancel.clone();
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::select! {
                    _ = term_signal.recv() => tracing::info!("TERM signal received"),
                    _ = int_signal.recv() => tracing::info!("INT signal received"),
                }
                cancel.cancel();
            }
        });

        let mut interval = tokio::time::interval(self.run_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    // Other errors are logged and the next tick tries again
                    if let Err(err) = self.run_single_pass().await
                        && err.is_fatal()
                    {
                        cancel.cancel();
                        return Err(eyre::Report::new(err)
                            .wrap_err("unrecoverable provisioning failure, exiting"));
                    }
                }
            }
        }

        tracing::info!("Clean exit");
        Ok(())
    }

    /// One pass, logged. The error is returned for `--once`.
    pub async fn run_single_pass(&mut self) -> Result<(), ProvisionerError> {
        self.pass += 1;
        let span = tracing::info_span!(
            "run_once",
            pass = self.pass,
            node = %self.provisioner.config().node_name
        );

        let start = Instant::now();
        let result = self.provisioner.run_once().instrument(span.clone()).await;
        let _guard = span.enter();
        match &result {
            Ok(()) => {
                tracing::debug!(elapsed = ?start.elapsed(), "Provisioning pass complete");
            }
            Err(err) if err.is_fatal() => {
                tracing::error!(error = format!("{err:#}"), "Provisioning pass failed");
            }
            Err(err) if err.is_transient() => {
                tracing::info!(error = %err, "Provisioning pass incomplete, will retry");
            }
            Err(err) => {
                tracing::warn!(error = format!("{err:#}"), "Provisioning pass failed");
            }
        }
        result
    }
}
