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

//! Kubernetes implementation of the Node repository.

use std::collections::BTreeMap;
use std::future::Future;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::traits::*;
use crate::FIELD_MANAGER;
use crate::error::ProvisionerError;

/// Kubernetes-backed implementation of [`NodeRepository`].
///
/// Every call races against the cancellation token, so shutting the agent
/// down does not wait on a slow API server.
#[derive(Clone)]
pub struct KubeNodeRepository {
    client: Client,
    cancel: CancellationToken,
}

impl KubeNodeRepository {
    /// Create a new KubeNodeRepository with the default in-cluster or kubeconfig client.
    pub async fn new(cancel: CancellationToken) -> Result<Self, ProvisionerError> {
        let client = Client::try_default().await?;
        Ok(Self::with_client(client, cancel))
    }

    /// Create a new KubeNodeRepository with a provided client.
    pub fn with_client(client: Client, cancel: CancellationToken) -> Self {
        Self { client, cancel }
    }

    fn api(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }

    async fn cancellable<T, F>(&self, fut: F) -> Result<T, ProvisionerError>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ProvisionerError::Cancelled),
            res = fut => Ok(res?),
        }
    }
}

#[async_trait]
impl NodeRepository for KubeNodeRepository {
    async fn get(&self, name: &str) -> Result<Option<Node>, ProvisionerError> {
        let api = self.api();
        self.cancellable(api.get_opt(name)).await
    }

    async fn apply_labels(
        &self,
        name: &str,
        labels: BTreeMap<String, String>,
    ) -> Result<(), ProvisionerError> {
        let api = self.api();
        let patch = json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": {
                "name": name,
                "labels": labels,
            },
        });
        self.cancellable(api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&patch),
        ))
        .await?;
        Ok(())
    }
}
