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

//! Repository traits for Node operations.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;

use crate::error::ProvisionerError;

/// Repository for the local Node resource.
#[async_trait]
pub trait NodeRepository: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<Node>, ProvisionerError>;

    /// Server-side apply `labels` onto the Node. Labels owned by this field
    /// manager but absent from `labels` are removed by the API server.
    async fn apply_labels(
        &self,
        name: &str,
        labels: BTreeMap<String, String>,
    ) -> Result<(), ProvisionerError>;
}
