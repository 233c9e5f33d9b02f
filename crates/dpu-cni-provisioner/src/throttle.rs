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

/// Rate limit for `netplan apply`, which briefly drops host networking while
/// it re-creates the bridge.
#[derive(Debug, Clone)]
pub struct ApplyThrottle {
    cooldown: Duration,
    last_applied: Option<Instant>,
}

impl ApplyThrottle {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_applied: None,
        }
    }

    /// Whether the action may run at `now`. The first call always may.
    pub fn is_ready(&self, now: Instant) -> bool {
        match self.last_applied {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
        }
    }

    /// Record that the action was issued at `now`, whatever its outcome.
    pub fn record(&mut self, now: Instant) {
        self.last_applied = Some(now);
    }

    /// Time left before the action may run again.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_applied {
            None => Duration::ZERO,
            Some(last) => self
                .cooldown
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }
}
