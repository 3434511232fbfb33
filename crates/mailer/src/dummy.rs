// Copyright 2024 The Courier Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! In-memory stand-in for [`crate::Mailer`]

use std::convert::Infallible;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{mailer::Deliver, Message};

/// A mailer which never sends anything, and keeps track of what it was given
/// instead. Meant to be used in tests.
///
/// Messages are recorded as they were handed over: no validation is done and
/// no default sender is applied.
pub struct DummyMailer<M = Message> {
    outbox: RwLock<Vec<M>>,
    queue: RwLock<Vec<M>>,
}

impl<M> Default for DummyMailer<M> {
    fn default() -> Self {
        Self {
            outbox: RwLock::new(Vec::new()),
            queue: RwLock::new(Vec::new()),
        }
    }
}

impl<M: Clone> DummyMailer<M> {
    /// Create a new mailer with an empty outbox and queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages passed to [`Deliver::send`], oldest first
    pub async fn outbox(&self) -> Vec<M> {
        self.outbox.read().await.clone()
    }

    /// Messages passed to [`Deliver::send_to_queue`], oldest first
    pub async fn queue(&self) -> Vec<M> {
        self.queue.read().await.clone()
    }
}

#[async_trait]
impl<M: Clone + Send + Sync> Deliver<M> for DummyMailer<M> {
    type Error = Infallible;

    async fn send(&self, message: &mut M) -> Result<Option<String>, Self::Error> {
        self.outbox.write().await.push(message.clone());
        Ok(None)
    }

    async fn send_to_queue(&self, message: &mut M) -> Result<Option<String>, Self::Error> {
        self.queue.write().await.push(message.clone());
        Ok(None)
    }
}
