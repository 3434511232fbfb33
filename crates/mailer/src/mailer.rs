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

//! Send emails, right away or through a queue

use std::sync::Arc;

use async_trait::async_trait;
use camino::Utf8Path;
use courier_config::{MailerConfig, Settings, SettingsError};
use lettre::message::Mailbox;
use thiserror::Error;
use tracing::field::{display, Empty};

use crate::{
    delivery::{DirectDelivery, QueuedDelivery},
    message::{MessageEnvelope, MessageError},
    transport::SmtpTransport,
};

/// Errors returned by [`Mailer`]
#[derive(Debug, Error)]
pub enum Error {
    /// Queued delivery was requested on a mailer without a queue
    #[error("no queue_path provided")]
    NoQueuePath,

    #[error(transparent)]
    Transport(#[from] crate::transport::Error),

    #[error(transparent)]
    Queue(#[from] std::io::Error),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Envelope(#[from] lettre::error::Error),
}

/// The two ways of handing over a message
///
/// Implemented by [`Mailer`], and by [`crate::DummyMailer`] which records
/// messages instead of sending them.
#[async_trait]
pub trait Deliver<M: Send>: Send + Sync {
    /// The error returned when delivery fails
    type Error;

    /// Send the message right away, returning its `Message-ID` if known
    async fn send(&self, message: &mut M) -> Result<Option<String>, Self::Error>;

    /// Queue the message for later delivery, returning its `Message-ID` if
    /// known
    async fn send_to_queue(&self, message: &mut M) -> Result<Option<String>, Self::Error>;
}

struct Prepared {
    sender: Mailbox,
    recipients: Vec<Mailbox>,
    email: lettre::Message,
}

/// Sends messages through a SMTP relay, or drops them in a maildir queue
#[derive(Clone)]
pub struct Mailer {
    inner: Arc<MailerInner>,
}

struct MailerInner {
    direct: DirectDelivery,
    queue: Option<QueuedDelivery>,
    default_sender: Option<Mailbox>,
}

impl Mailer {
    /// Constructs a new [`Mailer`] out of its delivery paths
    #[must_use]
    pub fn new(
        direct: DirectDelivery,
        queue: Option<QueuedDelivery>,
        default_sender: Option<Mailbox>,
    ) -> Self {
        let inner = MailerInner {
            direct,
            queue,
            default_sender,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Constructs a new [`Mailer`] from a config. This never fails: a bad
    /// relay or unreadable key only shows up when sending.
    #[must_use]
    pub fn from_config(config: &MailerConfig) -> Self {
        let transport = SmtpTransport::from_config(config);
        let queue = config.queue_path().cloned().map(QueuedDelivery::new);

        Self::new(
            DirectDelivery::new(transport),
            queue,
            config.default_sender.clone(),
        )
    }

    /// Constructs a new [`Mailer`] from a flat settings map, keeping only the
    /// keys starting with `prefix`
    ///
    /// # Errors
    ///
    /// Returns an error if one of the settings has an invalid value
    pub fn from_settings(settings: Option<&Settings>, prefix: &str) -> Result<Self, SettingsError> {
        let config = MailerConfig::from_settings(settings, prefix)?;
        Ok(Self::from_config(&config))
    }

    /// The transport used for direct delivery
    #[must_use]
    pub fn transport(&self) -> &SmtpTransport {
        self.inner.direct.transport()
    }

    /// The maildir used for queued delivery, if any
    #[must_use]
    pub fn queue_path(&self) -> Option<&Utf8Path> {
        self.inner.queue.as_ref().map(QueuedDelivery::path)
    }

    /// The sender used for messages which don't have one
    #[must_use]
    pub fn default_sender(&self) -> Option<&Mailbox> {
        self.inner.default_sender.as_ref()
    }

    /// Fill in the default sender, then gather what the delivery paths need.
    /// The sender stays set on the message even if this fails.
    fn prepare<M: MessageEnvelope>(&self, message: &mut M) -> Result<Prepared, Error> {
        if message.sender().is_none() {
            if let Some(sender) = &self.inner.default_sender {
                message.set_sender(sender.clone());
            }
        }

        let email = message.to_message()?;
        let sender = message
            .sender()
            .cloned()
            .ok_or(MessageError::MissingSender)?;
        let recipients = message.recipients();

        let span = tracing::Span::current();
        span.record("email.from", display(&sender.email));
        span.record("email.recipients", recipients.len());

        Ok(Prepared {
            sender,
            recipients,
            email,
        })
    }

    /// Send a message right away
    ///
    /// # Errors
    ///
    /// Will return `Err` if the message is incomplete, or if the relay could
    /// not be reached or refused it
    #[tracing::instrument(
        name = "mailer.send",
        skip_all,
        fields(email.from = Empty, email.recipients = Empty),
        err,
    )]
    pub async fn send<M: MessageEnvelope + Send>(
        &self,
        message: &mut M,
    ) -> Result<Option<String>, Error> {
        let prepared = self.prepare(message)?;
        self.inner
            .direct
            .send(&prepared.sender, &prepared.recipients, &prepared.email)
            .await
    }

    /// Add a message to the maildir queue
    ///
    /// # Errors
    ///
    /// Will return [`Error::NoQueuePath`] without touching the message if the
    /// mailer has no queue, or `Err` if the message is incomplete or could not
    /// be written
    #[tracing::instrument(
        name = "mailer.send_to_queue",
        skip_all,
        fields(email.from = Empty, email.recipients = Empty),
        err,
    )]
    pub async fn send_to_queue<M: MessageEnvelope + Send>(
        &self,
        message: &mut M,
    ) -> Result<Option<String>, Error> {
        let Some(queue) = &self.inner.queue else {
            return Err(Error::NoQueuePath);
        };

        let prepared = self.prepare(message)?;
        let id = queue
            .send(&prepared.sender, &prepared.recipients, &prepared.email)
            .await?;
        Ok(id)
    }

    /// Test the connection to the relay
    ///
    /// # Errors
    ///
    /// Returns an error if the connection failed
    #[tracing::instrument(name = "mailer.test_connection", skip_all, err)]
    pub async fn test_connection(&self) -> Result<bool, crate::transport::Error> {
        self.transport().test_connection().await
    }
}

#[async_trait]
impl<M: MessageEnvelope + Send> Deliver<M> for Mailer {
    type Error = Error;

    async fn send(&self, message: &mut M) -> Result<Option<String>, Self::Error> {
        Mailer::send(self, message).await
    }

    async fn send_to_queue(&self, message: &mut M) -> Result<Option<String>, Self::Error> {
        Mailer::send_to_queue(self, message).await
    }
}
