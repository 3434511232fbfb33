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

//! Direct and queued delivery paths

use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use lettre::{address::Envelope, message::Mailbox};
use tokio::{fs, io::AsyncWriteExt};

use crate::{transport::SmtpTransport, Error};

fn message_id(email: &lettre::Message) -> Option<String> {
    email
        .headers()
        .get_raw("Message-ID")
        .map(|id| id.trim().to_owned())
}

/// Sends emails right away through a SMTP relay
#[derive(Debug, Clone)]
pub struct DirectDelivery {
    transport: SmtpTransport,
}

impl DirectDelivery {
    /// Deliver through the given transport
    #[must_use]
    pub fn new(transport: SmtpTransport) -> Self {
        Self { transport }
    }

    /// The transport used for delivery
    #[must_use]
    pub fn transport(&self) -> &SmtpTransport {
        &self.transport
    }

    /// Send the email, returning its `Message-ID`
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope is invalid or if the relay could not
    /// be reached or refused the email
    pub async fn send(
        &self,
        sender: &Mailbox,
        recipients: &[Mailbox],
        email: &lettre::Message,
    ) -> Result<Option<String>, Error> {
        let envelope = Envelope::new(
            Some(sender.email.clone()),
            recipients.iter().map(|r| r.email.clone()).collect(),
        )?;

        if self.transport.debug() > 0 {
            tracing::info!(?envelope, "Sending email");
        }

        let response = self.transport.send_raw(&envelope, &email.formatted()).await?;
        tracing::debug!(code = %response.code(), "Relay accepted the email");

        Ok(message_id(email))
    }
}

/// Drops emails in a maildir, for another process to send them later
///
/// Each email is prefixed with `X-Actually-From` and `X-Actually-To` headers
/// holding its envelope, written to `tmp/` and then moved to `new/`.
#[derive(Debug, Clone)]
pub struct QueuedDelivery {
    path: Utf8PathBuf,
}

impl QueuedDelivery {
    /// Queue emails in the maildir at `path`. The directory is only created
    /// on the first delivery.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The maildir location
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Add the email to the queue, returning its `Message-ID`
    ///
    /// # Errors
    ///
    /// Returns an error if the maildir could not be created or written to
    pub async fn send(
        &self,
        sender: &Mailbox,
        recipients: &[Mailbox],
        email: &lettre::Message,
    ) -> Result<Option<String>, std::io::Error> {
        let tmp = self.path.join("tmp");
        let new = self.path.join("new");
        for dir in [&tmp, &new, &self.path.join("cur")] {
            fs::create_dir_all(dir).await?;
        }

        let recipients = recipients
            .iter()
            .map(|r| r.email.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let mut contents = format!(
            "X-Actually-From: {}\r\nX-Actually-To: {recipients}\r\n",
            sender.email
        )
        .into_bytes();
        contents.extend_from_slice(&email.formatted());

        let name = unique_name();
        let tmp_path = tmp.join(&name);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .await?;
        file.write_all(&contents).await?;
        file.sync_all().await?;
        drop(file);

        let new_path = new.join(&name);
        fs::rename(&tmp_path, &new_path).await?;
        tracing::debug!(path = %new_path, "Queued email");

        Ok(message_id(email))
    }
}

/// `<seconds>.<pid>_<random>.<hostname>`, with the characters maildir readers
/// split on escaped in the hostname
fn unique_name() -> String {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let pid = std::process::id();
    let random: u64 = rand::random();
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_owned())
        .replace('/', "\\057")
        .replace(':', "\\072");

    format!("{seconds}.{pid}_{random}.{host}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailbox(address: &str) -> Mailbox {
        address.parse().unwrap()
    }

    fn email() -> lettre::Message {
        lettre::Message::builder()
            .from(mailbox("noreply@example.com"))
            .to(mailbox("alice@example.com"))
            .subject("Hello")
            .message_id(Some("<hello@example.com>".to_owned()))
            .body(String::from("Hi Alice"))
            .unwrap()
    }

    #[tokio::test]
    async fn queue_writes_to_new() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("queue")).unwrap();
        let queue = QueuedDelivery::new(path.clone());

        let id = queue
            .send(
                &mailbox("noreply@example.com"),
                &[mailbox("alice@example.com"), mailbox("bob@example.com")],
                &email(),
            )
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("<hello@example.com>"));

        assert!(path.join("cur").is_dir());
        assert_eq!(std::fs::read_dir(path.join("tmp")).unwrap().count(), 0);

        let entries: Vec<_> = std::fs::read_dir(path.join("new"))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 1);

        let contents = std::fs::read_to_string(entries[0].path()).unwrap();
        assert!(contents.starts_with(
            "X-Actually-From: noreply@example.com\r\nX-Actually-To: alice@example.com, bob@example.com\r\n"
        ));
        assert!(contents.contains("Subject: Hello\r\n"));
        assert!(contents.contains("Hi Alice"));
    }

    #[tokio::test]
    async fn queue_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_owned()).unwrap();
        let queue = QueuedDelivery::new(path.clone());

        for _ in 0..3 {
            queue
                .send(
                    &mailbox("noreply@example.com"),
                    &[mailbox("alice@example.com")],
                    &email(),
                )
                .await
                .unwrap();
        }

        assert_eq!(std::fs::read_dir(path.join("new")).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn queue_errors_are_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the maildir should be
        let path = dir.path().join("queue");
        std::fs::write(&path, b"").unwrap();
        let queue = QueuedDelivery::new(Utf8PathBuf::from_path_buf(path).unwrap());

        let result = queue
            .send(
                &mailbox("noreply@example.com"),
                &[mailbox("alice@example.com")],
                &email(),
            )
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn unique_name_layout() {
        let name = unique_name();
        let mut parts = name.splitn(3, '.');
        assert!(parts.next().unwrap().parse::<u64>().is_ok());
        let (pid, random) = parts.next().unwrap().split_once('_').unwrap();
        assert_eq!(pid.parse::<u32>().unwrap(), std::process::id());
        assert!(random.parse::<u64>().is_ok());
        assert!(!parts.next().unwrap().contains('/'));
    }
}
