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

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use courier_mailer::{Mailbox, Message};
use figment::Figment;
use tokio::io::AsyncReadExt;
use tracing::{info, info_span, Instrument};

use crate::util::mailer_from_figment;

#[derive(Parser, Debug)]
pub(super) struct Options {
    /// Recipient of the email. Can be repeated
    #[arg(long, required = true)]
    to: Vec<Mailbox>,

    /// Carbon copy recipient. Can be repeated
    #[arg(long)]
    cc: Vec<Mailbox>,

    /// Sender of the email, defaults to the configured `default_sender`
    #[arg(long)]
    from: Option<Mailbox>,

    /// Subject line
    #[arg(short, long)]
    subject: String,

    /// Plain text body. Read from stdin if neither this nor `--html` is set
    #[arg(long)]
    body: Option<String>,

    /// HTML body
    #[arg(long)]
    html: Option<String>,

    /// Add the email to the maildir queue instead of sending it right away
    #[arg(long)]
    queue: bool,
}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        let span = info_span!("cli.send", queue = self.queue);
        async move {
            let (_config, mailer) = mailer_from_figment(figment)?;

            let body = if self.body.is_none() && self.html.is_none() {
                let mut body = String::new();
                tokio::io::stdin()
                    .read_to_string(&mut body)
                    .await
                    .context("could not read the body from stdin")?;
                Some(body)
            } else {
                self.body
            };

            let mut message = Message {
                subject: self.subject,
                sender: self.from,
                recipients: self.to,
                cc: self.cc,
                body,
                html: self.html,
                ..Message::default()
            };

            let message_id = if self.queue {
                mailer
                    .send_to_queue(&mut message)
                    .await
                    .context("could not queue the email")?
            } else {
                mailer
                    .send(&mut message)
                    .await
                    .context("could not send the email")?
            };

            info!(
                message_id = message_id.as_deref(),
                from = message.sender.as_ref().map(tracing::field::display),
                "Email {}",
                if self.queue { "queued" } else { "sent" }
            );

            Ok(ExitCode::SUCCESS)
        }
        .instrument(span)
        .await
    }
}
