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

//! Diagnostic utility to check the health of the mail setup

use std::process::ExitCode;

use clap::Parser;
use courier_config::MailerConfig;
use courier_mailer::{
    transport::{TlsMode, TransportKind},
    SmtpTransport,
};
use figment::Figment;
use tracing::{error, info, info_span, warn, Instrument};

use crate::util::mailer_from_figment;

#[derive(Parser, Debug)]
pub(super) struct Options {}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        let span = info_span!("cli.doctor");
        async move {
            info!("💡 Running diagnostics against the configured SMTP server and mail queue");

            let (config, mailer) = mailer_from_figment(figment)?;
            let transport = mailer.transport();
            let mut healthy = true;

            if config.keyfile.is_some() && config.certfile.is_none() {
                error!("❌ `mail.keyfile` is set without `mail.certfile`");
                healthy = false;
            }

            if matches!(transport.kind(), TransportKind::Plain)
                && (config.keyfile.is_some() || config.certfile.is_some())
            {
                warn!(
                    "⚠️ A client key or certificate is configured but `mail.ssl` is off, they will not be used"
                );
            }

            if credentials_in_clear(&config, transport) {
                warn!(
                    "⚠️ Credentials are configured but TLS is off, they will be sent in clear text"
                );
            }

            match mailer.test_connection().await {
                Ok(true) => info!(
                    host = transport.host(),
                    port = transport.port(),
                    "✅ The SMTP server is reachable"
                ),
                Ok(false) => {
                    error!(
                        host = transport.host(),
                        port = transport.port(),
                        "❌ The SMTP server did not answer the connection test"
                    );
                    healthy = false;
                }
                Err(e) => {
                    error!(
                        host = transport.host(),
                        port = transport.port(),
                        error = &e as &dyn std::error::Error,
                        "❌ Could not connect to the SMTP server"
                    );
                    healthy = false;
                }
            }

            if let Some(path) = mailer.queue_path() {
                match tokio::fs::metadata(path).await {
                    Ok(meta) if !meta.is_dir() => {
                        error!(%path, "❌ The mail queue path is not a directory");
                        healthy = false;
                    }
                    Ok(meta) if meta.permissions().readonly() => {
                        error!(%path, "❌ The mail queue directory is read-only");
                        healthy = false;
                    }
                    Ok(_) => info!(%path, "✅ The mail queue directory exists"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        info!(%path, "💡 The mail queue directory will be created on first use");
                    }
                    Err(e) => {
                        error!(
                            %path,
                            error = &e as &dyn std::error::Error,
                            "❌ Could not inspect the mail queue directory"
                        );
                        healthy = false;
                    }
                }
            } else {
                info!("💡 No `mail.queue_path` configured, queued delivery is disabled");
            }

            if mailer.default_sender().is_none() {
                warn!(
                    "⚠️ No `mail.default_sender` configured, every message must carry its own sender"
                );
            }

            Ok(if healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        .instrument(span)
        .await
    }
}

/// Whether the credentials would go over a connection which is never encrypted
fn credentials_in_clear(config: &MailerConfig, transport: &SmtpTransport) -> bool {
    config.credentials().is_some() && matches!(transport.tls_mode(), TlsMode::Disabled)
}
