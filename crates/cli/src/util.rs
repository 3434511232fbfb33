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

use anyhow::Context;
use courier_config::{ConfigurationSectionExt, MailerConfig};
use courier_mailer::{transport::TransportKind, Mailer};
use figment::Figment;
use tracing::info;

pub fn mailer_from_figment(figment: &Figment) -> Result<(MailerConfig, Mailer), anyhow::Error> {
    let config =
        MailerConfig::extract_or_default(figment).context("could not load the mail configuration")?;

    let mailer = Mailer::from_config(&config);
    let transport = mailer.transport();
    let kind = match transport.kind() {
        TransportKind::Plain if transport.force_tls() => "plain+starttls",
        TransportKind::Plain => "plain",
        TransportKind::Secured { .. } => "tls",
    };

    info!(
        host = transport.host(),
        port = transport.port(),
        kind,
        queue_path = mailer.queue_path().map(tracing::field::display),
        "Mailer ready"
    );

    Ok((config, mailer))
}
