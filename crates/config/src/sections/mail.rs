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

use camino::Utf8PathBuf;
use lettre::message::Mailbox;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ConfigurationSection;

fn default_host() -> String {
    "localhost".to_owned()
}

fn default_port() -> u16 {
    25
}

fn is_default_port(port: &u16) -> bool {
    *port == default_port()
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(value: &u8) -> bool {
    *value == 0
}

/// Configuration related to sending emails
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MailerConfig {
    /// Hostname of the SMTP relay
    #[serde(default = "default_host")]
    #[schemars(schema_with = "crate::schema::hostname")]
    pub host: String,

    /// Port of the SMTP relay
    #[serde(default = "default_port", skip_serializing_if = "is_default_port")]
    pub port: u16,

    /// Username used to authenticate against the relay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password used to authenticate against the relay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Require a STARTTLS upgrade of the plain connection. When unset, the
    /// connection is never upgraded.
    #[serde(default, skip_serializing_if = "is_false")]
    pub tls: bool,

    /// Wrap the whole connection in TLS from the first byte
    #[serde(default, skip_serializing_if = "is_false")]
    pub ssl: bool,

    /// PEM private key presented to the relay. Only used with `ssl`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub keyfile: Option<Utf8PathBuf>,

    /// PEM certificate presented to the relay. Only used with `ssl`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub certfile: Option<Utf8PathBuf>,

    /// Maildir used by queued delivery. Queued delivery is disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub queue_path: Option<Utf8PathBuf>,

    /// Address used when a message has no sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::schema::optional_mailbox")]
    pub default_sender: Option<Mailbox>,

    /// Verbosity of the SMTP exchange logging
    #[serde(default, skip_serializing_if = "is_zero")]
    pub debug: u8,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            tls: false,
            ssl: false,
            keyfile: None,
            certfile: None,
            queue_path: None,
            default_sender: None,
            debug: 0,
        }
    }
}

impl ConfigurationSection for MailerConfig {
    const PATH: Option<&'static str> = Some("mail");

    fn validate(&self, figment: &figment::Figment) -> Result<(), figment::Error> {
        let annotate = |mut error: figment::Error, field: &'static str| {
            error.metadata = figment.find_metadata(Self::PATH.unwrap()).cloned();
            error.profile = Some(figment::Profile::Default);
            error.path = vec![Self::PATH.unwrap().to_owned(), field.to_owned()];
            Err(error)
        };

        if self.keyfile.is_some() && self.certfile.is_none() {
            return annotate(
                figment::Error::from("`keyfile` requires a `certfile`".to_owned()),
                "keyfile",
            );
        }

        if !self.ssl && (self.keyfile.is_some() || self.certfile.is_some()) {
            tracing::warn!("`keyfile` and `certfile` are ignored unless `ssl` is set");
        }

        Ok(())
    }
}

impl MailerConfig {
    /// The configured queue path, treating an empty path as absent
    #[must_use]
    pub fn queue_path(&self) -> Option<&Utf8PathBuf> {
        self.queue_path.as_ref().filter(|path| !path.as_str().is_empty())
    }

    /// The username and password pair, if both are set
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.username.as_deref().zip(self.password.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use figment::{
        providers::{Env, Format, Yaml},
        Figment, Jail,
    };

    use super::*;

    #[test]
    fn load_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    mail:
                      host: smtp.example.com
                      port: 465
                      ssl: true
                      certfile: /etc/courier/client.pem
                      queue_path: /var/spool/courier
                      default_sender: Courier <noreply@example.com>
                ",
            )?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let config = MailerConfig::extract(&figment)?;

            assert_eq!(config.host, "smtp.example.com");
            assert_eq!(config.port, 465);
            assert!(config.ssl);
            assert!(!config.tls);
            assert_eq!(
                config.certfile,
                Some(Utf8PathBuf::from("/etc/courier/client.pem"))
            );
            assert_eq!(
                config.queue_path(),
                Some(&Utf8PathBuf::from("/var/spool/courier"))
            );
            assert_eq!(
                config.default_sender.as_ref().map(|m| m.email.to_string()),
                Some("noreply@example.com".to_owned())
            );
            assert_eq!(config.credentials(), None);

            Ok(())
        });
    }

    #[test]
    fn load_config_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("COURIER_MAIL__HOST", "relay.internal");
            jail.set_env("COURIER_MAIL__PORT", "2525");
            jail.set_env("COURIER_MAIL__TLS", "true");

            let figment = Figment::new().merge(Env::prefixed("COURIER_").split("__"));
            let config = MailerConfig::extract(&figment)?;

            assert_eq!(config.host, "relay.internal");
            assert_eq!(config.port, 2525);
            assert!(config.tls);

            Ok(())
        });
    }

    #[test]
    fn keyfile_without_certfile_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    mail:
                      ssl: true
                      keyfile: /etc/courier/client.key
                ",
            )?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let error = MailerConfig::extract(&figment).unwrap_err();
            assert_eq!(error.path, vec!["mail".to_owned(), "keyfile".to_owned()]);

            Ok(())
        });
    }

    #[test]
    fn empty_queue_path_is_absent() {
        let config = MailerConfig {
            queue_path: Some(Utf8PathBuf::new()),
            ..MailerConfig::default()
        };

        assert_eq!(config.queue_path(), None);
    }

    #[test]
    fn defaults() {
        let config = MailerConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 25);
        assert!(!config.tls);
        assert!(!config.ssl);
        assert_eq!(config.debug, 0);
        assert_eq!(config.queue_path(), None);
    }
}
