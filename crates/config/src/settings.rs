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

//! Build a [`MailerConfig`] out of a flat, prefixed settings map, like the
//! ones web frameworks load from their INI files.

use std::collections::{BTreeMap, HashMap};

use figment::{
    providers::Serialized,
    value::{Dict, Value},
    Figment,
};
use thiserror::Error;

use crate::MailerConfig;

/// Prefix used when none is given
pub const DEFAULT_PREFIX: &str = "mail.";

/// Option names understood by [`MailerConfig::from_settings`]
pub const RECOGNIZED_OPTIONS: [&str; 10] = [
    "host",
    "port",
    "username",
    "password",
    "tls",
    "ssl",
    "keyfile",
    "certfile",
    "queue_path",
    "debug",
];

/// A flat settings map
pub type Settings = HashMap<String, String>;

/// Error returned when building a [`MailerConfig`] from settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// One of the recognized options has a value of the wrong type
    #[error(transparent)]
    Extract(#[from] figment::Error),

    /// A key carries the prefix but names no known option
    #[error("unknown mail setting {key:?}")]
    UnknownKey {
        /// The offending key, prefix included
        key: String,
    },
}

/// Keep the recognized `prefix`ed keys of `settings`, with the prefix
/// stripped.
///
/// Everything else is silently dropped, so the same map can hold settings for
/// other components. A missing map behaves like an empty one.
#[must_use]
pub fn settings_kwargs(settings: Option<&Settings>, prefix: &str) -> BTreeMap<String, String> {
    let Some(settings) = settings else {
        return BTreeMap::new();
    };

    RECOGNIZED_OPTIONS
        .iter()
        .filter_map(|name| {
            let value = settings.get(&format!("{prefix}{name}"))?;
            Some(((*name).to_owned(), value.clone()))
        })
        .collect()
}

/// Turn the string value of a typed option into the matching [`Value`].
/// Values which don't parse are left as strings, for the extraction to report.
fn convert(name: &str, value: String) -> Value {
    match name {
        "port" | "debug" => value
            .trim()
            .parse::<u64>()
            .map_or_else(|_| Value::from(value), Value::from),
        "tls" | "ssl" => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Value::from(true),
            "false" | "no" | "off" | "0" => Value::from(false),
            _ => Value::from(value),
        },
        _ => Value::from(value),
    }
}

impl MailerConfig {
    /// Build the configuration from a flat settings map
    ///
    /// Values are strings and are converted to the type each option expects:
    /// `"465"` becomes a port and `"true"` or `"on"` a flag. Other options are
    /// kept as strings, even when they look like numbers. Blank values are
    /// treated as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a recognized option holds a value that can't be
    /// converted
    pub fn from_settings(settings: Option<&Settings>, prefix: &str) -> Result<Self, SettingsError> {
        let options = settings_kwargs(settings, prefix);
        tracing::debug!(options = ?options.keys().collect::<Vec<_>>(), "Loading mail settings");

        let dict: Dict = options
            .into_iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(name, value)| {
                let value = convert(&name, value);
                (name, value)
            })
            .collect();

        let config = Figment::from(Serialized::defaults(dict)).extract()?;
        Ok(config)
    }

    /// Same as [`MailerConfig::from_settings`], but fail on keys carrying the
    /// prefix which are not a known option, to catch typos like `mail.hots`
    ///
    /// # Errors
    ///
    /// Returns an error on unknown prefixed keys, or if a recognized option
    /// holds a value that can't be converted
    pub fn from_settings_strict(
        settings: Option<&Settings>,
        prefix: &str,
    ) -> Result<Self, SettingsError> {
        if let Some(settings) = settings {
            let mut unknown: Vec<&String> = settings
                .keys()
                .filter(|key| {
                    key.strip_prefix(prefix)
                        .is_some_and(|name| !RECOGNIZED_OPTIONS.contains(&name))
                })
                .collect();
            unknown.sort();

            if let Some(key) = unknown.first() {
                return Err(SettingsError::UnknownKey {
                    key: (*key).clone(),
                });
            }
        }

        Self::from_settings(settings, prefix)
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn recognized_keys_are_stripped() {
        let settings = settings(&[
            ("mail.host", "smtp.example.com"),
            ("mail.port", "587"),
            ("mail.queue_path", "/var/spool/mail"),
        ]);

        let kwargs = settings_kwargs(Some(&settings), DEFAULT_PREFIX);
        assert_eq!(
            kwargs,
            BTreeMap::from([
                ("host".to_owned(), "smtp.example.com".to_owned()),
                ("port".to_owned(), "587".to_owned()),
                ("queue_path".to_owned(), "/var/spool/mail".to_owned()),
            ])
        );
    }

    #[test]
    fn foreign_and_unknown_keys_are_dropped() {
        let settings = settings(&[
            ("mail.host", "smtp.example.com"),
            ("mail.hots", "typo.example.com"),
            ("sqlalchemy.url", "sqlite://"),
            ("host", "bare.example.com"),
            ("email.port", "2525"),
            ("mail.default_sender", "noreply@example.com"),
        ]);

        let kwargs = settings_kwargs(Some(&settings), DEFAULT_PREFIX);
        assert_eq!(
            kwargs,
            BTreeMap::from([("host".to_owned(), "smtp.example.com".to_owned())])
        );

        let config = MailerConfig::from_settings(Some(&settings), DEFAULT_PREFIX).unwrap();
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 25);
        assert_eq!(config.default_sender, None);
    }

    #[test]
    fn custom_prefix() {
        let settings = settings(&[
            ("mail.host", "ignored.example.com"),
            ("courier.host", "smtp.example.com"),
            ("courier.tls", "on"),
        ]);

        let config = MailerConfig::from_settings(Some(&settings), "courier.").unwrap();
        assert_eq!(config.host, "smtp.example.com");
        assert!(config.tls);
    }

    #[test]
    fn missing_settings_behave_like_empty_ones() {
        let empty = Settings::new();
        for prefix in [DEFAULT_PREFIX, "courier.", ""] {
            assert_eq!(
                settings_kwargs(None, prefix),
                settings_kwargs(Some(&empty), prefix)
            );
            assert_eq!(
                MailerConfig::from_settings(None, prefix).unwrap(),
                MailerConfig::from_settings(Some(&empty), prefix).unwrap(),
            );
        }

        assert_eq!(
            MailerConfig::from_settings(None, DEFAULT_PREFIX).unwrap(),
            MailerConfig::default()
        );
    }

    #[test]
    fn values_are_converted() {
        let settings = settings(&[
            ("mail.host", "smtp.example.com"),
            ("mail.port", "465"),
            ("mail.username", "courier"),
            ("mail.password", "1234"),
            ("mail.tls", "false"),
            ("mail.ssl", "true"),
            ("mail.keyfile", "/etc/courier/client.key"),
            ("mail.certfile", "/etc/courier/client.pem"),
            ("mail.queue_path", "/var/spool/mail"),
            ("mail.debug", "2"),
        ]);

        let config = MailerConfig::from_settings(Some(&settings), DEFAULT_PREFIX).unwrap();
        assert_eq!(config.port, 465);
        assert_eq!(config.credentials(), Some(("courier", "1234")));
        assert!(!config.tls);
        assert!(config.ssl);
        assert_eq!(
            config.keyfile,
            Some(Utf8PathBuf::from("/etc/courier/client.key"))
        );
        assert_eq!(
            config.certfile,
            Some(Utf8PathBuf::from("/etc/courier/client.pem"))
        );
        assert_eq!(config.debug, 2);
    }

    #[test]
    fn blank_values_are_unset() {
        let settings = settings(&[("mail.queue_path", ""), ("mail.host", "  ")]);

        let config = MailerConfig::from_settings(Some(&settings), DEFAULT_PREFIX).unwrap();
        assert_eq!(config.queue_path, None);
        assert_eq!(config.host, "localhost");
    }

    #[test]
    fn invalid_values_are_reported() {
        let settings = settings(&[("mail.port", "not-a-port")]);

        let error = MailerConfig::from_settings(Some(&settings), DEFAULT_PREFIX).unwrap_err();
        assert!(matches!(error, SettingsError::Extract(_)));
    }

    #[test]
    fn strict_mode_rejects_typos() {
        let settings = settings(&[
            ("mail.host", "smtp.example.com"),
            ("mail.hots", "typo.example.com"),
            ("sqlalchemy.url", "sqlite://"),
        ]);

        let error = MailerConfig::from_settings_strict(Some(&settings), DEFAULT_PREFIX).unwrap_err();
        assert!(
            matches!(error, SettingsError::UnknownKey { ref key } if key == "mail.hots"),
            "{error:?}"
        );
    }

    #[test]
    fn strict_mode_accepts_foreign_keys() {
        let settings = settings(&[
            ("mail.host", "smtp.example.com"),
            ("other.x", "1"),
        ]);

        let config = MailerConfig::from_settings_strict(Some(&settings), DEFAULT_PREFIX).unwrap();
        assert_eq!(config.host, "smtp.example.com");

        assert!(MailerConfig::from_settings_strict(None, DEFAULT_PREFIX).is_ok());
    }
}
