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

//! SMTP transport selection

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use courier_config::MailerConfig;
use lettre::{
    address::Envelope,
    transport::smtp::{
        authentication::Credentials,
        client::{Identity, Tls, TlsParameters},
        response::Response,
        AsyncSmtpTransport,
    },
    AsyncTransport, Tokio1Executor,
};
use thiserror::Error;

/// Which kind of connection is opened to the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportKind {
    /// Plain connection, upgraded with STARTTLS when `tls` is set
    Plain,

    /// Connection wrapped in TLS from the first byte, presenting an optional
    /// client certificate
    Secured {
        /// PEM private key. When unset, the key is read from the certfile
        keyfile: Option<Utf8PathBuf>,
        /// PEM certificate
        certfile: Option<Utf8PathBuf>,
    },
}

/// How the channel to the relay gets encrypted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode<'a> {
    /// Never encrypted
    Disabled,

    /// Plain connection which must be upgraded with STARTTLS
    StartTls,

    /// TLS from the start, with the client identity files handed to the TLS
    /// session itself
    Wrapper {
        /// PEM private key
        keyfile: Option<&'a Utf8Path>,
        /// PEM certificate
        certfile: Option<&'a Utf8Path>,
    },
}

/// Errors raised when talking to the relay, passed through from the
/// underlying SMTP client
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("a keyfile was given without a certfile")]
    MissingCertificate,

    #[error("no PEM certificate found in {path}")]
    NoCertificate { path: Utf8PathBuf },

    #[error("no PEM private key found in {path}")]
    NoPrivateKey { path: Utf8PathBuf },
}

/// Everything needed to open a connection to a SMTP relay
///
/// Building it never fails and never touches the network or the filesystem:
/// errors only show up once a connection is opened.
#[derive(Clone)]
pub struct SmtpTransport {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    tls: bool,
    kind: TransportKind,
    debug: u8,
}

impl fmt::Debug for SmtpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpTransport")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "username",
                &self.credentials.as_ref().map(|(username, _)| username),
            )
            .field("tls", &self.tls)
            .field("kind", &self.kind)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl SmtpTransport {
    /// Construct a plain transport. `tls` forces a STARTTLS upgrade, otherwise
    /// the connection stays unencrypted.
    #[must_use]
    pub fn plain(host: impl Into<String>, port: u16, tls: bool) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
            tls,
            kind: TransportKind::Plain,
            debug: 0,
        }
    }

    /// Construct a transport which wraps the connection in TLS
    #[must_use]
    pub fn secured(
        host: impl Into<String>,
        port: u16,
        keyfile: Option<Utf8PathBuf>,
        certfile: Option<Utf8PathBuf>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
            tls: false,
            kind: TransportKind::Secured { keyfile, certfile },
            debug: 0,
        }
    }

    /// Select and construct the transport described by the config
    #[must_use]
    pub fn from_config(config: &MailerConfig) -> Self {
        let mut transport = if config.ssl {
            Self::secured(
                config.host.clone(),
                config.port,
                config.keyfile.clone(),
                config.certfile.clone(),
            )
        } else {
            Self::plain(config.host.clone(), config.port, config.tls)
        };

        // The TLS flag is kept on the secured variant too, even if a wrapped
        // connection never needs the upgrade
        transport.tls = config.tls;

        if let Some((username, password)) = config.credentials() {
            transport = transport.with_credentials(username, password);
        }

        transport.with_debug(config.debug)
    }

    /// Authenticate with the given username and password
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Set the verbosity of the SMTP exchange logging
    #[must_use]
    pub fn with_debug(mut self, debug: u8) -> Self {
        self.debug = debug;
        self
    }

    /// Hostname of the relay
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port of the relay
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The selected variant
    #[must_use]
    pub fn kind(&self) -> &TransportKind {
        &self.kind
    }

    /// Verbosity of the SMTP exchange logging
    #[must_use]
    pub fn debug(&self) -> u8 {
        self.debug
    }

    /// Whether the STARTTLS upgrade is disabled
    #[must_use]
    pub fn no_tls(&self) -> bool {
        !self.tls
    }

    /// Whether the STARTTLS upgrade is mandatory
    #[must_use]
    pub fn force_tls(&self) -> bool {
        self.tls
    }

    /// How the channel will be encrypted once a connection is opened
    #[must_use]
    pub fn tls_mode(&self) -> TlsMode<'_> {
        match &self.kind {
            TransportKind::Plain if self.tls => TlsMode::StartTls,
            TransportKind::Plain => TlsMode::Disabled,
            TransportKind::Secured { keyfile, certfile } => TlsMode::Wrapper {
                keyfile: keyfile.as_deref(),
                certfile: certfile.as_deref(),
            },
        }
    }

    /// Open a connection handle to the relay
    ///
    /// For the secured variant, this is where the client identity gets loaded
    /// and attached to the TLS session.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity files can't be read or parsed, or if
    /// the TLS parameters are invalid
    pub async fn connect(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, Error> {
        let tls = match self.tls_mode() {
            TlsMode::Disabled => Tls::None,
            TlsMode::StartTls => Tls::Required(TlsParameters::new(self.host.clone())?),
            TlsMode::Wrapper { keyfile, certfile } => {
                let mut parameters = TlsParameters::builder(self.host.clone());
                if let Some(identity) = load_identity(keyfile, certfile).await? {
                    parameters = parameters.identify_with(identity);
                }
                Tls::Wrapper(parameters.build()?)
            }
        };

        if self.debug > 0 {
            tracing::info!(
                host = %self.host,
                port = self.port,
                tls_mode = ?self.tls_mode(),
                "Opening SMTP connection"
            );
        } else {
            tracing::debug!(host = %self.host, port = self.port, "Opening SMTP connection");
        }

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host)
            .port(self.port)
            .tls(tls);

        if let Some((username, password)) = &self.credentials {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }

    /// Send an already serialized email
    ///
    /// # Errors
    ///
    /// Returns an error if the connection could not be opened or if the relay
    /// rejected the email
    pub async fn send_raw(&self, envelope: &Envelope, email: &[u8]) -> Result<Response, Error> {
        let transport = self.connect().await?;
        let response = transport.send_raw(envelope, email).await?;
        Ok(response)
    }

    /// Test the connection to the relay
    ///
    /// # Errors
    ///
    /// Returns an error if the connection could not be opened
    pub async fn test_connection(&self) -> Result<bool, Error> {
        let transport = self.connect().await?;
        Ok(transport.test_connection().await?)
    }
}

async fn load_identity(
    keyfile: Option<&Utf8Path>,
    certfile: Option<&Utf8Path>,
) -> Result<Option<Identity>, Error> {
    let certfile = match (keyfile, certfile) {
        (None, None) => return Ok(None),
        (Some(_), None) => return Err(Error::MissingCertificate),
        (_, Some(certfile)) => certfile,
    };

    let certificate = tokio::fs::read(certfile).await?;
    let (key, keyfile) = match keyfile {
        Some(keyfile) => (tokio::fs::read(keyfile).await?, keyfile),
        // The key lives in the same PEM bundle as the certificate
        None => (certificate.clone(), certfile),
    };

    // With rustls, lettre takes the certificate as DER but still parses the
    // key as PEM, and panics if there is none
    let certificate = rustls_pemfile::certs(&mut certificate.as_slice())
        .next()
        .transpose()?
        .ok_or_else(|| Error::NoCertificate {
            path: certfile.to_owned(),
        })?;

    if rustls_pemfile::private_key(&mut key.as_slice())?.is_none() {
        return Err(Error::NoPrivateKey {
            path: keyfile.to_owned(),
        });
    }

    Ok(Some(Identity::from_pem(&certificate, &key)?))
}
