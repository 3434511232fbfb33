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

//! Messages handed over to a mailer

use lettre::message::{
    header::{HeaderName, HeaderValue},
    Mailbox, MultiPart, SinglePart,
};
use thiserror::Error;

/// What a mailer needs to know about a message to deliver it
pub trait MessageEnvelope {
    /// The sender, if one is set
    fn sender(&self) -> Option<&Mailbox>;

    /// Replace the sender
    fn set_sender(&mut self, sender: Mailbox);

    /// Everyone the message should be delivered to
    fn recipients(&self) -> Vec<Mailbox>;

    /// Serialize the message into something a transport can send
    ///
    /// # Errors
    ///
    /// Returns an error if the message is incomplete or malformed
    fn to_message(&self) -> Result<lettre::Message, MessageError>;
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message has no sender")]
    MissingSender,

    #[error("message has no recipients")]
    NoRecipients,

    #[error("message has no subject")]
    EmptySubject,

    #[error("message subject contains a line break")]
    SubjectLineBreak,

    #[error("invalid header name {name:?}")]
    InvalidHeader { name: String },

    #[error(transparent)]
    Content(#[from] lettre::error::Error),
}

/// A simple email, with a plain text and/or HTML body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Subject line
    pub subject: String,

    /// Sender. The mailer fills it with its default sender when unset
    pub sender: Option<Mailbox>,

    /// `To` recipients
    pub recipients: Vec<Mailbox>,

    /// `Cc` recipients
    pub cc: Vec<Mailbox>,

    /// Blind copies, never written in the headers
    pub bcc: Vec<Mailbox>,

    /// Plain text body
    pub body: Option<String>,

    /// HTML body
    pub html: Option<String>,

    /// Additional raw headers
    pub extra_headers: Vec<(String, String)>,
}

impl Message {
    /// Start a new message with the given subject
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    /// Set the sender
    #[must_use]
    pub fn from(mut self, sender: Mailbox) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Add a `To` recipient
    #[must_use]
    pub fn to(mut self, recipient: Mailbox) -> Self {
        self.recipients.push(recipient);
        self
    }

    /// Add a `Cc` recipient
    #[must_use]
    pub fn cc(mut self, recipient: Mailbox) -> Self {
        self.cc.push(recipient);
        self
    }

    /// Add a blind copy recipient
    #[must_use]
    pub fn bcc(mut self, recipient: Mailbox) -> Self {
        self.bcc.push(recipient);
        self
    }

    /// Set the plain text body
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the HTML body
    #[must_use]
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Add a raw header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Check that the message can be sent
    ///
    /// # Errors
    ///
    /// Returns an error if the sender, the recipients or the subject are
    /// missing, or if the subject would break the headers
    pub fn validate(&self) -> Result<(), MessageError> {
        if self.sender.is_none() {
            return Err(MessageError::MissingSender);
        }

        if self.recipients.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
            return Err(MessageError::NoRecipients);
        }

        if self.subject.trim().is_empty() {
            return Err(MessageError::EmptySubject);
        }

        if self.subject.contains(['\r', '\n']) {
            return Err(MessageError::SubjectLineBreak);
        }

        Ok(())
    }
}

impl MessageEnvelope for Message {
    fn sender(&self) -> Option<&Mailbox> {
        self.sender.as_ref()
    }

    fn set_sender(&mut self, sender: Mailbox) {
        self.sender = Some(sender);
    }

    fn recipients(&self) -> Vec<Mailbox> {
        self.recipients
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .cloned()
            .collect()
    }

    fn to_message(&self) -> Result<lettre::Message, MessageError> {
        self.validate()?;

        let mut builder = lettre::Message::builder()
            .subject(self.subject.clone())
            .message_id(None);

        if let Some(sender) = &self.sender {
            builder = builder.from(sender.clone());
        }

        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }

        for recipient in &self.cc {
            builder = builder.cc(recipient.clone());
        }

        for recipient in &self.bcc {
            builder = builder.bcc(recipient.clone());
        }

        for (name, value) in &self.extra_headers {
            let header_name = HeaderName::new_from_ascii(name.clone())
                .map_err(|_| MessageError::InvalidHeader { name: name.clone() })?;
            builder = builder.raw_header(HeaderValue::new(header_name, value.clone()));
        }

        let message = match (&self.body, &self.html) {
            (Some(plain), Some(html)) => builder.multipart(MultiPart::alternative_plain_html(
                plain.clone(),
                html.clone(),
            ))?,
            (None, Some(html)) => builder.singlepart(SinglePart::html(html.clone()))?,
            (Some(plain), None) => builder.singlepart(SinglePart::plain(plain.clone()))?,
            (None, None) => builder.singlepart(SinglePart::plain(String::new()))?,
        };

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailbox(address: &str) -> Mailbox {
        address.parse().unwrap()
    }

    fn formatted(message: &Message) -> String {
        String::from_utf8(message.to_message().unwrap().formatted()).unwrap()
    }

    #[test]
    fn recipients_include_copies() {
        let message = Message::new("Hello")
            .to(mailbox("alice@example.com"))
            .cc(mailbox("bob@example.com"))
            .bcc(mailbox("carol@example.com"));

        let recipients: Vec<String> = message
            .recipients()
            .iter()
            .map(|m| m.email.to_string())
            .collect();
        assert_eq!(
            recipients,
            ["alice@example.com", "bob@example.com", "carol@example.com"]
        );
    }

    #[test]
    fn serialize_plain_message() {
        let message = Message::new("Hello")
            .from(mailbox("Courier <noreply@example.com>"))
            .to(mailbox("alice@example.com"))
            .bcc(mailbox("carol@example.com"))
            .header("X-Mailer", "courier")
            .body("Hi Alice");

        let email = formatted(&message);
        assert!(email.contains("Subject: Hello\r\n"));
        assert!(email.contains("From: Courier <noreply@example.com>\r\n"));
        assert!(email.contains("To: alice@example.com\r\n"));
        assert!(email.contains("X-Mailer: courier\r\n"));
        assert!(email.contains("Message-ID: "));
        assert!(email.contains("Hi Alice"));
        assert!(!email.contains("carol@example.com"));
    }

    #[test]
    fn serialize_alternative_message() {
        let message = Message::new("Hello")
            .from(mailbox("noreply@example.com"))
            .to(mailbox("alice@example.com"))
            .body("Hi Alice")
            .html("<p>Hi Alice</p>");

        let email = formatted(&message);
        assert!(email.contains("multipart/alternative"));
        assert!(email.contains("text/plain"));
        assert!(email.contains("text/html"));
    }

    #[test]
    fn validation() {
        let complete = Message::new("Hello")
            .from(mailbox("noreply@example.com"))
            .to(mailbox("alice@example.com"));
        assert!(complete.validate().is_ok());

        let message = Message {
            sender: None,
            ..complete.clone()
        };
        assert!(matches!(
            message.to_message(),
            Err(MessageError::MissingSender)
        ));

        let message = Message {
            recipients: Vec::new(),
            ..complete.clone()
        };
        assert!(matches!(
            message.to_message(),
            Err(MessageError::NoRecipients)
        ));

        let message = Message {
            subject: " ".to_owned(),
            ..complete.clone()
        };
        assert!(matches!(
            message.to_message(),
            Err(MessageError::EmptySubject)
        ));

        let message = Message {
            subject: "Hello\r\nBcc: eve@example.com".to_owned(),
            ..complete.clone()
        };
        assert!(matches!(
            message.to_message(),
            Err(MessageError::SubjectLineBreak)
        ));

        let message = complete.header("Bad Header", "value");
        assert!(matches!(
            message.to_message(),
            Err(MessageError::InvalidHeader { .. })
        ));
    }
}
