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

//! Send emails through a SMTP relay or a maildir queue
//!
//! ```no_run
//! use courier_mailer::{Mailbox, Mailer, Message};
//! use courier_config::DEFAULT_PREFIX;
//!
//! # async fn run(settings: &courier_config::Settings) -> Result<(), Box<dyn std::error::Error>> {
//! let mailer = Mailer::from_settings(Some(settings), DEFAULT_PREFIX)?;
//!
//! let mut message = Message::new("Welcome")
//!     .to("alice@example.com".parse::<Mailbox>()?)
//!     .body("Hello Alice");
//!
//! mailer.send(&mut message).await?;
//! # Ok(())
//! # }
//! ```

#![allow(clippy::module_name_repetitions)]

mod delivery;
mod dummy;
mod mailer;
mod message;
pub mod transport;

pub use lettre::{message::Mailbox, Address};

pub use self::{
    delivery::{DirectDelivery, QueuedDelivery},
    dummy::DummyMailer,
    mailer::{Deliver, Error, Mailer},
    message::{Message, MessageEnvelope, MessageError},
    transport::SmtpTransport,
};
