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

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod mail;

pub use self::mail::MailerConfig;
use crate::util::ConfigurationSection;

/// Application configuration root
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct RootConfig {
    /// Configuration related to sending emails
    #[serde(default)]
    pub mail: MailerConfig,
}

impl ConfigurationSection for RootConfig {
    fn validate(&self, figment: &figment::Figment) -> Result<(), figment::error::Error> {
        self.mail.validate(figment)?;

        Ok(())
    }
}
