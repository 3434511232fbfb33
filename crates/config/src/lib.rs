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

#![deny(missing_docs, rustdoc::missing_crate_level_docs)]
#![allow(clippy::module_name_repetitions)]

//! Mailer configuration logic

pub(crate) mod schema;
mod sections;
mod settings;
pub(crate) mod util;

pub use self::{
    sections::*,
    settings::{settings_kwargs, Settings, SettingsError, DEFAULT_PREFIX, RECOGNIZED_OPTIONS},
    util::{ConfigurationSection, ConfigurationSectionExt},
};
