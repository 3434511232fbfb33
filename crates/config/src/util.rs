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

//! Loading sections of the configuration file out of a [`Figment`]

use figment::Figment;
use serde::de::DeserializeOwned;

/// A part of the configuration file, found under [`Self::PATH`]
pub trait ConfigurationSection: Sized + DeserializeOwned {
    /// Key of the section, or `None` for the whole file
    const PATH: Option<&'static str> = None;

    /// Check what deserialization alone can't
    ///
    /// # Errors
    ///
    /// Returns an error if the section is inconsistent
    fn validate(&self, _figment: &Figment) -> Result<(), figment::Error> {
        Ok(())
    }

    /// Deserialize and validate the section
    ///
    /// # Errors
    ///
    /// Returns an error if the section is missing, malformed or invalid
    fn extract(figment: &Figment) -> Result<Self, figment::Error> {
        let this: Self = match Self::PATH {
            Some(path) => figment.extract_inner(path)?,
            None => figment.extract()?,
        };

        this.validate(figment)?;
        Ok(this)
    }
}

/// Sections which can be left out of the file entirely
pub trait ConfigurationSectionExt: ConfigurationSection + Default {
    /// Like [`ConfigurationSection::extract`], but a missing section yields
    /// its default value
    ///
    /// # Errors
    ///
    /// Returns an error if the section is present but malformed or invalid
    fn extract_or_default(figment: &Figment) -> Result<Self, figment::Error> {
        match Self::PATH {
            Some(path) if !figment.contains(path) => Ok(Self::default()),
            _ => Self::extract(figment),
        }
    }
}

impl<T: ConfigurationSection + Default> ConfigurationSectionExt for T {}
