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

use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{CommandFactory, Parser};
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};

mod config;
mod doctor;
mod send;

#[derive(Parser, Debug)]
enum Subcommand {
    /// Configuration-related commands
    Config(self::config::Options),

    /// Send a single email
    Send(self::send::Options),

    /// Run diagnostics on the mail setup
    Doctor(self::doctor::Options),
}

#[derive(Parser, Debug)]
#[command(version)]
pub struct Options {
    /// Path to the configuration file
    #[arg(short, long, global = true, action = clap::ArgAction::Append)]
    config: Vec<Utf8PathBuf>,

    #[command(subcommand)]
    subcommand: Option<Subcommand>,
}

impl Options {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        use Subcommand as S;
        let figment = self.figment();
        match self.subcommand {
            Some(S::Config(c)) => c.run(&figment).await,
            Some(S::Send(c)) => c.run(&figment).await,
            Some(S::Doctor(c)) => c.run(&figment).await,
            None => {
                Self::command().print_help()?;
                Ok(ExitCode::FAILURE)
            }
        }
    }

    /// Get a [`Figment`] instance with the configuration loaded
    pub fn figment(&self) -> Figment {
        let configs = if self.config.is_empty() {
            // Read the COURIER_CONFIG environment variable
            std::env::var("COURIER_CONFIG")
                // Default to "config.yaml"
                .unwrap_or_else(|_| "config.yaml".to_owned())
                // Split the file list on `:`
                .split(':')
                .map(Utf8PathBuf::from)
                .collect()
        } else {
            self.config.clone()
        };

        // Field names have underscores, so nested keys are split on `__`,
        // e.g. `COURIER_MAIL__QUEUE_PATH`
        configs
            .into_iter()
            .fold(Figment::new(), |f, path| f.admerge(Yaml::file(path)))
            .merge(Env::prefixed("COURIER_").split("__"))
    }
}
