// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use config::{Config, ConfigError, Environment, File, FileFormat};
use playground::{SinkBackend, TitleStyle, VideoFormat};
use serde::Deserialize;

const ENV_PREFIX: &str = "PITIVI_PLAYGROUND";

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output: OutputSettings,
    /// Format of the placeholder and of rendered titles.
    pub project: VideoFormat,
    /// Style of titles unless given on the command line.
    pub title: TitleStyle,
}

impl Settings {
    /// Load settings from an optional TOML file, overridden by `PITIVI_PLAYGROUND__*`
    /// environment variables.
    pub fn load(file_name: &str) -> Result<Self, ConfigError> {
        Self::load_with_prefix(file_name, ENV_PREFIX)
    }

    fn load_with_prefix(file_name: &str, prefix: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::new(file_name, FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix(prefix).separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub audio: SinkBackend,
    pub video: SinkBackend,
}
