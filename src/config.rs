// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Sound bank configuration.
//!
//! Banks are read once at startup and handed to the engine as immutable data.

use std::path::Path;

use config::{Config, File, FileFormat};
use tracing::info;

mod bank;
mod error;
mod layer;

pub use bank::SoundBank;
pub use error::ConfigError;
pub use layer::{
    ControllerRange, LayerConfig, Trigger, VelocityOverride, DEFAULT_PEDAL_THRESHOLD,
    DEFAULT_SOSTENUTO_CC, DEFAULT_SUSTAIN_CC,
};

/// Loads and validates a sound bank from a YAML file.
pub fn load_bank(path: &Path) -> Result<SoundBank, ConfigError> {
    let bank: SoundBank = Config::builder()
        .add_source(File::from(path).format(FileFormat::Yaml))
        .build()?
        .try_deserialize()?;
    bank.validate()?;

    info!(
        path = %path.display(),
        layers = bank.layers().len(),
        "Loaded sound bank"
    );
    Ok(bank)
}

/// Parses and validates a sound bank from a YAML string.
pub fn parse_bank(yaml: &str) -> Result<SoundBank, ConfigError> {
    let bank: SoundBank = Config::builder()
        .add_source(File::from_str(yaml, FileFormat::Yaml))
        .build()?
        .try_deserialize()?;
    bank.validate()?;
    Ok(bank)
}
