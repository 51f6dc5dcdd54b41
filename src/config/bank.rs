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
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::layer::LayerConfig;

/// A YAML representation of a sound bank: the layers that share one controller state.
#[derive(Deserialize, Clone, Serialize, Debug, Default, PartialEq)]
pub struct SoundBank {
    /// The MIDI channel (1-indexed) to listen on. Listens on all channels if unset.
    channel: Option<u8>,

    /// Seed for the random draw used by layer selection. Drawn from entropy if unset.
    seed: Option<u64>,

    /// The layers of the bank.
    #[serde(default)]
    layers: Vec<LayerConfig>,
}

impl SoundBank {
    /// Creates a new sound bank.
    pub fn new(channel: Option<u8>, seed: Option<u64>, layers: Vec<LayerConfig>) -> Self {
        SoundBank {
            channel,
            seed,
            layers,
        }
    }

    /// Gets the channel filter (1-indexed).
    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    /// Gets the random seed.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Replaces the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Gets the layer configurations.
    pub fn layers(&self) -> &[LayerConfig] {
        &self.layers
    }

    /// Validates the bank and every layer in it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(channel) = self.channel {
            if !(1..=16).contains(&channel) {
                return Err(ConfigError::InvalidBank {
                    reason: format!("channel {} is outside 1-16", channel),
                });
            }
        }

        self.layers
            .iter()
            .enumerate()
            .try_for_each(|(index, layer)| layer.validate(index))
    }

    /// Serializes the bank back to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yml::to_string(self)?)
    }
}
