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

/// Errors raised while loading, validating or writing a sound bank.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Sound bank load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Sound bank serialization error: {0}")]
    Serialize(#[from] serde_yml::Error),

    #[error("Invalid sound bank: {reason}")]
    InvalidBank { reason: String },

    #[error("Invalid layer {layer}: {reason}")]
    Invalid { layer: usize, reason: String },
}
