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
use crate::midi_state::NUM_CCS;

const WORDS: usize = NUM_CCS.div_ceil(64);

/// One gate bit per controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CcSwitches {
    bits: [u64; WORDS],
}

impl CcSwitches {
    /// Creates a set with every gate open.
    pub fn all_set() -> Self {
        CcSwitches {
            bits: [u64::MAX; WORDS],
        }
    }

    /// Sets one gate. Controllers outside the table are ignored.
    pub fn set(&mut self, cc: u16, value: bool) {
        let index = cc as usize;
        if index >= NUM_CCS {
            return;
        }
        let mask = 1u64 << (index % 64);
        if value {
            self.bits[index / 64] |= mask;
        } else {
            self.bits[index / 64] &= !mask;
        }
    }

    /// Whether every gate is open.
    pub fn all(&self) -> bool {
        self.bits.iter().all(|word| *word == u64::MAX)
    }
}
