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

//! Offline replay of Standard MIDI Files through a trigger engine.

use std::fs;
use std::path::Path;

use midly::live::LiveEvent;
use midly::{Format, MetaMessage, Smf, TrackEventKind};
use tracing::{debug, info};

use crate::config::{self, ConfigError};
use crate::engine::{Trigger, TriggerEngine};

/// Errors while replaying a MIDI file.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Unable to read MIDI file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to parse MIDI file: {0}")]
    Midi(#[from] midly::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A trigger produced during replay, stamped with the absolute tick of its event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReplayedTrigger {
    pub tick: u64,
    pub trigger: Trigger,
}

/// Loads the bank at `bank_path` and replays `midi_path` through a fresh engine.
/// `seed` overrides the seed configured in the bank.
pub fn replay_with_bank(
    bank_path: &Path,
    midi_path: &Path,
    seed: Option<u64>,
) -> Result<Vec<ReplayedTrigger>, ReplayError> {
    let mut bank = config::load_bank(bank_path)?;
    if let Some(seed) = seed {
        bank = bank.with_seed(seed);
    }
    let mut engine = TriggerEngine::new(&bank);
    replay_file(&mut engine, midi_path)
}

/// Replays the MIDI file at `path` and returns every trigger in order.
pub fn replay_file(
    engine: &mut TriggerEngine,
    path: &Path,
) -> Result<Vec<ReplayedTrigger>, ReplayError> {
    let buf = fs::read(path)?;
    let triggers = replay_bytes(engine, &buf)?;
    info!(
        path = %path.display(),
        triggers = triggers.len(),
        "Replayed MIDI file"
    );
    Ok(triggers)
}

/// Replays an in-memory MIDI file and returns every trigger in order.
pub fn replay_bytes(
    engine: &mut TriggerEngine,
    bytes: &[u8],
) -> Result<Vec<ReplayedTrigger>, ReplayError> {
    let smf = Smf::parse(bytes)?;

    // Flatten all tracks onto one timeline of absolute ticks.
    let mut timeline: Vec<(u64, TrackEventKind)> = Vec::new();
    let mut track_offset = 0u64;
    for track in smf.tracks.iter() {
        let mut tick = track_offset;
        for event in track.iter() {
            tick += u64::from(event.delta.as_int());
            timeline.push((tick, event.kind));
        }
        if smf.header.format == Format::Sequential {
            track_offset = tick;
        }
    }
    timeline.sort_by_key(|(tick, _)| *tick);

    let mut triggers = Vec::new();
    for (tick, kind) in timeline {
        match kind {
            TrackEventKind::Midi { channel, message } => {
                let event = LiveEvent::Midi { channel, message };
                engine.process_live_event(&event, |trigger| {
                    triggers.push(ReplayedTrigger { tick, trigger })
                });
            }
            TrackEventKind::Meta(MetaMessage::Tempo(micros_per_quarter)) => {
                let seconds_per_quarter = micros_per_quarter.as_int() as f32 / 1_000_000.0;
                debug!(tick, seconds_per_quarter, "Tempo change");
                engine.tempo(seconds_per_quarter);
            }
            _ => {}
        }
    }

    Ok(triggers)
}
