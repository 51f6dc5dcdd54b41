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

//! Per-layer trigger decisions.
//!
//! A layer keeps one sticky gate per condition category. Each gate is recomputed
//! when an event of its category arrives, and the layer is "switched on" when every
//! gate holds. The `register_*` calls return true when the event should start a
//! voice for this layer.

use tracing::{debug, trace};

use crate::config::{LayerConfig, Trigger, VelocityOverride};
use crate::midi_state::MidiState;

mod cc_switches;
mod releases;

pub use cc_switches::CcSwitches;
pub use releases::{DeferredRelease, DeferredReleases};

/// The runtime trigger state of one sound layer.
#[derive(Clone, Debug)]
pub struct Layer {
    config: LayerConfig,

    key_switched: bool,
    previous_key_switched: bool,
    sequence_switched: bool,
    pitch_switched: bool,
    bpm_switched: bool,
    aftertouch_switched: bool,
    cc_switched: CcSwitches,

    sequence_counter: u64,

    sustain_pressed: bool,
    sostenuto_pressed: bool,
    sustain_releases: DeferredReleases,
    sostenuto_releases: DeferredReleases,
}

impl Layer {
    /// Creates the layer with every gate at its initial value.
    pub fn new(config: LayerConfig) -> Self {
        Layer {
            key_switched: !config.uses_key_switches(),
            previous_key_switched: !config.uses_previous_key_switches(),
            sequence_switched: !config.uses_sequence_switches(),
            pitch_switched: true,
            bpm_switched: true,
            aftertouch_switched: true,
            cc_switched: CcSwitches::all_set(),
            sequence_counter: 0,
            sustain_pressed: false,
            sostenuto_pressed: false,
            sustain_releases: DeferredReleases::default(),
            sostenuto_releases: DeferredReleases::default(),
            config,
        }
    }

    /// Gets the static configuration of the layer.
    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Whether every gate currently holds.
    pub fn is_switched_on(&self) -> bool {
        self.key_switched
            && self.previous_key_switched
            && self.sequence_switched
            && self.pitch_switched
            && self.bpm_switched
            && self.aftertouch_switched
            && self.cc_switched.all()
    }

    /// Whether the note and velocity are inside the layer's ranges (both inclusive).
    pub fn check_note(&self, note: u8, velocity: f32) -> bool {
        self.config.key_range().contains_with_end(note)
            && self.config.velocity_range().contains_with_end(velocity)
    }

    /// Whether the random draw falls in the layer's slice. The draw is usually in
    /// [0, 1), so a slice that ends at 1 also owns a draw of exactly 1.
    pub fn check_random(&self, random: f32) -> bool {
        let range = self.config.random_range();
        range.contains(random) || (random >= 1.0 && range.is_valid() && range.end() >= 1.0)
    }

    /// Updates the key switch gates for a note-on. `previous_note` is the note-on
    /// that came before this one.
    pub fn register_key_switch(&mut self, note: u8, previous_note: Option<u8>) {
        if let Some(previous_keyswitch) = self.config.previous_keyswitch() {
            self.previous_key_switched = previous_note == Some(previous_keyswitch);
        }

        if let Some(last_keyswitch) = self.config.last_keyswitch() {
            let in_range = self
                .config
                .keyswitch_range()
                .map_or(true, |range| range.contains_with_end(note));
            if in_range {
                self.key_switched = note == last_keyswitch;
            }
        }
    }

    /// Decides whether a note-on starts a voice.
    pub fn register_note_on(
        &mut self,
        state: &MidiState,
        note: u8,
        velocity: f32,
        random: f32,
    ) -> bool {
        debug_assert!((0.0..=1.0).contains(&velocity));

        if !self.note_prerequisites(state, note, velocity, random) {
            return false;
        }

        // The modes are tested independently rather than as one selector.
        let trigger = self.config.trigger();
        let attack = trigger == Trigger::Attack;
        let first_legato_note = trigger == Trigger::First && state.active_notes() == 1;
        let not_first_legato_note = trigger == Trigger::Legato && state.active_notes() > 1;

        if attack || first_legato_note || not_first_legato_note {
            self.walk_sequence();
            return self.is_switched_on();
        }

        false
    }

    /// Decides whether a note-off starts a release voice.
    ///
    /// With the `release` trigger, a release held by a pedal is deferred into the
    /// matching queue instead of firing. Draining those queues when the pedal goes
    /// up is left to the caller.
    pub fn register_note_off(
        &mut self,
        state: &MidiState,
        note: u8,
        velocity: f32,
        random: f32,
    ) -> bool {
        debug_assert!((0.0..=1.0).contains(&velocity));

        if !self.note_prerequisites(state, note, velocity, random) {
            return false;
        }

        let trigger_ok = match self.config.trigger() {
            Trigger::ReleaseKey => true,
            Trigger::Release => self.pedal_release(state, note),
            Trigger::Attack | Trigger::First | Trigger::Legato => false,
        };

        if trigger_ok {
            self.walk_sequence();
            return self.is_switched_on();
        }

        false
    }

    /// Decides whether a controller change starts a voice, and updates the pedal
    /// and controller gates.
    pub fn register_cc(&mut self, state: &MidiState, cc: u16, value: f32, _random: f32) -> bool {
        if cc == self.config.sustain_cc() {
            self.sustain_pressed =
                self.config.check_sustain() && value >= self.config.sustain_threshold();
        }

        if cc == self.config.sostenuto_cc() {
            let pressed =
                self.config.check_sostenuto() && value >= self.config.sostenuto_threshold();
            if pressed && !self.sostenuto_pressed {
                self.store_sostenuto_notes(state);
            }
            // Lifting the sostenuto discards what it held. Unlike sustain, nothing is
            // handed back to the caller for release.
            if !pressed && self.sostenuto_pressed {
                self.sostenuto_releases.clear();
            }
            self.sostenuto_pressed = pressed;
        }

        let switched = self
            .config
            .cc_condition(cc)
            .map_or(true, |range| range.contains_with_end(value));
        self.cc_switched.set(cc, switched);

        if !self.config.trigger_on_cc() {
            return false;
        }

        if let Some(range) = self.config.cc_trigger(cc) {
            if range.contains_with_end(value) {
                self.walk_sequence();
                return self.is_switched_on();
            }
        }

        false
    }

    /// Re-arms the pitch gate. `bend` is normalized to [-1, 1].
    pub fn register_pitch_wheel(&mut self, bend: f32) {
        self.pitch_switched = self.config.bend_range().contains_with_end(bend);
    }

    /// Re-arms the channel aftertouch gate.
    pub fn register_aftertouch(&mut self, aftertouch: f32) {
        self.aftertouch_switched = self.config.aftertouch_range().contains_with_end(aftertouch);
    }

    /// Re-arms the tempo gate.
    pub fn register_tempo(&mut self, seconds_per_quarter: f32) {
        let bpm = 60.0 / seconds_per_quarter;
        self.bpm_switched = self.config.bpm_range().contains_with_end(bpm);
    }

    pub fn is_sustain_pressed(&self) -> bool {
        self.sustain_pressed
    }

    pub fn is_sostenuto_pressed(&self) -> bool {
        self.sostenuto_pressed
    }

    /// The releases waiting for the sustain pedal.
    pub fn sustain_releases(&self) -> &DeferredReleases {
        &self.sustain_releases
    }

    /// The notes captured by the sostenuto pedal.
    pub fn sostenuto_releases(&self) -> &DeferredReleases {
        &self.sostenuto_releases
    }

    /// Moves the pending sustain releases out, leaving the queue empty.
    pub fn take_sustain_releases(&mut self) -> DeferredReleases {
        std::mem::take(&mut self.sustain_releases)
    }

    pub fn is_note_sustained(&self, note: u8) -> bool {
        self.sustain_releases.contains(note)
    }

    pub fn is_note_sostenutoed(&self, note: u8) -> bool {
        self.sostenuto_releases.contains(note)
    }

    /// Number of sequence steps taken so far.
    pub fn sequence_counter(&self) -> u64 {
        self.sequence_counter
    }

    /// Checks shared by note-on and note-off.
    fn note_prerequisites(
        &self,
        state: &MidiState,
        note: u8,
        mut velocity: f32,
        random: f32,
    ) -> bool {
        if self.config.velocity_override() == VelocityOverride::Previous {
            velocity = state.velocity_override();
        }

        if !(self.config.trigger_on_note()
            && self.check_note(note, velocity)
            && self.check_random(random))
        {
            return false;
        }

        self.config
            .poly_aftertouch_range()
            .contains_with_end(state.poly_aftertouch(note))
    }

    /// Pedal chaining for the `release` trigger. Returns true when the release
    /// should fire now.
    fn pedal_release(&mut self, state: &MidiState, note: u8) -> bool {
        if self.is_note_sostenutoed(note) {
            if self.sostenuto_pressed {
                return false;
            }
            self.sostenuto_releases.remove(note);
        }

        if self.sustain_pressed {
            self.delay_sustain_release(note, state.note_velocity(note));
            return false;
        }

        true
    }

    fn walk_sequence(&mut self) {
        let length = u64::from(self.config.sequence_length().max(1));
        let position = u64::from(self.config.sequence_position());
        self.sequence_switched = position.checked_sub(1) == Some(self.sequence_counter % length);
        self.sequence_counter += 1;
        trace!(
            counter = self.sequence_counter,
            switched = self.sequence_switched,
            "Walked sequence"
        );
    }

    fn delay_sustain_release(&mut self, note: u8, velocity: f32) {
        if !self.sustain_releases.push(note, velocity) {
            debug!(note, "Sustain release queue full, dropping release");
        }
    }

    fn store_sostenuto_notes(&mut self, state: &MidiState) {
        debug_assert!(self.sostenuto_releases.is_empty());
        let key_range = *self.config.key_range();
        for note in key_range.start()..=key_range.end() {
            if !state.is_note_pressed(note) {
                continue;
            }
            if !self.sostenuto_releases.push(note, state.note_velocity(note)) {
                debug!(note, "Sostenuto release queue full, dropping release");
            }
        }
    }
}
