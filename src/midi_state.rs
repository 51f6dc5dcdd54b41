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

//! Shared controller memory.
//!
//! Holds the latest value of every controller, the held notes and a few derived
//! quantities. One instance is owned per synthesizer and read by all of its layers.
//! Every operation is constant time and allocation free.

/// Number of MIDI notes.
pub const NUM_NOTES: usize = 128;

/// Number of controllers tracked, including the extended range above 127.
pub const NUM_CCS: usize = 512;

/// Extended controller mirroring pitch bend, stored unipolar.
pub const CC_PITCH_BEND: u16 = 128;
/// Extended controller mirroring channel aftertouch.
pub const CC_CHANNEL_AFTERTOUCH: u16 = 129;
/// Extended controller mirroring the last polyphonic aftertouch.
pub const CC_POLY_AFTERTOUCH: u16 = 130;
/// Extended controller mirroring the last note-on velocity.
pub const CC_NOTE_ON_VELOCITY: u16 = 131;
/// Extended controller mirroring the last note-off velocity.
pub const CC_NOTE_OFF_VELOCITY: u16 = 132;
/// Extended controller mirroring the last note number.
pub const CC_KEYBOARD_NOTE_NUMBER: u16 = 133;
/// Extended controller that is 1 while any note is held.
pub const CC_KEYBOARD_NOTE_GATE: u16 = 134;
/// Extended controller that flips between 0 and 1 on every note-on.
pub const CC_ALTERNATE: u16 = 137;

/// The latest known state of the performance controllers.
#[derive(Clone, Debug)]
pub struct MidiState {
    note_velocities: [f32; NUM_NOTES],
    note_pressed: [bool; NUM_NOTES],
    poly_aftertouch: [f32; NUM_NOTES],
    active_notes: usize,
    velocity_override: f32,
    last_note: Option<u8>,
    cc_values: [f32; NUM_CCS],
    pitch_bend: f32,
    channel_aftertouch: f32,
}

impl Default for MidiState {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiState {
    /// Creates a new state with every value at rest.
    pub fn new() -> Self {
        MidiState {
            note_velocities: [0.0; NUM_NOTES],
            note_pressed: [false; NUM_NOTES],
            poly_aftertouch: [0.0; NUM_NOTES],
            active_notes: 0,
            velocity_override: 0.0,
            last_note: None,
            cc_values: [0.0; NUM_CCS],
            pitch_bend: 0.0,
            channel_aftertouch: 0.0,
        }
    }

    /// Registers a note-on. `velocity` must be normalized.
    pub fn note_on(&mut self, note: u8, velocity: f32) {
        debug_assert!((0.0..=1.0).contains(&velocity));
        let index = note as usize;
        if index >= NUM_NOTES {
            return;
        }

        self.note_velocities[index] = velocity;
        if !self.note_pressed[index] {
            self.note_pressed[index] = true;
            self.active_notes += 1;
        }
        self.velocity_override = velocity;
        self.last_note = Some(note);

        self.set_cc(CC_NOTE_ON_VELOCITY, velocity);
        self.set_cc(CC_KEYBOARD_NOTE_NUMBER, note as f32 / 127.0);
        self.set_cc(CC_KEYBOARD_NOTE_GATE, 1.0);
        let alternate = self.cc_value(CC_ALTERNATE);
        self.set_cc(CC_ALTERNATE, if alternate == 0.0 { 1.0 } else { 0.0 });
    }

    /// Registers a note-off. The note's last on-velocity stays readable until the
    /// next note-on for it.
    pub fn note_off(&mut self, note: u8, velocity: f32) {
        debug_assert!((0.0..=1.0).contains(&velocity));
        let index = note as usize;
        if index >= NUM_NOTES {
            return;
        }

        if self.note_pressed[index] {
            self.note_pressed[index] = false;
            self.active_notes -= 1;
        }

        self.set_cc(CC_NOTE_OFF_VELOCITY, velocity);
        if self.active_notes == 0 {
            self.set_cc(CC_KEYBOARD_NOTE_GATE, 0.0);
        }
    }

    /// Stores a controller value. Controller numbers outside the table are ignored.
    pub fn cc_event(&mut self, cc: u16, value: f32) {
        self.set_cc(cc, value);
    }

    /// Stores the pitch bend, normalized to [-1, 1].
    pub fn pitch_bend_event(&mut self, value: f32) {
        self.pitch_bend = value;
        self.set_cc(CC_PITCH_BEND, (value + 1.0) * 0.5);
    }

    /// Stores the polyphonic aftertouch of a note.
    pub fn poly_aftertouch_event(&mut self, note: u8, value: f32) {
        if let Some(slot) = self.poly_aftertouch.get_mut(note as usize) {
            *slot = value;
            self.set_cc(CC_POLY_AFTERTOUCH, value);
        }
    }

    /// Stores the channel aftertouch.
    pub fn channel_aftertouch_event(&mut self, value: f32) {
        self.channel_aftertouch = value;
        self.set_cc(CC_CHANNEL_AFTERTOUCH, value);
    }

    /// Zeroes every controller and the pitch bend. Note state is kept, so the note
    /// gate stays up while notes are held.
    pub fn reset_all_controllers(&mut self) {
        self.cc_values.fill(0.0);
        self.pitch_bend = 0.0;
        self.channel_aftertouch = 0.0;
        self.poly_aftertouch.fill(0.0);
        if self.active_notes > 0 {
            self.set_cc(CC_KEYBOARD_NOTE_GATE, 1.0);
        }
    }

    /// Returns everything to the initial state.
    pub fn reset(&mut self) {
        *self = MidiState::new();
    }

    /// Gets a controller value, 0 for controllers outside the table.
    pub fn cc_value(&self, cc: u16) -> f32 {
        self.cc_values.get(cc as usize).copied().unwrap_or(0.0)
    }

    pub fn pitch_bend(&self) -> f32 {
        self.pitch_bend
    }

    pub fn channel_aftertouch(&self) -> f32 {
        self.channel_aftertouch
    }

    /// Gets the last recorded on-velocity of a note.
    pub fn note_velocity(&self, note: u8) -> f32 {
        self.note_velocities
            .get(note as usize)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn is_note_pressed(&self, note: u8) -> bool {
        self.note_pressed
            .get(note as usize)
            .copied()
            .unwrap_or(false)
    }

    pub fn poly_aftertouch(&self, note: u8) -> f32 {
        self.poly_aftertouch
            .get(note as usize)
            .copied()
            .unwrap_or(0.0)
    }

    /// Number of notes currently held.
    pub fn active_notes(&self) -> usize {
        self.active_notes
    }

    /// The velocity of the most recent note-on, whatever the note.
    pub fn velocity_override(&self) -> f32 {
        self.velocity_override
    }

    /// The most recent note-on number.
    pub fn last_note(&self) -> Option<u8> {
        self.last_note
    }

    fn set_cc(&mut self, cc: u16, value: f32) {
        if let Some(slot) = self.cc_values.get_mut(cc as usize) {
            *slot = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(value: u8) -> f32 {
        value as f32 / 127.0
    }

    #[test]
    fn test_initial_values() {
        let state = MidiState::new();
        for cc in 0..NUM_CCS as u16 {
            assert_eq!(state.cc_value(cc), 0.0);
        }
        assert_eq!(state.pitch_bend(), 0.0);
        assert_eq!(state.active_notes(), 0);
        assert_eq!(state.last_note(), None);
    }

    #[test]
    fn test_set_and_get_ccs() {
        let mut state = MidiState::new();
        state.cc_event(24, norm(23));
        state.cc_event(123, norm(124));
        assert_eq!(state.cc_value(24), norm(23));
        assert_eq!(state.cc_value(123), norm(124));
    }

    #[test]
    fn test_set_and_get_pitch_bends() {
        let mut state = MidiState::new();
        state.pitch_bend_event(0.5);
        assert_eq!(state.pitch_bend(), 0.5);
        assert_eq!(state.cc_value(CC_PITCH_BEND), 0.75);
        state.pitch_bend_event(0.0);
        assert_eq!(state.pitch_bend(), 0.0);
    }

    #[test]
    fn test_reset() {
        let mut state = MidiState::new();
        state.pitch_bend_event(0.7);
        state.note_on(64, norm(24));
        state.cc_event(123, norm(124));
        state.reset();
        assert_eq!(state.pitch_bend(), 0.0);
        assert_eq!(state.note_velocity(64), 0.0);
        assert!(!state.is_note_pressed(64));
        assert_eq!(state.cc_value(123), 0.0);
        assert_eq!(state.active_notes(), 0);
    }

    #[test]
    fn test_reset_all_controllers() {
        let mut state = MidiState::new();
        state.note_on(60, 0.5);
        state.pitch_bend_event(0.7);
        state.cc_event(122, norm(124));
        assert_eq!(state.pitch_bend(), 0.7);
        assert_eq!(state.cc_value(122), norm(124));

        state.reset_all_controllers();
        assert_eq!(state.pitch_bend(), 0.0);
        assert_eq!(state.cc_value(122), 0.0);
        assert_eq!(state.cc_value(4), 0.0);

        // Notes are untouched, and so is the gate that follows them.
        assert!(state.is_note_pressed(60));
        assert_eq!(state.note_velocity(60), 0.5);
        assert_eq!(state.active_notes(), 1);
        assert_eq!(state.cc_value(CC_KEYBOARD_NOTE_GATE), 1.0);

        state.note_off(60, 0.0);
        state.reset_all_controllers();
        assert_eq!(state.cc_value(CC_KEYBOARD_NOTE_GATE), 0.0);
    }

    #[test]
    fn test_note_velocities() {
        let mut state = MidiState::new();
        state.note_on(64, 0.2);
        assert_eq!(state.note_velocity(64), 0.2);
        state.note_on(64, 0.6);
        assert_eq!(state.note_velocity(64), 0.6);
        state.reset();
        assert_eq!(state.note_velocity(64), 0.0);
    }

    #[test]
    fn test_velocity_survives_note_off() {
        let mut state = MidiState::new();
        state.note_on(60, 0.8);
        state.note_off(60, 0.1);
        assert_eq!(state.note_velocity(60), 0.8);
        assert!(!state.is_note_pressed(60));
        assert_eq!(state.cc_value(CC_NOTE_OFF_VELOCITY), 0.1);
    }

    #[test]
    fn test_velocity_override_is_most_recent() {
        let mut state = MidiState::new();
        state.note_on(62, 0.5);
        state.note_on(60, 0.2);
        assert_eq!(state.velocity_override(), 0.2);
        assert_eq!(state.last_note(), Some(60));
    }

    #[test]
    fn test_extended_ccs_do_not_trap() {
        let mut state = MidiState::new();
        state.cc_event(10, 0.3);
        state.cc_event(142, norm(64));
        state.cc_event(NUM_CCS as u16, 1.0);
        state.cc_event(u16::MAX, 1.0);
        assert_eq!(state.cc_value(142), norm(64));
        assert_eq!(state.cc_value(10), 0.3);
        assert_eq!(state.cc_value(u16::MAX), 0.0);
    }

    #[test]
    fn test_active_notes_match_pressed_flags() {
        let mut state = MidiState::new();
        state.note_on(60, 0.5);
        state.note_on(60, 0.5);
        state.note_on(64, 0.5);
        assert_eq!(state.active_notes(), 2);

        state.note_off(67, 0.0);
        assert_eq!(state.active_notes(), 2);

        state.note_off(60, 0.0);
        state.note_off(60, 0.0);
        assert_eq!(state.active_notes(), 1);

        let pressed = (0..NUM_NOTES as u8)
            .filter(|note| state.is_note_pressed(*note))
            .count();
        assert_eq!(pressed, state.active_notes());
    }

    #[test]
    fn test_keyboard_extended_ccs() {
        let mut state = MidiState::new();
        state.note_on(127, 0.4);
        assert_eq!(state.cc_value(CC_NOTE_ON_VELOCITY), 0.4);
        assert_eq!(state.cc_value(CC_KEYBOARD_NOTE_NUMBER), 1.0);
        assert_eq!(state.cc_value(CC_KEYBOARD_NOTE_GATE), 1.0);
        assert_eq!(state.cc_value(CC_ALTERNATE), 1.0);

        state.note_on(60, 0.4);
        assert_eq!(state.cc_value(CC_ALTERNATE), 0.0);

        state.note_off(127, 0.0);
        assert_eq!(state.cc_value(CC_KEYBOARD_NOTE_GATE), 1.0);
        state.note_off(60, 0.0);
        assert_eq!(state.cc_value(CC_KEYBOARD_NOTE_GATE), 0.0);
    }

    #[test]
    fn test_aftertouch() {
        let mut state = MidiState::new();
        state.poly_aftertouch_event(60, 0.3);
        state.channel_aftertouch_event(0.6);
        assert_eq!(state.poly_aftertouch(60), 0.3);
        assert_eq!(state.poly_aftertouch(61), 0.0);
        assert_eq!(state.cc_value(CC_POLY_AFTERTOUCH), 0.3);
        assert_eq!(state.channel_aftertouch(), 0.6);
        assert_eq!(state.cc_value(CC_CHANNEL_AFTERTOUCH), 0.6);
    }
}
