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
use crate::midi_state::{NUM_CCS, NUM_NOTES};
use crate::range::Range;

/// Default controller number of the sustain pedal.
pub const DEFAULT_SUSTAIN_CC: u16 = 64;

/// Default controller number of the sostenuto pedal.
pub const DEFAULT_SOSTENUTO_CC: u16 = 66;

/// Default pedal threshold (normalized), i.e. MIDI value 64 and up counts as pressed.
pub const DEFAULT_PEDAL_THRESHOLD: f32 = 0.5;

/// Which musical context makes a layer fire.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Fire on every qualifying note-on.
    #[default]
    Attack,
    /// Fire only on the first note of a legato group (no other note held).
    First,
    /// Fire only on notes played while another note is held.
    Legato,
    /// Fire on note-off, ignoring pedals.
    ReleaseKey,
    /// Fire on note-off, deferring the release while sustain or sostenuto holds it.
    Release,
}

impl Trigger {
    /// Returns true for the modes that fire on note-off.
    pub fn is_release(&self) -> bool {
        matches!(self, Trigger::Release | Trigger::ReleaseKey)
    }
}

/// Which velocity a layer tests against its velocity range.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VelocityOverride {
    /// Use the velocity carried by the event.
    #[default]
    Current,
    /// Use the most recent note-on velocity, whatever note it was for.
    Previous,
}

/// A range of normalized values bound to a controller number.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, PartialEq)]
pub struct ControllerRange {
    /// The controller number.
    cc: u16,

    /// The accepted values (inclusive).
    range: Range<f32>,
}

impl ControllerRange {
    /// Creates a new controller range.
    pub fn new(cc: u16, range: Range<f32>) -> Self {
        ControllerRange { cc, range }
    }

    /// Returns the controller number.
    pub fn cc(&self) -> u16 {
        self.cc
    }

    /// Returns the accepted values.
    pub fn range(&self) -> &Range<f32> {
        &self.range
    }
}

/// The static configuration of a single sound layer.
///
/// All values other than notes and controller numbers are normalized: velocities,
/// controller values and aftertouch to [0, 1], pitch bend to [-1, 1]. Tempo is in
/// beats per minute.
#[derive(Deserialize, Clone, Serialize, Debug, PartialEq)]
#[serde(default)]
pub struct LayerConfig {
    /// An optional display name.
    name: Option<String>,

    /// The notes this layer responds to (inclusive).
    key_range: Range<u8>,

    /// The velocities this layer responds to (inclusive).
    velocity_range: Range<f32>,

    /// The slice of the random draw this layer owns.
    random_range: Range<f32>,

    /// Controller values that must hold for the layer to be switched on.
    cc_conditions: Vec<ControllerRange>,

    /// Controller values that trigger the layer on their own.
    cc_triggers: Vec<ControllerRange>,

    /// Round robin length.
    sequence_length: u32,

    /// Round robin position, 1-indexed.
    sequence_position: u32,

    /// Trigger mode.
    trigger: Trigger,

    sustain_cc: u16,
    sostenuto_cc: u16,
    sustain_threshold: f32,
    sostenuto_threshold: f32,
    check_sustain: bool,
    check_sostenuto: bool,

    /// Accepted polyphonic aftertouch of the played note.
    poly_aftertouch_range: Range<f32>,

    /// Accepted pitch bend.
    bend_range: Range<f32>,

    /// Accepted channel aftertouch.
    aftertouch_range: Range<f32>,

    /// Accepted tempo in beats per minute.
    bpm_range: Range<f32>,

    velocity_override: VelocityOverride,

    /// Whether note events may trigger the layer.
    trigger_on_note: bool,

    /// Whether controller events may trigger the layer. Defaults to true when any
    /// controller trigger is configured.
    trigger_on_cc: Option<bool>,

    /// The notes that act as key switches. When unset, any note can switch.
    keyswitch_range: Option<Range<u8>>,

    /// The key switch that enables this layer.
    last_keyswitch: Option<u8>,

    /// The note that must have been played right before for this layer to play.
    previous_keyswitch: Option<u8>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        LayerConfig {
            name: None,
            key_range: Range::new(0, 127),
            velocity_range: Range::new(0.0, 1.0),
            random_range: Range::new(0.0, 1.0),
            cc_conditions: Vec::new(),
            cc_triggers: Vec::new(),
            sequence_length: 1,
            sequence_position: 1,
            trigger: Trigger::Attack,
            sustain_cc: DEFAULT_SUSTAIN_CC,
            sostenuto_cc: DEFAULT_SOSTENUTO_CC,
            sustain_threshold: DEFAULT_PEDAL_THRESHOLD,
            sostenuto_threshold: DEFAULT_PEDAL_THRESHOLD,
            check_sustain: true,
            check_sostenuto: true,
            poly_aftertouch_range: Range::new(0.0, 1.0),
            bend_range: Range::new(-1.0, 1.0),
            aftertouch_range: Range::new(0.0, 1.0),
            bpm_range: Range::new(0.0, 500.0),
            velocity_override: VelocityOverride::Current,
            trigger_on_note: true,
            trigger_on_cc: None,
            keyswitch_range: None,
            last_keyswitch: None,
            previous_keyswitch: None,
        }
    }
}

impl LayerConfig {
    /// Returns the display name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn key_range(&self) -> &Range<u8> {
        &self.key_range
    }

    pub fn velocity_range(&self) -> &Range<f32> {
        &self.velocity_range
    }

    pub fn random_range(&self) -> &Range<f32> {
        &self.random_range
    }

    /// Gets the acceptance range of a controller, if one is configured.
    pub fn cc_condition(&self, cc: u16) -> Option<&Range<f32>> {
        self.cc_conditions
            .iter()
            .find(|c| c.cc == cc)
            .map(|c| &c.range)
    }

    /// Gets the trigger range of a controller, if one is configured.
    pub fn cc_trigger(&self, cc: u16) -> Option<&Range<f32>> {
        self.cc_triggers
            .iter()
            .find(|c| c.cc == cc)
            .map(|c| &c.range)
    }

    pub fn cc_conditions(&self) -> &[ControllerRange] {
        &self.cc_conditions
    }

    pub fn cc_triggers(&self) -> &[ControllerRange] {
        &self.cc_triggers
    }

    pub fn sequence_length(&self) -> u32 {
        self.sequence_length
    }

    pub fn sequence_position(&self) -> u32 {
        self.sequence_position
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    pub fn sustain_cc(&self) -> u16 {
        self.sustain_cc
    }

    pub fn sostenuto_cc(&self) -> u16 {
        self.sostenuto_cc
    }

    pub fn sustain_threshold(&self) -> f32 {
        self.sustain_threshold
    }

    pub fn sostenuto_threshold(&self) -> f32 {
        self.sostenuto_threshold
    }

    pub fn check_sustain(&self) -> bool {
        self.check_sustain
    }

    pub fn check_sostenuto(&self) -> bool {
        self.check_sostenuto
    }

    pub fn poly_aftertouch_range(&self) -> &Range<f32> {
        &self.poly_aftertouch_range
    }

    pub fn bend_range(&self) -> &Range<f32> {
        &self.bend_range
    }

    pub fn aftertouch_range(&self) -> &Range<f32> {
        &self.aftertouch_range
    }

    pub fn bpm_range(&self) -> &Range<f32> {
        &self.bpm_range
    }

    pub fn velocity_override(&self) -> VelocityOverride {
        self.velocity_override
    }

    pub fn trigger_on_note(&self) -> bool {
        self.trigger_on_note
    }

    pub fn trigger_on_cc(&self) -> bool {
        self.trigger_on_cc.unwrap_or(!self.cc_triggers.is_empty())
    }

    pub fn keyswitch_range(&self) -> Option<&Range<u8>> {
        self.keyswitch_range.as_ref()
    }

    pub fn last_keyswitch(&self) -> Option<u8> {
        self.last_keyswitch
    }

    pub fn previous_keyswitch(&self) -> Option<u8> {
        self.previous_keyswitch
    }

    /// Whether the layer waits for a key switch before it can play.
    pub fn uses_key_switches(&self) -> bool {
        self.last_keyswitch.is_some()
    }

    /// Whether the layer depends on the note played before the current one.
    pub fn uses_previous_key_switches(&self) -> bool {
        self.previous_keyswitch.is_some()
    }

    /// Whether the layer takes part in a round robin.
    pub fn uses_sequence_switches(&self) -> bool {
        self.sequence_length != 1 || self.sequence_position != 1
    }

    /// Checks the configuration for values the trigger logic cannot work with.
    /// `index` identifies the layer in the error.
    pub fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            layer: index,
            reason,
        };

        if self.sequence_length < 1 {
            return Err(invalid("sequence_length must be at least 1".into()));
        }
        if self.sequence_position < 1 {
            return Err(invalid("sequence_position must be at least 1".into()));
        }
        if !self.key_range.is_valid() || self.key_range.end() as usize >= NUM_NOTES {
            return Err(invalid(format!("key_range {} is invalid", self.key_range)));
        }

        let ranges = [
            ("velocity_range", &self.velocity_range),
            ("random_range", &self.random_range),
            ("poly_aftertouch_range", &self.poly_aftertouch_range),
            ("bend_range", &self.bend_range),
            ("aftertouch_range", &self.aftertouch_range),
            ("bpm_range", &self.bpm_range),
        ];
        for (field, range) in ranges {
            if !range.is_valid() {
                return Err(invalid(format!("{} {} is inverted", field, range)));
            }
        }

        for (field, threshold) in [
            ("sustain_threshold", self.sustain_threshold),
            ("sostenuto_threshold", self.sostenuto_threshold),
        ] {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(invalid(format!("{} {} is outside [0, 1]", field, threshold)));
            }
        }

        for controller in self.cc_conditions.iter().chain(self.cc_triggers.iter()) {
            if controller.cc as usize >= NUM_CCS {
                return Err(invalid(format!(
                    "controller {} is beyond the supported {} controllers",
                    controller.cc, NUM_CCS
                )));
            }
            if !controller.range.is_valid() {
                return Err(invalid(format!(
                    "range {} for controller {} is inverted",
                    controller.range, controller.cc
                )));
            }
        }

        if let Some(range) = &self.keyswitch_range {
            if !range.is_valid() || range.end() as usize >= NUM_NOTES {
                return Err(invalid(format!("keyswitch_range {} is invalid", range)));
            }
        }
        for (field, note) in [
            ("last_keyswitch", self.last_keyswitch),
            ("previous_keyswitch", self.previous_keyswitch),
        ] {
            if note.is_some_and(|n| n as usize >= NUM_NOTES) {
                return Err(invalid(format!("{} must be a MIDI note", field)));
            }
        }

        Ok(())
    }
}

/// Builder-style setters for assembling configurations in code.
impl LayerConfig {
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_key_range(mut self, low: u8, high: u8) -> Self {
        self.key_range = Range::new(low, high);
        self
    }

    pub fn with_velocity_range(mut self, low: f32, high: f32) -> Self {
        self.velocity_range = Range::new(low, high);
        self
    }

    pub fn with_random_range(mut self, low: f32, high: f32) -> Self {
        self.random_range = Range::new(low, high);
        self
    }

    pub fn with_cc_condition(mut self, cc: u16, low: f32, high: f32) -> Self {
        self.cc_conditions
            .push(ControllerRange::new(cc, Range::new(low, high)));
        self
    }

    pub fn with_cc_trigger(mut self, cc: u16, low: f32, high: f32) -> Self {
        self.cc_triggers
            .push(ControllerRange::new(cc, Range::new(low, high)));
        self
    }

    pub fn with_sequence(mut self, length: u32, position: u32) -> Self {
        self.sequence_length = length;
        self.sequence_position = position;
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_sustain(mut self, cc: u16, threshold: f32, check: bool) -> Self {
        self.sustain_cc = cc;
        self.sustain_threshold = threshold;
        self.check_sustain = check;
        self
    }

    pub fn with_sostenuto(mut self, cc: u16, threshold: f32, check: bool) -> Self {
        self.sostenuto_cc = cc;
        self.sostenuto_threshold = threshold;
        self.check_sostenuto = check;
        self
    }

    pub fn with_poly_aftertouch_range(mut self, low: f32, high: f32) -> Self {
        self.poly_aftertouch_range = Range::new(low, high);
        self
    }

    pub fn with_bend_range(mut self, low: f32, high: f32) -> Self {
        self.bend_range = Range::new(low, high);
        self
    }

    pub fn with_aftertouch_range(mut self, low: f32, high: f32) -> Self {
        self.aftertouch_range = Range::new(low, high);
        self
    }

    pub fn with_bpm_range(mut self, low: f32, high: f32) -> Self {
        self.bpm_range = Range::new(low, high);
        self
    }

    pub fn with_velocity_override(mut self, velocity_override: VelocityOverride) -> Self {
        self.velocity_override = velocity_override;
        self
    }

    pub fn with_trigger_on_note(mut self, trigger_on_note: bool) -> Self {
        self.trigger_on_note = trigger_on_note;
        self
    }

    pub fn with_trigger_on_cc(mut self, trigger_on_cc: bool) -> Self {
        self.trigger_on_cc = Some(trigger_on_cc);
        self
    }

    pub fn with_keyswitch(mut self, range: Option<(u8, u8)>, last: u8) -> Self {
        self.keyswitch_range = range.map(|(low, high)| Range::new(low, high));
        self.last_keyswitch = Some(last);
        self
    }

    pub fn with_previous_keyswitch(mut self, note: u8) -> Self {
        self.previous_keyswitch = Some(note);
        self
    }
}
