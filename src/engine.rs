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

//! Event dispatch across all layers of a sound bank.
//!
//! Every event updates the shared [`MidiState`] first and is then offered to each
//! layer in bank order. Fire decisions are reported through a callback so the hot
//! path never allocates.

use midly::live::LiveEvent;
use midly::num::u7;
use midly::MidiMessage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};

use crate::config::SoundBank;
use crate::layer::Layer;
use crate::midi_state::{MidiState, NUM_CCS};

/// The controller that resets all controllers.
pub const RESET_ALL_CONTROLLERS_CC: u16 = 121;

/// What kind of event made a layer fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerKind {
    /// A note-on.
    Attack,
    /// A note-off, or a release handed back by the sustain pedal.
    Release,
    /// A controller change.
    Controller,
}

/// A decision to start a voice for a layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trigger {
    /// Index of the layer in the bank.
    pub layer: usize,
    pub kind: TriggerKind,
    /// The note for attacks and releases, the controller number otherwise.
    pub number: u16,
    /// The velocity for attacks and releases, the controller value otherwise.
    pub value: f32,
}

/// Owns the controller state and the layers of one sound bank.
pub struct TriggerEngine {
    midi_state: MidiState,
    layers: Vec<Layer>,
    /// Channel filter, 0-indexed.
    channel: Option<u8>,
    rng: StdRng,
}

impl TriggerEngine {
    /// Creates an engine for the given bank.
    pub fn new(bank: &SoundBank) -> Self {
        let rng = match bank.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let layers: Vec<Layer> = bank.layers().iter().cloned().map(Layer::new).collect();

        info!(
            layers = layers.len(),
            channel = ?bank.channel(),
            "Trigger engine created"
        );

        TriggerEngine {
            midi_state: MidiState::new(),
            layers,
            channel: bank.channel().map(|c| c.saturating_sub(1)),
            rng,
        }
    }

    /// Gets the shared controller state.
    pub fn midi_state(&self) -> &MidiState {
        &self.midi_state
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    /// Handles a note-on. `velocity` is normalized.
    pub fn note_on<F: FnMut(Trigger)>(&mut self, note: u8, velocity: f32, mut on_trigger: F) {
        let previous_note = self.midi_state.last_note();
        self.midi_state.note_on(note, velocity);
        let random = self.rng.gen::<f32>();

        for (index, layer) in self.layers.iter_mut().enumerate() {
            layer.register_key_switch(note, previous_note);
            if layer.register_note_on(&self.midi_state, note, velocity, random) {
                trace!(layer = index, note, velocity, "Attack");
                on_trigger(Trigger {
                    layer: index,
                    kind: TriggerKind::Attack,
                    number: u16::from(note),
                    value: velocity,
                });
            }
        }
    }

    /// Handles a note-off. `velocity` is normalized.
    pub fn note_off<F: FnMut(Trigger)>(&mut self, note: u8, velocity: f32, mut on_trigger: F) {
        self.midi_state.note_off(note, velocity);
        let random = self.rng.gen::<f32>();

        for (index, layer) in self.layers.iter_mut().enumerate() {
            if layer.register_note_off(&self.midi_state, note, velocity, random) {
                trace!(layer = index, note, velocity, "Release");
                on_trigger(Trigger {
                    layer: index,
                    kind: TriggerKind::Release,
                    number: u16::from(note),
                    value: velocity,
                });
            }
        }
    }

    /// Handles a controller change. When a layer's sustain pedal goes up, the
    /// releases it held are decided again and reported as releases. CC 121 resets
    /// every controller first.
    pub fn control_change<F: FnMut(Trigger)>(&mut self, cc: u16, value: f32, mut on_trigger: F) {
        if cc == RESET_ALL_CONTROLLERS_CC {
            self.reset_controllers(&mut on_trigger);
        }

        self.midi_state.cc_event(cc, value);
        let random = self.rng.gen::<f32>();

        for (index, layer) in self.layers.iter_mut().enumerate() {
            let was_sustained = layer.is_sustain_pressed();

            if layer.register_cc(&self.midi_state, cc, value, random) {
                trace!(layer = index, cc, value, "Controller trigger");
                on_trigger(Trigger {
                    layer: index,
                    kind: TriggerKind::Controller,
                    number: cc,
                    value,
                });
            }

            if was_sustained && !layer.is_sustain_pressed() {
                release_sustained(
                    index,
                    layer,
                    &self.midi_state,
                    &mut self.rng,
                    &mut on_trigger,
                );
            }
        }
    }

    /// Handles a pitch bend normalized to [-1, 1].
    pub fn pitch_bend(&mut self, bend: f32) {
        self.midi_state.pitch_bend_event(bend);
        for layer in self.layers.iter_mut() {
            layer.register_pitch_wheel(bend);
        }
    }

    /// Handles a channel aftertouch.
    pub fn channel_aftertouch(&mut self, value: f32) {
        self.midi_state.channel_aftertouch_event(value);
        for layer in self.layers.iter_mut() {
            layer.register_aftertouch(value);
        }
    }

    /// Handles a polyphonic aftertouch. It is consulted on the note's next decision.
    pub fn poly_aftertouch(&mut self, note: u8, value: f32) {
        self.midi_state.poly_aftertouch_event(note, value);
    }

    /// Handles a tempo change.
    pub fn tempo(&mut self, seconds_per_quarter: f32) {
        for layer in self.layers.iter_mut() {
            layer.register_tempo(seconds_per_quarter);
        }
    }

    /// Zeroes the controllers and re-arms the gates that follow them. Releases held
    /// by a sustain pedal that the reset lifts are decided and dropped.
    pub fn reset_all_controllers(&mut self) {
        self.reset_controllers(|_| {});
    }

    /// Zeroes the controllers and replays a value of 0 for each of them into every
    /// layer. Controller triggers do not fire on a reset, sustained releases do.
    fn reset_controllers<F: FnMut(Trigger)>(&mut self, mut on_trigger: F) {
        self.midi_state.reset_all_controllers();

        for (index, layer) in self.layers.iter_mut().enumerate() {
            let was_sustained = layer.is_sustain_pressed();

            layer.register_pitch_wheel(0.0);
            layer.register_aftertouch(0.0);
            for cc in 0..NUM_CCS as u16 {
                layer.register_cc(&self.midi_state, cc, 0.0, 0.0);
            }

            if was_sustained && !layer.is_sustain_pressed() {
                release_sustained(
                    index,
                    layer,
                    &self.midi_state,
                    &mut self.rng,
                    &mut on_trigger,
                );
            }
        }
    }

    /// Returns the controller state and every layer to their initial state.
    pub fn reset(&mut self) {
        self.midi_state.reset();
        for layer in self.layers.iter_mut() {
            *layer = Layer::new(layer.config().clone());
        }
    }

    /// Parses a raw MIDI message and dispatches it.
    pub fn process_midi_event<F: FnMut(Trigger)>(&mut self, raw_event: &[u8], on_trigger: F) {
        let event = match LiveEvent::parse(raw_event) {
            Ok(e) => e,
            Err(e) => {
                debug!(error = ?e, "Failed to parse MIDI event");
                return;
            }
        };
        self.process_live_event(&event, on_trigger);
    }

    /// Dispatches an already parsed MIDI event.
    pub fn process_live_event<F: FnMut(Trigger)>(&mut self, event: &LiveEvent, on_trigger: F) {
        let LiveEvent::Midi { channel, message } = event else {
            trace!("Ignoring non-channel MIDI event");
            return;
        };

        if self.channel.is_some_and(|c| c != channel.as_int()) {
            return;
        }

        match *message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => {
                // Note On with velocity 0 is equivalent to Note Off
                self.note_off(key.as_int(), 0.0, on_trigger);
            }
            MidiMessage::NoteOn { key, vel } => {
                self.note_on(key.as_int(), normalize(vel), on_trigger);
            }
            MidiMessage::NoteOff { key, vel } => {
                self.note_off(key.as_int(), normalize(vel), on_trigger);
            }
            MidiMessage::Controller { controller, value } => {
                self.control_change(u16::from(controller.as_int()), normalize(value), on_trigger);
            }
            MidiMessage::PitchBend { bend } => {
                self.pitch_bend(bend.as_f32().clamp(-1.0, 1.0));
            }
            MidiMessage::ChannelAftertouch { vel } => {
                self.channel_aftertouch(normalize(vel));
            }
            MidiMessage::Aftertouch { key, vel } => {
                self.poly_aftertouch(key.as_int(), normalize(vel));
            }
            MidiMessage::ProgramChange { .. } => {}
        }
    }
}

/// Decides again every release the layer's sustain pedal held, after the pedal
/// went up.
fn release_sustained<F: FnMut(Trigger)>(
    index: usize,
    layer: &mut Layer,
    state: &MidiState,
    rng: &mut StdRng,
    on_trigger: &mut F,
) {
    let releases = layer.take_sustain_releases();
    debug!(
        layer = index,
        count = releases.len(),
        "Sustain lifted, releasing held notes"
    );
    for release in releases.iter() {
        let random = rng.gen::<f32>();
        if layer.register_note_off(state, release.note, release.velocity, random) {
            on_trigger(Trigger {
                layer: index,
                kind: TriggerKind::Release,
                number: u16::from(release.note),
                value: release.velocity,
            });
        }
    }
}

/// Normalizes a 7-bit MIDI value to [0, 1].
fn normalize(value: u7) -> f32 {
    f32::from(value.as_int()) / 127.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LayerConfig, Trigger as TriggerMode};

    fn engine(layers: Vec<LayerConfig>) -> TriggerEngine {
        TriggerEngine::new(&SoundBank::new(None, Some(1), layers))
    }

    fn collect(triggers: &mut Vec<Trigger>) -> impl FnMut(Trigger) + '_ {
        move |trigger| triggers.push(trigger)
    }

    #[test]
    fn test_engine_creation() {
        let engine = engine(vec![LayerConfig::default(), LayerConfig::default()]);
        assert_eq!(engine.layers().len(), 2);
        assert_eq!(engine.midi_state().active_notes(), 0);
        assert!(engine.layer(2).is_none());
    }

    #[test]
    fn test_note_on_fires_matching_layers() {
        let mut engine = engine(vec![
            LayerConfig::default().with_key_range(0, 59),
            LayerConfig::default().with_key_range(60, 127),
        ]);

        let mut triggers = Vec::new();
        engine.note_on(64, 0.5, collect(&mut triggers));

        assert_eq!(
            triggers,
            vec![Trigger {
                layer: 1,
                kind: TriggerKind::Attack,
                number: 64,
                value: 0.5,
            }]
        );
        assert!(engine.midi_state().is_note_pressed(64));
    }

    #[test]
    fn test_random_layer_selection() {
        let mut engine = engine(vec![
            LayerConfig::default().with_random_range(0.0, 0.5),
            LayerConfig::default().with_random_range(0.5, 1.0),
        ]);

        for _ in 0..100 {
            let mut triggers = Vec::new();
            engine.note_on(60, 0.5, collect(&mut triggers));
            assert_eq!(triggers.len(), 1);
        }
    }

    #[test]
    fn test_sustain_release_is_drained() {
        let mut engine = engine(vec![
            LayerConfig::default(),
            LayerConfig::default().with_trigger(TriggerMode::Release),
        ]);

        let mut triggers = Vec::new();
        engine.control_change(64, 1.0, collect(&mut triggers));
        engine.note_on(60, 0.7, collect(&mut triggers));
        assert_eq!(triggers.len(), 1);

        triggers.clear();
        engine.note_off(60, 0.2, collect(&mut triggers));
        assert!(triggers.is_empty());
        assert!(engine.layers()[1].is_note_sustained(60));

        engine.control_change(64, 0.0, collect(&mut triggers));
        assert_eq!(
            triggers,
            vec![Trigger {
                layer: 1,
                kind: TriggerKind::Release,
                number: 60,
                value: 0.7,
            }]
        );
        assert!(engine.layers()[1].sustain_releases().is_empty());
    }

    #[test]
    fn test_sostenuto_release_is_not_drained() {
        let mut engine = engine(vec![LayerConfig::default().with_trigger(TriggerMode::Release)]);

        let mut triggers = Vec::new();
        engine.note_on(60, 0.5, collect(&mut triggers));
        engine.control_change(66, 1.0, collect(&mut triggers));
        engine.note_off(60, 0.0, collect(&mut triggers));
        engine.control_change(66, 0.0, collect(&mut triggers));

        assert!(triggers.is_empty());
        assert!(engine.layers()[0].sostenuto_releases().is_empty());
    }

    #[test]
    fn test_process_midi_event() {
        let mut engine = engine(vec![
            LayerConfig::default(),
            LayerConfig::default().with_trigger(TriggerMode::ReleaseKey),
        ]);

        let mut triggers = Vec::new();
        engine.process_midi_event(&[0x90, 60, 127], collect(&mut triggers));
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].kind, TriggerKind::Attack);
        assert_eq!(triggers[0].value, 1.0);

        // Note On with velocity 0 releases the note.
        triggers.clear();
        engine.process_midi_event(&[0x90, 60, 0], collect(&mut triggers));
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].kind, TriggerKind::Release);
        assert_eq!(triggers[0].layer, 1);
        assert!(!engine.midi_state().is_note_pressed(60));

        engine.process_midi_event(&[0xB0, 7, 127], collect(&mut triggers));
        assert_eq!(engine.midi_state().cc_value(7), 1.0);

        engine.process_midi_event(&[0xE0, 0x00, 0x00], collect(&mut triggers));
        assert_eq!(engine.midi_state().pitch_bend(), -1.0);

        engine.process_midi_event(&[0xA0, 60, 127], collect(&mut triggers));
        assert_eq!(engine.midi_state().poly_aftertouch(60), 1.0);

        engine.process_midi_event(&[0xD0, 127], collect(&mut triggers));
        assert_eq!(engine.midi_state().channel_aftertouch(), 1.0);

        // Garbage is ignored.
        engine.process_midi_event(&[0x42], collect(&mut triggers));
    }

    #[test]
    fn test_channel_filter() {
        let mut engine = TriggerEngine::new(&SoundBank::new(
            Some(10),
            Some(1),
            vec![LayerConfig::default()],
        ));

        let mut triggers = Vec::new();
        engine.process_midi_event(&[0x90, 36, 100], collect(&mut triggers));
        assert!(triggers.is_empty());
        assert_eq!(engine.midi_state().active_notes(), 0);

        engine.process_midi_event(&[0x99, 36, 100], collect(&mut triggers));
        assert_eq!(triggers.len(), 1);
    }

    #[test]
    fn test_controller_triggers() {
        let mut engine = engine(vec![LayerConfig::default()
            .with_trigger_on_note(false)
            .with_cc_trigger(20, 0.5, 1.0)]);

        let mut triggers = Vec::new();
        engine.control_change(20, 0.25, collect(&mut triggers));
        engine.note_on(60, 0.5, collect(&mut triggers));
        assert!(triggers.is_empty());

        engine.control_change(20, 0.75, collect(&mut triggers));
        assert_eq!(
            triggers,
            vec![Trigger {
                layer: 0,
                kind: TriggerKind::Controller,
                number: 20,
                value: 0.75,
            }]
        );
    }

    #[test]
    fn test_key_switch_through_engine() {
        let mut engine = engine(vec![LayerConfig::default()
            .with_key_range(48, 72)
            .with_keyswitch(Some((24, 25)), 24)]);

        let mut triggers = Vec::new();
        engine.note_on(60, 0.5, collect(&mut triggers));
        assert!(triggers.is_empty());

        engine.note_on(24, 0.5, collect(&mut triggers));
        engine.note_on(60, 0.5, collect(&mut triggers));
        assert_eq!(triggers.len(), 1);

        engine.note_on(25, 0.5, collect(&mut triggers));
        engine.note_on(62, 0.5, collect(&mut triggers));
        assert_eq!(triggers.len(), 1);
    }

    #[test]
    fn test_reset_all_controllers_lifts_pedals_and_conditions() {
        let mut engine = engine(vec![
            LayerConfig::default().with_trigger(TriggerMode::Release),
            LayerConfig::default().with_cc_condition(1, 0.5, 1.0),
        ]);

        let mut triggers = Vec::new();
        engine.control_change(64, 1.0, collect(&mut triggers));
        engine.control_change(1, 0.8, collect(&mut triggers));
        assert!(engine.layers()[0].is_sustain_pressed());
        assert!(engine.layers()[1].is_switched_on());

        engine.note_on(60, 0.7, collect(&mut triggers));
        triggers.clear();
        engine.note_off(60, 0.0, collect(&mut triggers));
        assert!(triggers.is_empty());
        assert!(engine.layers()[0].is_note_sustained(60));

        // The held release fires when the reset lifts the pedal.
        engine.control_change(RESET_ALL_CONTROLLERS_CC, 0.0, collect(&mut triggers));
        assert_eq!(
            triggers,
            vec![Trigger {
                layer: 0,
                kind: TriggerKind::Release,
                number: 60,
                value: 0.7,
            }]
        );
        assert_eq!(engine.midi_state().cc_value(64), 0.0);
        assert!(!engine.layers()[0].is_sustain_pressed());
        assert!(engine.layers()[0].sustain_releases().is_empty());
        assert!(!engine.layers()[1].is_switched_on());

        // Later releases are no longer deferred.
        triggers.clear();
        engine.note_on(62, 0.5, collect(&mut triggers));
        engine.note_off(62, 0.0, collect(&mut triggers));
        assert_eq!(
            triggers,
            vec![Trigger {
                layer: 0,
                kind: TriggerKind::Release,
                number: 62,
                value: 0.0,
            }]
        );
    }

    #[test]
    fn test_reset_all_controllers_does_not_fire_controller_triggers() {
        let mut engine = engine(vec![LayerConfig::default()
            .with_trigger_on_note(false)
            .with_cc_trigger(20, 0.0, 0.5)]);

        let mut triggers = Vec::new();
        engine.control_change(RESET_ALL_CONTROLLERS_CC, 0.0, collect(&mut triggers));
        assert!(triggers.is_empty());

        engine.reset_all_controllers();
        engine.control_change(20, 0.25, collect(&mut triggers));
        assert_eq!(triggers.len(), 1);
    }

    #[test]
    fn test_gates_and_reset() {
        let mut engine = engine(vec![LayerConfig::default()
            .with_bend_range(0.0, 1.0)
            .with_bpm_range(100.0, 140.0)]);

        let mut triggers = Vec::new();
        engine.pitch_bend(-0.5);
        engine.note_on(60, 0.5, collect(&mut triggers));
        assert!(triggers.is_empty());

        engine.control_change(RESET_ALL_CONTROLLERS_CC, 0.0, collect(&mut triggers));
        assert_eq!(engine.midi_state().pitch_bend(), 0.0);
        engine.note_on(60, 0.5, collect(&mut triggers));
        assert_eq!(triggers.len(), 1);

        engine.tempo(1.0);
        engine.note_on(60, 0.5, collect(&mut triggers));
        assert_eq!(triggers.len(), 1);

        engine.reset();
        assert_eq!(engine.midi_state().active_notes(), 0);
        assert!(engine.layers()[0].is_switched_on());
    }
}
