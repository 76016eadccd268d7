//! Voice manager: pool allocation, note lifecycle, unison and mono/legato
//! play modes.

#[allow(unused_imports)]
use num_traits::float::Float;

use heapless::Vec;
use log::warn;

use crate::patch::{OperatorParams, Patch};
use crate::voice::FmVoice;

/// Reference to a pool slot, valid only while the slot's generation
/// matches. A reclaimed slot bumps its generation, so stale references
/// degrade to no-ops instead of touching a voice that was handed to a
/// different key.
#[derive(Debug, Clone, Copy)]
struct VoiceRef {
    slot: usize,
    generation: u32,
}

/// A held key and the pool slots that sound it.
#[derive(Debug)]
struct KeyEvent<const MAX_POLYPHONY: usize> {
    note: u8,
    velocity: u8,
    voices: Vec<VoiceRef, MAX_POLYPHONY>,
}

#[derive(Debug)]
struct VoiceSlot<const N_OSC: usize> {
    in_use: bool,
    generation: u32,
    voice: FmVoice<N_OSC>,
}

/// Polyphony controller owning the voice pool and the shared [`Patch`].
///
/// All mutation happens from the task context; the audio loop only calls
/// [`FmSynth::get_sample`], [`FmSynth::increment_phases`] and
/// [`FmSynth::clean_voice_pool`], which are bounded-time and non-blocking.
#[derive(Debug)]
pub struct FmSynth<const N_OSC: usize = 2, const MAX_POLYPHONY: usize = 4> {
    center_tune: f32,
    global_detune: f32,

    mono: bool,
    legato: bool,

    /// Number of unison voices to spawn per keypress; 0 disables unison.
    unison: u8,
    /// Volume of the off-center unison voices.
    unison_vol: f32,
    /// Pitch spread of the unison voices, in cents.
    unison_pitch: f32,
    /// Phase spread of the unison voices, in [0, 1].
    unison_phase: f32,
    /// Panning spread of the unison voices, in [0, 1].
    unison_pan: f32,

    n_polyphony: u8,

    patch: Patch<N_OSC>,
    voices: [VoiceSlot<N_OSC>; MAX_POLYPHONY],
    voices_used: u8,
    key_events: Vec<KeyEvent<MAX_POLYPHONY>, MAX_POLYPHONY>,
}

impl<const N_OSC: usize, const MAX_POLYPHONY: usize> FmSynth<N_OSC, MAX_POLYPHONY> {
    pub fn new() -> Self {
        Self {
            center_tune: 440.0,
            global_detune: 0.0,
            mono: false,
            legato: false,
            unison: 0,
            unison_vol: 0.0,
            unison_pitch: 0.0,
            unison_phase: 0.0,
            unison_pan: 0.0,
            n_polyphony: MAX_POLYPHONY as u8,
            patch: Patch::new(),
            voices: core::array::from_fn(|_| VoiceSlot {
                in_use: false,
                generation: 0,
                voice: FmVoice::new(),
            }),
            voices_used: 0,
            key_events: Vec::new(),
        }
    }

    /// Equal temperament centered on MIDI note 64 at `center_tune` Hz.
    #[inline]
    fn note_to_hz(&self, note: u8) -> f32 {
        self.center_tune * (2.0_f32).powf((note as f32 - 64.0) / 12.0)
    }

    /// Handles a semantic note-on event.
    ///
    /// In polyphonic mode the event is dropped silently when the polyphony
    /// cap is reached. In monophonic mode at most one key event exists;
    /// with legato enabled a held key is retuned in place without
    /// retriggering the envelopes.
    pub fn note_pressed(&mut self, note: u8, velocity: u8) {
        if self.mono {
            if self.legato && !self.key_events.is_empty() {
                self.retune_held_key(note, velocity);
                return;
            }
            // Release whatever key is still held before the new allocation.
            if !self.legato {
                if let Some(prev) = self.key_events.first().map(|event| event.note) {
                    self.note_released(prev, velocity);
                }
            }
        } else if self.voices_used >= self.n_polyphony {
            return;
        }

        let mut event = KeyEvent {
            note,
            velocity,
            voices: Vec::new(),
        };
        self.play_note(&mut event);
        if event.voices.is_empty() {
            return;
        }

        if self.key_events.is_full() {
            self.prune_stale_events();
        }
        if self.key_events.push(event).is_err() {
            warn!("key event list full, note {} will not be releasable", note);
        }
    }

    /// Handles a semantic note-off event. Any velocity releases a
    /// matching key.
    pub fn note_released(&mut self, note: u8, _velocity: u8) {
        let Self {
            key_events,
            voices,
            patch,
            ..
        } = self;

        let mut matched = false;
        let mut i = 0;
        while i < key_events.len() {
            if key_events[i].note == note {
                matched = true;
                for voice_ref in key_events[i].voices.iter() {
                    let slot = &mut voices[voice_ref.slot];
                    if slot.in_use && slot.generation == voice_ref.generation {
                        slot.voice.event_released(patch);
                    }
                }
                key_events.swap_remove(i);
            } else {
                i += 1;
            }
        }
        if !matched {
            warn!("release for note {} but it is not being played", note);
        }

        self.clean_voice_pool();
    }

    /// Sum of the samples of every sounding voice for the given channel.
    #[inline]
    pub fn get_sample(&mut self, is_left_channel: bool) -> f32 {
        let Self { voices, patch, .. } = self;
        let mut sum = 0.0;
        for slot in voices.iter_mut() {
            if slot.in_use && !slot.voice.is_done(patch) {
                sum += slot.voice.generate_sample(patch, is_left_channel);
            }
        }
        sum
    }

    /// Advances every in-use voice by `dt_ms` milliseconds.
    #[inline]
    pub fn increment_phases(&mut self, dt_ms: f32) {
        let Self { voices, patch, .. } = self;
        for slot in voices.iter_mut() {
            if slot.in_use {
                slot.voice.increment_phase(patch, dt_ms);
            }
        }
    }

    /// Returns finished voices to the free pool, invalidating any key-event
    /// references to them.
    pub fn clean_voice_pool(&mut self) {
        let Self {
            voices,
            patch,
            voices_used,
            ..
        } = self;
        for slot in voices.iter_mut() {
            if slot.in_use && slot.voice.is_done(patch) {
                slot.voice.reset();
                slot.in_use = false;
                slot.generation = slot.generation.wrapping_add(1);
                *voices_used -= 1;
            }
        }
    }

    /// Writes a modulation matrix entry; out-of-range indices are ignored.
    pub fn set_mod(&mut self, carrier: usize, modulator: usize, amount: f32) {
        if carrier < N_OSC && modulator < N_OSC {
            self.patch.mod_matrix[carrier][modulator] = amount;
        }
    }

    /// Sets an operator's output volume; negative volumes and out-of-range
    /// indices are ignored.
    pub fn set_output_volume(&mut self, operator: usize, vol: f32) {
        if vol >= 0.0 && operator < N_OSC {
            self.patch.output_vols[operator] = vol;
        }
    }

    /// Sets an operator's output panning, clamped into [-1, 1];
    /// out-of-range indices are ignored.
    pub fn set_output_pan(&mut self, operator: usize, pan: f32) {
        if operator < N_OSC {
            self.patch.output_pans[operator] = pan.clamp(-1.0, 1.0);
        }
    }

    pub fn set_mono(&mut self, mono: bool) {
        self.mono = mono;
    }

    pub fn set_legato(&mut self, legato: bool) {
        self.legato = legato;
    }

    /// Sets the global detune in cents and propagates it to every voice
    /// currently in use.
    pub fn set_detune(&mut self, cents: f32) {
        self.global_detune = cents;
        for slot in self.voices.iter_mut() {
            if slot.in_use {
                slot.voice.set_detune(cents);
            }
        }
    }

    pub fn set_center_tune(&mut self, hz: f32) {
        self.center_tune = hz;
    }

    /// Sets the number of unison voices per keypress, capped by the pool
    /// size.
    pub fn set_unison(&mut self, count: u8) {
        self.unison = count.min(MAX_POLYPHONY as u8);
    }

    pub fn set_unison_vol(&mut self, vol: f32) {
        self.unison_vol = vol;
    }

    pub fn set_unison_pitch(&mut self, cents: f32) {
        self.unison_pitch = cents;
    }

    pub fn set_unison_phase(&mut self, phase: f32) {
        self.unison_phase = phase;
    }

    pub fn set_unison_pan(&mut self, pan: f32) {
        self.unison_pan = pan;
    }

    /// Caps the number of simultaneously sounding voices, bounded by the
    /// pool size.
    pub fn set_polyphony(&mut self, voices: u8) {
        self.n_polyphony = voices.min(MAX_POLYPHONY as u8);
    }

    /// Mutable access to an operator's parameters.
    pub fn op_mut(&mut self, operator: usize) -> Option<&mut OperatorParams> {
        self.patch.ops.get_mut(operator)
    }

    pub fn patch(&self) -> &Patch<N_OSC> {
        &self.patch
    }

    /// Number of pool slots currently in use.
    pub fn voices_used(&self) -> usize {
        self.voices_used as usize
    }

    /// Iterator over the voices currently in use.
    pub fn active_voices(&self) -> impl Iterator<Item = &FmVoice<N_OSC>> {
        self.voices
            .iter()
            .filter(|slot| slot.in_use)
            .map(|slot| &slot.voice)
    }

    /// Allocates the voices for `event` and fills in its reference list.
    ///
    /// With unison enabled, `unison` voices are spread in velocity, pan,
    /// phase and detune around the played note; otherwise a single voice
    /// plays it straight. Allocation failures shorten the spread instead
    /// of aborting the whole keypress.
    fn play_note(&mut self, event: &mut KeyEvent<MAX_POLYPHONY>) {
        let hz = self.note_to_hz(event.note);
        let velocity = event.velocity as f32 / 127.0;

        if self.unison > 0 {
            let unison = self.unison as usize;
            let step = 1.0 / unison as f32;
            // One full-volume voice in the middle for odd counts, two for
            // even counts.
            let n_center = if unison % 2 == 1 { 1 } else { 2 };

            for i in 0..unison {
                let Some(slot) = self.find_free_voice() else {
                    warn!("voice pool exhausted after {} of {} unison voices", i, unison);
                    break;
                };

                let center = i >= unison / 2 && i < unison / 2 + n_center;
                let vel_fac = if center { 1.0 } else { self.unison_vol };
                let pan = -self.unison_pan + i as f32 * 2.0 * self.unison_pan * step;
                let phase = self.unison_phase * i as f32 * step;
                let detune = -0.5 * self.unison_pitch
                    + i as f32 * self.unison_pitch * step
                    + self.global_detune;

                let entry = &mut self.voices[slot];
                entry.voice.init(hz, vel_fac * velocity, pan, phase);
                entry.voice.set_detune(detune);
                event
                    .voices
                    .push(VoiceRef {
                        slot,
                        generation: entry.generation,
                    })
                    .ok();
            }
        } else {
            let Some(slot) = self.find_free_voice() else {
                warn!("voice pool exhausted, dropping note {}", event.note);
                return;
            };

            let entry = &mut self.voices[slot];
            entry.voice.init(hz, velocity, 0.0, 0.0);
            entry.voice.set_detune(self.global_detune);
            event
                .voices
                .push(VoiceRef {
                    slot,
                    generation: entry.generation,
                })
                .ok();
        }
    }

    /// Retunes the voices of the held key without touching their envelope
    /// clocks (legato).
    fn retune_held_key(&mut self, note: u8, velocity: u8) {
        let hz = self.note_to_hz(note);
        let detune = self.global_detune;

        let Self {
            key_events, voices, ..
        } = self;
        // Mono mode keeps at most one key event.
        if let Some(event) = key_events.first_mut() {
            for voice_ref in event.voices.iter() {
                let slot = &mut voices[voice_ref.slot];
                if slot.in_use && slot.generation == voice_ref.generation {
                    slot.voice.override_frequency(hz);
                    slot.voice.set_detune(detune);
                }
            }
            // The loudness of the sounding voices is not updated; the new
            // velocity only affects the event record.
            event.note = note;
            event.velocity = velocity;
        }
    }

    /// First free slot, after one cleanup attempt when the pool looks
    /// full. Marks the returned slot as used.
    fn find_free_voice(&mut self) -> Option<usize> {
        if self.voices_used as usize == MAX_POLYPHONY {
            self.clean_voice_pool();
            if self.voices_used as usize == MAX_POLYPHONY {
                return None;
            }
        }
        let slot = self.voices.iter().position(|slot| !slot.in_use)?;
        self.voices[slot].in_use = true;
        self.voices_used += 1;
        Some(slot)
    }

    /// Drops key events whose voices have all been reclaimed; their notes
    /// finished sounding without a note-off.
    fn prune_stale_events(&mut self) {
        let Self {
            key_events, voices, ..
        } = self;
        let mut i = 0;
        while i < key_events.len() {
            let stale = key_events[i].voices.iter().all(|voice_ref| {
                let slot = &voices[voice_ref.slot];
                !slot.in_use || slot.generation != voice_ref.generation
            });
            if stale {
                key_events.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }
}

impl<const N_OSC: usize, const MAX_POLYPHONY: usize> Default for FmSynth<N_OSC, MAX_POLYPHONY> {
    fn default() -> Self {
        Self::new()
    }
}
