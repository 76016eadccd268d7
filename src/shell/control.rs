//! Reference control surface: the continuous-controller bindings of the
//! default configuration.

#[allow(unused_imports)]
use num_traits::float::Float;

use log::trace;

use super::OutputStage;
use crate::midi::MidiHandler;
use crate::synth::FmSynth;
use crate::waveform::Waveform;

/// Maps a 7-bit controller value onto an envelope time in milliseconds,
/// exponential from 0 to about 5.3 s.
#[inline]
fn cc_to_time_ms(value: u8) -> f32 {
    (value as f32 / 100.0).exp() * 7000.0 - 7000.0
}

/// Maps a 7-bit controller value onto a frequency ratio, one octave per
/// 16 steps around the centre value 63.
#[inline]
fn cc_to_ratio(value: u8) -> f32 {
    (2.0_f32).powf((value as f32 - 63.0) / 16.0)
}

/// Waveform selection by value quartile.
#[inline]
fn cc_to_waveform(value: u8) -> Waveform {
    match value {
        0..=31 => Waveform::Sine,
        32..=63 => Waveform::Triangle,
        64..=95 => Waveform::Saw,
        _ => Waveform::Square,
    }
}

/// [`MidiHandler`] binding the note events, the CC 11..=31 parameter
/// block and pitch bend onto a two-operator synth and its output stage.
pub struct CcSurface<'a, const N_OSC: usize, const MAX_POLYPHONY: usize> {
    pub synth: &'a mut FmSynth<N_OSC, MAX_POLYPHONY>,
    pub output: &'a mut OutputStage,
}

impl<const N_OSC: usize, const MAX_POLYPHONY: usize> MidiHandler
    for CcSurface<'_, N_OSC, MAX_POLYPHONY>
{
    fn note_on(&mut self, note: u8, velocity: u8) {
        self.synth.note_pressed(note, velocity);
    }

    fn note_off(&mut self, note: u8, velocity: u8) {
        self.synth.note_released(note, velocity);
    }

    fn cc7(&mut self, id: u8, value: u8) {
        trace!("cc {} = {}", id, value);
        let norm = value as f32 / 127.0;
        match id {
            // Modulation matrix entries. The (0, 1) binding keeps a floor
            // of 0.3 so the default patch stays audible with the
            // controller at zero.
            11 => self.synth.set_mod(0, 0, norm * 3.0),
            12 => self.synth.set_mod(0, 1, 0.3 + norm * 3.0),
            13 => self.synth.set_mod(1, 0, norm * 3.0),
            14 => self.synth.set_mod(1, 1, norm * 3.0),
            // Output mix.
            15 => self.synth.set_output_volume(0, norm),
            16 => self.synth.set_output_volume(1, norm),
            17 => self.output.set_master_volume(value as f32 / 64.0),
            18 => self.output.set_crush(1 + 30 * value as u16),
            // Per-operator ADSR blocks: attack, decay, sustain, release.
            19..=26 => {
                let operator = ((id - 19) / 4) as usize;
                if let Some(params) = self.synth.op_mut(operator) {
                    match (id - 19) % 4 {
                        0 => params.adsr.set_attack(cc_to_time_ms(value)),
                        1 => params.adsr.set_decay(cc_to_time_ms(value)),
                        2 => params.adsr.set_sustain(norm),
                        _ => params.adsr.set_release(cc_to_time_ms(value)),
                    }
                }
            }
            27 | 28 => {
                if let Some(params) = self.synth.op_mut((id - 27) as usize) {
                    params.waveform = cc_to_waveform(value);
                }
            }
            30 | 31 => {
                if let Some(params) = self.synth.op_mut((id - 30) as usize) {
                    params.ratio = cc_to_ratio(value);
                }
            }
            _ => {}
        }
    }

    fn pitch_bend(&mut self, value: u16) {
        // Full range maps to +-1200 cents.
        let cents = (value as f32 / 8192.0 - 1.0) * 1200.0;
        self.synth.set_detune(cents);
    }
}
