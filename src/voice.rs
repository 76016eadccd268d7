//! A single sounding note: the per-voice operator bank.

#[allow(unused_imports)]
use num_traits::float::Float;

use crate::envelope::NOT_RELEASED;
use crate::patch::Patch;
use crate::utils::cents_to_ratio;

/// Envelope values are refreshed every this many samples. Envelopes move
/// at control rate, so the decimation removes most of their cost from the
/// sample loop without audible stairstepping.
const ADSR_REFRESH_PERIOD: u8 = 16;

/// Modulation amounts below this threshold skip the operator evaluation.
const MOD_EPSILON: f32 = 1e-5;

/// Output volumes below this threshold count as silent for [`FmVoice::is_done`].
const SILENT_VOL: f32 = 1e-3;

/// One voice of the synth: an N-operator phase bank plus the per-note
/// state (elapsed time, release point, detune, output gains).
///
/// A voice is dormant until [`FmVoice::init`] and must be [`FmVoice::reset`]
/// before it can be initialized again.
#[derive(Debug, Clone)]
pub struct FmVoice<const N_OSC: usize = 2> {
    phases: [f32; N_OSC],
    frequency: f32,
    /// Milliseconds since note-on.
    elapsed: f32,
    /// Millisecond timepoint of the note-off; [`NOT_RELEASED`] until then.
    releasepoint: f32,
    detune: f32,
    precalc_detune_factor: f32,
    global_vol: f32,
    global_pan: f32,
    precalc_vol_left: f32,
    precalc_vol_right: f32,
    adsr_cache: [f32; N_OSC],
    adsr_counter: u8,
    is_init: bool,
}

impl<const N_OSC: usize> FmVoice<N_OSC> {
    pub fn new() -> Self {
        let mut voice = Self {
            phases: [0.0; N_OSC],
            frequency: 0.0,
            elapsed: 0.0,
            releasepoint: NOT_RELEASED,
            detune: 0.0,
            precalc_detune_factor: 1.0,
            global_vol: 1.0,
            global_pan: 0.0,
            precalc_vol_left: 0.5,
            precalc_vol_right: 0.5,
            adsr_cache: [0.0; N_OSC],
            adsr_counter: 0,
            is_init: false,
        };
        voice.reset();
        voice
    }

    /// Returns the voice to its dormant state.
    pub fn reset(&mut self) {
        self.phases = [0.0; N_OSC];
        self.frequency = 0.0;
        self.elapsed = 0.0;
        self.releasepoint = NOT_RELEASED;
        self.detune = 0.0;
        self.precalc_detune_factor = 1.0;
        self.global_vol = 1.0;
        self.global_pan = 0.0;
        self.precalc_vol_left = 0.5;
        self.precalc_vol_right = 0.5;
        self.is_init = false;
    }

    /// Starts a note at `freq` Hz with the given per-voice volume, pan in
    /// [-1, 1] and initial phase offset in [0, 1].
    ///
    /// Precondition: the voice has been `reset` since it last sounded.
    pub fn init(&mut self, freq: f32, vol: f32, pan: f32, phase_offset: f32) {
        self.frequency = freq;
        self.global_vol = vol;
        self.global_pan = pan;

        // The pan formula in generate_sample doubles each operator
        // contribution; the 0.25 folds the compensating 0.5 into the
        // channel gains.
        self.precalc_vol_left = vol * 0.25 * (1.0 - pan);
        self.precalc_vol_right = vol * 0.25 * (1.0 + pan);

        self.phases = [phase_offset; N_OSC];
        self.adsr_counter = 0;

        self.is_init = true;
    }

    /// Produces one sample for the requested channel.
    #[inline]
    pub fn generate_sample(&mut self, patch: &Patch<N_OSC>, is_left_channel: bool) -> f32 {
        if self.adsr_counter == 0 {
            for (cached, op) in self.adsr_cache.iter_mut().zip(patch.ops.iter()) {
                *cached = op.adsr.calc_vol(self.elapsed, self.releasepoint);
            }
        }
        self.adsr_counter = (self.adsr_counter + 1) % ADSR_REFRESH_PERIOD;

        // Walk the matrix from the last row to the first; a row's finished
        // shift feeds forward into every lower-indexed row evaluated after
        // it, which resolves the upper-triangular routing in one pass.
        let mut shifts = [0.0; N_OSC];
        for i in (0..N_OSC).rev() {
            for j in 0..N_OSC {
                let m = patch.mod_matrix[i][j] * self.adsr_cache[j];
                if m.abs() > MOD_EPSILON {
                    shifts[i] += m * patch.ops[j].waveform.eval(self.phases[j] + shifts[j]);
                    // Keep the partial sum inside one cycle: fractional
                    // part, negatives reflected positively.
                    let frac = shifts[i] - (shifts[i] as i32) as f32;
                    shifts[i] = frac.abs();
                }
            }
        }

        let sign = if is_left_channel { -1.0 } else { 1.0 };
        let mut output = 0.0;
        for j in 0..N_OSC {
            // The pan factor is twice too large; precalc_vol_* carries the
            // correction.
            let pan = sign * patch.output_pans[j] + 1.0;
            output += pan
                * patch.output_vols[j]
                * patch.ops[j].waveform.eval(self.phases[j] + shifts[j])
                * self.adsr_cache[j];
        }

        output
            * if is_left_channel {
                self.precalc_vol_left
            } else {
                self.precalc_vol_right
            }
    }

    /// Advances elapsed time and every operator phase by `dt_ms`.
    #[inline]
    pub fn increment_phase(&mut self, patch: &Patch<N_OSC>, dt_ms: f32) {
        self.elapsed += dt_ms;

        let dt_s = dt_ms / 1000.0;
        let real_freq = self.frequency * self.precalc_detune_factor;
        for (phase, op) in self.phases.iter_mut().zip(patch.ops.iter()) {
            *phase += dt_s * real_freq * op.ratio;
            *phase -= (*phase as i32) as f32;
        }
    }

    /// Marks the note as released.
    ///
    /// The release timepoint can only be lowered, so repeated calls keep
    /// the first release. The envelope cache counter is reset so the next
    /// sample recomputes the envelopes, and every operator's release ramp
    /// is re-anchored at the level it was actually holding.
    pub fn event_released(&mut self, patch: &mut Patch<N_OSC>) {
        if self.releasepoint > self.elapsed {
            self.releasepoint = self.elapsed;
        }
        self.adsr_counter = 0;
        for (op, cached) in patch.ops.iter_mut().zip(self.adsr_cache.iter()) {
            op.adsr.fast_release_update(*cached);
        }
    }

    /// True if the voice no longer produces sound: uninitialized, or every
    /// operator is either mixed out or past the end of its release.
    pub fn is_done(&self, patch: &Patch<N_OSC>) -> bool {
        if !self.is_init {
            return true;
        }
        for (j, op) in patch.ops.iter().enumerate() {
            if patch.output_vols[j] > SILENT_VOL
                && !op.adsr.is_done(self.elapsed, self.releasepoint)
            {
                return false;
            }
        }
        true
    }

    /// Sets the detune amount in cents and refreshes the derived ratio.
    #[inline]
    pub fn set_detune(&mut self, cents: f32) {
        self.detune = cents;
        self.precalc_detune_factor = cents_to_ratio(cents);
    }

    /// Moves the envelope clock; used for legato-style continuation.
    #[inline]
    pub fn override_time_pos(&mut self, elapsed_ms: f32) {
        self.elapsed = elapsed_ms;
    }

    /// Retunes the voice without retriggering the envelopes.
    #[inline]
    pub fn override_frequency(&mut self, freq: f32) {
        self.frequency = freq;
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn release_point(&self) -> f32 {
        self.releasepoint
    }

    pub fn detune(&self) -> f32 {
        self.detune
    }

    pub fn vol(&self) -> f32 {
        self.global_vol
    }

    pub fn pan(&self) -> f32 {
        self.global_pan
    }

    pub fn is_init(&self) -> bool {
        self.is_init
    }

    /// Operator phases, each in [0, 1).
    pub fn phases(&self) -> &[f32; N_OSC] {
        &self.phases
    }
}

impl<const N_OSC: usize> Default for FmVoice<N_OSC> {
    fn default() -> Self {
        Self::new()
    }
}
