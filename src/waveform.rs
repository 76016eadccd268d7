//! Waveform evaluators.
//!
//! Each evaluator is a pure map from a phase in [0, 1) to an amplitude in
//! [-1, 1]. They run up to N_OSC * N_OSC times per sample per voice, so
//! they are kept branch-light: boolean arithmetic instead of jumps.

/// Per-operator waveform selection.
///
/// Dispatch happens in exactly one place ([`Waveform::eval`]) so the hot
/// path stays a single match on a copy-sized tag.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Saw,
    Square,
    /// Square with 25% duty cycle.
    Square25,
    /// Square with 10% duty cycle.
    Square10,
}

impl Waveform {
    /// Evaluates the waveform at `phase`.
    ///
    /// Accepts any non-negative phase; the modulation path produces sums in
    /// [0, 2), which are wrapped back into one cycle here. The free
    /// functions below assume in-range input.
    #[inline]
    pub fn eval(self, phase: f32) -> f32 {
        let phase = phase - (phase as i32) as f32;
        match self {
            Waveform::Sine => sine(phase),
            Waveform::Triangle => triangle(phase),
            Waveform::Saw => saw(phase),
            Waveform::Square => square(phase),
            Waveform::Square25 => square25(phase),
            Waveform::Square10 => square10(phase),
        }
    }
}

/// Approximation of sin(2*pi*phase).
///
/// Bhaskara I's formula with the argument folded into the first half
/// cycle; peak error stays below 2e-3 over the full cycle, which is well
/// under the quantization floor of a 14-bit DAC.
#[inline]
pub fn sine(phase: f32) -> f32 {
    let sign = (phase < 0.5) as i32 as f32 - (phase > 0.5) as i32 as f32;
    let x = phase - 0.5 * (phase > 0.5) as i32 as f32;
    let k = x * (1.0 - 2.0 * x);
    sign * 32.0 * k / (5.0 - 8.0 * k)
}

/// Triangle wave rising through zero at phase 0.25.
#[inline]
pub fn triangle(phase: f32) -> f32 {
    (phase <= 0.5) as i32 as f32 * (4.0 * phase - 1.0)
        + (phase > 0.5) as i32 as f32 * (3.0 - 4.0 * phase)
}

/// Rising saw from -1 to 1 over one cycle.
#[inline]
pub fn saw(phase: f32) -> f32 {
    2.0 * phase - 1.0
}

/// Square wave with 50% duty cycle.
#[inline]
pub fn square(phase: f32) -> f32 {
    2.0 * (phase > 0.5) as i32 as f32 - 1.0
}

/// Square wave with 25% duty cycle.
#[inline]
pub fn square25(phase: f32) -> f32 {
    2.0 * (phase > 0.75) as i32 as f32 - 1.0
}

/// Square wave with 10% duty cycle.
#[inline]
pub fn square10(phase: f32) -> f32 {
    2.0 * (phase > 0.9) as i32 as f32 - 1.0
}
