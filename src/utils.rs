//! Small shared DSP helpers.

#[allow(unused_imports)]
use num_traits::float::Float;

/// Hard-clips a signal to the [-1, 1] range expected by the DAC mapping.
#[inline]
pub fn clamp_signal(value: f32) -> f32 {
    value.clamp(-1.0, 1.0)
}

/// Converts a detune amount in cents to a frequency ratio.
#[inline]
pub fn cents_to_ratio(cents: f32) -> f32 {
    (2.0_f32).powf(cents / 1200.0)
}
