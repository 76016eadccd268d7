//! Shared per-synth parameter tables.

use crate::envelope::Adsr;
use crate::waveform::Waveform;

/// Parameters of a single operator, shared by every voice of the synth.
#[derive(Debug, Clone)]
pub struct OperatorParams {
    pub waveform: Waveform,
    /// Frequency multiplier relative to the note pitch.
    pub ratio: f32,
    /// Operator output volume.
    pub vol: f32,
    pub adsr: Adsr,
}

impl OperatorParams {
    pub fn new() -> Self {
        Self {
            waveform: Waveform::Sine,
            ratio: 1.0,
            vol: 1.0,
            adsr: Adsr::new(),
        }
    }
}

impl Default for OperatorParams {
    fn default() -> Self {
        Self::new()
    }
}

/// Modulation matrix, operator bank and output mix of one synth.
///
/// The synth owns a single `Patch` and lends it to its voices for every
/// sample; voices never keep a reference across calls.
#[derive(Debug, Clone)]
pub struct Patch<const N_OSC: usize = 2> {
    /// Row-major modulation matrix; entry (i, j) is the amount by which
    /// operator j phase-shifts operator i.
    pub mod_matrix: [[f32; N_OSC]; N_OSC],
    pub ops: [OperatorParams; N_OSC],
    /// Final mix-down weights applied after modulation.
    pub output_vols: [f32; N_OSC],
    /// Output panning per operator; 0 is center, -1 left, 1 right.
    pub output_pans: [f32; N_OSC],
}

impl<const N_OSC: usize> Patch<N_OSC> {
    pub fn new() -> Self {
        Self {
            mod_matrix: [[0.0; N_OSC]; N_OSC],
            ops: core::array::from_fn(|_| OperatorParams::new()),
            output_vols: [0.0; N_OSC],
            output_pans: [0.0; N_OSC],
        }
    }
}

impl<const N_OSC: usize> Default for Patch<N_OSC> {
    fn default() -> Self {
        Self::new()
    }
}
