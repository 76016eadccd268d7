//! Per-operator ADSR envelope.
//!
//! Piecewise-linear attack/decay/sustain/release with precomputed slopes:
//! divisions are paid once in `precalc`, the per-sample evaluation is
//! multiply-add only.

/// Durations at or below this many milliseconds are treated as instant;
/// their slope contribution is suppressed so no division by a degenerate
/// duration ever happens.
pub const MIN_DURATION_MS: f32 = 1e-3;

/// Release timepoint meaning "not released yet". Larger than any elapsed
/// time a voice can accumulate.
pub const NOT_RELEASED: f32 = 1e8;

/// ADSR parameter set with derived slope constants.
///
/// The attack ramps linearly to full level, the decay falls linearly to
/// the sustain level which holds until the note is released, and the
/// release falls linearly to silence. Mutating any duration through the
/// setters recomputes the derived slopes before the next evaluation.
#[derive(Debug, Clone)]
pub struct Adsr {
    attack: f32,
    decay: f32,
    sustain: f32,
    release: f32,

    a_slope: f32,
    d_slope: f32,
    r_slope: f32,
    /// Level at which the release ramp starts. Defaults to the sustain
    /// level; re-anchored by [`Adsr::fast_release_update`] when the
    /// release happens before the envelope settled into sustain.
    r_val: f32,
    t_ad: f32,
}

impl Adsr {
    pub fn new() -> Self {
        let mut adsr = Self {
            attack: 1e-5,
            decay: 1e-5,
            sustain: 1.0,
            release: 1e-5,
            a_slope: 0.0,
            d_slope: 0.0,
            r_slope: 0.0,
            r_val: 1.0,
            t_ad: 0.0,
        };
        adsr.precalc();
        adsr
    }

    pub fn set_attack(&mut self, ms: f32) {
        self.attack = ms;
        self.precalc();
    }

    pub fn set_decay(&mut self, ms: f32) {
        self.decay = ms;
        self.precalc();
    }

    /// Sets the sustain level, expected in [0, 1].
    pub fn set_sustain(&mut self, level: f32) {
        self.sustain = level;
        self.precalc();
    }

    pub fn set_release(&mut self, ms: f32) {
        self.release = ms;
        self.precalc();
    }

    pub fn attack(&self) -> f32 {
        self.attack
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    pub fn sustain(&self) -> f32 {
        self.sustain
    }

    pub fn release(&self) -> f32 {
        self.release
    }

    fn precalc(&mut self) {
        if self.attack > MIN_DURATION_MS {
            self.a_slope = 1.0 / self.attack;
        }
        if self.decay > MIN_DURATION_MS {
            self.d_slope = (self.sustain - 1.0) / self.decay;
        }
        if self.release > MIN_DURATION_MS {
            self.r_slope = -self.r_val / self.release;
        }
        self.t_ad = self.attack + self.decay;
    }

    /// Re-anchors the release ramp at the level actually held when the
    /// release happened, so amplitude stays continuous across the release
    /// transition even when it cuts into the attack or decay.
    #[inline]
    pub fn fast_release_update(&mut self, last_held: f32) {
        self.r_val = last_held;
        if self.release > MIN_DURATION_MS {
            self.r_slope = -self.r_val / self.release;
        }
    }

    /// Envelope level at `t` ms after note-on, given the release
    /// timepoint (pass [`NOT_RELEASED`] while the key is held).
    ///
    /// The four regions are mutually exclusive: once `t` reaches
    /// `t_release` only the release ramp (or silence) applies, so a
    /// release that starts mid-attack cannot double-count the attack term.
    #[inline]
    pub fn calc_vol(&self, t: f32, t_release: f32) -> f32 {
        if t >= t_release {
            if t <= t_release + self.release {
                self.r_val + self.r_slope * (t - t_release)
            } else {
                0.0
            }
        } else if t < self.attack {
            t * self.a_slope
        } else if t < self.t_ad {
            1.0 + self.d_slope * (t - self.attack)
        } else {
            self.sustain
        }
    }

    /// True once the release ramp has run out.
    #[inline]
    pub fn is_done(&self, t: f32, t_release: f32) -> bool {
        t > t_release + self.release
    }
}

impl Default for Adsr {
    fn default() -> Self {
        Self::new()
    }
}
