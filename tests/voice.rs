//! Tests for the FM voice

use polyfm_dsp::envelope::NOT_RELEASED;
use polyfm_dsp::patch::Patch;
use polyfm_dsp::voice::FmVoice;
use polyfm_dsp::waveform::sine;

const SAMPLE_RATE: f32 = 20000.0;
const DT_MS: f32 = 1000.0 / SAMPLE_RATE;

fn audible_patch() -> Patch<2> {
    let mut patch = Patch::new();
    patch.output_vols[0] = 1.0;
    patch.ops[1].ratio = 2.5;
    patch
}

#[test]
fn phases_stay_wrapped() {
    let patch = audible_patch();
    let mut voice: FmVoice<2> = FmVoice::new();
    voice.init(440.0, 1.0, 0.0, 0.9);

    for _ in 0..5000 {
        voice.increment_phase(&patch, DT_MS);
        for phase in voice.phases() {
            assert!((0.0..1.0).contains(phase), "phase {}", phase);
        }
    }
}

#[test]
fn detune_raises_the_phase_rate() {
    let patch = audible_patch();
    let mut straight: FmVoice<2> = FmVoice::new();
    let mut detuned: FmVoice<2> = FmVoice::new();
    straight.init(100.0, 1.0, 0.0, 0.0);
    detuned.init(100.0, 1.0, 0.0, 0.0);
    detuned.set_detune(1200.0);

    straight.increment_phase(&patch, 1.0);
    detuned.increment_phase(&patch, 1.0);

    // One octave up doubles the phase increment.
    assert!((straight.phases()[0] - 0.1).abs() < 1e-4);
    assert!((detuned.phases()[0] - 0.2).abs() < 1e-4);
}

#[test]
fn release_point_latches_the_first_release() {
    let mut patch = audible_patch();
    let mut voice: FmVoice<2> = FmVoice::new();
    voice.init(440.0, 1.0, 0.0, 0.0);

    voice.increment_phase(&patch, 100.0);
    voice.event_released(&mut patch);
    assert!((voice.release_point() - 100.0).abs() < 1e-6);

    // A later release must not raise the release point.
    voice.increment_phase(&patch, 20.0);
    voice.event_released(&mut patch);
    assert!((voice.release_point() - 100.0).abs() < 1e-6);
}

#[test]
fn voice_finishes_shortly_after_release() {
    let mut patch = audible_patch();
    patch.ops[0].adsr.set_release(10.0);
    let mut voice: FmVoice<2> = FmVoice::new();
    voice.init(440.0, 1.0, 0.0, 0.0);

    voice.increment_phase(&patch, 100.0);
    assert!(!voice.is_done(&patch));

    voice.event_released(&mut patch);
    assert!(!voice.is_done(&patch));

    voice.increment_phase(&patch, 10.5);
    assert!(voice.is_done(&patch));
}

#[test]
fn reset_returns_the_voice_to_dormant() {
    let patch = audible_patch();
    let mut voice: FmVoice<2> = FmVoice::new();
    voice.init(440.0, 1.0, 0.0, 0.0);
    voice.increment_phase(&patch, 50.0);

    voice.reset();
    assert!(!voice.is_init());
    assert!(voice.is_done(&patch));
    assert_eq!(voice.elapsed(), 0.0);
    assert_eq!(voice.release_point(), NOT_RELEASED);
    assert_eq!(voice.phases(), &[0.0; 2]);
}

#[test]
fn matrix_row_consumes_the_later_rows_shift() {
    // Operator 1 modulates operator 0; with every other entry zero, the
    // mix reduces to sine(phase0 + wrap(m * sine(phase1))) scaled by the
    // channel gain.
    let m = 0.5;
    let mut patch = audible_patch();
    patch.ops[1].ratio = 1.0;
    patch.mod_matrix[0][1] = m;

    let mut voice: FmVoice<2> = FmVoice::new();
    voice.init(440.0, 1.0, 0.0, 0.0);

    // Move both operators to a nonzero phase, then compare one sample
    // against the closed form. Envelopes are instant, so both caches
    // hold 1.
    for _ in 0..37 {
        voice.increment_phase(&patch, DT_MS);
    }
    let phase = voice.phases()[0];
    let shift = {
        let raw: f32 = m * sine(phase);
        (raw - raw.trunc()).abs()
    };
    let expected = 0.25 * sine((phase + shift).fract());

    let sample = voice.generate_sample(&patch, false);
    assert!(
        (sample - expected).abs() < 1e-5,
        "sample {} expected {}",
        sample,
        expected
    );
}

#[test]
fn modulation_below_threshold_is_skipped() {
    let mut patch = audible_patch();
    patch.ops[1].ratio = 1.0;
    patch.mod_matrix[0][1] = 1e-6;

    let mut clean: FmVoice<2> = FmVoice::new();
    let mut modulated: FmVoice<2> = FmVoice::new();
    clean.init(440.0, 1.0, 0.0, 0.0);
    modulated.init(440.0, 1.0, 0.0, 0.0);

    for _ in 0..64 {
        clean.increment_phase(&patch, DT_MS);
        modulated.increment_phase(&patch, DT_MS);
        let a = {
            let mut p = patch.clone();
            p.mod_matrix[0][1] = 0.0;
            clean.generate_sample(&p, false)
        };
        let b = modulated.generate_sample(&patch, false);
        assert_eq!(a, b);
    }
}

#[test]
fn release_refreshes_the_envelope_cache() {
    let mut patch = audible_patch();
    patch.ops[0].adsr.set_sustain(1.0);
    patch.ops[0].adsr.set_release(50.0);

    let mut voice: FmVoice<2> = FmVoice::new();
    voice.init(443.0, 1.0, 0.0, 0.0);

    // Park the voice in sustain with a warm cache.
    for _ in 0..2000 {
        voice.increment_phase(&patch, DT_MS);
    }
    let _ = voice.generate_sample(&patch, false);

    voice.event_released(&mut patch);
    for _ in 0..500 {
        voice.increment_phase(&patch, DT_MS);
    }

    // The first sample after the release must already see the ramp, not
    // the stale sustain value from the cache.
    let level = patch.ops[0]
        .adsr
        .calc_vol(voice.elapsed(), voice.release_point());
    assert!((level - 0.5).abs() < 1e-2, "level {}", level);

    let expected = 0.25 * sine(voice.phases()[0]) * level;
    assert!(expected.abs() > 0.05, "degenerate probe phase");

    let sample = voice.generate_sample(&patch, false);
    assert!(
        (sample - expected).abs() < 1e-5,
        "sample {} expected {}",
        sample,
        expected
    );
}

#[test]
fn pan_weights_the_channels() {
    let patch = audible_patch();
    let mut voice: FmVoice<2> = FmVoice::new();
    voice.init(440.0, 1.0, 0.8, 0.0);

    for _ in 0..53 {
        voice.increment_phase(&patch, DT_MS);
    }
    let right = voice.clone().generate_sample(&patch, false).abs();
    let left = voice.generate_sample(&patch, true).abs();
    assert!(right > left);
}

#[test]
fn silent_mix_counts_as_done() {
    let mut patch = audible_patch();
    patch.output_vols[0] = 0.0;

    let mut voice: FmVoice<2> = FmVoice::new();
    voice.init(440.0, 1.0, 0.0, 0.0);
    voice.increment_phase(&patch, 10.0);

    assert!(voice.is_done(&patch));
}
