//! Rendering smoke test for the full voice path


use polyfm_dsp::synth::FmSynth;
use polyfm_dsp::waveform::Waveform;

const SAMPLE_RATE: u32 = 20000;
const DT_MS: f32 = 1000.0 / SAMPLE_RATE as f32;

/// The default two-operator patch of the reference hardware build.
fn default_patch(synth: &mut FmSynth<2, 4>) {
    synth.set_mod(0, 1, 2.0);
    synth.set_output_volume(0, 1.0);

    if let Some(params) = synth.op_mut(0) {
        params.ratio = 1.0;
        params.waveform = Waveform::Sine;
        params.adsr.set_attack(20.0);
        params.adsr.set_sustain(1.0);
        params.adsr.set_decay(800.0);
        params.adsr.set_release(20.0);
    }
    if let Some(params) = synth.op_mut(1) {
        params.ratio = 2.0;
        params.waveform = Waveform::Triangle;
        params.adsr.set_attack(10.0);
        params.adsr.set_decay(700.0);
        params.adsr.set_sustain(0.7);
    }
}

#[test]
fn sustained_note() {
    let duration = 0.5;
    let note = 64;
    let velocity = 100;

    let mut synth: FmSynth<2, 4> = FmSynth::new();
    default_patch(&mut synth);

    let samples = (duration * SAMPLE_RATE as f32) as usize;
    let release_at = samples / 2;
    let mut wav_data = Vec::with_capacity(samples);

    synth.note_pressed(note, velocity);
    for n in 0..samples {
        if n == release_at {
            synth.note_released(note, velocity);
        }
        let sample = synth.get_sample(false);
        synth.increment_phases(DT_MS);
        wav_data.push(sample);
    }
    synth.clean_voice_pool();

    assert!(wav_data.iter().all(|sample| sample.is_finite()));
    assert!(wav_data.iter().all(|sample| sample.abs() <= 1.0));
    let peak = wav_data.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
    assert!(peak > 0.01, "peak {}", peak);
    // The release ran out well before the end of the render.
    assert_eq!(synth.voices_used(), 0);
    assert!(wav_data.last().unwrap().abs() < 1e-6);

    wav_writer::write("render/sustained_note.wav", SAMPLE_RATE, &wav_data).ok();
}

#[test]
fn unison_spread_stays_in_range() {
    let duration = 0.25;

    let mut synth: FmSynth<2, 4> = FmSynth::new();
    default_patch(&mut synth);
    synth.set_unison(3);
    synth.set_unison_vol(0.6);
    synth.set_unison_pitch(12.0);
    synth.set_unison_pan(0.7);
    synth.set_unison_phase(0.25);

    let samples = (duration * SAMPLE_RATE as f32) as usize;
    let mut wav_data = Vec::with_capacity(samples);

    synth.note_pressed(57, 110);
    for _ in 0..samples {
        let left = synth.get_sample(true);
        let right = synth.get_sample(false);
        synth.increment_phases(DT_MS);
        wav_data.push((left + right) * 0.5);
    }

    assert_eq!(synth.voices_used(), 3);
    assert!(wav_data.iter().all(|sample| sample.is_finite()));
    let peak = wav_data.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
    assert!(peak > 0.01, "peak {}", peak);

    wav_writer::write("render/unison_spread.wav", SAMPLE_RATE, &wav_data).ok();
}
