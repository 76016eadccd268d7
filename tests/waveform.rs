//! Tests for the waveform evaluators

use std::f32::consts::TAU;

use polyfm_dsp::waveform::{saw, sine, square, square10, square25, triangle, Waveform};

const STEPS: usize = 4096;

#[test]
fn sine_tracks_reference_within_tolerance() {
    let tolerance = 2e-3;

    for n in 0..STEPS {
        let phase = n as f32 / STEPS as f32;
        let reference = (TAU * phase).sin();
        let error = (sine(phase) - reference).abs();
        assert!(
            error < tolerance,
            "phase {}: error {} exceeds {}",
            phase,
            error,
            tolerance
        );
    }
}

#[test]
fn evaluators_stay_in_range() {
    for n in 0..STEPS {
        let phase = n as f32 / STEPS as f32;
        for value in [
            sine(phase),
            triangle(phase),
            saw(phase),
            square(phase),
            square25(phase),
            square10(phase),
        ] {
            assert!((-1.0..=1.0).contains(&value), "phase {}: {}", phase, value);
        }
    }
}

#[test]
fn triangle_hits_its_corners() {
    assert!((triangle(0.0) - -1.0).abs() < 1e-6);
    assert!(triangle(0.25).abs() < 1e-6);
    assert!((triangle(0.5) - 1.0).abs() < 1e-6);
    assert!(triangle(0.75).abs() < 1e-6);
}

#[test]
fn saw_is_linear() {
    assert!((saw(0.0) - -1.0).abs() < 1e-6);
    assert!(saw(0.5).abs() < 1e-6);
    assert!((saw(0.999) - 0.998).abs() < 1e-3);
}

#[test]
fn square_duty_cycles() {
    assert_eq!(square(0.25), -1.0);
    assert_eq!(square(0.75), 1.0);
    assert_eq!(square25(0.74), -1.0);
    assert_eq!(square25(0.76), 1.0);
    assert_eq!(square10(0.89), -1.0);
    assert_eq!(square10(0.91), 1.0);
}

#[test]
fn eval_wraps_out_of_range_phase() {
    let waveform = Waveform::Sine;

    for phase in [0.1, 0.4, 0.8] {
        let wrapped = waveform.eval(phase + 1.0);
        assert!(
            (wrapped - waveform.eval(phase)).abs() < 1e-6,
            "phase {} not wrapped",
            phase
        );
    }
}
