//! End-to-end demo: MIDI bytes through the parser, the synth and the
//! output stage, rendered to a WAV file.
//!
//! The DAC FIFO is emulated by a sink that decodes the codes back to
//! floats, and the UART interrupt by pushing bytes into the queue between
//! task slices.

use std::fs::File;

use simple_logger::SimpleLogger;

use polyfm_dsp::midi::MidiByteQueue;
use polyfm_dsp::shell::{AudioSink, SynthShell};
use polyfm_dsp::waveform::Waveform;

const SAMPLE_RATE: u32 = 20000;
/// Samples granted to the shell per emulated task slice.
const SLICE: usize = 1000;

/// Emulated DAC: accepts codes in slices of `SLICE` samples and keeps the
/// decoded signal for the WAV writer.
#[derive(Debug, Default)]
struct WavSink {
    rate: u32,
    running: bool,
    budget: usize,
    samples: Vec<f32>,
}

impl AudioSink for WavSink {
    fn set_rate(&mut self, hz: u32) {
        self.rate = hz;
    }

    fn available_put(&self) -> usize {
        self.budget
    }

    fn put(&mut self, code: u16) {
        self.budget -= 1;
        self.samples.push((code as i32 - 0x2000) as f32 / 6191.0);
    }

    fn enable_output(&mut self, enable: bool) {
        self.running = enable;
    }

    fn start(&mut self) {
        log::info!("audio output started at {} Hz", self.rate);
    }
}

/// The default patch of the hardware build: a sine carrier modulated by a
/// one-octave-up triangle.
fn setup_patch(shell: &mut SynthShell<2, 4>) {
    shell.synth.set_mono(false);
    shell.synth.set_mod(0, 1, 2.0);
    shell.synth.set_output_volume(0, 1.0);

    if let Some(params) = shell.synth.op_mut(0) {
        params.ratio = 1.0;
        params.waveform = Waveform::Sine;
        params.adsr.set_attack(20.0);
        params.adsr.set_sustain(1.0);
        params.adsr.set_decay(800.0);
        params.adsr.set_release(20.0);
    }
    if let Some(params) = shell.synth.op_mut(1) {
        params.ratio = 2.0;
        params.waveform = Waveform::Triangle;
        params.adsr.set_attack(10.0);
        params.adsr.set_decay(700.0);
        params.adsr.set_sustain(0.7);
    }
}

fn main() {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init()
        .unwrap();

    let mut queue = MidiByteQueue::new();
    let (mut producer, consumer) = queue.split();

    let mut shell: SynthShell<2, 4> = SynthShell::new(consumer, SAMPLE_RATE);
    setup_patch(&mut shell);

    let mut sink = WavSink::default();
    shell.start(&mut sink);

    // A short C major phrase with running status, plus a pitch bend on
    // the final chord. Timestamps are task-slice indices (50 ms each).
    let script: &[(usize, &[u8])] = &[
        (0, &[0x90, 0x3C, 0x64]),
        (4, &[0x80, 0x3C, 0x40]),
        (5, &[0x90, 0x40, 0x64]),
        (9, &[0x80, 0x40, 0x40]),
        (10, &[0x90, 0x43, 0x64]),
        (14, &[0x80, 0x43, 0x40]),
        // Chord via running status.
        (15, &[0x90, 0x3C, 0x64, 0x40, 0x64, 0x43, 0x64]),
        (20, &[0xE0, 0x00, 0x50]),
        (24, &[0xE0, 0x00, 0x40]),
        (25, &[0x80, 0x3C, 0x40, 0x40, 0x40, 0x43, 0x40]),
    ];

    let total_slices = 30;
    for slice in 0..total_slices {
        for (_, bytes) in script.iter().filter(|(at, _)| *at == slice) {
            for &byte in bytes.iter() {
                if producer.enqueue(byte).is_err() {
                    log::warn!("midi byte queue overflow");
                }
            }
        }

        sink.budget = SLICE;
        shell.run_slice(&mut sink);
        log::debug!(
            "slice {:2}: {} voices sounding",
            slice,
            shell.synth.voices_used()
        );
    }

    if sink.running {
        log::info!("rendered {} samples", sink.samples.len());
    }

    let mut file = File::create("midi_render.wav").expect("failed to create output file");
    let header = wav::Header::new(wav::WAV_FORMAT_IEEE_FLOAT, 1, SAMPLE_RATE, 32);
    wav::write(header, &wav::BitDepth::from(sink.samples), &mut file)
        .expect("failed to write output file");
    log::info!("wrote midi_render.wav");
}
