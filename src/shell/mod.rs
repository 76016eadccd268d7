//! Glue between the MIDI byte source, the synth and the audio FIFO.
//!
//! Everything here runs in one cooperative task context: the interrupt
//! side only ever touches the byte queue, and the audio loop's single
//! voluntary yield is the caller sleeping when the FIFO reports full.

pub mod control;

use crate::midi::{MidiByteConsumer, MidiParser};
use crate::synth::FmSynth;
use crate::utils::clamp_signal;

/// Contract of the DAC/DMA collaborator: a bounded FIFO of unsigned DAC
/// codes plus rate and gating controls.
pub trait AudioSink {
    fn set_rate(&mut self, hz: u32);
    /// Number of FIFO slots currently writable.
    fn available_put(&self) -> usize;
    /// Pushes one DAC code; only called while `available_put` is nonzero.
    fn put(&mut self, code: u16);
    fn enable_output(&mut self, enable: bool);
    fn start(&mut self);
}

/// Full-scale multiplier mapping [-1, 1] into the DAC range.
const PREMUL: f32 = 6191.0;
/// DAC code of a zero sample.
const DAC_OFFSET: i32 = 0x2000;

/// Final conditioning applied to every sample: master volume, hard clamp,
/// bit-crusher quantization and the DAC offset.
#[derive(Debug)]
pub struct OutputStage {
    master_vol: f32,
    crush: u16,
    inv_crush: f32,
}

impl OutputStage {
    pub fn new() -> Self {
        Self {
            master_vol: 1.0,
            crush: 1,
            inv_crush: 1.0,
        }
    }

    pub fn set_master_volume(&mut self, vol: f32) {
        self.master_vol = vol;
    }

    /// Sets the bit-crusher quantization factor; 1 is transparent.
    pub fn set_crush(&mut self, factor: u16) {
        self.crush = factor.max(1);
        self.inv_crush = 1.0 / self.crush as f32;
    }

    /// Converts one synth sample into a DAC code.
    #[inline]
    pub fn dac_code(&self, sample: f32) -> u16 {
        let value = clamp_signal(self.master_vol * sample);
        (DAC_OFFSET + self.crush as i32 * (value * PREMUL * self.inv_crush) as i16 as i32) as u16
    }
}

impl Default for OutputStage {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the synth, the parser and the output stage, and wires them to the
/// byte queue and the DAC FIFO.
pub struct SynthShell<'a, const N_OSC: usize = 2, const MAX_POLYPHONY: usize = 4> {
    pub synth: FmSynth<N_OSC, MAX_POLYPHONY>,
    pub parser: MidiParser,
    pub output: OutputStage,
    midi_in: MidiByteConsumer<'a>,
    sample_rate: u32,
    dt_ms: f32,
}

impl<'a, const N_OSC: usize, const MAX_POLYPHONY: usize> SynthShell<'a, N_OSC, MAX_POLYPHONY> {
    pub fn new(midi_in: MidiByteConsumer<'a>, sample_rate: u32) -> Self {
        Self {
            synth: FmSynth::new(),
            parser: MidiParser::new(false),
            output: OutputStage::new(),
            midi_in,
            sample_rate,
            dt_ms: 1000.0 / sample_rate as f32,
        }
    }

    /// Configures and starts the audio collaborator.
    pub fn start<A: AudioSink>(&self, sink: &mut A) {
        sink.set_rate(self.sample_rate);
        sink.enable_output(true);
        sink.start();
    }

    /// Drains pending MIDI bytes through the parser; every resulting
    /// event lands on the synth before the next sample is produced.
    pub fn pump_midi(&mut self) {
        while let Some(byte) = self.midi_in.dequeue() {
            let mut surface = control::CcSurface {
                synth: &mut self.synth,
                output: &mut self.output,
            };
            self.parser.consume_byte(byte, &mut surface);
        }
    }

    /// Fills the sink FIFO one sample at a time, advancing the voice
    /// phases by `dt` per pushed sample. Returns the number of samples
    /// pushed; the caller sleeps briefly once the FIFO reports full.
    pub fn fill_fifo<A: AudioSink>(&mut self, sink: &mut A) -> usize {
        let mut pushed = 0;
        while sink.available_put() > 0 {
            let sample = self.synth.get_sample(false);
            sink.put(self.output.dac_code(sample));
            self.synth.increment_phases(self.dt_ms);
            pushed += 1;
        }
        pushed
    }

    /// Housekeeping for the FIFO-full idle path.
    pub fn idle_maintenance(&mut self) {
        self.synth.clean_voice_pool();
    }

    /// One iteration of the task loop: drain MIDI, top up the FIFO, clean
    /// the voice pool. Returns the number of samples pushed.
    pub fn run_slice<A: AudioSink>(&mut self, sink: &mut A) -> usize {
        self.pump_midi();
        let pushed = self.fill_fifo(sink);
        self.idle_maintenance();
        pushed
    }
}
