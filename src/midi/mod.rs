//! Streaming MIDI input: the byte-level parser and the ISR-side byte
//! queue feeding it.

pub mod parser;
pub mod queue;

pub use parser::{MidiHandler, MidiParser};
pub use queue::{MidiByteConsumer, MidiByteProducer, MidiByteQueue, MIDI_QUEUE_CAPACITY};
