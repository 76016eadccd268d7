//! ISR-to-task byte transport.
//!
//! The UART interrupt handler is the sole producer and the synth task the
//! sole consumer, so a lock-free SPSC ring buffer is all that is needed:
//! no synth data structure is ever touched from interrupt context.

use heapless::spsc::{Consumer, Producer, Queue};

/// Capacity of the MIDI byte queue. 64 bytes is roughly 20 ms of
/// saturated MIDI 1.0 wire traffic, far more than one task-loop
/// iteration leaves pending.
pub const MIDI_QUEUE_CAPACITY: usize = 64;

/// Byte queue between the UART interrupt and the synth task. Split it
/// once at startup; the producer half goes to the interrupt handler, the
/// consumer half to the [`crate::shell::SynthShell`].
pub type MidiByteQueue = Queue<u8, MIDI_QUEUE_CAPACITY>;

/// Interrupt-side handle. `enqueue` fails when the queue is full; the
/// byte is dropped and the parser resynchronizes on a later status byte.
pub type MidiByteProducer<'a> = Producer<'a, u8, MIDI_QUEUE_CAPACITY>;

/// Task-side handle.
pub type MidiByteConsumer<'a> = Consumer<'a, u8, MIDI_QUEUE_CAPACITY>;
