//! Byte-at-a-time MIDI parser.
//!
//! The parser consumes exactly one byte per call and fires semantic
//! events through a [`MidiHandler`] before returning. It never allocates,
//! never blocks and never recurses; malformed input resynchronizes on the
//! next status byte without leaking state into subsequent messages.

use log::debug;

/// Receiver of parsed MIDI events.
///
/// Every method has a no-op default, so an implementation only picks the
/// events it cares about.
pub trait MidiHandler {
    fn note_on(&mut self, _note: u8, _velocity: u8) {}
    fn note_off(&mut self, _note: u8, _velocity: u8) {}
    /// 7-bit continuous controller change.
    fn cc7(&mut self, _id: u8, _value: u8) {}
    /// Reassembled 14-bit continuous controller change (ids 0..32).
    fn cc14(&mut self, _id: u8, _value: u16) {}
    /// 14-bit pitch-bend value; 0x2000 is neutral.
    fn pitch_bend(&mut self, _value: u16) {}
}

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;
const PROGRAM_CHANGE: u8 = 0xC0;
const CHANNEL_PRESSURE: u8 = 0xD0;
const PITCH_BEND: u8 = 0xE0;
const SYSEX_BEGIN: u8 = 0xF0;
const MTC_QUARTER_FRAME: u8 = 0xF1;
const SONG_POSITION: u8 = 0xF2;
const SONG_SELECT: u8 = 0xF3;
const SYSEX_END: u8 = 0xF7;
const FIRST_REALTIME: u8 = 0xF8;

/// Streaming MIDI byte parser with running status, SysEx framing, a
/// channel filter and optional 14-bit controller pairing.
#[derive(Debug)]
pub struct MidiParser {
    /// Channel events are delivered for; values of 16 and up mean omni.
    listen_channel: u8,
    /// When set, controllers 0..64 are paired into 14-bit values.
    midi2_compliant: bool,

    /// Active status: the command nibble for channel-voice messages, the
    /// full byte for system common. 0 means no status seen yet; a
    /// retained value across completed messages is what implements
    /// running status.
    status: u8,
    /// Channel of the message currently being assembled.
    msg_channel: u8,
    expected: u8,
    seen: u8,
    buffer: [u8; 2],
    in_sysex: bool,

    /// Partially assembled 14-bit controller values, indexed by MSB id.
    cc_partial: [u16; 32],
    /// Which halves arrived so far: bit 1 for the MSB, bit 0 for the LSB.
    cc_halves: [u8; 32],
}

impl MidiParser {
    pub fn new(midi2_compliant: bool) -> Self {
        Self {
            listen_channel: 0,
            midi2_compliant,
            status: 0,
            msg_channel: 0,
            expected: 0,
            seen: 0,
            buffer: [0; 2],
            in_sysex: false,
            cc_partial: [0; 32],
            cc_halves: [0; 32],
        }
    }

    pub fn listen_channel(&self) -> u8 {
        self.listen_channel
    }

    /// Sets the channel events are delivered for; 16 and up means omni.
    pub fn set_listen_channel(&mut self, channel: u8) {
        debug!("midi listen channel set to {}", channel);
        self.listen_channel = channel;
    }

    /// Consumes one byte from the wire, firing zero or more handler
    /// callbacks before returning.
    pub fn consume_byte<H: MidiHandler>(&mut self, byte: u8, handler: &mut H) {
        if byte & 0x80 != 0 {
            self.consume_status(byte);
        } else {
            self.consume_data(byte, handler);
        }
    }

    fn consume_status(&mut self, byte: u8) {
        // Realtime bytes are transparent: they never disturb a message in
        // flight, so running status survives them.
        if byte >= FIRST_REALTIME {
            return;
        }

        match byte {
            SYSEX_BEGIN => {
                self.in_sysex = true;
                self.status = 0;
                self.expected = 0;
                self.seen = 0;
                return;
            }
            SYSEX_END => {
                self.in_sysex = false;
                self.status = 0;
                self.expected = 0;
                self.seen = 0;
                return;
            }
            _ => {}
        }

        // Any other status byte terminates an unfinished SysEx block and
        // starts a fresh message.
        self.in_sysex = false;
        self.seen = 0;

        if byte < SYSEX_BEGIN {
            self.msg_channel = byte & 0x0F;
            self.status = byte & 0xF0;
            self.expected = match self.status {
                PROGRAM_CHANGE | CHANNEL_PRESSURE => 1,
                _ => 2,
            };
        } else {
            self.status = byte;
            self.expected = match byte {
                MTC_QUARTER_FRAME | SONG_SELECT => 1,
                SONG_POSITION => 2,
                // Tune request and the undefined system commands carry no
                // data.
                _ => 0,
            };
        }
    }

    fn consume_data<H: MidiHandler>(&mut self, byte: u8, handler: &mut H) {
        if self.in_sysex || self.status == 0 || self.expected == 0 {
            return;
        }

        self.buffer[self.seen as usize] = byte;
        self.seen += 1;
        if self.seen == self.expected {
            // Keep status and expected so further data bytes continue the
            // same message type (running status).
            self.seen = 0;
            self.fire_event(handler);
        }
    }

    fn fire_event<H: MidiHandler>(&mut self, handler: &mut H) {
        if self.status < SYSEX_BEGIN
            && self.listen_channel <= 15
            && self.msg_channel != self.listen_channel
        {
            return;
        }

        match self.status {
            NOTE_OFF => handler.note_off(self.buffer[0], self.buffer[1]),
            NOTE_ON => {
                if self.buffer[1] == 0 {
                    // Note on with velocity 0 is a note off.
                    handler.note_off(self.buffer[0], 0);
                } else {
                    handler.note_on(self.buffer[0], self.buffer[1]);
                }
            }
            CONTROL_CHANGE => self.process_cc(handler),
            PITCH_BEND => {
                let value = self.buffer[0] as u16 | (self.buffer[1] as u16) << 7;
                handler.pitch_bend(value);
            }
            // Aftertouch, program change, channel pressure and the system
            // common messages are consumed but have no handler surface.
            _ => {}
        }
    }

    fn process_cc<H: MidiHandler>(&mut self, handler: &mut H) {
        let id = self.buffer[0];
        let value = self.buffer[1];

        if self.midi2_compliant && id < 64 {
            let entry = (id & 0x1F) as usize;
            if id < 32 {
                // MSB half.
                self.cc_partial[entry] = (value as u16) << 7;
                self.cc_halves[entry] |= 0x2;
            } else {
                // LSB half; replace the low seven bits.
                self.cc_partial[entry] = (self.cc_partial[entry] & !0x7F) | value as u16;
                self.cc_halves[entry] |= 0x1;
            }
            if self.cc_halves[entry] == 0x3 {
                handler.cc14(entry as u8, self.cc_partial[entry]);
                self.cc_halves[entry] = 0;
            }
        } else {
            handler.cc7(id, value);
        }
    }
}

impl Default for MidiParser {
    fn default() -> Self {
        Self::new(false)
    }
}
