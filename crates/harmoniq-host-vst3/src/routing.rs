//! Turns MIDI 1.0 input into the event shape a plugin negotiated.

use harmoniq_ump::{
    Event, EventError, EventFlags, EventList, EventPayload, NoteOffEvent, NoteOnEvent,
    PolyPressureEvent, UmpEvent,
};
use tracing::trace;

use crate::instance::MidiDelivery;
use crate::protocol::MidiProtocol;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const POLY_PRESSURE: u8 = 0xA0;
const CONTROL_CHANGE: u8 = 0xB0;
const PROGRAM_CHANGE: u8 = 0xC0;
const CHANNEL_PRESSURE: u8 = 0xD0;
const PITCH_BEND: u8 = 0xE0;

const UMP_MIDI1_CHANNEL_VOICE: u32 = 0x2;
const UMP_MIDI2_CHANNEL_VOICE: u32 = 0x4;

/// Release velocity used when a MIDI 1.0 note-on with velocity 0 becomes a MIDI 2.0 note-off.
const DEFAULT_RELEASE_VELOCITY: u8 = 64;

/// A MIDI 1.0 channel voice message from the host transport or the virtual keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiInputMessage {
    pub data: [u8; 3],
    /// Offset into the next block, in samples.
    pub sample_offset: i32,
    pub live: bool,
}

impl MidiInputMessage {
    pub fn new(data: [u8; 3], sample_offset: i32) -> Self {
        Self {
            data,
            sample_offset,
            live: false,
        }
    }

    pub fn live(data: [u8; 3], sample_offset: i32) -> Self {
        Self {
            data,
            sample_offset,
            live: true,
        }
    }

    #[inline]
    fn status(&self) -> u8 {
        self.data[0] & 0xF0
    }

    #[inline]
    fn channel(&self) -> u8 {
        self.data[0] & 0x0F
    }

    #[inline]
    fn data1(&self) -> u8 {
        self.data[1] & 0x7F
    }

    #[inline]
    fn data2(&self) -> u8 {
        self.data[2] & 0x7F
    }
}

/// Routes input for one plugin instance. Never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiRouter {
    delivery: MidiDelivery,
    bus_index: i32,
    group: u8,
}

impl MidiRouter {
    pub fn new(delivery: MidiDelivery, bus_index: i32, group: u8) -> Self {
        Self {
            delivery,
            bus_index,
            group: group & 0x0F,
        }
    }

    pub fn delivery(&self) -> MidiDelivery {
        self.delivery
    }

    /// Appends the translated message to `list`. Messages the delivery mode cannot carry
    /// are dropped and produce no event.
    pub fn route(&self, msg: &MidiInputMessage, list: &mut EventList) -> Result<(), EventError> {
        if msg.data[0] < NOTE_OFF || msg.data[0] >= 0xF0 {
            trace!(status = msg.data[0], "dropping non channel voice MIDI input");
            return Ok(());
        }

        let payload = match self.delivery {
            MidiDelivery::Legacy => legacy_payload(msg),
            MidiDelivery::Ump(MidiProtocol::Midi1_0) => {
                Some(EventPayload::Ump(self.midi1_packet(msg)))
            }
            MidiDelivery::Ump(MidiProtocol::Midi2_0) => {
                Some(EventPayload::Ump(self.midi2_packet(msg)))
            }
            MidiDelivery::Ump(MidiProtocol::Unknown(_)) | MidiDelivery::Disabled => None,
        };
        let Some(payload) = payload else {
            trace!(status = msg.status(), delivery = ?self.delivery, "MIDI input not routed");
            return Ok(());
        };

        let flags = if msg.live {
            EventFlags::IS_LIVE
        } else {
            EventFlags::empty()
        };
        list.add_event(Event::new(self.bus_index, msg.sample_offset, payload).with_flags(flags))
    }

    fn midi1_packet(&self, msg: &MidiInputMessage) -> UmpEvent {
        let data2 = match msg.status() {
            PROGRAM_CHANGE | CHANNEL_PRESSURE => 0,
            _ => msg.data2(),
        };
        UmpEvent::new([
            UMP_MIDI1_CHANNEL_VOICE << 28
                | u32::from(self.group) << 24
                | u32::from(msg.data[0]) << 16
                | u32::from(msg.data1()) << 8
                | u32::from(data2),
            0,
            0,
            0,
        ])
    }

    fn midi2_packet(&self, msg: &MidiInputMessage) -> UmpEvent {
        let header = |status: u8, index: u8| {
            UMP_MIDI2_CHANNEL_VOICE << 28
                | u32::from(self.group) << 24
                | u32::from(status | msg.channel()) << 16
                | u32::from(index) << 8
        };

        let (word0, word1) = match msg.status() {
            NOTE_ON if msg.data2() == 0 => (
                header(NOTE_OFF, msg.data1()),
                scale_up(u32::from(DEFAULT_RELEASE_VELOCITY), 7, 16) << 16,
            ),
            NOTE_ON | NOTE_OFF => (
                header(msg.status(), msg.data1()),
                scale_up(u32::from(msg.data2()), 7, 16) << 16,
            ),
            POLY_PRESSURE | CONTROL_CHANGE => (
                header(msg.status(), msg.data1()),
                scale_up(u32::from(msg.data2()), 7, 32),
            ),
            PROGRAM_CHANGE => (header(PROGRAM_CHANGE, 0), u32::from(msg.data1()) << 24),
            CHANNEL_PRESSURE => (
                header(CHANNEL_PRESSURE, 0),
                scale_up(u32::from(msg.data1()), 7, 32),
            ),
            _ => {
                let bend = u32::from(msg.data1()) | u32::from(msg.data2()) << 7;
                (header(PITCH_BEND, 0), scale_up(bend, 14, 32))
            }
        };
        UmpEvent::new([word0, word1, 0, 0])
    }
}

fn legacy_payload(msg: &MidiInputMessage) -> Option<EventPayload> {
    let channel = i16::from(msg.channel());
    let pitch = i16::from(msg.data1());
    let normalized = f32::from(msg.data2()) / 127.0;

    match msg.status() {
        NOTE_ON if msg.data2() > 0 => Some(EventPayload::NoteOn(NoteOnEvent {
            channel,
            pitch,
            tuning: 0.0,
            velocity: normalized,
            length: 0,
            note_id: -1,
        })),
        NOTE_ON | NOTE_OFF => Some(EventPayload::NoteOff(NoteOffEvent {
            channel,
            pitch,
            velocity: normalized,
            note_id: -1,
            tuning: 0.0,
        })),
        POLY_PRESSURE => Some(EventPayload::PolyPressure(PolyPressureEvent {
            channel,
            pitch,
            pressure: normalized,
            note_id: -1,
        })),
        _ => None,
    }
}

/// Min-center-max upscaling of a `src_bits` wide value to `dst_bits`.
///
/// 0 stays 0, the center value maps to the destination center and the maximum maps to
/// the destination maximum.
pub fn scale_up(value: u32, src_bits: u32, dst_bits: u32) -> u32 {
    debug_assert!(src_bits > 1 && src_bits <= dst_bits && dst_bits <= 32);
    let value = u64::from(value) & ((1 << src_bits) - 1);
    let scale_bits = dst_bits - src_bits;
    let mut shifted = value << scale_bits;
    let center = 1u64 << (src_bits - 1);
    if value <= center {
        return shifted as u32;
    }

    let repeat_bits = src_bits - 1;
    let mut repeat = value & ((1 << repeat_bits) - 1);
    if scale_bits > repeat_bits {
        repeat <<= scale_bits - repeat_bits;
    } else {
        repeat >>= repeat_bits - scale_bits;
    }
    while repeat != 0 {
        shifted |= repeat;
        repeat >>= repeat_bits;
    }
    shifted as u32
}
