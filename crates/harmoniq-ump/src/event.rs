//! Generic plugin event carrying either a discrete note message or a UMP packet.
//!
//! [`Event`] is the sum type used inside Harmoniq. Its tag is derived from the payload
//! variant, so the two cannot disagree. [`RawEvent`] is the `#[repr(C)]` tag + union form
//! used at the ABI boundary. Reading a member through it is checked against the tag.

use core::fmt;

use bitflags::bitflags;
use thiserror::Error;

use crate::ump::{UmpEvent, UMP_EVENT_TYPE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("event tag {found:#x} does not select the requested member {expected:#x}")]
    TagMismatch { expected: u16, found: u16 },
    #[error("unknown event type {0:#x}")]
    UnknownEventType(u16),
    #[error("event list is full")]
    ListFull,
    #[error("event index {index} out of range ({count} events)")]
    IndexOutOfRange { index: usize, count: usize },
}

/// Discriminator values of the generic event container.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NoteOn = 0,
    NoteOff = 1,
    PolyPressure = 3,
    Ump = UMP_EVENT_TYPE,
    LegacyMidiCcOut = 0xFFFF,
}

impl EventKind {
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::NoteOn),
            1 => Some(Self::NoteOff),
            3 => Some(Self::PolyPressure),
            UMP_EVENT_TYPE => Some(Self::Ump),
            0xFFFF => Some(Self::LegacyMidiCcOut),
            _ => None,
        }
    }

    #[inline]
    pub fn raw(self) -> u16 {
        self as u16
    }
}

bitflags! {
    pub struct EventFlags: u16 {
        /// Played live, e.g. from a physical keyboard.
        const IS_LIVE = 1;
        const USER_RESERVED_1 = 1 << 14;
        const USER_RESERVED_2 = 1 << 15;
    }
}

impl Default for EventFlags {
    fn default() -> Self {
        Self::empty()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteOnEvent {
    pub channel: i16,
    pub pitch: i16,
    /// Cents.
    pub tuning: f32,
    /// `[0.0, 1.0]`
    pub velocity: f32,
    /// In samples, 0 when unknown.
    pub length: i32,
    /// -1 if unspecified.
    pub note_id: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteOffEvent {
    pub channel: i16,
    pub pitch: i16,
    pub velocity: f32,
    pub note_id: i32,
    pub tuning: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolyPressureEvent {
    pub channel: i16,
    pub pitch: i16,
    pub pressure: f32,
    pub note_id: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyMidiCcOutEvent {
    pub control_number: u8,
    pub channel: i8,
    pub value: i8,
    pub value2: i8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventPayload {
    NoteOn(NoteOnEvent),
    NoteOff(NoteOffEvent),
    PolyPressure(PolyPressureEvent),
    LegacyMidiCcOut(LegacyMidiCcOutEvent),
    Ump(UmpEvent),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NoteOn(_) => EventKind::NoteOn,
            Self::NoteOff(_) => EventKind::NoteOff,
            Self::PolyPressure(_) => EventKind::PolyPressure,
            Self::LegacyMidiCcOut(_) => EventKind::LegacyMidiCcOut,
            Self::Ump(_) => EventKind::Ump,
        }
    }
}

/// An event as delivered to or received from a plugin during one process call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub bus_index: i32,
    /// Offset from the start of the current block, in samples.
    pub sample_offset: i32,
    /// Musical position in quarter notes.
    pub ppq_position: f64,
    pub flags: EventFlags,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(bus_index: i32, sample_offset: i32, payload: EventPayload) -> Self {
        Self {
            bus_index,
            sample_offset,
            ppq_position: 0.0,
            flags: EventFlags::empty(),
            payload,
        }
    }

    pub fn ump(bus_index: i32, sample_offset: i32, packet: UmpEvent) -> Self {
        Self::new(bus_index, sample_offset, EventPayload::Ump(packet))
    }

    pub fn with_flags(mut self, flags: EventFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_ppq_position(mut self, ppq_position: f64) -> Self {
        self.ppq_position = ppq_position;
        self
    }

    #[inline]
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn as_ump(&self) -> Option<&UmpEvent> {
        match &self.payload {
            EventPayload::Ump(packet) => Some(packet),
            _ => None,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
union RawEventPayload {
    note_on: NoteOnEvent,
    note_off: NoteOffEvent,
    poly_pressure: PolyPressureEvent,
    midi_cc_out: LegacyMidiCcOutEvent,
    ump: UmpEvent,
}

/// ABI form of [`Event`]: header, type tag and payload union.
///
/// Only constructible from an [`Event`], which keeps the tag and the active member in sync.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawEvent {
    bus_index: i32,
    sample_offset: i32,
    ppq_position: f64,
    flags: u16,
    event_type: u16,
    payload: RawEventPayload,
}

impl RawEvent {
    #[inline]
    pub fn event_type(&self) -> u16 {
        self.event_type
    }

    #[inline]
    pub fn bus_index(&self) -> i32 {
        self.bus_index
    }

    #[inline]
    pub fn sample_offset(&self) -> i32 {
        self.sample_offset
    }

    /// The UMP member. Fails unless the tag is [`UMP_EVENT_TYPE`].
    pub fn ump(&self) -> Result<UmpEvent, EventError> {
        if self.event_type != UMP_EVENT_TYPE {
            return Err(EventError::TagMismatch {
                expected: UMP_EVENT_TYPE,
                found: self.event_type,
            });
        }
        // Safe because the tag says `ump` is the active member.
        Ok(unsafe { self.payload.ump })
    }
}

impl From<&Event> for RawEvent {
    fn from(event: &Event) -> Self {
        let payload = match event.payload {
            EventPayload::NoteOn(note_on) => RawEventPayload { note_on },
            EventPayload::NoteOff(note_off) => RawEventPayload { note_off },
            EventPayload::PolyPressure(poly_pressure) => RawEventPayload { poly_pressure },
            EventPayload::LegacyMidiCcOut(midi_cc_out) => RawEventPayload { midi_cc_out },
            EventPayload::Ump(ump) => RawEventPayload { ump },
        };
        Self {
            bus_index: event.bus_index,
            sample_offset: event.sample_offset,
            ppq_position: event.ppq_position,
            flags: event.flags.bits(),
            event_type: event.kind().raw(),
            payload,
        }
    }
}

impl TryFrom<&RawEvent> for Event {
    type Error = EventError;

    fn try_from(raw: &RawEvent) -> Result<Self, Self::Error> {
        let kind =
            EventKind::from_raw(raw.event_type).ok_or(EventError::UnknownEventType(raw.event_type))?;
        // Safe because each arm reads the member named by the tag.
        let payload = unsafe {
            match kind {
                EventKind::NoteOn => EventPayload::NoteOn(raw.payload.note_on),
                EventKind::NoteOff => EventPayload::NoteOff(raw.payload.note_off),
                EventKind::PolyPressure => EventPayload::PolyPressure(raw.payload.poly_pressure),
                EventKind::LegacyMidiCcOut => {
                    EventPayload::LegacyMidiCcOut(raw.payload.midi_cc_out)
                }
                EventKind::Ump => EventPayload::Ump(raw.payload.ump),
            }
        };
        Ok(Self {
            bus_index: raw.bus_index,
            sample_offset: raw.sample_offset,
            ppq_position: raw.ppq_position,
            flags: EventFlags::from_bits_truncate(raw.flags),
            payload,
        })
    }
}

impl fmt::Debug for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawEvent")
            .field("bus_index", &self.bus_index)
            .field("sample_offset", &self.sample_offset)
            .field("ppq_position", &self.ppq_position)
            .field("flags", &self.flags)
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn note_on() -> Event {
        Event::new(
            0,
            12,
            EventPayload::NoteOn(NoteOnEvent {
                channel: 0,
                pitch: 60,
                tuning: 0.0,
                velocity: 0.5,
                length: 0,
                note_id: -1,
            }),
        )
    }

    #[test]
    fn ump_tag_is_reserved_value() {
        let event = Event::ump(0, 0, UmpEvent::new([0x2090_3C40, 0, 0, 0]));
        assert_eq!(event.kind(), EventKind::Ump);
        assert_eq!(event.kind().raw(), 0x100);
    }

    #[test]
    fn raw_ump_member_is_exposed_for_ump_tag() {
        let packet = UmpEvent::new([0x2080_4040, 0, 0, 0]);
        let raw = RawEvent::from(&Event::ump(1, 7, packet));
        assert_eq!(raw.event_type(), UMP_EVENT_TYPE);
        assert_eq!(raw.bus_index(), 1);
        assert_eq!(raw.sample_offset(), 7);
        assert_eq!(raw.ump(), Ok(packet));
    }

    #[test]
    fn reading_ump_from_note_event_is_rejected() {
        let raw = RawEvent::from(&note_on());
        assert_eq!(
            raw.ump(),
            Err(EventError::TagMismatch {
                expected: UMP_EVENT_TYPE,
                found: 0,
            })
        );
    }

    #[test]
    fn raw_conversion_keeps_header_and_payload() {
        let event = note_on()
            .with_flags(EventFlags::IS_LIVE)
            .with_ppq_position(3.5);
        let raw = RawEvent::from(&event);
        assert_eq!(Event::try_from(&raw), Ok(event));
    }

    #[test]
    fn unknown_raw_tags_are_reported() {
        let mut raw = RawEvent::from(&note_on());
        raw.event_type = 7;
        assert_eq!(Event::try_from(&raw), Err(EventError::UnknownEventType(7)));
    }

    #[test]
    fn as_ump_only_matches_ump_payload() {
        assert!(note_on().as_ump().is_none());
        let packet = UmpEvent::new([0x4090_3C00, 0x8000_0000, 0, 0]);
        assert_eq!(Event::ump(0, 0, packet).as_ump(), Some(&packet));
    }
}
