//! Universal MIDI Packet records and the event containers that carry them.
//!
//! Plugins that consume MIDI 2.0 era input receive [`UmpEvent`] packets through the same
//! event stream that carries discrete note events. This crate defines the fixed 16 byte
//! record, the tagged [`Event`] it travels in, and the allocation-free containers used on
//! the audio thread.

pub mod event;
pub mod list;
pub mod ump;

pub use event::{
    Event, EventError, EventFlags, EventKind, EventPayload, LegacyMidiCcOutEvent, NoteOffEvent,
    NoteOnEvent, PolyPressureEvent, RawEvent,
};
pub use list::{EventList, EventQueue, QueueError};
pub use ump::{UmpEvent, UmpMessageType, UMP_EVENT_SIZE, UMP_EVENT_TYPE, UMP_WORD_COUNT};
