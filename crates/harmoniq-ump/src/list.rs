//! Allocation-free event containers for the audio thread.

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use tracing::trace;

use crate::event::{Event, EventError};
use crate::ump::UmpEvent;

/// Events for one process call. Storage is reserved up front and never grows.
#[derive(Debug, Clone)]
pub struct EventList {
    events: Vec<Event>,
    capacity: usize,
}

impl EventList {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn add_event(&mut self, event: Event) -> Result<(), EventError> {
        if self.events.len() >= self.capacity {
            return Err(EventError::ListFull);
        }
        self.events.push(event);
        Ok(())
    }

    pub fn get_event(&self, index: usize) -> Result<&Event, EventError> {
        self.events.get(index).ok_or(EventError::IndexOutOfRange {
            index,
            count: self.events.len(),
        })
    }

    #[inline]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Removes all events, keeping the reserved storage.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// UMP packets whose message type is known. Packets with a reserved type are skipped.
    pub fn ump_events(&self) -> impl Iterator<Item = &UmpEvent> {
        self.events.iter().filter_map(|event| {
            let packet = event.as_ump()?;
            let kind = packet.message_type();
            if kind.is_known() {
                Some(packet)
            } else {
                trace!(?kind, "skipping UMP packet with reserved message type");
                None
            }
        })
    }
}

impl<'a> IntoIterator for &'a EventList {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue is full")]
    Full,
    #[error("queue is empty")]
    Empty,
}

/// Bounded lock-free queue handing values from a control or MIDI thread to the audio thread.
#[derive(Debug)]
pub struct EventQueue<T> {
    queue: Arc<ArrayQueue<T>>,
}

impl<T> Clone for EventQueue<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<T> EventQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity)),
        }
    }

    pub fn try_push(&self, value: T) -> Result<(), QueueError> {
        self.queue.push(value).map_err(|_| QueueError::Full)
    }

    pub fn try_pop(&self) -> Result<T, QueueError> {
        self.queue.pop().ok_or(QueueError::Empty)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventPayload, NoteOffEvent};
    use pretty_assertions::assert_eq;

    fn packet(word0: u32) -> Event {
        Event::ump(0, 0, UmpEvent::new([word0, 0, 0, 0]))
    }

    #[test]
    fn list_rejects_events_past_capacity() {
        let mut list = EventList::with_capacity(2);
        list.add_event(packet(0x2090_3C40)).unwrap();
        list.add_event(packet(0x2080_3C40)).unwrap();
        assert_eq!(list.add_event(packet(0x2090_3E40)), Err(EventError::ListFull));
        assert_eq!(list.event_count(), 2);
    }

    #[test]
    fn clear_keeps_reserved_storage() {
        let mut list = EventList::with_capacity(4);
        list.add_event(packet(0x2090_3C40)).unwrap();
        let reserved = list.events.capacity();
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.events.capacity(), reserved);
        assert_eq!(list.capacity(), 4);
    }

    #[test]
    fn get_event_reports_out_of_range() {
        let mut list = EventList::with_capacity(1);
        list.add_event(packet(0x2090_3C40)).unwrap();
        assert!(list.get_event(0).is_ok());
        assert_eq!(
            list.get_event(3).unwrap_err(),
            EventError::IndexOutOfRange { index: 3, count: 1 }
        );
    }

    #[test]
    fn ump_iteration_skips_reserved_and_legacy_events() {
        let mut list = EventList::with_capacity(4);
        list.add_event(packet(0x2090_3C40)).unwrap();
        list.add_event(packet(0x7000_0000)).unwrap();
        list.add_event(Event::new(
            0,
            0,
            EventPayload::NoteOff(NoteOffEvent {
                channel: 0,
                pitch: 60,
                velocity: 0.0,
                note_id: -1,
                tuning: 0.0,
            }),
        ))
        .unwrap();
        list.add_event(packet(0x4090_3C00)).unwrap();

        let words: Vec<u32> = list.ump_events().map(|p| p.word(0)).collect();
        assert_eq!(words, vec![0x2090_3C40, 0x4090_3C00]);
    }

    #[test]
    fn queue_is_bounded() {
        let queue = EventQueue::new(1);
        let producer = queue.clone();
        producer.try_push(1u8).unwrap();
        assert_eq!(producer.try_push(2), Err(QueueError::Full));
        assert_eq!(queue.try_pop(), Ok(1));
        assert_eq!(queue.try_pop(), Err(QueueError::Empty));
    }
}
