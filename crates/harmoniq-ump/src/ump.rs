//! Fixed-layout Universal MIDI Packet record.
//!
//! A [`UmpEvent`] is the 16 byte payload that crosses the host/plugin boundary inside the
//! generic event stream. The record is byte-array backed so its layout does not depend on
//! how either side lays out `[u32; 4]`: 16 bytes, 4 byte alignment, no padding. The words
//! are transported untouched. Decoding them into MIDI messages is the consumer's job.

use core::fmt;

/// Event type tag selecting the UMP member of the generic event union.
pub const UMP_EVENT_TYPE: u16 = 0x100;

/// Size of [`UmpEvent`] in bytes.
pub const UMP_EVENT_SIZE: usize = 16;

/// Number of 32-bit words carried by a [`UmpEvent`].
pub const UMP_WORD_COUNT: usize = 4;

/// One Universal MIDI Packet, carried by value.
#[repr(C, align(4))]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct UmpEvent {
    bytes: [u8; UMP_EVENT_SIZE],
}

const _: () = assert!(core::mem::size_of::<UmpEvent>() == UMP_EVENT_SIZE);
const _: () = assert!(core::mem::align_of::<UmpEvent>() == 4);

impl UmpEvent {
    /// Builds a packet from its four words.
    #[inline]
    pub const fn new(words: [u32; UMP_WORD_COUNT]) -> Self {
        let mut bytes = [0u8; UMP_EVENT_SIZE];
        let mut i = 0;
        while i < UMP_WORD_COUNT {
            let word = words[i].to_ne_bytes();
            bytes[i * 4] = word[0];
            bytes[i * 4 + 1] = word[1];
            bytes[i * 4 + 2] = word[2];
            bytes[i * 4 + 3] = word[3];
            i += 1;
        }
        Self { bytes }
    }

    /// Reinterprets 16 bytes in native byte order, which is the in-process ABI order.
    #[inline]
    pub const fn from_bytes(bytes: [u8; UMP_EVENT_SIZE]) -> Self {
        Self { bytes }
    }

    /// Decodes a packet written with [`UmpEvent::to_le_bytes`].
    pub fn from_le_bytes(bytes: [u8; UMP_EVENT_SIZE]) -> Self {
        let mut words = [0u32; UMP_WORD_COUNT];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self::new(words)
    }

    /// Word `index` (0..4). Panics when `index` is out of range, like slice indexing.
    #[inline]
    pub fn word(&self, index: usize) -> u32 {
        let offset = index * 4;
        let b = &self.bytes[offset..offset + 4];
        u32::from_ne_bytes([b[0], b[1], b[2], b[3]])
    }

    #[inline]
    pub fn set_word(&mut self, index: usize, value: u32) {
        let offset = index * 4;
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
    }

    #[inline]
    pub fn words(&self) -> [u32; UMP_WORD_COUNT] {
        [self.word(0), self.word(1), self.word(2), self.word(3)]
    }

    /// The raw record exactly as it sits in memory.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; UMP_EVENT_SIZE] {
        &self.bytes
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; UMP_EVENT_SIZE] {
        self.bytes
    }

    /// Byte-order independent encoding, for transports that leave the process.
    pub fn to_le_bytes(&self) -> [u8; UMP_EVENT_SIZE] {
        let mut out = [0u8; UMP_EVENT_SIZE];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.words()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Message type nibble (bits 28..32 of word 0).
    #[inline]
    pub fn message_type(&self) -> UmpMessageType {
        UmpMessageType::from_nibble((self.word(0) >> 28) as u8)
    }

    /// Group nibble (bits 24..28 of word 0).
    #[inline]
    pub fn group(&self) -> u8 {
        ((self.word(0) >> 24) & 0x0F) as u8
    }
}

impl From<[u32; UMP_WORD_COUNT]> for UmpEvent {
    fn from(words: [u32; UMP_WORD_COUNT]) -> Self {
        Self::new(words)
    }
}

impl From<UmpEvent> for [u32; UMP_WORD_COUNT] {
    fn from(event: UmpEvent) -> Self {
        event.words()
    }
}

impl fmt::Debug for UmpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.words();
        write!(f, "UmpEvent([{a:#010x}, {b:#010x}, {c:#010x}, {d:#010x}])")
    }
}

/// Message type field of a Universal MIDI Packet.
///
/// Reserved nibbles are kept as [`UmpMessageType::Reserved`] so newer packets pass through
/// instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UmpMessageType {
    Utility,
    System,
    Midi1ChannelVoice,
    Data64,
    Midi2ChannelVoice,
    Data128,
    FlexData,
    UmpStream,
    Reserved(u8),
}

impl UmpMessageType {
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble & 0x0F {
            0x0 => Self::Utility,
            0x1 => Self::System,
            0x2 => Self::Midi1ChannelVoice,
            0x3 => Self::Data64,
            0x4 => Self::Midi2ChannelVoice,
            0x5 => Self::Data128,
            0xD => Self::FlexData,
            0xF => Self::UmpStream,
            other => Self::Reserved(other),
        }
    }

    pub fn nibble(self) -> u8 {
        match self {
            Self::Utility => 0x0,
            Self::System => 0x1,
            Self::Midi1ChannelVoice => 0x2,
            Self::Data64 => 0x3,
            Self::Midi2ChannelVoice => 0x4,
            Self::Data128 => 0x5,
            Self::FlexData => 0xD,
            Self::UmpStream => 0xF,
            Self::Reserved(nibble) => nibble,
        }
    }

    /// Packet length in 32-bit words. Reserved types still have a defined size.
    pub fn word_count(self) -> usize {
        match self.nibble() {
            0x0..=0x2 | 0x6 | 0x7 => 1,
            0x3 | 0x4 | 0x8..=0xA => 2,
            0xB | 0xC => 3,
            _ => 4,
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Self::Reserved(_))
    }
}
