use core::fmt;

use serde::{Deserialize, Serialize};

/// MIDI protocol generation a plugin's process call consumes.
///
/// Values other than 0 and 1 are reserved for future protocol versions and are kept as
/// [`MidiProtocol::Unknown`] instead of being rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MidiProtocol {
    Midi1_0,
    Midi2_0,
    Unknown(u32),
}

impl MidiProtocol {
    pub const MIDI_1_0: u32 = 0;
    pub const MIDI_2_0: u32 = 1;

    pub fn from_raw(raw: u32) -> Self {
        match raw {
            Self::MIDI_1_0 => Self::Midi1_0,
            Self::MIDI_2_0 => Self::Midi2_0,
            other => Self::Unknown(other),
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            Self::Midi1_0 => Self::MIDI_1_0,
            Self::Midi2_0 => Self::MIDI_2_0,
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<u32> for MidiProtocol {
    fn from(raw: u32) -> Self {
        Self::from_raw(raw)
    }
}

impl From<MidiProtocol> for u32 {
    fn from(protocol: MidiProtocol) -> Self {
        protocol.to_raw()
    }
}

impl fmt::Display for MidiProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Midi1_0 => f.write_str("MIDI 1.0"),
            Self::Midi2_0 => f.write_str("MIDI 2.0"),
            Self::Unknown(raw) => write!(f, "unknown MIDI protocol ({raw})"),
        }
    }
}

/// 128-bit interface identifier in the SDK's in-memory byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tuid(pub [u8; 16]);

impl Tuid {
    /// Builds an identifier from the four words used in interface declarations.
    ///
    /// Windows builds use COM byte order for the first two words, everything else stores
    /// all four words big-endian.
    pub const fn from_words(l1: u32, l2: u32, l3: u32, l4: u32) -> Self {
        let a = l1.to_be_bytes();
        let b = l2.to_be_bytes();
        let c = l3.to_be_bytes();
        let d = l4.to_be_bytes();
        #[cfg(windows)]
        let head = [a[3], a[2], a[1], a[0], b[1], b[0], b[3], b[2]];
        #[cfg(not(windows))]
        let head = [a[0], a[1], a[2], a[3], b[0], b[1], b[2], b[3]];
        Self([
            head[0], head[1], head[2], head[3], head[4], head[5], head[6], head[7], c[0], c[1],
            c[2], c[3], d[0], d[1], d[2], d[3],
        ])
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for Tuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Tuid(")?;
        for byte in self.0 {
            write!(f, "{byte:02X}")?;
        }
        f.write_str(")")
    }
}

/// Interface identifier of the MIDI protocol capability query.
pub const IPROCESS_MIDI_PROTOCOL_IID: Tuid =
    Tuid::from_words(0x61C7_B395, 0xC496_43B4, 0x93DC_EB01, 0x603E_29EA);

/// Capability query a plugin exposes when its process call understands UMP events.
///
/// Asked once between initialization and the first activation. The answer must not
/// change afterwards and asking must have no effect on the plugin.
pub trait ProcessMidiProtocol {
    fn process_midi_protocol(&self) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defined_protocols_round_trip() {
        for protocol in [MidiProtocol::Midi1_0, MidiProtocol::Midi2_0] {
            assert_eq!(MidiProtocol::from_raw(protocol.to_raw()), protocol);
        }
        assert_eq!(MidiProtocol::Midi1_0.to_raw(), 0);
        assert_eq!(MidiProtocol::Midi2_0.to_raw(), 1);
    }

    #[test]
    fn reserved_values_are_unknown_not_errors() {
        let protocol = MidiProtocol::from_raw(2);
        assert_eq!(protocol, MidiProtocol::Unknown(2));
        assert!(!protocol.is_supported());
        assert_eq!(protocol.to_raw(), 2);
        assert_eq!(u32::from(MidiProtocol::from(u32::MAX)), u32::MAX);
    }

    #[cfg(not(windows))]
    #[test]
    fn iid_bytes_are_big_endian_words() {
        assert_eq!(
            IPROCESS_MIDI_PROTOCOL_IID.as_bytes(),
            &[
                0x61, 0xC7, 0xB3, 0x95, 0xC4, 0x96, 0x43, 0xB4, 0x93, 0xDC, 0xEB, 0x01, 0x60,
                0x3E, 0x29, 0xEA,
            ]
        );
    }

    #[cfg(windows)]
    #[test]
    fn iid_bytes_use_com_order() {
        assert_eq!(
            IPROCESS_MIDI_PROTOCOL_IID.as_bytes(),
            &[
                0x95, 0xB3, 0xC7, 0x61, 0x96, 0xC4, 0xB4, 0x43, 0x93, 0xDC, 0xEB, 0x01, 0x60,
                0x3E, 0x29, 0xEA,
            ]
        );
    }
}
