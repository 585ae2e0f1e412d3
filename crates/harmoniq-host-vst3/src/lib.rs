//! Harmoniq Studio VST3 hosting support.
//!
//! Before a VST3 plugin is activated the host asks it, once, which MIDI protocol its
//! process call consumes. Plugins that answer get packed UMP events. Plugins without the
//! capability get discrete note events for the rest of their lifetime. This crate holds
//! that negotiation, the plugin lifecycle it is tied to, and the bridge that turns MIDI
//! 1.0 input into whichever event shape was agreed.

pub mod config;
pub mod host;
pub mod instance;
pub mod protocol;
pub mod routing;

pub use config::{HostOptions, UnknownProtocolPolicy};
pub use host::{Vst3Host, Vst3HostBuilder};
pub use instance::{
    InstanceError, LifecycleState, MidiDelivery, PluginComponent, PluginFeatures, PluginInstance,
};
pub use protocol::{MidiProtocol, ProcessMidiProtocol, Tuid, IPROCESS_MIDI_PROTOCOL_IID};
pub use routing::{scale_up, MidiInputMessage, MidiRouter};
