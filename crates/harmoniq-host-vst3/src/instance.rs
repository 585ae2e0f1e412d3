use anyhow::Result;
use harmoniq_ump::EventList;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::UnknownProtocolPolicy;
use crate::protocol::{MidiProtocol, ProcessMidiProtocol, Tuid, IPROCESS_MIDI_PROTOCOL_IID};

/// Abstraction over a loaded plugin component, the boundary to the plugin binary.
pub trait PluginComponent {
    fn initialize(&mut self) -> Result<()>;
    fn terminate(&mut self) -> Result<()>;
    fn set_active(&mut self, active: bool) -> Result<()>;
    fn process(&mut self, input: &EventList, output: &mut EventList) -> Result<()>;

    /// Interface discovery: whether the component implements the interface `iid`.
    fn query_interface(&self, iid: &Tuid) -> bool;

    /// The object behind [`IPROCESS_MIDI_PROTOCOL_IID`], when discovery succeeded.
    fn midi_protocol_support(&self) -> Option<&dyn ProcessMidiProtocol> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Created,
    Initialized,
    Active,
    Terminated,
}

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("cannot {action} a plugin in state {state:?}")]
    InvalidState {
        action: &'static str,
        state: LifecycleState,
    },
    #[error("MIDI protocol can only be negotiated between initialize and activation (state {state:?})")]
    OutsideQueryWindow { state: LifecycleState },
    #[error("plugin failed to {action}")]
    Plugin {
        action: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// How MIDI input reaches a plugin's process call. Fixed once negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MidiDelivery {
    /// Discrete note on/off/pressure events.
    Legacy,
    /// Packed UMP events in the given protocol generation.
    Ump(MidiProtocol),
    /// The plugin reported an unknown protocol and the host chose not to feed it.
    Disabled,
}

/// Capabilities resolved for an instance at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginFeatures {
    /// What the plugin answered, `None` when it does not implement the query.
    pub reported_protocol: Option<MidiProtocol>,
    pub delivery: MidiDelivery,
}

impl PluginFeatures {
    fn legacy() -> Self {
        Self {
            reported_protocol: None,
            delivery: MidiDelivery::Legacy,
        }
    }
}

/// A plugin component together with its lifecycle and negotiated features.
pub struct PluginInstance<P: PluginComponent> {
    component: P,
    state: LifecycleState,
    features: Option<PluginFeatures>,
    unknown_protocol: UnknownProtocolPolicy,
}

impl<P: PluginComponent> PluginInstance<P> {
    pub fn new(component: P, unknown_protocol: UnknownProtocolPolicy) -> Self {
        Self {
            component,
            state: LifecycleState::Created,
            features: None,
            unknown_protocol,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn features(&self) -> Option<PluginFeatures> {
        self.features
    }

    pub fn component(&self) -> &P {
        &self.component
    }

    pub fn component_mut(&mut self) -> &mut P {
        &mut self.component
    }

    pub fn initialize(&mut self) -> Result<(), InstanceError> {
        self.expect_state(LifecycleState::Created, "initialize")?;
        self.component
            .initialize()
            .map_err(|source| InstanceError::Plugin {
                action: "initialize",
                source,
            })?;
        self.state = LifecycleState::Initialized;
        Ok(())
    }

    /// Resolves how MIDI reaches this plugin.
    ///
    /// The plugin is asked at most once, and only between [`initialize`](Self::initialize)
    /// and the first activation. Later calls return the cached answer.
    pub fn negotiate_midi_protocol(&mut self) -> Result<MidiDelivery, InstanceError> {
        if let Some(features) = self.features {
            return Ok(features.delivery);
        }
        if self.state != LifecycleState::Initialized {
            return Err(InstanceError::OutsideQueryWindow { state: self.state });
        }

        let features = self.discover_features();
        debug!(
            reported = ?features.reported_protocol,
            delivery = ?features.delivery,
            "resolved MIDI delivery"
        );
        self.features = Some(features);
        Ok(features.delivery)
    }

    fn discover_features(&self) -> PluginFeatures {
        if !self.component.query_interface(&IPROCESS_MIDI_PROTOCOL_IID) {
            return PluginFeatures::legacy();
        }
        let Some(query) = self.component.midi_protocol_support() else {
            warn!("plugin advertised the MIDI protocol interface but provided none");
            return PluginFeatures::legacy();
        };

        let protocol = MidiProtocol::from_raw(query.process_midi_protocol());
        let delivery = match protocol {
            MidiProtocol::Unknown(raw) => {
                warn!(raw, policy = ?self.unknown_protocol, "plugin reported unknown MIDI protocol");
                match self.unknown_protocol {
                    UnknownProtocolPolicy::FallbackToLegacy => MidiDelivery::Legacy,
                    UnknownProtocolPolicy::Ignore => MidiDelivery::Disabled,
                }
            }
            known => MidiDelivery::Ump(known),
        };
        PluginFeatures {
            reported_protocol: Some(protocol),
            delivery,
        }
    }

    /// Activates processing, negotiating first if the host has not done so yet.
    pub fn activate(&mut self) -> Result<MidiDelivery, InstanceError> {
        self.expect_state(LifecycleState::Initialized, "activate")?;
        let delivery = self.negotiate_midi_protocol()?;
        self.component
            .set_active(true)
            .map_err(|source| InstanceError::Plugin {
                action: "activate",
                source,
            })?;
        self.state = LifecycleState::Active;
        Ok(delivery)
    }

    pub fn deactivate(&mut self) -> Result<(), InstanceError> {
        self.expect_state(LifecycleState::Active, "deactivate")?;
        self.component
            .set_active(false)
            .map_err(|source| InstanceError::Plugin {
                action: "deactivate",
                source,
            })?;
        self.state = LifecycleState::Initialized;
        Ok(())
    }

    pub fn process(&mut self, input: &EventList, output: &mut EventList) -> Result<(), InstanceError> {
        self.expect_state(LifecycleState::Active, "process")?;
        self.component
            .process(input, output)
            .map_err(|source| InstanceError::Plugin {
                action: "process",
                source,
            })
    }

    pub fn terminate(&mut self) -> Result<(), InstanceError> {
        match self.state {
            LifecycleState::Terminated => return Ok(()),
            LifecycleState::Created => {
                // Never initialized, so there is nothing for the plugin to tear down.
                self.state = LifecycleState::Terminated;
                return Ok(());
            }
            LifecycleState::Active => self.deactivate()?,
            LifecycleState::Initialized => {}
        }
        self.component
            .terminate()
            .map_err(|source| InstanceError::Plugin {
                action: "terminate",
                source,
            })?;
        self.state = LifecycleState::Terminated;
        Ok(())
    }

    fn expect_state(
        &self,
        expected: LifecycleState,
        action: &'static str,
    ) -> Result<(), InstanceError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(InstanceError::InvalidState {
                action,
                state: self.state,
            })
        }
    }
}

impl<P: PluginComponent> Drop for PluginInstance<P> {
    fn drop(&mut self) {
        if let Err(err) = self.terminate() {
            warn!(?err, "failed to terminate plugin instance");
        }
    }
}

impl<P: PluginComponent> std::fmt::Debug for PluginInstance<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("state", &self.state)
            .field("features", &self.features)
            .field("unknown_protocol", &self.unknown_protocol)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Query {
        protocol: u32,
        calls: Cell<u32>,
    }

    impl ProcessMidiProtocol for Query {
        fn process_midi_protocol(&self) -> u32 {
            self.calls.set(self.calls.get() + 1);
            self.protocol
        }
    }

    #[derive(Default)]
    struct Component {
        query: Option<Query>,
        active: bool,
        terminated: bool,
    }

    impl PluginComponent for Component {
        fn initialize(&mut self) -> Result<()> {
            Ok(())
        }

        fn terminate(&mut self) -> Result<()> {
            self.terminated = true;
            Ok(())
        }

        fn set_active(&mut self, active: bool) -> Result<()> {
            self.active = active;
            Ok(())
        }

        fn process(&mut self, _input: &EventList, _output: &mut EventList) -> Result<()> {
            Ok(())
        }

        fn query_interface(&self, iid: &Tuid) -> bool {
            *iid == IPROCESS_MIDI_PROTOCOL_IID && self.query.is_some()
        }

        fn midi_protocol_support(&self) -> Option<&dyn ProcessMidiProtocol> {
            self.query.as_ref().map(|q| q as &dyn ProcessMidiProtocol)
        }
    }

    fn with_protocol(protocol: u32) -> Component {
        Component {
            query: Some(Query {
                protocol,
                calls: Cell::new(0),
            }),
            ..Component::default()
        }
    }

    fn query_calls(instance: &PluginInstance<Component>) -> u32 {
        instance
            .component()
            .query
            .as_ref()
            .map_or(0, |q| q.calls.get())
    }

    #[test]
    fn negotiation_before_initialize_is_refused() {
        let mut instance =
            PluginInstance::new(with_protocol(1), UnknownProtocolPolicy::FallbackToLegacy);
        assert!(matches!(
            instance.negotiate_midi_protocol(),
            Err(InstanceError::OutsideQueryWindow {
                state: LifecycleState::Created
            })
        ));
        assert_eq!(query_calls(&instance), 0);
    }

    #[test]
    fn plugin_is_asked_once() {
        let mut instance =
            PluginInstance::new(with_protocol(1), UnknownProtocolPolicy::FallbackToLegacy);
        instance.initialize().unwrap();
        let first = instance.negotiate_midi_protocol().unwrap();
        let second = instance.negotiate_midi_protocol().unwrap();
        assert_eq!(first, MidiDelivery::Ump(MidiProtocol::Midi2_0));
        assert_eq!(first, second);
        assert_eq!(query_calls(&instance), 1);

        instance.activate().unwrap();
        assert_eq!(query_calls(&instance), 1);
    }

    #[test]
    fn activation_negotiates_implicitly() {
        let mut instance =
            PluginInstance::new(with_protocol(0), UnknownProtocolPolicy::FallbackToLegacy);
        instance.initialize().unwrap();
        let delivery = instance.activate().unwrap();
        assert_eq!(delivery, MidiDelivery::Ump(MidiProtocol::Midi1_0));
        assert!(instance.component().active);
        assert_eq!(instance.state(), LifecycleState::Active);
    }

    #[test]
    fn unknown_protocol_follows_policy() {
        let mut fallback =
            PluginInstance::new(with_protocol(2), UnknownProtocolPolicy::FallbackToLegacy);
        fallback.initialize().unwrap();
        assert_eq!(fallback.negotiate_midi_protocol().unwrap(), MidiDelivery::Legacy);
        assert_eq!(
            fallback.features().unwrap().reported_protocol,
            Some(MidiProtocol::Unknown(2))
        );

        let mut ignore = PluginInstance::new(with_protocol(2), UnknownProtocolPolicy::Ignore);
        ignore.initialize().unwrap();
        assert_eq!(ignore.negotiate_midi_protocol().unwrap(), MidiDelivery::Disabled);
    }

    #[test]
    fn process_requires_active_state() {
        let mut instance =
            PluginInstance::new(Component::default(), UnknownProtocolPolicy::FallbackToLegacy);
        instance.initialize().unwrap();
        let input = EventList::with_capacity(1);
        let mut output = EventList::with_capacity(1);
        assert!(matches!(
            instance.process(&input, &mut output),
            Err(InstanceError::InvalidState {
                action: "process",
                ..
            })
        ));
    }

    #[test]
    fn terminate_deactivates_first() {
        let mut instance =
            PluginInstance::new(Component::default(), UnknownProtocolPolicy::FallbackToLegacy);
        instance.initialize().unwrap();
        instance.activate().unwrap();
        instance.terminate().unwrap();
        assert!(!instance.component().active);
        assert!(instance.component().terminated);
        assert_eq!(instance.state(), LifecycleState::Terminated);
        assert!(instance.terminate().is_ok());
    }

    #[test]
    fn terminating_an_uninitialized_instance_skips_the_plugin() {
        let mut instance =
            PluginInstance::new(Component::default(), UnknownProtocolPolicy::FallbackToLegacy);
        instance.terminate().unwrap();
        assert!(!instance.component().terminated);
        assert_eq!(instance.state(), LifecycleState::Terminated);
        assert!(instance.initialize().is_err());
    }
}
