use std::path::Path;

use anyhow::{ensure, Context, Result};
use harmoniq_ump::{EventError, EventList, EventQueue, UmpEvent};
use tracing::{debug, trace, warn};

use crate::config::{self, HostOptions, UnknownProtocolPolicy};
use crate::instance::{
    LifecycleState, MidiDelivery, PluginComponent, PluginFeatures, PluginInstance,
};
use crate::routing::{MidiInputMessage, MidiRouter};

/// Helper builder for constructing a VST3 host with custom options.
#[derive(Debug, Default, Clone)]
pub struct Vst3HostBuilder {
    options: HostOptions,
}

impl Vst3HostBuilder {
    pub fn new() -> Self {
        Self {
            options: HostOptions::default(),
        }
    }

    /// Starts from the options persisted in the user's config directory.
    pub fn from_saved_options() -> Self {
        Self {
            options: config::load(),
        }
    }

    pub fn from_options_file(path: &Path) -> Self {
        Self {
            options: HostOptions::load_or_default(path),
        }
    }

    pub fn options(mut self, options: HostOptions) -> Self {
        self.options = options;
        self
    }

    pub fn event_list_capacity(mut self, capacity: usize) -> Self {
        self.options.event_list_capacity = capacity;
        self
    }

    pub fn input_queue_capacity(mut self, capacity: usize) -> Self {
        self.options.input_queue_capacity = capacity;
        self
    }

    pub fn ump_group(mut self, group: u8) -> Self {
        self.options.ump_group = group;
        self
    }

    pub fn unknown_protocol(mut self, policy: UnknownProtocolPolicy) -> Self {
        self.options.unknown_protocol = policy;
        self
    }

    /// Initializes the component and settles its MIDI delivery before returning.
    pub fn build<P: PluginComponent>(self, component: P) -> Result<Vst3Host<P>> {
        Vst3Host::load(component, self.options)
    }
}

/// Drives one plugin instance and feeds it MIDI in the shape it negotiated.
#[derive(Debug)]
pub struct Vst3Host<P: PluginComponent> {
    instance: PluginInstance<P>,
    router: MidiRouter,
    input_queue: EventQueue<MidiInputMessage>,
    input_events: EventList,
    output_events: EventList,
    dropped_input: u64,
    skipped_output: u64,
}

impl<P: PluginComponent> Vst3Host<P> {
    pub fn load(component: P, options: HostOptions) -> Result<Self> {
        ensure!(
            options.input_queue_capacity > 0,
            "MIDI input queue capacity must be at least 1"
        );
        ensure!(
            options.event_list_capacity > 0,
            "event list capacity must be at least 1"
        );

        let mut instance = PluginInstance::new(component, options.unknown_protocol);
        instance
            .initialize()
            .context("failed to initialize VST3 plugin")?;
        let delivery = instance
            .negotiate_midi_protocol()
            .context("failed to negotiate MIDI protocol")?;
        debug!(?delivery, "VST3 plugin loaded");

        Ok(Self {
            instance,
            router: MidiRouter::new(delivery, options.event_bus, options.ump_group),
            input_queue: EventQueue::new(options.input_queue_capacity),
            input_events: EventList::with_capacity(options.event_list_capacity),
            output_events: EventList::with_capacity(options.event_list_capacity),
            dropped_input: 0,
            skipped_output: 0,
        })
    }

    pub fn midi_delivery(&self) -> MidiDelivery {
        self.router.delivery()
    }

    pub fn features(&self) -> Option<PluginFeatures> {
        self.instance.features()
    }

    pub fn instance(&self) -> &PluginInstance<P> {
        &self.instance
    }

    /// Producer handle for the MIDI thread.
    pub fn input_queue(&self) -> EventQueue<MidiInputMessage> {
        self.input_queue.clone()
    }

    pub fn queue_midi(&self, message: MidiInputMessage) -> Result<()> {
        self.input_queue
            .try_push(message)
            .context("MIDI input queue is full")
    }

    pub fn activate(&mut self) -> Result<()> {
        self.instance
            .activate()
            .context("failed to activate VST3 plugin")?;
        Ok(())
    }

    pub fn deactivate(&mut self) -> Result<()> {
        self.instance
            .deactivate()
            .context("failed to deactivate VST3 plugin")
    }

    /// Runs one process call with all MIDI queued since the previous block.
    ///
    /// Queued input stays queued when the plugin is not active.
    pub fn process_block(&mut self) -> Result<&EventList> {
        ensure!(
            self.instance.state() == LifecycleState::Active,
            "cannot process VST3 plugin in state {:?}",
            self.instance.state()
        );

        self.input_events.clear();
        while let Ok(message) = self.input_queue.try_pop() {
            match self.router.route(&message, &mut self.input_events) {
                Ok(()) => {}
                Err(EventError::ListFull) => {
                    self.dropped_input += 1;
                    trace!(?message, "input event list full, dropping MIDI input");
                }
                Err(err) => {
                    self.dropped_input += 1;
                    warn!(?err, "failed to route MIDI input");
                }
            }
        }

        self.output_events.clear();
        self.instance
            .process(&self.input_events, &mut self.output_events)
            .context("failed to process VST3 plugin")?;

        for event in self.output_events.iter() {
            if let Some(packet) = event.as_ump() {
                if !packet.message_type().is_known() {
                    self.skipped_output += 1;
                }
            }
        }
        Ok(&self.output_events)
    }

    pub fn output_events(&self) -> &EventList {
        &self.output_events
    }

    /// Output UMP packets from the last block that this host can interpret.
    pub fn ump_output(&self) -> impl Iterator<Item = &UmpEvent> {
        self.output_events.ump_events()
    }

    /// MIDI input dropped because the input event list was full.
    pub fn dropped_input_count(&self) -> u64 {
        self.dropped_input
    }

    /// Output packets skipped because of a reserved UMP message type.
    pub fn skipped_output_count(&self) -> u64 {
        self.skipped_output
    }

    pub fn terminate(&mut self) -> Result<()> {
        self.instance
            .terminate()
            .context("failed to terminate VST3 plugin")
    }
}
