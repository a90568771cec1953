//! MPT-1327 decoder state machine (component H).
//!
//! Dispatches each decoded message by type, updating tracked idents, group
//! membership, site, and in-flight call state, and publishing the resulting
//! `CallEvent`/`DecoderStateEvent`/`Metadata`/`ChangeChannelTimeoutEvent`
//! notifications on the channel's shared `DecoderStateBus`.
//!
//! Most branches end by emitting CONTINUATION/CONTROL; GTC, CLEAR and MAINT
//! are the exceptions (they emit their own terminal state instead) and do
//! not also emit CONTINUATION/CONTROL.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;

use crate::config::{ChannelType, DecoderConfig};
use crate::eventbus::DecoderStateBus;
use crate::events::{
    AttributeChangeEvent, CallEvent, CallEventKind, ChangeChannelTimeoutEvent, ChangedAttribute,
    DecoderState, DecoderStateEvent, DecoderStateEventKind, Metadata, MetadataType,
    StateEventPayload, TrafficChannelAllocationEvent,
};

use super::message::{Ident1Type, MessageType, Mpt1327Message};

/// Call timeout RESET restores a channel to, independent of whatever value
/// the channel was actually configured with.
const DEFAULT_CALL_TIMEOUT_MS: u64 = 1_000;

pub struct Mpt1327DecoderState {
    source_id: String,
    config: DecoderConfig,
    site_id: Option<String>,
    idents: BTreeSet<String>,
    groups: BTreeMap<String, Vec<String>>,
    channel: Option<String>,
    frequency: Option<u64>,
    from_talkgroup: Option<String>,
    to_talkgroup: Option<String>,
    current_call: Option<CallEvent>,
}

impl Mpt1327DecoderState {
    pub fn new(source_id: impl Into<String>, config: DecoderConfig) -> Self {
        Self {
            source_id: source_id.into(),
            config,
            site_id: None,
            idents: BTreeSet::new(),
            groups: BTreeMap::new(),
            channel: None,
            frequency: None,
            from_talkgroup: None,
            to_talkgroup: None,
            current_call: None,
        }
    }

    pub fn idents(&self) -> &BTreeSet<String> {
        &self.idents
    }

    pub fn group_members(&self, talkgroup: &str) -> &[String] {
        self.groups.get(talkgroup).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn site_id(&self) -> Option<&str> {
        self.site_id.as_deref()
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn frequency(&self) -> Option<u64> {
        self.frequency
    }

    pub fn from_talkgroup(&self) -> Option<&str> {
        self.from_talkgroup.as_deref()
    }

    pub fn to_talkgroup(&self) -> Option<&str> {
        self.to_talkgroup.as_deref()
    }

    /// Dispatch a decoded message, updating state and publishing events on `bus`.
    pub fn receive(&mut self, message: &Mpt1327Message, bus: &mut DecoderStateBus, now_ms: u64) {
        if !message.valid {
            warn!(target: "trunk_core::mpt1327", "dropping invalid MPT-1327 message");
            return;
        }
        let Some(message_type) = message.message_type else {
            warn!(target: "trunk_core::mpt1327", "dropping message with no type");
            return;
        };

        match message_type {
            MessageType::Ack => self.handle_ack(message, bus, now_ms),
            MessageType::Acki => self.handle_acki(message, bus),
            MessageType::Ahyc => self.handle_ahyc(message, bus, now_ms),
            MessageType::Ahyq => self.handle_ahyq(message, bus, now_ms),
            MessageType::Alh => self.handle_alh(message, bus),
            MessageType::Gtc => self.handle_gtc(message, bus, now_ms),
            MessageType::HeadPlus1
            | MessageType::HeadPlus2
            | MessageType::HeadPlus3
            | MessageType::HeadPlus4 => self.handle_head_plus(message, bus, now_ms),
            MessageType::Clear => self.handle_clear(message, bus),
            MessageType::Maint => self.handle_maint(message, bus, now_ms),
            MessageType::Other => {}
        }
    }

    /// Handle a `DecoderStateEvent` published by a peer channel's state
    /// machine (typically the control channel announcing a traffic channel
    /// grant, or a RESET/SOURCE_FREQUENCY notification).
    pub fn receive_decoder_state_event(&mut self, event: &DecoderStateEvent, bus: &mut DecoderStateBus, now_ms: u64) {
        match event.kind {
            DecoderStateEventKind::Reset => self.handle_reset(bus, now_ms),
            DecoderStateEventKind::SourceFrequency => {
                if let StateEventPayload::Frequency(frequency) = event.payload {
                    self.frequency = Some(frequency);
                }
            }
            DecoderStateEventKind::TrafficChannelAllocation => {
                if event.source != self.source_id {
                    self.handle_traffic_channel_allocation(&event.payload, bus);
                }
            }
            _ => {}
        }
    }

    fn continuation_control(&self, bus: &mut DecoderStateBus) {
        bus.broadcast_state(&DecoderStateEvent::new(
            self.source_id.clone(),
            DecoderStateEventKind::Continuation,
            DecoderState::Control,
        ));
    }

    fn publish_call(&mut self, bus: &mut DecoderStateBus, event: CallEvent) {
        self.current_call = Some(event.clone());
        bus.broadcast_call_event(&event);
    }

    fn handle_ack(&mut self, message: &Mpt1327Message, bus: &mut DecoderStateBus, now_ms: u64) {
        if let Some(from) = &message.from_id {
            self.idents.insert(from.clone());
        }

        let event = if message.ident1_type == Some(Ident1Type::Regi) {
            CallEvent::new(CallEventKind::Register, "REGISTERED ON NETWORK", now_ms)
                .with_from(message.to_id.clone())
                .with_to(message.from_id.clone())
        } else {
            let ident_label = message.from_id.clone().unwrap_or_default();
            CallEvent::new(CallEventKind::Response, format!("ACK {ident_label}"), now_ms)
                .with_from(message.from_id.clone())
                .with_to(message.to_id.clone())
        };
        self.publish_call(bus, event);
        self.continuation_control(bus);
    }

    fn handle_acki(&mut self, message: &Mpt1327Message, bus: &mut DecoderStateBus) {
        if let Some(from) = &message.from_id {
            self.idents.insert(from.clone());
        }
        if let Some(to) = &message.to_id {
            self.idents.insert(to.clone());
        }
        self.continuation_control(bus);
    }

    fn handle_ahyc(&mut self, message: &Mpt1327Message, bus: &mut DecoderStateBus, now_ms: u64) {
        if let Some(to) = &message.to_id {
            self.idents.insert(to.clone());
        }
        let details = message.request_string.clone().unwrap_or_default();
        let event = CallEvent::new(CallEventKind::Command, details, now_ms)
            .with_from(message.from_id.clone())
            .with_to(message.to_id.clone());
        self.publish_call(bus, event);
        self.continuation_control(bus);
    }

    fn handle_ahyq(&mut self, message: &Mpt1327Message, bus: &mut DecoderStateBus, now_ms: u64) {
        let details = message.status_message.clone().unwrap_or_default();
        let event = CallEvent::new(CallEventKind::Status, details, now_ms)
            .with_from(message.from_id.clone())
            .with_to(message.to_id.clone());
        self.publish_call(bus, event);
        self.continuation_control(bus);
    }

    fn handle_alh(&mut self, message: &Mpt1327Message, bus: &mut DecoderStateBus) {
        if let Some(site) = &message.site_id {
            if self.site_id.as_deref() != Some(site.as_str()) {
                self.site_id = Some(site.clone());
                bus.broadcast_attribute_change(&AttributeChangeEvent {
                    source: self.source_id.clone(),
                    attribute: ChangedAttribute::ChannelSiteNumber,
                });
            }
        }
        bus.broadcast_state(&DecoderStateEvent::new(
            self.source_id.clone(),
            DecoderStateEventKind::Start,
            DecoderState::Control,
        ));
    }

    fn handle_gtc(&mut self, message: &Mpt1327Message, bus: &mut DecoderStateBus, now_ms: u64) {
        if let Some(from) = &message.from_id {
            self.idents.insert(from.clone());
        }
        if let Some(to) = &message.to_id {
            self.idents.insert(to.clone());
        }
        if let (Some(from), Some(to)) = (&message.from_id, &message.to_id) {
            let members = self.groups.entry(to.clone()).or_default();
            if !members.contains(from) {
                members.push(from.clone());
            }
        }

        let channel = message.channel.clone().unwrap_or_default();
        let frequency = channel
            .parse::<u32>()
            .ok()
            .and_then(|ch| self.config.channel_map.as_ref().map(|m| m.frequency(ch)))
            .unwrap_or(0);

        let call_event = CallEvent::new(CallEventKind::Call, String::new(), now_ms)
            .with_channel(channel.clone())
            .with_frequency(frequency)
            .with_from(message.from_id.clone())
            .with_to(message.to_id.clone());
        self.publish_call(bus, call_event.clone());

        let allocation = TrafficChannelAllocationEvent {
            channel,
            frequency,
            call_event,
        };
        bus.broadcast_state(
            &DecoderStateEvent::new(self.source_id.clone(), DecoderStateEventKind::TrafficChannelAllocation, DecoderState::Control)
                .with_payload(StateEventPayload::Allocation(allocation)),
        );
    }

    fn handle_head_plus(&mut self, message: &Mpt1327Message, bus: &mut DecoderStateBus, now_ms: u64) {
        let details = message.message.clone().unwrap_or_default();
        let event = CallEvent::new(CallEventKind::Sdm, details, now_ms)
            .with_from(message.from_id.clone())
            .with_to(message.to_id.clone());
        self.publish_call(bus, event);
        self.continuation_control(bus);
    }

    fn handle_clear(&mut self, message: &Mpt1327Message, bus: &mut DecoderStateBus) {
        if let Some(channel) = &message.channel {
            self.channel = Some(channel.clone());
        }
        bus.broadcast_state(&DecoderStateEvent::new(
            self.source_id.clone(),
            DecoderStateEventKind::End,
            DecoderState::Fade,
        ));
    }

    fn handle_maint(&mut self, message: &Mpt1327Message, bus: &mut DecoderStateBus, now_ms: u64) {
        if self.config.channel_type != ChannelType::Standard {
            return;
        }

        bus.broadcast_timeout(&ChangeChannelTimeoutEvent {
            channel_type: self.config.channel_type,
            millis: self.config.call_timeout_ms,
        });

        if self.current_call.is_none() {
            let event = CallEvent::new(CallEventKind::Call, "MONITORED TRAFFIC CHANNEL", now_ms);
            self.publish_call(bus, event);
        }

        if let Some(to) = &message.to_id {
            bus.broadcast_metadata(&Metadata {
                kind: MetadataType::To,
                value: to.clone(),
                alias: None,
                live: true,
            });
        }

        bus.broadcast_state(&DecoderStateEvent::new(
            self.source_id.clone(),
            DecoderStateEventKind::Start,
            DecoderState::Call,
        ));
        self.to_talkgroup = message.to_id.clone();
    }

    fn handle_reset(&mut self, bus: &mut DecoderStateBus, now_ms: u64) {
        self.groups.clear();

        if self.from_talkgroup.take().is_some() {
            bus.broadcast_attribute_change(&AttributeChangeEvent {
                source: self.source_id.clone(),
                attribute: ChangedAttribute::FromTalkgroup,
            });
        }
        if self.to_talkgroup.take().is_some() {
            bus.broadcast_attribute_change(&AttributeChangeEvent {
                source: self.source_id.clone(),
                attribute: ChangedAttribute::ToTalkgroup,
            });
        }

        if self.config.channel_type == ChannelType::Standard {
            bus.broadcast_timeout(&ChangeChannelTimeoutEvent {
                channel_type: self.config.channel_type,
                millis: DEFAULT_CALL_TIMEOUT_MS,
            });
            if let Some(mut call) = self.current_call.take() {
                call.end(now_ms);
                bus.broadcast_call_event(&call);
            }
        }
    }

    fn handle_traffic_channel_allocation(&mut self, payload: &StateEventPayload, bus: &mut DecoderStateBus) {
        let StateEventPayload::Allocation(allocation) = payload else {
            return;
        };

        match allocation.channel.parse::<u32>() {
            Ok(_) => {
                self.channel = Some(allocation.channel.clone());
                bus.broadcast_attribute_change(&AttributeChangeEvent {
                    source: self.source_id.clone(),
                    attribute: ChangedAttribute::ChannelNumber,
                });
            }
            Err(_) => {
                warn!(
                    target: "trunk_core::mpt1327",
                    "dropping traffic channel allocation with unparseable channel {:?}",
                    allocation.channel
                );
            }
        }

        self.frequency = Some(allocation.frequency);
        bus.broadcast_attribute_change(&AttributeChangeEvent {
            source: self.source_id.clone(),
            attribute: ChangedAttribute::ChannelFrequency,
        });

        if let Some(from) = &allocation.call_event.from_id {
            self.from_talkgroup = Some(from.clone());
            bus.broadcast_attribute_change(&AttributeChangeEvent {
                source: self.source_id.clone(),
                attribute: ChangedAttribute::FromTalkgroup,
            });
        }
        if let Some(to) = &allocation.call_event.to_id {
            self.to_talkgroup = Some(to.clone());
            bus.broadcast_attribute_change(&AttributeChangeEvent {
                source: self.source_id.clone(),
                attribute: ChangedAttribute::ToTalkgroup,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_map::ChannelMap;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_bus() -> (DecoderStateBus, Rc<RefCell<Vec<DecoderStateEventKind>>>, Rc<RefCell<Vec<CallEventKind>>>) {
        let mut bus = DecoderStateBus::new();
        let state_kinds = Rc::new(RefCell::new(Vec::new()));
        let call_kinds = Rc::new(RefCell::new(Vec::new()));

        let state_clone = Rc::clone(&state_kinds);
        bus.subscribe_state(move |event| state_clone.borrow_mut().push(event.kind));
        let call_clone = Rc::clone(&call_kinds);
        bus.subscribe_call_event(move |event| call_clone.borrow_mut().push(event.kind));

        (bus, state_kinds, call_kinds)
    }

    #[test]
    fn ack_adds_ident_and_emits_continuation_control() {
        let mut state = Mpt1327DecoderState::new("ctrl-1", DecoderConfig::default());
        let (mut bus, state_kinds, call_kinds) = recording_bus();

        let message = Mpt1327Message::new(MessageType::Ack).from_id("1001").to_id("1002");
        state.receive(&message, &mut bus, 0);

        assert!(state.idents().contains("1001"));
        assert_eq!(call_kinds.borrow()[0], CallEventKind::Response);
        assert_eq!(state_kinds.borrow()[0], DecoderStateEventKind::Continuation);
    }

    #[test]
    fn registration_ack_emits_register_call_event() {
        let mut state = Mpt1327DecoderState::new("ctrl-1", DecoderConfig::default());
        let (mut bus, _state_kinds, call_kinds) = recording_bus();

        let message = Mpt1327Message::new(MessageType::Ack)
            .from_id("1001")
            .to_id("1002")
            .ident1_type(Ident1Type::Regi);
        state.receive(&message, &mut bus, 0);

        assert_eq!(call_kinds.borrow()[0], CallEventKind::Register);
    }

    #[test]
    fn gtc_emits_call_and_traffic_channel_allocation_without_continuation() {
        let mut map = ChannelMap::new();
        map.insert(7, 851_012_500);
        let mut config = DecoderConfig::default();
        config.channel_map = Some(map);

        let mut state = Mpt1327DecoderState::new("ctrl-1", config);
        let (mut bus, state_kinds, call_kinds) = recording_bus();

        let message = Mpt1327Message::new(MessageType::Gtc)
            .from_id("1001")
            .to_id("2001")
            .channel("7");
        state.receive(&message, &mut bus, 0);

        assert_eq!(call_kinds.borrow()[0], CallEventKind::Call);
        assert_eq!(state_kinds.borrow()[0], DecoderStateEventKind::TrafficChannelAllocation);
        assert_eq!(state_kinds.borrow().len(), 1, "GTC must not also emit CONTINUATION/CONTROL");
        assert_eq!(state.group_members("2001"), &["1001".to_string()]);
    }

    #[test]
    fn clear_emits_end_fade_without_continuation() {
        let mut state = Mpt1327DecoderState::new("traf-1", DecoderConfig::default());
        let (mut bus, state_kinds, _call_kinds) = recording_bus();

        let message = Mpt1327Message::new(MessageType::Clear).channel("7");
        state.receive(&message, &mut bus, 0);

        assert_eq!(state.channel(), Some("7"));
        assert_eq!(state_kinds.borrow()[0], DecoderStateEventKind::End);
        assert_eq!(state_kinds.borrow().len(), 1, "CLEAR must not also emit CONTINUATION/CONTROL");
    }

    #[test]
    fn maint_on_standard_channel_emits_timeout_and_start_without_continuation() {
        let mut state = Mpt1327DecoderState::new("std-1", DecoderConfig::default());
        let (mut bus, state_kinds, _call_kinds) = recording_bus();
        let timeouts = Rc::new(RefCell::new(Vec::new()));
        let timeouts_clone = Rc::clone(&timeouts);
        bus.subscribe_timeout(move |event| timeouts_clone.borrow_mut().push(*event));

        let message = Mpt1327Message::new(MessageType::Maint).to_id("2001");
        state.receive(&message, &mut bus, 0);

        assert_eq!(timeouts.borrow().len(), 1);
        assert_eq!(state_kinds.borrow()[0], DecoderStateEventKind::Start);
        assert_eq!(state_kinds.borrow().len(), 1, "MAINT must not also emit CONTINUATION/CONTROL");
        assert_eq!(state.to_talkgroup(), Some("2001"));
    }

    #[test]
    fn maint_on_traffic_channel_is_ignored() {
        let mut config = DecoderConfig::default();
        config.channel_type = ChannelType::Traffic;
        let mut state = Mpt1327DecoderState::new("traf-1", config);
        let (mut bus, state_kinds, _call_kinds) = recording_bus();

        let message = Mpt1327Message::new(MessageType::Maint).to_id("2001");
        state.receive(&message, &mut bus, 0);

        assert!(state_kinds.borrow().is_empty());
        assert!(state.to_talkgroup().is_none());
    }

    #[test]
    fn peer_traffic_channel_allocation_updates_local_state() {
        let mut state = Mpt1327DecoderState::new("traf-1", DecoderConfig::default());
        let (mut bus, _state_kinds, _call_kinds) = recording_bus();

        let call_event = CallEvent::new(CallEventKind::Call, "", 0).with_from("1001".to_string()).with_to("2001".to_string());
        let allocation = TrafficChannelAllocationEvent {
            channel: "7".to_string(),
            frequency: 851_012_500,
            call_event,
        };
        let event = DecoderStateEvent::new("ctrl-1", DecoderStateEventKind::TrafficChannelAllocation, DecoderState::Control)
            .with_payload(StateEventPayload::Allocation(allocation));

        state.receive_decoder_state_event(&event, &mut bus, 0);

        assert_eq!(state.channel(), Some("7"));
        assert_eq!(state.frequency(), Some(851_012_500));
        assert_eq!(state.from_talkgroup(), Some("1001"));
        assert_eq!(state.to_talkgroup(), Some("2001"));
    }

    #[test]
    fn allocation_from_own_source_is_ignored() {
        let mut state = Mpt1327DecoderState::new("traf-1", DecoderConfig::default());
        let (mut bus, _state_kinds, _call_kinds) = recording_bus();

        let call_event = CallEvent::new(CallEventKind::Call, "", 0);
        let allocation = TrafficChannelAllocationEvent {
            channel: "7".to_string(),
            frequency: 851_012_500,
            call_event,
        };
        let event = DecoderStateEvent::new("traf-1", DecoderStateEventKind::TrafficChannelAllocation, DecoderState::Control)
            .with_payload(StateEventPayload::Allocation(allocation));

        state.receive_decoder_state_event(&event, &mut bus, 0);
        assert!(state.channel().is_none());
    }

    #[test]
    fn reset_clears_talkgroups_and_ends_call_on_standard_channel() {
        let mut state = Mpt1327DecoderState::new("std-1", DecoderConfig::default());
        let (mut bus, _state_kinds, call_kinds) = recording_bus();

        state.from_talkgroup = Some("1001".to_string());
        state.to_talkgroup = Some("2001".to_string());
        state.current_call = Some(CallEvent::new(CallEventKind::Call, "", 0));

        let attribute_changes = Rc::new(RefCell::new(0));
        let attribute_changes_clone = Rc::clone(&attribute_changes);
        bus.subscribe_attribute_change(move |_| *attribute_changes_clone.borrow_mut() += 1);

        let reset_event = DecoderStateEvent::new("std-1", DecoderStateEventKind::Reset, DecoderState::Idle);
        state.receive_decoder_state_event(&reset_event, &mut bus, 500);

        assert!(state.from_talkgroup().is_none());
        assert!(state.to_talkgroup().is_none());
        assert_eq!(*attribute_changes.borrow(), 2);
        assert_eq!(call_kinds.borrow()[0], CallEventKind::Call);
    }

    #[test]
    fn reset_clears_group_membership_and_emits_default_timeout_regardless_of_configured_value() {
        let mut config = DecoderConfig::default();
        config.call_timeout_ms = 30_000;
        let mut state = Mpt1327DecoderState::new("ctrl-1", config);
        let (mut bus, _state_kinds, _call_kinds) = recording_bus();

        let grant = Mpt1327Message::new(MessageType::Gtc).from_id("1001").to_id("2001");
        state.receive(&grant, &mut bus, 0);
        assert_eq!(state.group_members("2001"), &["1001".to_string()]);

        let timeouts = Rc::new(RefCell::new(Vec::new()));
        let timeouts_clone = Rc::clone(&timeouts);
        bus.subscribe_timeout(move |event| timeouts_clone.borrow_mut().push(*event));

        let reset_event = DecoderStateEvent::new("ctrl-1", DecoderStateEventKind::Reset, DecoderState::Idle);
        state.receive_decoder_state_event(&reset_event, &mut bus, 0);

        assert!(state.group_members("2001").is_empty());
        assert_eq!(timeouts.borrow()[0].millis, DEFAULT_CALL_TIMEOUT_MS);
    }
}
