//! Synchronous, single-threaded publish/subscribe bus scoped to one channel
//! (component G).
//!
//! Each listener role is its own typed slot rather than one dynamically
//! typed channel, so a subscriber only ever sees the event types it asked
//! for and a broadcast never needs a downcast.

use crate::events::{
    AttributeChangeEvent, CallEvent, ChangeChannelTimeoutEvent, DecoderStateEvent, Metadata,
};

pub struct DecoderStateBus {
    state_listeners: Vec<Box<dyn FnMut(&DecoderStateEvent)>>,
    call_event_listeners: Vec<Box<dyn FnMut(&CallEvent)>>,
    metadata_listeners: Vec<Box<dyn FnMut(&Metadata)>>,
    attribute_listeners: Vec<Box<dyn FnMut(&AttributeChangeEvent)>>,
    timeout_listeners: Vec<Box<dyn FnMut(&ChangeChannelTimeoutEvent)>>,
}

impl DecoderStateBus {
    pub fn new() -> Self {
        Self {
            state_listeners: Vec::new(),
            call_event_listeners: Vec::new(),
            metadata_listeners: Vec::new(),
            attribute_listeners: Vec::new(),
            timeout_listeners: Vec::new(),
        }
    }

    pub fn subscribe_state(&mut self, listener: impl FnMut(&DecoderStateEvent) + 'static) {
        self.state_listeners.push(Box::new(listener));
    }

    pub fn subscribe_call_event(&mut self, listener: impl FnMut(&CallEvent) + 'static) {
        self.call_event_listeners.push(Box::new(listener));
    }

    pub fn subscribe_metadata(&mut self, listener: impl FnMut(&Metadata) + 'static) {
        self.metadata_listeners.push(Box::new(listener));
    }

    pub fn subscribe_attribute_change(&mut self, listener: impl FnMut(&AttributeChangeEvent) + 'static) {
        self.attribute_listeners.push(Box::new(listener));
    }

    pub fn subscribe_timeout(&mut self, listener: impl FnMut(&ChangeChannelTimeoutEvent) + 'static) {
        self.timeout_listeners.push(Box::new(listener));
    }

    pub fn broadcast_state(&mut self, event: &DecoderStateEvent) {
        for listener in self.state_listeners.iter_mut() {
            listener(event);
        }
    }

    pub fn broadcast_call_event(&mut self, event: &CallEvent) {
        for listener in self.call_event_listeners.iter_mut() {
            listener(event);
        }
    }

    pub fn broadcast_metadata(&mut self, event: &Metadata) {
        for listener in self.metadata_listeners.iter_mut() {
            listener(event);
        }
    }

    pub fn broadcast_attribute_change(&mut self, event: &AttributeChangeEvent) {
        for listener in self.attribute_listeners.iter_mut() {
            listener(event);
        }
    }

    pub fn broadcast_timeout(&mut self, event: &ChangeChannelTimeoutEvent) {
        for listener in self.timeout_listeners.iter_mut() {
            listener(event);
        }
    }
}

impl Default for DecoderStateBus {
    fn default() -> Self {
        Self::new()
    }
}
