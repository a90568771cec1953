//! Event and metadata payloads broadcast over a channel's `DecoderStateBus`.

/// Kind of call-related activity reported by the MPT-1327 state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEventKind {
    Register,
    Response,
    Command,
    Status,
    Call,
    Sdm,
}

/// A single reported unit of call activity, identified by `start_ms`/`end_ms`
/// timestamps supplied by the caller (the decoder core keeps no clock of its
/// own so that its behavior stays deterministic and replayable).
#[derive(Debug, Clone, PartialEq)]
pub struct CallEvent {
    pub kind: CallEventKind,
    pub channel: Option<String>,
    pub frequency: Option<u64>,
    pub from_id: Option<String>,
    pub to_id: Option<String>,
    pub details: String,
    pub start_ms: u64,
    pub end_ms: Option<u64>,
}

impl CallEvent {
    pub fn new(kind: CallEventKind, details: impl Into<String>, start_ms: u64) -> Self {
        Self {
            kind,
            channel: None,
            frequency: None,
            from_id: None,
            to_id: None,
            details: details.into(),
            start_ms,
            end_ms: None,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<Option<String>>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_frequency(mut self, frequency: impl Into<Option<u64>>) -> Self {
        self.frequency = frequency.into();
        self
    }

    pub fn with_from(mut self, from_id: impl Into<Option<String>>) -> Self {
        self.from_id = from_id.into();
        self
    }

    pub fn with_to(mut self, to_id: impl Into<Option<String>>) -> Self {
        self.to_id = to_id.into();
        self
    }

    pub fn end(&mut self, end_ms: u64) {
        self.end_ms = Some(end_ms);
    }
}

/// Logical decoder state reported alongside a `DecoderStateEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Idle,
    Call,
    Control,
    Fade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderStateEventKind {
    Start,
    Continuation,
    End,
    Reset,
    SourceFrequency,
    TrafficChannelAllocation,
    RequestReset,
}

/// A traffic-channel grant observed on a control channel, rebroadcast so the
/// newly assigned traffic channel's own decoder can pick it up.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficChannelAllocationEvent {
    pub channel: String,
    pub frequency: u64,
    pub call_event: CallEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateEventPayload {
    None,
    Frequency(u64),
    Allocation(TrafficChannelAllocationEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecoderStateEvent {
    pub source: String,
    pub kind: DecoderStateEventKind,
    pub state: DecoderState,
    pub payload: StateEventPayload,
}

impl DecoderStateEvent {
    pub fn new(source: impl Into<String>, kind: DecoderStateEventKind, state: DecoderState) -> Self {
        Self {
            source: source.into(),
            kind,
            state,
            payload: StateEventPayload::None,
        }
    }

    pub fn with_payload(mut self, payload: StateEventPayload) -> Self {
        self.payload = payload;
        self
    }
}

/// Field of a channel's tracked state that just changed, independent of any
/// particular `DecoderStateEvent` kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangedAttribute {
    ChannelSiteNumber,
    ChannelNumber,
    ChannelFrequency,
    FromTalkgroup,
    ToTalkgroup,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChangeEvent {
    pub source: String,
    pub attribute: ChangedAttribute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataType {
    From,
    To,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub kind: MetadataType,
    pub value: String,
    pub alias: Option<String>,
    pub live: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeChannelTimeoutEvent {
    pub channel_type: crate::config::ChannelType,
    pub millis: u64,
}
