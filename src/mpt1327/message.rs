//! Decoded MPT-1327 control channel message (component H's input).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Ack,
    Acki,
    Ahyc,
    Ahyq,
    Alh,
    Gtc,
    HeadPlus1,
    HeadPlus2,
    HeadPlus3,
    HeadPlus4,
    Clear,
    Maint,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ident1Type {
    Regi,
    Other,
}

#[derive(Debug, Clone, Default)]
pub struct Mpt1327Message {
    pub valid: bool,
    pub message_type: Option<MessageType>,
    pub from_id: Option<String>,
    pub to_id: Option<String>,
    pub ident1_type: Option<Ident1Type>,
    pub channel: Option<String>,
    pub site_id: Option<String>,
    pub status_message: Option<String>,
    pub request_string: Option<String>,
    pub message: Option<String>,
}

impl Mpt1327Message {
    pub fn new(message_type: MessageType) -> Self {
        Self {
            valid: true,
            message_type: Some(message_type),
            ..Default::default()
        }
    }

    pub fn from_id(mut self, id: impl Into<String>) -> Self {
        self.from_id = Some(id.into());
        self
    }

    pub fn to_id(mut self, id: impl Into<String>) -> Self {
        self.to_id = Some(id.into());
        self
    }

    pub fn ident1_type(mut self, t: Ident1Type) -> Self {
        self.ident1_type = Some(t);
        self
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn site_id(mut self, site_id: impl Into<String>) -> Self {
        self.site_id = Some(site_id.into());
        self
    }

    pub fn status_message(mut self, status: impl Into<String>) -> Self {
        self.status_message = Some(status.into());
        self
    }

    pub fn request_string(mut self, request: impl Into<String>) -> Self {
        self.request_string = Some(request.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
