use chrono::{DateTime, Utc};

/// Kind of an inbound or outbound chat stanza
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// One-to-one message (also private messages inside a room)
    Chat,
    /// Public room message
    GroupChat,
    /// Roster push carrying the contact list
    Roster,
    Other(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Chat => "chat",
            MessageKind::GroupChat => "groupchat",
            MessageKind::Roster => "roster",
            MessageKind::Other(s) => s,
        }
    }
}

/// Split `user@host/resource` into the bare address and the resource.
///
/// For room occupants the resource is the nickname.
pub fn split_jid(jid: &str) -> (&str, &str) {
    match jid.split_once('/') {
        Some((bare, resource)) => (bare, resource),
        None => (jid, ""),
    }
}

/// Bare address without any resource suffix
pub fn bare_jid(jid: &str) -> &str {
    split_jid(jid).0
}

/// Roster contact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub remote: String,
    pub name: Option<String>,
    pub groups: Vec<String>,
}

impl Contact {
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            name: None,
            groups: Vec::new(),
        }
    }
}

/// A chat message delivered by the transport
#[derive(Debug, Clone)]
pub struct ChatEvent {
    /// Full sender address; `room@host/nick` for room messages
    pub remote: String,
    pub kind: MessageKind,
    pub text: String,
    /// Set when the stanza carries a delay stamp (history replay)
    pub stamp: Option<DateTime<Utc>>,
    pub roster: Vec<Contact>,
}

impl ChatEvent {
    pub fn new(remote: impl Into<String>, kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            kind,
            text: text.into(),
            stamp: None,
            roster: Vec::new(),
        }
    }

    pub fn chat(remote: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(remote, MessageKind::Chat, text)
    }

    pub fn group_chat(remote: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(remote, MessageKind::GroupChat, text)
    }

    pub fn roster(contacts: Vec<Contact>) -> Self {
        let mut event = Self::new("", MessageKind::Roster, "");
        event.roster = contacts;
        event
    }

    pub fn with_stamp(mut self, stamp: DateTime<Utc>) -> Self {
        self.stamp = Some(stamp);
        self
    }

    /// Live text input: non-empty and not a delayed replay
    pub fn is_live_text(&self) -> bool {
        !self.text.is_empty() && self.stamp.is_none()
    }

    pub fn is_group(&self) -> bool {
        self.kind == MessageKind::GroupChat
    }

    /// Bare sender address (room address for room messages)
    pub fn bare_remote(&self) -> &str {
        bare_jid(&self.remote)
    }

    /// Sender resource; the occupant nickname for room messages
    pub fn resource(&self) -> &str {
        split_jid(&self.remote).1
    }
}

/// A presence stanza delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    pub from: String,
    pub to: String,
    /// `subscribe`, `subscribed`, `unavailable`, ... empty when available
    pub kind: String,
    pub show: String,
    pub status: String,
}

impl PresenceEvent {
    pub fn new(from: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: String::new(),
            kind: kind.into(),
            show: String::new(),
            status: String::new(),
        }
    }
}

/// Anything the transport can deliver
#[derive(Debug, Clone)]
pub enum Event {
    Chat(ChatEvent),
    Presence(PresenceEvent),
}
