use async_trait::async_trait;

use crate::application::errors::BotError;
use crate::domain::entities::{Contact, Event, MessageKind};

/// Transport trait - abstraction over the chat/presence client library
///
/// Implementations must tolerate concurrent sends: scheduled jobs send from
/// their own tasks while the event loop is dispatching.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Block until the next inbound event. `Ok(None)` means the stream ended.
    async fn receive(&self) -> Result<Option<Event>, BotError>;

    /// Send a plain text message
    async fn send(&self, target: &str, kind: MessageKind, text: &str) -> Result<(), BotError>;

    /// Send a raw XML fragment (presence updates, nick changes, XHTML bodies)
    async fn send_raw(&self, fragment: &str) -> Result<(), BotError>;

    async fn join_room(&self, room: &str, nickname: &str, password: Option<&str>) -> Result<(), BotError>;

    async fn leave_room(&self, room: &str) -> Result<(), BotError>;

    async fn invite_to_room(&self, invite: &RoomInvite) -> Result<(), BotError>;

    async fn request_subscription(&self, jid: &str) -> Result<(), BotError>;

    async fn approve_subscription(&self, jid: &str) -> Result<(), BotError>;

    async fn revoke_subscription(&self, jid: &str) -> Result<(), BotError>;

    /// Current contact list
    async fn fetch_roster(&self) -> Result<Vec<Contact>, BotError>;

    /// Client-to-server keep-alive
    async fn ping(&self) -> Result<(), BotError>;
}

/// Mediated room invitation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInvite {
    /// Bot account issuing the invitation
    pub from: String,
    /// Bot nickname in the room
    pub nickname: String,
    pub to: String,
    pub room: String,
    pub password: Option<String>,
    pub reason: String,
}
