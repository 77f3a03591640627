//! Console transport for development/testing
//!
//! Each stdin line is one inbound message:
//! - `a@x/res some text` is a direct message from `a@x/res`
//! - `#room@conf/nick some text` is a room message
//! - anything else is a direct message from the default sender
//!
//! Outbound traffic is printed to stdout.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::application::errors::BotError;
use crate::domain::entities::{ChatEvent, Contact, Event, MessageKind};
use crate::domain::traits::{RoomInvite, Transport};

type LineReader = Lines<Box<dyn AsyncBufRead + Unpin + Send>>;

/// Console transport adapter for local development
pub struct ConsoleTransport {
    lines: Mutex<LineReader>,
    default_sender: String,
}

impl ConsoleTransport {
    /// Read from stdin; lines without an address come from `default_sender`
    pub fn new(default_sender: impl Into<String>) -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()), default_sender)
    }

    pub fn from_reader(reader: impl AsyncBufRead + Unpin + Send + 'static, default_sender: impl Into<String>) -> Self {
        let reader: Box<dyn AsyncBufRead + Unpin + Send> = Box::new(reader);
        Self {
            lines: Mutex::new(reader.lines()),
            default_sender: default_sender.into(),
        }
    }
}

/// Turn one console line into an event. Blank lines yield nothing.
pub fn parse_line(line: &str, default_sender: &str) -> Option<Event> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let event = if let Some(occupant) = head.strip_prefix('#') {
        ChatEvent::group_chat(occupant, rest.trim_start())
    } else if head.contains('@') {
        ChatEvent::chat(head, rest.trim_start())
    } else {
        ChatEvent::chat(default_sender, line)
    };
    Some(Event::Chat(event))
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn receive(&self) -> Result<Option<Event>, BotError> {
        let mut lines = self.lines.lock().await;
        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| BotError::Transport(format!("stdin: {}", e)))?;
            match line {
                Some(line) => {
                    if let Some(event) = parse_line(&line, &self.default_sender) {
                        return Ok(Some(event));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    async fn send(&self, target: &str, kind: MessageKind, text: &str) -> Result<(), BotError> {
        println!("[{}] {} <- {}", kind.as_str(), target, text);
        Ok(())
    }

    async fn send_raw(&self, fragment: &str) -> Result<(), BotError> {
        println!("[raw] {}", fragment);
        Ok(())
    }

    async fn join_room(&self, room: &str, nickname: &str, password: Option<&str>) -> Result<(), BotError> {
        info!(
            "Joining {} as {}{}",
            room,
            nickname,
            if password.is_some() { " (protected)" } else { "" }
        );
        Ok(())
    }

    async fn leave_room(&self, room: &str) -> Result<(), BotError> {
        info!("Leaving {}", room);
        Ok(())
    }

    async fn invite_to_room(&self, invite: &RoomInvite) -> Result<(), BotError> {
        println!("[invite] {} -> {} ({})", invite.room, invite.to, invite.reason);
        Ok(())
    }

    async fn request_subscription(&self, jid: &str) -> Result<(), BotError> {
        println!("[subscribe] {}", jid);
        Ok(())
    }

    async fn approve_subscription(&self, jid: &str) -> Result<(), BotError> {
        println!("[subscribed] {}", jid);
        Ok(())
    }

    async fn revoke_subscription(&self, jid: &str) -> Result<(), BotError> {
        println!("[unsubscribed] {}", jid);
        Ok(())
    }

    async fn fetch_roster(&self) -> Result<Vec<Contact>, BotError> {
        Ok(vec![Contact::new(crate::domain::entities::bare_jid(&self.default_sender))])
    }

    async fn ping(&self) -> Result<(), BotError> {
        debug!("console keep-alive");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(event: Option<Event>) -> ChatEvent {
        match event {
            Some(Event::Chat(chat)) => chat,
            other => panic!("expected chat, got {:?}", other),
        }
    }

    #[test]
    fn addressed_direct_message() {
        let event = chat(parse_line("a@x/phone --help room", "owner@x/console"));
        assert_eq!(event.remote, "a@x/phone");
        assert_eq!(event.text, "--help room");
        assert_eq!(event.kind, MessageKind::Chat);
    }

    #[test]
    fn room_message() {
        let event = chat(parse_line("#c@rooms/alice bot: hi", "owner@x"));
        assert!(event.is_group());
        assert_eq!(event.bare_remote(), "c@rooms");
        assert_eq!(event.resource(), "alice");
        assert_eq!(event.text, "bot: hi");
    }

    #[test]
    fn bare_text_comes_from_default_sender() {
        let event = chat(parse_line("--room list", "owner@x/console"));
        assert_eq!(event.remote, "owner@x/console");
        assert_eq!(event.text, "--room list");
        assert!(parse_line("   ", "owner@x").is_none());
    }

    #[tokio::test]
    async fn receive_ends_at_eof() {
        let input: &'static [u8] = b"\na@x hello\n";
        let transport = ConsoleTransport::from_reader(input, "owner@x");
        assert!(matches!(transport.receive().await, Ok(Some(Event::Chat(_)))));
        assert!(matches!(transport.receive().await, Ok(None)));
    }
}
