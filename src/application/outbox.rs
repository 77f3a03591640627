//! Outbound message path shared by the orchestrator and scheduled jobs

use std::sync::Arc;
use tracing::warn;

use crate::domain::entities::MessageKind;
use crate::domain::traits::Transport;

/// Cheap handle over the transport send primitive.
///
/// Scheduled jobs hold a clone so they can deliver messages from their own
/// task without borrowing the orchestrator.
#[derive(Clone)]
pub struct Outbox {
    transport: Arc<dyn Transport>,
}

impl Outbox {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send `text` as a plain body. Failures are logged and swallowed.
    pub async fn send(&self, to: &str, kind: MessageKind, text: &str) {
        if let Err(e) = self.transport.send(to, kind, text).await {
            warn!("Failed to send message to {}: {}", to, e);
        }
    }

    /// Send an XHTML-IM message built by the bot. Every external value
    /// interpolated into `markup` must already be passed through
    /// [`escape_xml`]; the fragment goes onto the wire as is.
    pub async fn send_markup(&self, to: &str, kind: MessageKind, markup: &str) {
        if let Err(e) = self.transport.send_raw(&xhtml_message(to, &kind, markup)).await {
            warn!("Failed to send message to {}: {}", to, e);
        }
    }

    /// Direct message, also used for private messages inside a room
    pub async fn send_auto(&self, to: &str, text: &str) {
        self.send(to, MessageKind::Chat, text).await;
    }

    /// Public room message
    pub async fn send_pub(&self, room: &str, text: &str) {
        self.send(room, MessageKind::GroupChat, text).await;
    }
}

/// Escape text for use inside XML attributes and bodies
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Plain fallback of escaped markup: tags dropped, `<br/>` kept as newlines.
/// Entities stay escaped so the result is still a valid XML text node.
fn strip_tags(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut tag: Option<String> = None;
    for c in markup.chars() {
        if let Some(name) = tag.as_mut() {
            if c != '>' {
                name.push(c);
                continue;
            }
            if name.trim_end_matches('/').trim() == "br" {
                out.push('\n');
            }
            tag = None;
        } else if c == '<' {
            tag = Some(String::new());
        } else {
            out.push(c);
        }
    }
    out
}

fn xhtml_message(to: &str, kind: &MessageKind, markup: &str) -> String {
    format!(
        "<message to='{}' type='{}' xml:lang='en'><body>{}</body>\
         <html xmlns='http://jabber.org/protocol/xhtml-im'>\
         <body xmlns='http://www.w3.org/1999/xhtml'>{}</body></html></message>",
        escape_xml(to),
        escape_xml(kind.as_str()),
        strip_tags(markup),
        markup
    )
}
