//! Shared fixtures: an in-memory transport that records every call

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use xmppbot::application::errors::{BotError, PluginError};
use xmppbot::domain::entities::{ChatEvent, Contact, Event, MessageKind};
use xmppbot::domain::traits::{RoomInvite, Transport};
use xmppbot::infrastructure::config::{Config, PluginSettings, RoomConfig};
use xmppbot::plugins::{Plugin, PluginFactories};
use xmppbot::Bot;

pub const OWNER: &str = "owner@x/phone";
pub const STRANGER: &str = "a@x/laptop";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub to: String,
    pub kind: MessageKind,
    pub text: String,
}

#[derive(Default)]
struct Log {
    sent: Vec<Sent>,
    raw: Vec<String>,
    joins: Vec<(String, String, Option<String>)>,
    leaves: Vec<String>,
    invites: Vec<RoomInvite>,
    requested: Vec<String>,
    approved: Vec<String>,
    revoked: Vec<String>,
}

/// Transport double fed from a channel; closing the channel ends `receive`
pub struct RecordingTransport {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Event, BotError>>>,
    log: Mutex<Log>,
    roster: Vec<Contact>,
    pings: AtomicUsize,
    pub fail_joins: AtomicBool,
    pub fail_raw: AtomicBool,
}

impl RecordingTransport {
    pub fn new(roster: Vec<Contact>) -> (Arc<Self>, mpsc::UnboundedSender<Result<Event, BotError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            inbound: tokio::sync::Mutex::new(rx),
            log: Mutex::new(Log::default()),
            roster,
            pings: AtomicUsize::new(0),
            fail_joins: AtomicBool::new(false),
            fail_raw: AtomicBool::new(false),
        });
        (transport, tx)
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.log.lock().unwrap().sent.clone()
    }

    /// Plain texts sent to `to`; XHTML messages land in `raw`
    pub fn texts_to(&self, to: &str) -> Vec<String> {
        self.sent().into_iter().filter(|s| s.to == to).map(|s| s.text).collect()
    }

    pub fn last_text_to(&self, to: &str) -> Option<String> {
        self.texts_to(to).pop()
    }

    pub fn raw(&self) -> Vec<String> {
        self.log.lock().unwrap().raw.clone()
    }

    pub fn joins(&self) -> Vec<(String, String, Option<String>)> {
        self.log.lock().unwrap().joins.clone()
    }

    pub fn leaves(&self) -> Vec<String> {
        self.log.lock().unwrap().leaves.clone()
    }

    pub fn invites(&self) -> Vec<RoomInvite> {
        self.log.lock().unwrap().invites.clone()
    }

    pub fn requested(&self) -> Vec<String> {
        self.log.lock().unwrap().requested.clone()
    }

    pub fn approved(&self) -> Vec<String> {
        self.log.lock().unwrap().approved.clone()
    }

    pub fn revoked(&self) -> Vec<String> {
        self.log.lock().unwrap().revoked.clone()
    }

    pub fn clear(&self) {
        *self.log.lock().unwrap() = Log::default();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn receive(&self) -> Result<Option<Event>, BotError> {
        match self.inbound.lock().await.recv().await {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn send(&self, target: &str, kind: MessageKind, text: &str) -> Result<(), BotError> {
        self.log.lock().unwrap().sent.push(Sent {
            to: target.to_string(),
            kind,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_raw(&self, fragment: &str) -> Result<(), BotError> {
        if self.fail_raw.load(Ordering::SeqCst) {
            return Err(BotError::Transport("raw rejected".to_string()));
        }
        self.log.lock().unwrap().raw.push(fragment.to_string());
        Ok(())
    }

    async fn join_room(&self, room: &str, nickname: &str, password: Option<&str>) -> Result<(), BotError> {
        self.log.lock().unwrap().joins.push((
            room.to_string(),
            nickname.to_string(),
            password.map(str::to_string),
        ));
        if self.fail_joins.load(Ordering::SeqCst) {
            return Err(BotError::Transport("join rejected".to_string()));
        }
        Ok(())
    }

    async fn leave_room(&self, room: &str) -> Result<(), BotError> {
        self.log.lock().unwrap().leaves.push(room.to_string());
        Ok(())
    }

    async fn invite_to_room(&self, invite: &RoomInvite) -> Result<(), BotError> {
        self.log.lock().unwrap().invites.push(invite.clone());
        Ok(())
    }

    async fn request_subscription(&self, jid: &str) -> Result<(), BotError> {
        self.log.lock().unwrap().requested.push(jid.to_string());
        Ok(())
    }

    async fn approve_subscription(&self, jid: &str) -> Result<(), BotError> {
        self.log.lock().unwrap().approved.push(jid.to_string());
        Ok(())
    }

    async fn revoke_subscription(&self, jid: &str) -> Result<(), BotError> {
        self.log.lock().unwrap().revoked.push(jid.to_string());
        Ok(())
    }

    async fn fetch_roster(&self) -> Result<Vec<Contact>, BotError> {
        Ok(self.roster.clone())
    }

    async fn ping(&self) -> Result<(), BotError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Bot `bot@x/home`, super admin `owner@x`, two configured rooms
pub fn config() -> Config {
    let mut config = Config::default();
    config.account.username = "bot@x".to_string();
    config.account.resource = "home".to_string();
    config.setup.admin = vec!["owner@x".to_string()];
    config.setup.rooms = vec![
        RoomConfig {
            jid: "lounge@rooms".to_string(),
            nickname: "botty".to_string(),
            password: None,
        },
        RoomConfig {
            jid: "dev@rooms".to_string(),
            nickname: "helper".to_string(),
            password: Some("pw".to_string()),
        },
    ];
    config
}

/// Sample plugin that announces every live direct message it sees
pub struct SamplePlugin {
    name: String,
    options: Mutex<BTreeMap<String, String>>,
}

#[async_trait]
impl Plugin for SamplePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> &str {
        "sample"
    }

    fn help(&self, _bot: &Bot) -> String {
        "sample help".to_string()
    }

    async fn start(&self, _bot: &Bot) {}

    async fn on_chat(&self, bot: &Bot, event: &ChatEvent) {
        if event.kind == MessageKind::Chat && event.text == "ping?" {
            bot.reply_auto(event, &format!("{} saw ping", self.name)).await;
        }
    }

    fn options(&self) -> BTreeMap<String, String> {
        self.options.lock().unwrap().clone()
    }

    fn set_option(&self, key: &str, value: &str) {
        self.options.lock().unwrap().insert(key.to_string(), value.to_string());
    }
}

pub fn sample(name: &str, _settings: &PluginSettings) -> Result<Arc<dyn Plugin>, PluginError> {
    Ok(Arc::new(SamplePlugin {
        name: name.to_string(),
        options: Mutex::new(BTreeMap::from([("level".to_string(), "1".to_string())])),
    }))
}

/// Plugin whose environment never checks out
pub struct Unready;

#[async_trait]
impl Plugin for Unready {
    fn name(&self) -> &str {
        "unready"
    }

    fn summary(&self) -> &str {
        "never ready"
    }

    fn help(&self, _bot: &Bot) -> String {
        String::new()
    }

    fn check_environment(&self) -> bool {
        false
    }

    async fn start(&self, _bot: &Bot) {}

    async fn on_chat(&self, _bot: &Bot, _event: &ChatEvent) {}
}

pub fn unready(_name: &str, _settings: &PluginSettings) -> Result<Arc<dyn Plugin>, PluginError> {
    Ok(Arc::new(Unready))
}

pub fn factories() -> PluginFactories {
    let mut factories = PluginFactories::new();
    factories.register("sample", sample);
    factories.register("sample-2", sample);
    factories.register("unready", unready);
    factories.register("about", xmppbot::plugins::about::create);
    factories.register("tuling", xmppbot::plugins::tuling::create);
    factories
}

/// A started bot over a recording transport with the sent log cleared
pub async fn started_bot(config: Config) -> (Bot, Arc<RecordingTransport>) {
    let (transport, _tx) = RecordingTransport::new(vec![Contact::new("owner@x"), Contact::new("friend@x")]);
    let bot = Bot::new(transport.clone(), config, factories());
    bot.start().await.expect("start");
    transport.clear();
    (bot, transport)
}

pub async fn say(bot: &Bot, from: &str, text: &str) {
    bot.dispatch_chat(&ChatEvent::chat(from, text)).await;
}

pub async fn say_in_room(bot: &Bot, from: &str, text: &str) {
    bot.dispatch_chat(&ChatEvent::group_chat(from, text)).await;
}
