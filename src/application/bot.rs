//! Orchestrator - owns the transport, the scheduler and the plugin registry

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

use crate::application::errors::{BotError, ConfigError, PluginError};
use crate::application::outbox::{escape_xml, Outbox};
use crate::application::router::{AdminPlugin, NOT_ADMIN};
use crate::domain::entities::{
    split_jid, ChatEvent, Contact, Event, MessageKind, Permission, PresenceEvent, PresenceState, Room,
};
use crate::domain::traits::{RoomInvite, Transport};
use crate::infrastructure::config::{Config, PluginSettings};
use crate::infrastructure::scheduler::{job, Scheduler};
use crate::plugins::manager::{PluginFactories, PluginManager};
use crate::plugins::trait_def::Plugin;

/// Id of the keep-alive job
pub const KEEPALIVE_JOB_ID: &str = "xmpp ping";

/// Keep-alive fires at second 0 of every minute
const KEEPALIVE_SPEC: &str = "0 * * * * *";

/// Produces a freshly resolved configuration for `--bot restart`
pub type ConfigLoader = Box<dyn Fn() -> Result<Config, ConfigError> + Send + Sync>;

/// The bot runtime.
///
/// Plugins receive `&Bot` on every call and reach the transport only through
/// the methods below. Registries live behind short-lived locks that are never
/// held across an `.await`.
pub struct Bot {
    transport: Arc<dyn Transport>,
    outbox: Outbox,
    scheduler: Arc<Scheduler>,
    config: RwLock<Config>,
    loader: Option<ConfigLoader>,
    admin: Arc<AdminPlugin>,
    plugins: RwLock<PluginManager>,
    factories: PluginFactories,
}

impl Bot {
    /// Build the registry: the router first, then every plugin enabled in
    /// `config` whose environment check passes. Nothing is started yet.
    pub fn new(transport: Arc<dyn Transport>, config: Config, factories: PluginFactories) -> Self {
        let admin = Arc::new(AdminPlugin::new());
        let mut manager = PluginManager::new(admin.clone());

        for (name, settings) in config.plugins.iter().filter(|(_, s)| s.enable) {
            if name == admin.name() {
                continue;
            }
            match factories.create(name, settings) {
                Ok(plugin) => {
                    if let Err(e) = manager.register(plugin) {
                        warn!("{}", e);
                    }
                }
                Err(e) => warn!("Skipping plugin '{}': {}", name, e),
            }
        }

        Self {
            outbox: Outbox::new(transport.clone()),
            transport,
            scheduler: Arc::new(Scheduler::new()),
            config: RwLock::new(config),
            loader: None,
            admin,
            plugins: RwLock::new(manager),
            factories,
        }
    }

    /// Reload configuration through `loader` on restart
    pub fn with_config_loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    fn plugins_read(&self) -> RwLockReadGuard<'_, PluginManager> {
        self.plugins.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn plugins_write(&self) -> RwLockWriteGuard<'_, PluginManager> {
        self.plugins.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> Config {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn plugin_settings(&self, name: &str) -> Option<PluginSettings> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .plugin(name)
            .cloned()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Send handle usable from scheduled jobs
    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// The built-in command router
    pub fn admin(&self) -> &AdminPlugin {
        &self.admin
    }

    /// Owned router handle for tasks that outlive a dispatch call
    pub fn admin_handle(&self) -> Arc<AdminPlugin> {
        self.admin.clone()
    }

    // ---- lifecycle ----

    /// Start every plugin in registration order, then the keep-alive job.
    pub async fn start(&self) -> Result<(), BotError> {
        for plugin in self.plugins() {
            plugin.start(self).await;
        }

        let transport = self.transport.clone();
        self.scheduler.add_func(
            KEEPALIVE_SPEC,
            job(move || {
                let transport = transport.clone();
                async move {
                    if let Err(e) = transport.ping().await {
                        warn!("Keep-alive ping failed: {}", e);
                    }
                }
            }),
            KEEPALIVE_JOB_ID,
        )?;
        self.scheduler.start();

        info!("Bot started with plugins: {}", self.plugins_read().names().join(", "));
        Ok(())
    }

    /// Receive and dispatch until the transport ends. A receive error is fatal.
    pub async fn run(&self) -> Result<(), BotError> {
        loop {
            match self.transport.receive().await {
                Ok(Some(Event::Chat(event))) => self.dispatch_chat(&event).await,
                Ok(Some(Event::Presence(event))) => self.dispatch_presence(&event).await,
                Ok(None) => {
                    info!("Transport closed, leaving event loop");
                    return Ok(());
                }
                Err(e) => {
                    error!("Receive failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    /// Hand the event to every active plugin in order
    pub async fn dispatch_chat(&self, event: &ChatEvent) {
        debug!("Chat from {} ({}): {}", event.remote, event.kind.as_str(), event.text);
        for plugin in self.plugins() {
            plugin.on_chat(self, event).await;
        }
    }

    pub async fn dispatch_presence(&self, event: &PresenceEvent) {
        debug!("Presence from {} type '{}'", event.from, event.kind);
        for plugin in self.plugins() {
            plugin.on_presence(self, event).await;
        }
    }

    /// Stop every plugin and the scheduler
    pub async fn stop(&self) {
        for plugin in self.plugins() {
            plugin.stop(self).await;
        }
        self.scheduler.stop();
        info!("Bot stopped");
    }

    /// Reload configuration, restart the router and every configured plugin,
    /// then enable configured plugins that are not running.
    pub async fn restart(&self) {
        if let Some(loader) = &self.loader {
            match loader() {
                Ok(config) => {
                    *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
                    info!("Configuration reloaded");
                }
                Err(e) => warn!("Keeping previous configuration: {}", e),
            }
        }

        let config = self.config();
        self.admin.restart(self).await;

        let running = self.plugins();
        for plugin in running.iter().skip(1) {
            if config.plugin(plugin.name()).is_some() {
                plugin.restart(self).await;
            }
        }

        for name in config.plugins.keys() {
            if name == self.admin.name() {
                continue;
            }
            match self.add_plugin(name).await {
                Ok(true) => info!("Plugin '{}' enabled on restart", name),
                Ok(false) => {}
                Err(e) => debug!("Plugin '{}' not enabled: {}", name, e),
            }
        }
    }

    // ---- plugin registry ----

    pub fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.plugins_read().snapshot()
    }

    pub fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins_read().get(name)
    }

    /// Construct, start and register a configured plugin.
    ///
    /// Returns `Ok(false)` when a plugin of that name is already active.
    pub async fn add_plugin(&self, name: &str) -> Result<bool, PluginError> {
        if self.plugin(name).is_some() {
            return Ok(false);
        }
        let settings = self
            .plugin_settings(name)
            .filter(|s| s.enable)
            .ok_or_else(|| PluginError::NotConfigured(name.to_string()))?;
        let plugin = self.factories.create(name, &settings)?;

        plugin.start(self).await;
        let registered = self.plugins_write().register(plugin.clone());
        if let Err(e) = registered {
            plugin.stop(self).await;
            return Err(e);
        }
        Ok(true)
    }

    /// Stop and remove an active plugin. The router itself is never removed.
    pub async fn remove_plugin(&self, name: &str) -> bool {
        let removed = self.plugins_write().unregister(name);
        match removed {
            Some(plugin) => {
                plugin.stop(self).await;
                true
            }
            None => false,
        }
    }

    // ---- queries ----

    pub fn is_admin(&self, jid: &str) -> bool {
        self.admin.is_admin(jid)
    }

    pub fn is_friend(&self, jid: &str) -> bool {
        self.admin.is_friend(jid)
    }

    /// Whether the bare part of `jid` is a joined room
    pub fn is_room(&self, jid: &str) -> bool {
        self.admin.is_room(split_jid(jid).0)
    }

    pub fn rooms(&self) -> Vec<Room> {
        self.admin.rooms()
    }

    /// Whether the event was produced by the bot itself
    pub fn is_sent_by_bot(&self, event: &ChatEvent) -> bool {
        match event.kind {
            MessageKind::Chat => {
                let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
                let (bare, resource) = split_jid(&event.remote);
                bare == config.account.username && resource == config.account.resource
            }
            MessageKind::GroupChat => self.rooms().iter().any(|r| event.remote == r.occupant_jid()),
            _ => false,
        }
    }

    /// Whether the sender's nick is on the block list of the room
    pub fn is_blocked(&self, event: &ChatEvent) -> bool {
        if !event.is_group() {
            return false;
        }
        let (room, nick) = split_jid(&event.remote);
        self.admin.room(room).is_some_and(|r| r.is_blocked(nick))
    }

    /// Room text addressed to the bot, with the nickname removed.
    ///
    /// `nick: text` yields `text`; otherwise the first occurrence of the
    /// nickname is cut out.
    pub fn was_bot_mentioned(&self, event: &ChatEvent) -> Option<String> {
        if !event.is_group() {
            return None;
        }
        self.rooms()
            .iter()
            .filter(|r| !r.nickname.is_empty())
            .find(|r| event.text.contains(&r.nickname))
            .map(|r| {
                let addressed = format!("{}:", r.nickname);
                match event.text.strip_prefix(&addressed) {
                    Some(rest) => rest.to_string(),
                    None => event.text.replacen(&r.nickname, "", 1),
                }
            })
    }

    // ---- permissions ----

    /// Check `group` for `event`; a sender lacking admin rights gets the
    /// standard notice.
    pub async fn has_permission(&self, group: &str, event: &ChatEvent) -> bool {
        let access = self.admin.access(group, &event.kind, self.is_admin(&event.remote));
        if !access.perm_allowed {
            self.reply_auto(event, NOT_ADMIN).await;
        }
        access.granted()
    }

    pub fn set_perm(&self, group: &str, mask: Permission) {
        self.admin.set_perm(group, mask);
    }

    /// Mask of `group` rendered as `(chat,room,admin)`
    pub fn show_perm(&self, group: &str) -> String {
        self.admin.perm(group).to_string()
    }

    /// Command prefix followed by `group`
    pub fn cmd_string(&self, group: &str) -> String {
        self.admin.cmd_string(group)
    }

    pub fn is_cmd(&self, text: &str) -> bool {
        self.admin.is_cmd(text)
    }

    // ---- outbound ----

    /// Reply to the sender's full address (private message inside rooms)
    pub async fn reply_auto(&self, event: &ChatEvent, text: &str) {
        self.outbox.send_auto(&event.remote, text).await;
    }

    /// Reply publicly in the room for room events, directly otherwise
    pub async fn reply_pub(&self, event: &ChatEvent, text: &str) {
        if event.is_group() {
            self.outbox.send_pub(event.bare_remote(), text).await;
        } else {
            self.reply_auto(event, text).await;
        }
    }

    pub async fn send_auto(&self, to: &str, text: &str) {
        self.outbox.send_auto(to, text).await;
    }

    pub async fn send_pub(&self, room: &str, text: &str) {
        self.outbox.send_pub(room, text).await;
    }

    /// XHTML reply to the sender's full address; see [`Outbox::send_markup`]
    pub async fn reply_markup(&self, event: &ChatEvent, markup: &str) {
        self.outbox.send_markup(&event.remote, MessageKind::Chat, markup).await;
    }

    pub async fn send_pub_markup(&self, room: &str, markup: &str) {
        self.outbox.send_markup(room, MessageKind::GroupChat, markup).await;
    }

    /// Join a room and record it. The room is recorded even when the
    /// transport reports an error.
    pub async fn join_room(&self, jid: &str, nickname: &str, password: Option<String>) {
        let password = password.filter(|p| !p.is_empty());
        if let Err(e) = self.transport.join_room(jid, nickname, password.as_deref()).await {
            warn!("Join request for {} failed: {}", jid, e);
        }
        self.admin.record_join(jid, nickname, password);
        info!("Joined {} as {}", jid, nickname);
    }

    /// Leave a joined room. Returns false if the bot is not in it.
    pub async fn leave_room(&self, jid: &str) -> bool {
        if !self.admin.is_room(jid) {
            return false;
        }
        if let Err(e) = self.transport.leave_room(jid).await {
            warn!("Leave request for {} failed: {}", jid, e);
        }
        self.admin.record_leave(jid);
        info!("Left {}", jid);
        true
    }

    /// Change the bot nickname in a room once the transport accepts it
    pub async fn set_room_nick(&self, room: &str, nickname: &str) -> Result<(), BotError> {
        let from = self.config().bot_full_jid();
        let raw = format!(
            "<presence from='{}' to='{}/{}'/>",
            escape_xml(&from),
            escape_xml(room),
            escape_xml(nickname)
        );
        self.transport.send_raw(&raw).await?;
        self.admin.update_room(room, |r| r.set_nickname(nickname));
        Ok(())
    }

    pub async fn set_status(&self, state: PresenceState, message: &str) -> Result<(), BotError> {
        let raw = format!(
            "<presence xml:lang='en'><show>{}</show><status>{}</status></presence>",
            state,
            escape_xml(message)
        );
        self.transport.send_raw(&raw).await
    }

    /// Invite `to` into a joined room. Returns false for unknown rooms.
    pub async fn invite_to_room(&self, to: &str, room: &str, reason: &str) -> bool {
        let Some(joined) = self.admin.room(room) else {
            return false;
        };
        let invite = RoomInvite {
            from: self.config().account.username,
            nickname: joined.nickname,
            to: to.to_string(),
            room: joined.jid,
            password: joined.password,
            reason: reason.to_string(),
        };
        if let Err(e) = self.transport.invite_to_room(&invite).await {
            warn!("Invitation of {} to {} failed: {}", to, room, e);
        }
        true
    }

    /// Advertise bot capabilities to a contact
    pub async fn mark_as_bot(&self, jid: &str) -> Result<(), BotError> {
        let raw = format!(
            "<presence from='{}' to='{}'><caps:c node='http://talk.google.com/xmpp/bot/caps' \
             ver='1.0' xmlns:caps='http://jabber.org/protocol/caps'/></presence>",
            escape_xml(&self.config().bot_full_jid()),
            escape_xml(jid)
        );
        self.transport.send_raw(&raw).await
    }

    pub async fn request_subscription(&self, jid: &str) {
        if let Err(e) = self.transport.request_subscription(jid).await {
            warn!("Subscription request to {} failed: {}", jid, e);
        }
    }

    pub async fn approve_subscription(&self, jid: &str) {
        if let Err(e) = self.transport.approve_subscription(jid).await {
            warn!("Subscription approval for {} failed: {}", jid, e);
        }
    }

    pub async fn revoke_subscription(&self, jid: &str) {
        if let Err(e) = self.transport.revoke_subscription(jid).await {
            warn!("Subscription revocation for {} failed: {}", jid, e);
        }
    }

    /// Current contacts; empty when the transport cannot provide them
    pub async fn fetch_roster(&self) -> Vec<Contact> {
        match self.transport.fetch_roster().await {
            Ok(contacts) => contacts,
            Err(e) => {
                warn!("Roster fetch failed: {}", e);
                Vec::new()
            }
        }
    }
}
