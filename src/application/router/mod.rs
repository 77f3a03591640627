//! Command router - the built-in `admin` plugin
//!
//! Owns the admin and friend lists, the joined rooms, the permission table
//! and the scheduled messages. Prefixed commands (`--room`, `--bot`, ...)
//! are split into a verb and an argument tail and handed to the group
//! handlers in the sibling modules.

mod admin;
mod bot;
mod cron;
mod help;
pub mod parser;
mod plugin;
mod room;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::application::bot::Bot;
use crate::domain::entities::{
    bare_jid, Access, ChatEvent, Contact, CronEntry, MessageKind, Permission, PermissionTable, PresenceEvent,
    PresenceState, Room, RoomRegistry,
};
use crate::plugins::trait_def::{describe, parse_bool, Plugin};

/// Notice sent when a privileged command comes from a non-admin
pub const NOT_ADMIN: &str = "请确认您是管理员，并且通过好友消息发送了此命令。";

/// Prefix of the reply to an unknown verb
pub const UNSUPPORTED: &str = "不支持的命令: ";

/// Reply when a room selector matches no joined room
pub const ROOM_MISS: &str = "Bot未进入此聊天室";

/// Command groups in matching order
const GROUPS: [&str; 6] = ["help", "room", "cron", "bot", "admin", "plugin"];

const NAME: &str = "admin";

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
struct RouterOptions {
    cmd_prefix: String,
    auto_subscribe: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            cmd_prefix: "--".to_string(),
            auto_subscribe: true,
        }
    }
}

/// The built-in router plugin. Each registry has its own lock.
pub struct AdminPlugin {
    admins: RwLock<Vec<String>>,
    super_admins: RwLock<Vec<String>>,
    friends: RwLock<Vec<String>>,
    rooms: RwLock<RoomRegistry>,
    perms: RwLock<PermissionTable>,
    crons: RwLock<BTreeMap<String, CronEntry>>,
    options: RwLock<RouterOptions>,
}

impl Default for AdminPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminPlugin {
    pub fn new() -> Self {
        Self {
            admins: RwLock::new(Vec::new()),
            super_admins: RwLock::new(Vec::new()),
            friends: RwLock::new(Vec::new()),
            rooms: RwLock::new(RoomRegistry::new()),
            perms: RwLock::new(PermissionTable::with_defaults()),
            crons: RwLock::new(BTreeMap::new()),
            options: RwLock::new(RouterOptions::default()),
        }
    }

    // ---- admins and friends ----

    pub fn is_admin(&self, jid: &str) -> bool {
        let bare = bare_jid(jid);
        read(&self.admins).iter().any(|a| a == bare)
    }

    /// Statically configured admins
    pub fn is_super_admin(&self, jid: &str) -> bool {
        let bare = bare_jid(jid);
        read(&self.super_admins).iter().any(|a| a == bare)
    }

    pub fn is_friend(&self, jid: &str) -> bool {
        let bare = bare_jid(jid);
        read(&self.friends).iter().any(|f| f == bare)
    }

    pub fn admins(&self) -> Vec<String> {
        read(&self.admins).clone()
    }

    pub fn friends(&self) -> Vec<String> {
        read(&self.friends).clone()
    }

    /// Returns false if `jid` already is an admin
    pub fn add_admin(&self, jid: &str) -> bool {
        if self.is_admin(jid) {
            return false;
        }
        write(&self.admins).push(bare_jid(jid).to_string());
        true
    }

    pub fn remove_admin(&self, jid: &str) -> bool {
        let bare = bare_jid(jid);
        let mut admins = write(&self.admins);
        let before = admins.len();
        admins.retain(|a| a != bare);
        before != admins.len()
    }

    pub fn add_friend(&self, jid: &str) -> bool {
        if self.is_friend(jid) {
            return false;
        }
        write(&self.friends).push(bare_jid(jid).to_string());
        true
    }

    /// Drop a friend; an admin entry for the same address goes with it.
    pub fn remove_friend(&self, jid: &str) -> bool {
        let bare = bare_jid(jid);
        let removed = {
            let mut friends = write(&self.friends);
            let before = friends.len();
            friends.retain(|f| f != bare);
            before != friends.len()
        };
        if removed {
            self.remove_admin(bare);
        }
        removed
    }

    // ---- rooms ----

    /// Whether `jid` is exactly the address of a joined room
    pub fn is_room(&self, jid: &str) -> bool {
        read(&self.rooms).contains(jid)
    }

    pub fn room(&self, jid: &str) -> Option<Room> {
        read(&self.rooms).get(jid).cloned()
    }

    pub fn rooms(&self) -> Vec<Room> {
        read(&self.rooms).iter().cloned().collect()
    }

    pub fn room_addresses(&self) -> Vec<String> {
        read(&self.rooms).addresses()
    }

    pub fn record_join(&self, jid: &str, nickname: &str, password: Option<String>) {
        write(&self.rooms).join(jid, nickname, password);
    }

    pub fn record_leave(&self, jid: &str) -> Option<Room> {
        write(&self.rooms).leave(jid)
    }

    /// Apply `f` to a joined room
    pub fn update_room<R>(&self, jid: &str, f: impl FnOnce(&mut Room) -> R) -> Option<R> {
        write(&self.rooms).get_mut(jid).map(f)
    }

    /// `all` selects every joined room, anything else one joined room
    fn select_rooms(&self, selector: &str) -> Option<Vec<Room>> {
        if selector == "all" {
            return Some(self.rooms());
        }
        self.room(selector).map(|r| vec![r])
    }

    // ---- permissions ----

    pub fn access(&self, group: &str, kind: &MessageKind, sender_is_admin: bool) -> Access {
        read(&self.perms).evaluate(group, kind, sender_is_admin)
    }

    pub fn perm(&self, group: &str) -> Permission {
        read(&self.perms).get(group)
    }

    pub fn set_perm(&self, group: &str, mask: Permission) {
        info!("Permission of '{}' set to {}", group, mask);
        write(&self.perms).set(group, mask);
    }

    // ---- command prefix ----

    pub fn cmd_prefix(&self) -> String {
        read(&self.options).cmd_prefix.clone()
    }

    pub fn cmd_string(&self, group: &str) -> String {
        format!("{}{}", self.cmd_prefix(), group)
    }

    pub fn is_cmd(&self, text: &str) -> bool {
        text.trim().starts_with(&self.cmd_prefix())
    }

    pub fn auto_subscribe(&self) -> bool {
        read(&self.options).auto_subscribe
    }

    // ---- scheduled messages ----

    /// `(id, entry)` pairs ordered by id
    pub fn crons(&self) -> Vec<(String, CronEntry)> {
        read(&self.crons)
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    async fn absorb_roster(&self, bot: &Bot, contacts: &[Contact]) {
        for contact in contacts {
            if self.add_friend(&contact.remote) {
                debug!("New friend {}", contact.remote);
            }
            if let Err(e) = bot.mark_as_bot(&contact.remote).await {
                warn!("Failed to advertise bot caps to {}: {}", contact.remote, e);
            }
        }
    }

    /// First group whose command string prefixes the text wins
    async fn route(&self, bot: &Bot, event: &ChatEvent) {
        for group in GROUPS {
            let Some(rest) = event.text.strip_prefix(&self.cmd_string(group)) else {
                continue;
            };
            if !bot.has_permission(group, event).await {
                debug!("Denied '{}' for {}", group, event.remote);
                return;
            }
            let cmd = rest.trim();
            match group {
                "help" => self.help_command(bot, cmd, event).await,
                "room" => self.room_command(bot, cmd, event).await,
                "cron" => self.cron_command(bot, cmd, event).await,
                "bot" => self.bot_command(bot, cmd, event).await,
                "admin" => self.admin_command(bot, cmd, event).await,
                _ => self.plugin_command(bot, cmd, event).await,
            }
            return;
        }
    }
}

#[async_trait]
impl Plugin for AdminPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn summary(&self) -> &str {
        "管理员模块[内置]"
    }

    fn help(&self, bot: &Bot) -> String {
        let line = |group: &str, text: &str| {
            format!("{:<10}{}{}", bot.cmd_string(group), text, bot.show_perm(group))
        };
        [
            format!("{}: 提供了基础的机器人管理命令。", self.summary()),
            line("help", "查看帮助命令详情"),
            line("admin", "查看管理员命令详情"),
            line("bot", "查看机器人命令详情"),
            line("cron", "查看计划任务命令详情"),
            line("plugin", "查看模块命令详情"),
            line("room", "查看聊天室命令详情"),
        ]
        .join("\n")
    }

    async fn start(&self, bot: &Bot) {
        info!("[{}] Starting...", NAME);

        let config = bot.config();
        *write(&self.admins) = config.setup.admin.clone();
        *write(&self.super_admins) = config.setup.admin.clone();
        *write(&self.options) = RouterOptions {
            cmd_prefix: config.setup.cmd_prefix.clone(),
            auto_subscribe: config.setup.auto_subscribe,
        };

        let roster = bot.fetch_roster().await;
        self.absorb_roster(bot, &roster).await;

        for room in &config.setup.rooms {
            bot.join_room(&room.jid, &room.nickname, room.password.clone()).await;
        }
    }

    async fn stop(&self, bot: &Bot) {
        for jid in self.room_addresses() {
            bot.leave_room(&jid).await;
        }
        info!("[{}] Stopped", NAME);
    }

    async fn restart(&self, bot: &Bot) {
        self.stop(bot).await;

        let setup = bot.config().setup;
        match setup.status.parse::<PresenceState>() {
            Ok(state) => {
                if let Err(e) = bot.set_status(state, &setup.status_message).await {
                    warn!("Failed to set status: {}", e);
                }
            }
            Err(e) => warn!("{}", e),
        }

        self.start(bot).await;
    }

    async fn on_chat(&self, bot: &Bot, event: &ChatEvent) {
        if event.kind == MessageKind::Roster {
            self.absorb_roster(bot, &event.roster).await;
        }
        if !event.is_live_text() {
            return;
        }
        self.route(bot, event).await;
    }

    async fn on_presence(&self, bot: &Bot, event: &PresenceEvent) {
        if event.kind != "subscribe" {
            return;
        }
        if self.auto_subscribe() {
            info!("Accepting subscription from {}", event.from);
            bot.approve_subscription(&event.from).await;
            bot.request_subscription(&event.from).await;
        } else {
            info!("Refusing subscription from {}", event.from);
            bot.revoke_subscription(&event.from).await;
        }
    }

    fn options(&self) -> BTreeMap<String, String> {
        let options = read(&self.options);
        BTreeMap::from([
            ("cmd_prefix".to_string(), describe(&options.cmd_prefix, "命令前缀")),
            (
                "auto-subscribe".to_string(),
                describe(options.auto_subscribe, "是否自动完成互加好友"),
            ),
        ])
    }

    fn set_option(&self, key: &str, value: &str) {
        let mut options = write(&self.options);
        match key {
            "cmd_prefix" if !value.trim().is_empty() => options.cmd_prefix = value.trim().to_string(),
            "auto-subscribe" => options.auto_subscribe = parse_bool(value),
            _ => debug!("[{}] Ignoring option {}", NAME, key),
        }
    }
}
