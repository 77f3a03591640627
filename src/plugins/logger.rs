//! Logger plugin - records chat traffic to SQLite

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::application::bot::Bot;
use crate::application::errors::{PluginError, StorageError};
use crate::domain::entities::{ChatEvent, MessageKind};
use crate::infrastructure::config::PluginSettings;
use crate::plugins::trait_def::{describe, parse_bool, Plugin};

const DEFAULT_DB: &str = "chatlog.db";

pub fn create(name: &str, settings: &PluginSettings) -> Result<Arc<dyn Plugin>, PluginError> {
    Ok(Arc::new(LoggerPlugin {
        name: name.to_string(),
        path: PathBuf::from(settings.get_str("dbname").unwrap_or(DEFAULT_DB)),
        store: Mutex::new(None),
        options: RwLock::new(Options {
            chat: settings.get_bool("chat", true),
            room: settings.get_bool("room", true),
        }),
    }))
}

/// A logged message
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: i64,
    pub jid: String,
    pub nick: String,
    pub text: String,
    pub is_room: bool,
    pub is_image: bool,
    pub created: DateTime<Utc>,
}

/// SQLite-backed chat log
pub struct ChatLog {
    conn: Connection,
}

impl ChatLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let log = Self { conn };
        log.init_tables()?;
        Ok(log)
    }

    fn init_tables(&self) -> Result<(), StorageError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS chat_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                jid TEXT NOT NULL,
                nick TEXT NOT NULL DEFAULT '',
                text TEXT NOT NULL,
                is_room INTEGER NOT NULL DEFAULT 0,
                is_image INTEGER NOT NULL DEFAULT 0,
                created TEXT NOT NULL
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chat_log_jid ON chat_log(jid)",
            [],
        )?;
        Ok(())
    }

    pub fn record(&self, event: &ChatEvent, at: DateTime<Utc>) -> Result<i64, StorageError> {
        let is_room = event.is_group();
        let is_image = event.text.contains("<img");
        self.conn.execute(
            "INSERT INTO chat_log (jid, nick, text, is_room, is_image, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.bare_remote(),
                event.resource(),
                event.text,
                is_room,
                is_image,
                at.to_rfc3339()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Distinct addresses with at least one entry
    pub fn logged_addresses(&self) -> Result<Vec<String>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT DISTINCT jid FROM chat_log ORDER BY jid")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    /// Latest `limit` entries of one address, oldest first
    pub fn history(&self, jid: &str, limit: usize) -> Result<Vec<LogEntry>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, jid, nick, text, is_room, is_image, created FROM chat_log
             WHERE jid = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![jid, limit as i64], |row| {
            let created: String = row.get(6)?;
            Ok(LogEntry {
                id: row.get(0)?,
                jid: row.get(1)?,
                nick: row.get(2)?,
                text: row.get(3)?,
                is_room: row.get(4)?,
                is_image: row.get(5)?,
                created: DateTime::parse_from_rfc3339(&created)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_default(),
            })
        })?;
        let mut entries = rows.collect::<Result<Vec<_>, _>>()?;
        if entries.is_empty() {
            return Err(StorageError::NotFound(jid.to_string()));
        }
        entries.reverse();
        Ok(entries)
    }
}

#[derive(Debug, Clone, Copy)]
struct Options {
    chat: bool,
    room: bool,
}

pub struct LoggerPlugin {
    name: String,
    path: PathBuf,
    store: Mutex<Option<ChatLog>>,
    options: RwLock<Options>,
}

impl LoggerPlugin {
    fn with_store<T>(&self, f: impl FnOnce(&ChatLog) -> Result<T, StorageError>) -> Result<T, StorageError> {
        let guard = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(log) => f(log),
            None => Err(StorageError::NotFound(self.path.display().to_string())),
        }
    }

    pub fn logged_addresses(&self) -> Result<Vec<String>, StorageError> {
        self.with_store(ChatLog::logged_addresses)
    }

    pub fn history(&self, jid: &str, limit: usize) -> Result<Vec<LogEntry>, StorageError> {
        self.with_store(|log| log.history(jid, limit))
    }

    fn wants(&self, kind: &MessageKind) -> bool {
        let options = *self.options.read().unwrap_or_else(PoisonError::into_inner);
        match kind {
            MessageKind::Chat => options.chat,
            MessageKind::GroupChat => options.room,
            _ => false,
        }
    }
}

#[async_trait]
impl Plugin for LoggerPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> &str {
        "聊天记录模块"
    }

    fn help(&self, _bot: &Bot) -> String {
        format!("{}: 记录好友及群聊消息．", self.summary())
    }

    fn check_environment(&self) -> bool {
        match ChatLog::open(&self.path) {
            Ok(log) => {
                *self.store.lock().unwrap_or_else(PoisonError::into_inner) = Some(log);
                true
            }
            Err(e) => {
                warn!("[{}] cannot open {}: {}", self.name, self.path.display(), e);
                false
            }
        }
    }

    async fn start(&self, _bot: &Bot) {
        info!("[{}] Starting... ({})", self.name, self.path.display());
    }

    async fn stop(&self, _bot: &Bot) {
        info!("[{}] Stop", self.name);
        self.store.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    async fn restart(&self, bot: &Bot) {
        if let Some(settings) = bot.plugin_settings(&self.name) {
            let mut options = self.options.write().unwrap_or_else(PoisonError::into_inner);
            options.chat = settings.get_bool("chat", options.chat);
            options.room = settings.get_bool("room", options.room);
        }
    }

    async fn on_chat(&self, bot: &Bot, event: &ChatEvent) {
        if !event.is_live_text() || !self.wants(&event.kind) {
            return;
        }
        if event.is_group() && bot.is_sent_by_bot(event) {
            return;
        }
        if let Err(e) = self.with_store(|log| log.record(event, Utc::now())) {
            debug!("[{}] not logged: {}", self.name, e);
        }
    }

    fn options(&self) -> BTreeMap<String, String> {
        let options = *self.options.read().unwrap_or_else(PoisonError::into_inner);
        BTreeMap::from([
            ("chat".to_string(), describe(options.chat, "是否记录好友消息")),
            ("room".to_string(), describe(options.room, "是否记录群聊消息")),
        ])
    }

    fn set_option(&self, key: &str, value: &str) {
        let mut options = self.options.write().unwrap_or_else(PoisonError::into_inner);
        match key {
            "chat" => options.chat = parse_bool(value),
            "room" => options.room = parse_bool(value),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_reads_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = ChatLog::open(dir.path().join("log.db")).expect("open");

        log.record(&ChatEvent::chat("a@x/phone", "hi"), Utc::now()).expect("record");
        log.record(&ChatEvent::group_chat("r@rooms/bob", "<img src='x'/>"), Utc::now())
            .expect("record");
        log.record(&ChatEvent::chat("a@x/laptop", "again"), Utc::now()).expect("record");

        assert_eq!(log.logged_addresses().expect("addresses"), vec!["a@x", "r@rooms"]);

        let history = log.history("a@x", 10).expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text, "hi");
        assert_eq!(history[1].nick, "laptop");

        let room = log.history("r@rooms", 1).expect("history");
        assert!(room[0].is_room && room[0].is_image);

        assert!(matches!(log.history("nobody@x", 5), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn environment_check_fails_closed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bad = dir.path().join("missing").join("log.db");
        let plugin = create("logger", &PluginSettings::enabled().with_option("dbname", bad.to_string_lossy().to_string()))
            .expect("create");
        assert!(!plugin.check_environment());

        let good = dir.path().join("log.db");
        let plugin = create("logger", &PluginSettings::enabled().with_option("dbname", good.to_string_lossy().to_string()))
            .expect("create");
        assert!(plugin.check_environment());
        assert!(good.exists());
    }
}
