//! Auto-reply plugin - random lines from data files
//!
//! Answers direct messages and room messages that mention the bot with a
//! random line of the `random` file; `<prefix>joke` picks from `jokes`.

use async_trait::async_trait;
use rand::Rng;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

use crate::application::bot::Bot;
use crate::application::errors::{PluginError, StorageError};
use crate::domain::entities::{ChatEvent, MessageKind};
use crate::infrastructure::config::PluginSettings;
use crate::plugins::trait_def::{describe, parse_bool, Plugin};

pub fn create(name: &str, settings: &PluginSettings) -> Result<Arc<dyn Plugin>, PluginError> {
    let path = |key: &str| {
        settings
            .get_str(key)
            .map(PathBuf::from)
            .ok_or_else(|| PluginError::InvalidOption {
                plugin: name.to_string(),
                reason: format!("missing '{}' data file", key),
            })
    };
    Ok(Arc::new(AutoReplyPlugin {
        name: name.to_string(),
        jokes_path: path("jokes")?,
        random_path: path("random")?,
        state: RwLock::new(State {
            chat: settings.get_bool("chat", true),
            room: settings.get_bool("room", true),
            ..State::default()
        }),
    }))
}

#[derive(Default)]
struct State {
    chat: bool,
    room: bool,
    jokes: Vec<String>,
    random: Vec<String>,
}

pub struct AutoReplyPlugin {
    name: String,
    jokes_path: PathBuf,
    random_path: PathBuf,
    state: RwLock<State>,
}

/// Non-empty trimmed lines of a data file
fn load_lines(path: &Path) -> Result<Vec<String>, StorageError> {
    let data = std::fs::read_to_string(path)?;
    Ok(data
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn pick(lines: &[String]) -> Option<String> {
    if lines.is_empty() {
        return None;
    }
    let idx = rand::rng().random_range(0..lines.len());
    Some(lines[idx].clone())
}

impl AutoReplyPlugin {
    fn reload(&self) {
        let jokes = load_lines(&self.jokes_path).unwrap_or_else(|e| {
            warn!("[{}] {}: {}", self.name, self.jokes_path.display(), e);
            Vec::new()
        });
        let random = load_lines(&self.random_path).unwrap_or_else(|e| {
            warn!("[{}] {}: {}", self.name, self.random_path.display(), e);
            Vec::new()
        });
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.jokes = jokes;
        state.random = random;
    }

    fn joke(&self) -> Option<String> {
        pick(&self.state.read().unwrap_or_else(PoisonError::into_inner).jokes)
    }

    fn random(&self) -> Option<String> {
        pick(&self.state.read().unwrap_or_else(PoisonError::into_inner).random)
    }

    fn enabled_for(&self, kind: &MessageKind) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match kind {
            MessageKind::Chat => state.chat,
            MessageKind::GroupChat => state.room,
            _ => false,
        }
    }
}

#[async_trait]
impl Plugin for AutoReplyPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> &str {
        "和Bot聊天时自动回复消息"
    }

    fn help(&self, bot: &Bot) -> String {
        [
            "自动应答模块，在以下情况下触发：和Bot聊天、在群聊时提到Bot".to_string(),
            "支持以下命令：".to_string(),
            format!("{}   讲个笑话", bot.cmd_string("joke")),
        ]
        .join("\n")
    }

    fn check_environment(&self) -> bool {
        [&self.jokes_path, &self.random_path].iter().all(|p| p.is_file())
    }

    async fn start(&self, _bot: &Bot) {
        info!("[{}] Starting...", self.name);
        self.reload();
    }

    async fn stop(&self, _bot: &Bot) {
        info!("[{}] Stop", self.name);
    }

    async fn restart(&self, bot: &Bot) {
        if let Some(settings) = bot.plugin_settings(&self.name) {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.chat = settings.get_bool("chat", state.chat);
            state.room = settings.get_bool("room", state.room);
        }
        self.reload();
    }

    async fn on_chat(&self, bot: &Bot, event: &ChatEvent) {
        if !event.is_live_text() || !self.enabled_for(&event.kind) {
            return;
        }
        if bot.is_sent_by_bot(event) || bot.is_blocked(event) {
            return;
        }

        let wants_joke = event.text.trim() == bot.cmd_string("joke");
        if event.is_group() {
            if wants_joke {
                if let Some(joke) = self.joke() {
                    bot.reply_pub(event, &format!("{}: {}", event.resource(), joke)).await;
                }
            } else if bot.was_bot_mentioned(event).is_some() {
                if let Some(line) = self.random() {
                    bot.reply_pub(event, &line).await;
                }
            }
        } else if wants_joke {
            if let Some(joke) = self.joke() {
                bot.reply_auto(event, &joke).await;
            }
        } else if !bot.is_cmd(&event.text) {
            if let Some(line) = self.random() {
                bot.reply_auto(event, &line).await;
            }
        }
    }

    fn options(&self) -> BTreeMap<String, String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        BTreeMap::from([
            ("chat".to_string(), describe(state.chat, "是否在好友间启用随机回复")),
            ("room".to_string(), describe(state.room, "是否在群聊时启用随机回复")),
        ])
    }

    fn set_option(&self, key: &str, value: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match key {
            "chat" => state.chat = parse_bool(value),
            "room" => state.room = parse_bool(value),
            _ => {}
        }
    }
}
