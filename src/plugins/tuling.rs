//! Tuling plugin - proxies chat to the Tuling chat-bot API

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{info, warn};

use crate::application::bot::Bot;
use crate::application::errors::{BotError, PluginError};
use crate::application::outbox::escape_xml;
use crate::domain::entities::{ChatEvent, MessageKind};
use crate::infrastructure::config::PluginSettings;
use crate::plugins::trait_def::{describe, parse_bool, Plugin};

const API_URL: &str = "http://www.tuling123.com/openapi/api";

/// Reply used whenever the API cannot answer
pub const FALLBACK_REPLY: &str = "我知道了";

const CODE_TEXT: i64 = 100000;
const CODE_LINK: i64 = 200000;
const CODE_NEWS: i64 = 302000;
const CODE_RECIPE: i64 = 308000;

pub fn create(name: &str, settings: &PluginSettings) -> Result<Arc<dyn Plugin>, PluginError> {
    let key = settings.get_str("key").unwrap_or_default();
    if key.is_empty() {
        return Err(PluginError::InvalidOption {
            plugin: name.to_string(),
            reason: "missing api key".to_string(),
        });
    }
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| PluginError::InvalidOption {
            plugin: name.to_string(),
            reason: e.to_string(),
        })?;
    Ok(Arc::new(TulingPlugin {
        name: name.to_string(),
        url: settings.get_str("url").unwrap_or(API_URL).to_string(),
        key: key.to_string(),
        client,
        options: RwLock::new(Options::from_settings(settings)),
    }))
}

#[derive(Debug, Clone, Copy)]
struct Options {
    chat: bool,
    room: bool,
}

impl Options {
    fn from_settings(settings: &PluginSettings) -> Self {
        Self {
            chat: settings.get_bool("chat", true),
            room: settings.get_bool("room", true),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    list: Vec<ApiItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiItem {
    article: String,
    source: String,
    name: String,
    info: String,
    detailurl: String,
}

impl ApiResponse {
    /// Render the answer as XHTML with every API field escaped; unknown
    /// codes yield nothing
    fn render(&self) -> Option<String> {
        let text = escape_xml(&self.text);
        let markup = match self.code {
            CODE_TEXT => text,
            CODE_LINK => format!("<p>{}, 点击查看<a href='{}'>详情</a><br/></p>", text, escape_xml(&self.url)),
            CODE_NEWS => {
                let items: Vec<String> = self
                    .list
                    .iter()
                    .map(|i| {
                        format!(
                            "{}:<a href='{}'>{}</a><br/>",
                            escape_xml(&i.source),
                            escape_xml(&i.detailurl),
                            escape_xml(&i.article)
                        )
                    })
                    .collect();
                format!("<p>{}<br/>{}<br/></p>", text, items.join("\n"))
            }
            CODE_RECIPE => {
                let items: Vec<String> = self
                    .list
                    .iter()
                    .map(|i| {
                        format!(
                            "<a href='{}'>{}</a>，食材:{}<br/>",
                            escape_xml(&i.detailurl),
                            escape_xml(&i.name),
                            escape_xml(&i.info)
                        )
                    })
                    .collect();
                format!("<p>{}<br/>{}<br/></p>", text, items.join("\n"))
            }
            _ => return None,
        };
        Some(markup.replace("图灵", ""))
    }
}

pub struct TulingPlugin {
    name: String,
    url: String,
    key: String,
    client: Client,
    options: RwLock<Options>,
}

impl TulingPlugin {
    fn options_snapshot(&self) -> Options {
        *self.options.read().unwrap_or_else(PoisonError::into_inner)
    }

    async fn request(&self, words: &str, user: &str) -> Result<ApiResponse, BotError> {
        let user_id = format!("{:x}", Sha256::digest(user.as_bytes()));
        let body = self
            .client
            .get(&self.url)
            .query(&[("key", self.key.as_str()), ("userid", &user_id[..32]), ("info", words)])
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?
            .text()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| BotError::Parse(e.to_string()))
    }

    /// Escaped markup; errors fall back to a fixed reply
    async fn answer(&self, words: &str, user: &str) -> String {
        match self.request(words.trim(), user).await {
            Ok(response) => response.render().unwrap_or_else(|| FALLBACK_REPLY.to_string()),
            Err(e) => {
                warn!("[{}] request failed: {}", self.name, e);
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

#[async_trait]
impl Plugin for TulingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> &str {
        "图灵机器人模块"
    }

    fn help(&self, _bot: &Bot) -> String {
        format!("{}: 和好友聊天，或在群聊中被提到时自动应答．", self.summary())
    }

    async fn start(&self, _bot: &Bot) {
        info!("[{}] Starting...", self.name);
    }

    async fn stop(&self, _bot: &Bot) {
        info!("[{}] Stop", self.name);
    }

    async fn restart(&self, bot: &Bot) {
        if let Some(settings) = bot.plugin_settings(&self.name) {
            *self.options.write().unwrap_or_else(PoisonError::into_inner) = Options::from_settings(&settings);
        }
    }

    async fn on_chat(&self, bot: &Bot, event: &ChatEvent) {
        if !event.is_live_text() || bot.is_cmd(&event.text) {
            return;
        }
        let options = self.options_snapshot();
        match event.kind {
            MessageKind::Chat if options.chat => {
                if bot.is_sent_by_bot(event) {
                    return;
                }
                let reply = self.answer(&event.text, &event.remote).await;
                bot.reply_markup(event, &reply).await;
            }
            MessageKind::GroupChat if options.room => {
                if bot.is_sent_by_bot(event) || bot.is_blocked(event) {
                    return;
                }
                if let Some(message) = bot.was_bot_mentioned(event) {
                    let reply = self.answer(&message, &event.remote).await;
                    bot.send_pub_markup(event.bare_remote(), &reply).await;
                }
            }
            _ => {}
        }
    }

    fn options(&self) -> BTreeMap<String, String> {
        let options = self.options_snapshot();
        BTreeMap::from([
            ("chat".to_string(), describe(options.chat, "是否响应好友消息")),
            ("room".to_string(), describe(options.room, "是否响应群聊呼叫消息")),
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
