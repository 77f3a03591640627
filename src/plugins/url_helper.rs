//! URL helper plugin - announces the title of links posted in chat

use async_trait::async_trait;
use regex_lite::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info};

use crate::application::bot::Bot;
use crate::application::errors::{BotError, PluginError};
use crate::application::outbox::escape_xml;
use crate::domain::entities::{ChatEvent, MessageKind};
use crate::infrastructure::config::PluginSettings;
use crate::plugins::trait_def::{describe, parse_bool, Plugin};

const DEFAULT_TIMEOUT_SECS: u64 = 5;

pub fn create(name: &str, settings: &PluginSettings) -> Result<Arc<dyn Plugin>, PluginError> {
    let invalid = |reason: String| PluginError::InvalidOption {
        plugin: name.to_string(),
        reason,
    };
    Ok(Arc::new(UrlHelperPlugin {
        name: name.to_string(),
        client: Client::builder()
            .user_agent(concat!("xmppbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| invalid(e.to_string()))?,
        url_re: Regex::new(r"https?://[\w\-./%?=&#:~+@!,;]+").map_err(|e| invalid(e.to_string()))?,
        title_re: Regex::new(r"(?is)<title[^>]*>(.*?)</title>").map_err(|e| invalid(e.to_string()))?,
        options: RwLock::new(Options::from_settings(settings)),
    }))
}

#[derive(Debug, Clone, Copy)]
struct Options {
    chat: bool,
    room: bool,
    timeout: u64,
}

impl Options {
    fn from_settings(settings: &PluginSettings) -> Self {
        Self {
            chat: settings.get_bool("chat", true),
            room: settings.get_bool("room", true),
            timeout: settings.get_u64("timeout", DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// What a fetched link turned out to be
#[derive(Debug, PartialEq, Eq)]
enum LinkInfo {
    Title(String),
    Untitled,
    Image,
    Other,
    Unreachable,
}

pub struct UrlHelperPlugin {
    name: String,
    client: Client,
    url_re: Regex,
    title_re: Regex,
    options: RwLock<Options>,
}

impl UrlHelperPlugin {
    fn options_snapshot(&self) -> Options {
        *self.options.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn urls<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.url_re.find_iter(text).map(|m| m.as_str()).collect()
    }

    fn title_of(&self, html: &str) -> Option<String> {
        let raw = self.title_re.captures(html)?.get(1)?.as_str();
        let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        (!title.is_empty()).then_some(title)
    }

    async fn inspect(&self, url: &str, timeout: u64) -> Result<LinkInfo, BotError> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(timeout))
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?
            .error_for_status()
            .map_err(|e| BotError::Network(e.to_string()))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.starts_with("text/html") {
            let body = response.text().await.map_err(|e| BotError::Network(e.to_string()))?;
            Ok(self.title_of(&body).map_or(LinkInfo::Untitled, LinkInfo::Title))
        } else if content_type.starts_with("image/") {
            Ok(LinkInfo::Image)
        } else {
            Ok(LinkInfo::Other)
        }
    }

    /// Description of the first link that yields one, as escaped markup
    async fn describe_links(&self, text: &str, timeout: u64) -> Option<String> {
        for url in self.urls(text) {
            let info = self.inspect(url, timeout).await.unwrap_or_else(|e| {
                debug!("[{}] {}: {}", self.name, url, e);
                LinkInfo::Unreachable
            });
            match link_markup(url, &info) {
                Some(reply) => return Some(reply),
                None => debug!("[{}] {} is neither page nor image", self.name, url),
            }
        }
        None
    }
}

fn link_markup(url: &str, info: &LinkInfo) -> Option<String> {
    let url = escape_xml(url);
    let markup = match info {
        LinkInfo::Title(title) => format!("发链接了，标题是[<a href='{}'>{}</a>]", url, escape_xml(title)),
        LinkInfo::Untitled => format!("报歉，无法得到<a href='{}'>链接</a>标题", url),
        LinkInfo::Image => format!("发<a href='{}'>图片</a>了", url),
        LinkInfo::Unreachable => format!("对不起，无法打开此<a href='{}'>链接</a>", url),
        LinkInfo::Other => return None,
    };
    Some(markup)
}

#[async_trait]
impl Plugin for UrlHelperPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> &str {
        "URL链接辅助功能"
    }

    fn help(&self, _bot: &Bot) -> String {
        format!("{}: 当有好友或群聊发送网址时，将自动回复该网址的标题．", self.summary())
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
        if !event.is_live_text() || bot.is_sent_by_bot(event) {
            return;
        }
        let options = self.options_snapshot();
        match event.kind {
            MessageKind::Chat if options.chat => {
                if let Some(text) = self.describe_links(&event.text, options.timeout).await {
                    bot.reply_markup(event, &format!("<p>{}</p>", text)).await;
                }
            }
            MessageKind::GroupChat if options.room => {
                if bot.is_blocked(event) {
                    return;
                }
                if let Some(text) = self.describe_links(&event.text, options.timeout).await {
                    let reply = format!("<p>{} {}</p>", escape_xml(event.resource()), text);
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
            ("room".to_string(), describe(options.room, "是否响应群聊消息")),
            ("timeout".to_string(), describe(options.timeout, "访问链接超时时间")),
        ])
    }

    fn set_option(&self, key: &str, value: &str) {
        let mut options = self.options.write().unwrap_or_else(PoisonError::into_inner);
        match key {
            "chat" => options.chat = parse_bool(value),
            "room" => options.room = parse_bool(value),
            "timeout" => {
                if let Ok(secs) = value.parse() {
                    options.timeout = secs;
                }
            }
            _ => {}
        }
    }
}
