//! About plugin - version and address of the running bot

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::application::bot::Bot;
use crate::application::errors::PluginError;
use crate::application::router::parser::split_verb;
use crate::application::router::UNSUPPORTED;
use crate::domain::entities::{ChatEvent, Permission};
use crate::infrastructure::config::PluginSettings;
use crate::plugins::trait_def::Plugin;

const DEFAULT_IP_SERVICE: &str = "https://api.ipify.org";

pub fn create(name: &str, settings: &PluginSettings) -> Result<Arc<dyn Plugin>, PluginError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(5))
        .user_agent(concat!("xmppbot/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PluginError::InvalidOption {
            plugin: name.to_string(),
            reason: e.to_string(),
        })?;
    Ok(Arc::new(AboutPlugin {
        name: name.to_string(),
        ip_service: settings.get_str("ip-service").unwrap_or(DEFAULT_IP_SERVICE).to_string(),
        client,
    }))
}

pub struct AboutPlugin {
    name: String,
    ip_service: String,
    client: Client,
}

impl AboutPlugin {
    async fn public_ip(&self) -> Result<String, reqwest::Error> {
        let body = self
            .client
            .get(&self.ip_service)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body.trim().to_string())
    }

    async fn command(&self, bot: &Bot, cmd: &str, event: &ChatEvent) {
        match split_verb(cmd) {
            ("" | "help", _) => {
                let prefix = bot.cmd_string(&self.name);
                let text = [
                    "===关于命令===".to_string(),
                    format!("{} help     显示本信息", prefix),
                    format!("{} version  显示bot版本信息", prefix),
                    format!("{} ip       显示bot的ip地址", prefix),
                ]
                .join("\n");
                bot.reply_auto(event, &text).await;
            }
            ("version", "") => {
                let text = format!("{}-{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                bot.reply_pub(event, &text).await;
            }
            ("ip", "") => {
                let text = match self.public_ip().await {
                    Ok(ip) if !ip.is_empty() => format!("== ip地址信息 ==\npublic: {}", ip),
                    Ok(_) => "== ip地址信息 ==\n无法获取公网地址".to_string(),
                    Err(e) => {
                        warn!("[{}] ip lookup failed: {}", self.name, e);
                        "== ip地址信息 ==\n无法获取公网地址".to_string()
                    }
                };
                bot.reply_auto(event, &text).await;
            }
            _ => bot.reply_auto(event, &format!("{}{}", UNSUPPORTED, cmd)).await,
        }
    }
}

#[async_trait]
impl Plugin for AboutPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> &str {
        "关于模块，提供Bot相关的消息。"
    }

    fn help(&self, bot: &Bot) -> String {
        format!(
            "关于模块，提供Bot相关的消息。支持命令:\n{}    关于模块命令{}",
            bot.cmd_string(&self.name),
            bot.show_perm(&self.name)
        )
    }

    async fn start(&self, bot: &Bot) {
        info!("[{}] Starting...", self.name);
        bot.set_perm(&self.name, Permission::ALL_TALK);
    }

    async fn stop(&self, _bot: &Bot) {
        info!("[{}] Stop", self.name);
    }

    async fn on_chat(&self, bot: &Bot, event: &ChatEvent) {
        if !event.is_live_text() {
            return;
        }
        let Some(rest) = event.text.strip_prefix(&bot.cmd_string(&self.name)) else {
            return;
        };
        if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
            return;
        }
        if bot.has_permission(&self.name, event).await {
            self.command(bot, rest.trim(), event).await;
        }
    }
}
