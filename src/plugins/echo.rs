//! Echo plugin - sample capability that repeats direct messages

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::application::bot::Bot;
use crate::application::errors::PluginError;
use crate::domain::entities::{ChatEvent, MessageKind};
use crate::infrastructure::config::PluginSettings;
use crate::plugins::trait_def::Plugin;

pub fn create(name: &str, _settings: &PluginSettings) -> Result<Arc<dyn Plugin>, PluginError> {
    Ok(Arc::new(EchoPlugin {
        name: name.to_string(),
    }))
}

pub struct EchoPlugin {
    name: String,
}

#[async_trait]
impl Plugin for EchoPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> &str {
        "示例模块"
    }

    fn help(&self, _bot: &Bot) -> String {
        format!("{}: 回显好友消息．", self.summary())
    }

    async fn start(&self, _bot: &Bot) {
        info!("[{}] Starting...", self.name);
    }

    async fn stop(&self, _bot: &Bot) {
        info!("[{}] Stop", self.name);
    }

    async fn on_chat(&self, bot: &Bot, event: &ChatEvent) {
        if !event.is_live_text() || event.kind != MessageKind::Chat {
            return;
        }
        if bot.is_sent_by_bot(event) || bot.is_cmd(&event.text) {
            return;
        }
        bot.reply_auto(event, &event.text).await;
    }
}
