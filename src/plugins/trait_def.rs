//! Plugin trait definitions

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::application::bot::Bot;
use crate::domain::entities::{ChatEvent, PresenceEvent};

/// Core plugin trait that all capability modules implement
///
/// Handlers never return errors: a plugin recovers from its own failures and
/// degrades to a fallback reply so that dispatch to later plugins continues.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique identifier for the plugin
    fn name(&self) -> &str;

    /// One-line description shown by `plugin list`
    fn summary(&self) -> &str;

    /// Help text; the bot supplies the command prefix
    fn help(&self, bot: &Bot) -> String;

    /// Preconditions such as data files or a reachable database
    fn check_environment(&self) -> bool {
        true
    }

    async fn start(&self, bot: &Bot);

    async fn stop(&self, _bot: &Bot) {}

    /// Reload options from the current configuration
    async fn restart(&self, _bot: &Bot) {}

    async fn on_chat(&self, bot: &Bot, event: &ChatEvent);

    async fn on_presence(&self, _bot: &Bot, _event: &PresenceEvent) {}

    /// Option name to `value  #description`
    fn options(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Unknown keys and unparsable values are ignored
    fn set_option(&self, _key: &str, _value: &str) {}
}

/// Lenient boolean used by plugin options: 1, true, t, y, yes, ok
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "1" | "true" | "t" | "y" | "yes" | "ok"
    )
}

/// Render an option value with its description
pub fn describe(value: impl std::fmt::Display, description: &str) -> String {
    format!("{}  #{}", value, description)
}
