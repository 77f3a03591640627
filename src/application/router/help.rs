use super::AdminPlugin;
use crate::application::bot::Bot;
use crate::domain::entities::ChatEvent;

impl AdminPlugin {
    /// Help of every active plugin, or of the named ones only
    pub(super) async fn help_command(&self, bot: &Bot, cmd: &str, event: &ChatEvent) {
        let mut lines = Vec::new();
        if cmd.is_empty() {
            lines.push("==所有模块帮助==".to_string());
            for plugin in bot.plugins() {
                lines.push(format!("=={}模块==", plugin.name()));
                lines.push(plugin.help(bot));
            }
        } else {
            for plugin in cmd.split_whitespace().filter_map(|name| bot.plugin(name)) {
                lines.push(format!("=={}帮助==", plugin.name()));
                lines.push(plugin.help(bot));
            }
        }
        if !lines.is_empty() {
            bot.reply_auto(event, &lines.join("\n")).await;
        }
    }
}
