use std::collections::BTreeMap;

use super::parser::{split_fields, split_verb};
use super::{AdminPlugin, NAME, NOT_ADMIN, UNSUPPORTED};
use crate::application::bot::Bot;
use crate::domain::entities::ChatEvent;

impl AdminPlugin {
    pub(super) async fn plugin_command(&self, bot: &Bot, cmd: &str, event: &ChatEvent) {
        if !self.is_admin(&event.remote) {
            bot.reply_auto(event, NOT_ADMIN).await;
            return;
        }
        let (verb, tail) = split_verb(cmd);
        match verb {
            "" | "help" => bot.reply_auto(event, &plugin_help(bot)).await,
            "all" => self.plugin_all(bot, event).await,
            "list" => {
                let mut lines = vec!["==运行中插件列表==".to_string()];
                lines.extend(bot.plugins().iter().map(|p| format!("{} -- {}", p.name(), p.summary())));
                bot.reply_auto(event, &lines.join("\n")).await;
            }
            "disable" if !tail.is_empty() => self.plugin_disable(bot, tail.trim(), event).await,
            "enable" if !tail.is_empty() => self.plugin_enable(bot, tail.trim(), event).await,
            "get" => self.plugin_get(bot, tail.trim(), event).await,
            "set" => self.plugin_set(bot, tail, event).await,
            _ => bot.reply_auto(event, &format!("{}{}", UNSUPPORTED, cmd)).await,
        }
    }

    /// Every configured plugin with its switch; the router is always listed first
    async fn plugin_all(&self, bot: &Bot, event: &ChatEvent) {
        let mut lines = vec!["==所有插件列表==".to_string(), format!("{}[内置]", NAME)];
        for (name, settings) in bot.config().plugins.iter().filter(|(n, _)| n.as_str() != NAME) {
            let tag = if settings.enable { "启用" } else { "禁用" };
            lines.push(format!("{}[{}]", name, tag));
        }
        bot.reply_auto(event, &lines.join("\n")).await;
    }

    async fn plugin_disable(&self, bot: &Bot, name: &str, event: &ChatEvent) {
        if name == NAME {
            bot.reply_auto(event, &format!("{}是内置模块，不允许禁用", NAME)).await;
            return;
        }
        let text = if bot.remove_plugin(name).await {
            format!("已禁用模块 {}", name)
        } else {
            format!("模块 {} 未运行", name)
        };
        bot.reply_auto(event, &text).await;
    }

    async fn plugin_enable(&self, bot: &Bot, name: &str, event: &ChatEvent) {
        let text = match bot.add_plugin(name).await {
            Ok(true) => format!("已启用模块 {}", name),
            Ok(false) => format!("模块 {} 已在运行", name),
            Err(e) => format!("启用模块 {} 失败: {}", name, e),
        };
        bot.reply_auto(event, &text).await;
    }

    /// Options of one plugin, or of every active plugin, keyed `name.option`
    async fn plugin_get(&self, bot: &Bot, name: &str, event: &ChatEvent) {
        let (header, plugins) = if name.is_empty() {
            ("==所有模块属性==".to_string(), bot.plugins())
        } else {
            match bot.plugin(name) {
                Some(plugin) => (format!("=={}模块属性==", plugin.name()), vec![plugin]),
                None => {
                    bot.reply_auto(event, &format!("模块 {} 未运行", name)).await;
                    return;
                }
            }
        };

        let options: BTreeMap<String, String> = plugins
            .iter()
            .flat_map(|p| {
                p.options()
                    .into_iter()
                    .map(move |(k, v)| (format!("{}.{}", p.name(), k), v))
            })
            .collect();

        let mut lines = vec![header];
        lines.extend(options.iter().map(|(k, v)| format!("{:<20} : {}", k, v)));
        bot.reply_auto(event, &lines.join("\n")).await;
    }

    /// `set <plugin.option> <value>`
    async fn plugin_set(&self, bot: &Bot, tail: &str, event: &ChatEvent) {
        let [field, value] = split_fields(tail, 2)[..] else {
            bot.reply_auto(event, "命令格式错误，请使用: set <模块名.属性> <值>").await;
            return;
        };
        let Some((name, key)) = field.split_once('.') else {
            bot.reply_auto(event, "命令格式错误，请使用: set <模块名.属性> <值>").await;
            return;
        };
        match bot.plugin(name) {
            Some(plugin) => {
                plugin.set_option(key, value);
                bot.reply_auto(event, &format!("已设置 {}.{} = {}", name, key, value)).await;
            }
            None => bot.reply_auto(event, &format!("模块 {} 未运行", name)).await,
        }
    }
}

fn plugin_help(bot: &Bot) -> String {
    let cmd = bot.cmd_string("plugin");
    [
        "==插件命令==".to_string(),
        format!("{} help                   显示本信息", cmd),
        format!("{} all                    列出所有的模块", cmd),
        format!("{} list                   列出当前启用的模块", cmd),
        format!("{} disable <Plugin>       禁用模块", cmd),
        format!("{} enable <Plugin>        启用模块", cmd),
        format!("{} get [Plugin]           列出模块属性", cmd),
        format!("{} set <field> <value>    设置模块属性", cmd),
    ]
    .join("\n")
}
