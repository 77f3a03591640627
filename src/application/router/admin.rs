use super::parser::split_verb;
use super::{AdminPlugin, UNSUPPORTED};
use crate::application::bot::Bot;
use crate::domain::entities::ChatEvent;

impl AdminPlugin {
    pub(super) async fn admin_command(&self, bot: &Bot, cmd: &str, event: &ChatEvent) {
        let (verb, tail) = split_verb(cmd);
        match verb {
            "" | "help" => bot.reply_auto(event, &admin_help(bot)).await,
            "list" if tail.is_empty() => {
                let text = format!("==管理员列表==\n{}", self.admins().join("\n"));
                bot.reply_auto(event, &text).await;
            }
            "add" => self.admin_add(bot, tail.trim(), event).await,
            "del" => self.admin_del(bot, tail.trim(), event).await,
            _ => bot.reply_auto(event, &format!("{}{}", UNSUPPORTED, cmd)).await,
        }
    }

    async fn admin_add(&self, bot: &Bot, jid: &str, event: &ChatEvent) {
        if !jid.contains('@') || jid.contains(char::is_whitespace) {
            return;
        }
        if self.is_admin(jid) {
            bot.reply_auto(event, &format!("{} 已是管理员用户，不需再次增加！", jid)).await;
            return;
        }
        if !self.is_friend(jid) {
            bot.request_subscription(jid).await;
        }
        self.add_admin(jid);
        bot.reply_auto(event, &format!("您已添加 {}为管理员!", jid)).await;
        bot.send_auto(jid, &format!("{} 添加您为临时管理员!", event.bare_remote()))
            .await;
    }

    /// Refused for the sender itself, statically configured admins and
    /// addresses that are not admins.
    async fn admin_del(&self, bot: &Bot, jid: &str, event: &ChatEvent) {
        if jid.is_empty() {
            return;
        }
        let sender = event.bare_remote();
        if self.is_admin(jid) && jid != sender && !self.is_super_admin(jid) {
            self.remove_admin(jid);
            bot.send_auto(jid, &format!("{} 临时取消了您的管理员身份!", sender)).await;
            bot.reply_auto(event, &format!("已取消 {} 的管理员身份!", jid)).await;
        } else {
            bot.reply_auto(event, &format!("不能取消 {} 的管理员身份!", jid)).await;
        }
    }
}

fn admin_help(bot: &Bot) -> String {
    let cmd = bot.cmd_string("admin");
    [
        "==管理员命令==".to_string(),
        format!("{} list       列出管理员帐号", cmd),
        format!("{} add <jid>  新增管理员帐号", cmd),
        format!("{} del <jid>  删除管理员帐号", cmd),
    ]
    .join("\n")
}
