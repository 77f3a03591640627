use tracing::{info, warn};

use super::parser::{split_fields, split_verb};
use super::{AdminPlugin, UNSUPPORTED};
use crate::application::bot::Bot;
use crate::domain::entities::{bare_jid, ChatEvent, Permission, PresenceState};

impl AdminPlugin {
    pub(super) async fn bot_command(&self, bot: &Bot, cmd: &str, event: &ChatEvent) {
        let (verb, tail) = split_verb(cmd);
        match verb {
            "" | "help" => bot.reply_auto(event, &bot_help(bot)).await,
            "restart" if tail.is_empty() => {
                info!("Restart requested by {}", event.remote);
                bot.restart().await;
            }
            "perm" => self.bot_perm(bot, tail, event).await,
            "status" => self.bot_status(bot, tail, event).await,
            "send" => self.bot_send(bot, tail).await,
            "friends" if tail.is_empty() => {
                let text = format!("==好友列表==\n{}", self.friends().join("\n"));
                bot.reply_auto(event, &text).await;
            }
            "subscribe" => self.bot_subscribe(bot, tail, event).await,
            "unsubscribe" => self.bot_unsubscribe(bot, tail, event).await,
            _ => bot.reply_auto(event, &format!("{}{}", UNSUPPORTED, cmd)).await,
        }
    }

    async fn bot_perm(&self, bot: &Bot, tail: &str, event: &ChatEvent) {
        let [group, mask] = split_fields(tail, 2)[..] else {
            return;
        };
        match Permission::parse(mask) {
            Some(mask) => {
                self.set_perm(group, mask);
                bot.reply_auto(event, &format!("{} 命令权限已设置为 {}", group, mask)).await;
            }
            None => {
                bot.reply_auto(event, &format!("无效的权限值: {}，可用 1-7 或 chat,room,admin", mask))
                    .await
            }
        }
    }

    async fn bot_status(&self, bot: &Bot, tail: &str, event: &ChatEvent) {
        let fields = split_fields(tail, 2);
        let (state, message) = match fields[..] {
            [state, message] => (state, message),
            [state] => (state, ""),
            _ => ("", ""),
        };
        match state.parse::<PresenceState>() {
            Ok(state) => {
                if let Err(e) = bot.set_status(state, message).await {
                    warn!("Failed to set status: {}", e);
                }
            }
            Err(_) => {
                let text = format!("设置状态失败，有效的状态为: {}.", PresenceState::VALID);
                bot.reply_auto(event, &text).await;
            }
        }
    }

    /// Only friends can be messaged; anything else is dropped
    async fn bot_send(&self, bot: &Bot, tail: &str) {
        let [to, text] = split_fields(tail, 2)[..] else {
            return;
        };
        if self.is_friend(to) {
            bot.send_auto(to, text).await;
        }
    }

    async fn bot_subscribe(&self, bot: &Bot, tail: &str, event: &ChatEvent) {
        let jid = tail.trim();
        if !jid.contains('@') {
            return;
        }
        if self.is_friend(jid) {
            bot.reply_auto(event, &format!("{}已经是好友，不需要多次增加！", jid)).await;
        } else {
            bot.request_subscription(jid).await;
            bot.reply_auto(event, &format!("已向 {} 发送好友请求", jid)).await;
        }
    }

    async fn bot_unsubscribe(&self, bot: &Bot, tail: &str, event: &ChatEvent) {
        let jid = tail.trim();
        if !jid.contains('@') {
            return;
        }
        if !self.is_friend(jid) {
            bot.reply_auto(event, &format!("{}不是好友，不需要删除！", jid)).await;
            return;
        }
        if jid == event.bare_remote() {
            bot.reply_auto(event, &format!("{}是你的id, 不支持这个操作！", jid)).await;
            return;
        }
        if self.is_super_admin(jid) {
            bot.reply_auto(event, &format!("不允许删除超级管理员帐号 {}！", jid)).await;
            return;
        }

        let was_admin = self.is_admin(jid);
        self.remove_friend(bare_jid(jid));
        bot.revoke_subscription(jid).await;
        let text = if was_admin {
            format!("将管理员帐号 {} 从好友中删除！", jid)
        } else {
            format!("将帐号 {} 从好友中删除！", jid)
        };
        bot.reply_auto(event, &text).await;
    }
}

fn bot_help(bot: &Bot) -> String {
    let cmd = bot.cmd_string("bot");
    [
        "==机器人命令==".to_string(),
        format!("{} help                      显示本信息", cmd),
        format!("{} restart                   重新载入配置文件，初始化各模块", cmd),
        format!("{} perm <cmd> <value>        设置命令权限", cmd),
        format!("{} status <status> [message] 设置机器人在线状态", cmd),
        format!("{} send <jid> <message>      给好友发送消息", cmd),
        String::new(),
        format!("{} friends                   列出好友帐号", cmd),
        format!("{} subscribe <jid>           新增好友帐号", cmd),
        format!("{} unsubscribe <jid>         删除好友帐号", cmd),
    ]
    .join("\n")
}
