use tracing::warn;

use super::parser::{split_fields, split_verb};
use super::{AdminPlugin, ROOM_MISS, UNSUPPORTED};
use crate::application::bot::Bot;
use crate::domain::entities::ChatEvent;

impl AdminPlugin {
    pub(super) async fn room_command(&self, bot: &Bot, cmd: &str, event: &ChatEvent) {
        let (verb, tail) = split_verb(cmd);
        match verb {
            "" | "help" => bot.reply_auto(event, &room_help(bot)).await,
            "send" => self.room_send(bot, tail, event).await,
            "nick" => self.room_nick(bot, tail, event).await,
            "invite" => self.room_invite(bot, tail, event).await,
            "list-blocks" => self.room_list_blocks(bot, tail, event).await,
            "block" => self.room_block(bot, tail, event, true).await,
            "unblock" => self.room_block(bot, tail, event, false).await,
            "list" => self.room_list(bot, event).await,
            "join" => self.room_join(bot, tail, event).await,
            "leave" => self.room_leave(bot, tail, event).await,
            _ => bot.reply_auto(event, &format!("{}{}", UNSUPPORTED, cmd)).await,
        }
    }

    async fn room_send(&self, bot: &Bot, tail: &str, event: &ChatEvent) {
        let [selector, text] = split_fields(tail, 2)[..] else {
            return;
        };
        let Some(rooms) = self.select_rooms(selector) else {
            bot.reply_auto(event, ROOM_MISS).await;
            return;
        };
        for room in rooms {
            bot.send_pub(&room.jid, text).await;
        }
    }

    async fn room_nick(&self, bot: &Bot, tail: &str, event: &ChatEvent) {
        let [selector, nick] = split_fields(tail, 2)[..] else {
            return;
        };
        let Some(rooms) = self.select_rooms(selector) else {
            bot.reply_auto(event, ROOM_MISS).await;
            return;
        };
        for room in rooms {
            if let Err(e) = bot.set_room_nick(&room.jid, nick).await {
                warn!("Nick change in {} failed: {}", room.jid, e);
            }
        }
    }

    async fn room_invite(&self, bot: &Bot, tail: &str, event: &ChatEvent) {
        let fields = split_fields(tail, 3);
        let (to, room, reason) = match fields[..] {
            [to, room, reason] => (to, room, reason),
            [to, room] => (to, room, ""),
            _ => return,
        };
        if !self.is_friend(to) {
            return;
        }
        if !bot.invite_to_room(to, room, reason).await {
            bot.reply_auto(event, ROOM_MISS).await;
        }
    }

    async fn room_list_blocks(&self, bot: &Bot, tail: &str, event: &ChatEvent) {
        let [selector] = split_fields(tail, 1)[..] else {
            return;
        };
        let Some(rooms) = self.select_rooms(selector) else {
            bot.reply_auto(event, ROOM_MISS).await;
            return;
        };
        let text = rooms
            .iter()
            .map(|r| format!("== Block of {} ==\n{}", r.jid, r.list_blocks().join("\n")))
            .collect::<Vec<_>>()
            .join("\n");
        bot.reply_auto(event, &text).await;
    }

    /// `block` and `unblock`; the room is told only when its list changes
    async fn room_block(&self, bot: &Bot, tail: &str, event: &ChatEvent, block: bool) {
        let [selector, who] = split_fields(tail, 2)[..] else {
            return;
        };
        let Some(rooms) = self.select_rooms(selector) else {
            bot.reply_auto(event, ROOM_MISS).await;
            return;
        };
        for room in rooms {
            let changed = self
                .update_room(&room.jid, |r| if block { r.block(who) } else { r.unblock(who) })
                .unwrap_or(false);
            if !changed {
                continue;
            }
            let notice = if block {
                format!("/me 忽略了 {} 的消息", who)
            } else {
                format!("/me 开始关注 {} 的消息", who)
            };
            bot.send_pub(&room.jid, &notice).await;
        }
    }

    async fn room_list(&self, bot: &Bot, event: &ChatEvent) {
        let lines: Vec<String> = self
            .rooms()
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{:2}: {} as {}", i + 1, r.jid, r.nickname))
            .collect();
        bot.reply_auto(event, &format!("==聊天室列表==\n{}", lines.join("\n"))).await;
    }

    async fn room_join(&self, bot: &Bot, tail: &str, event: &ChatEvent) {
        let fields = split_fields(tail, 3);
        let (jid, nick, password) = match fields[..] {
            [jid, nick, password] => (jid, nick, Some(password.to_string())),
            [jid, nick] => (jid, nick, None),
            _ => return,
        };
        bot.join_room(jid, nick, password).await;
        bot.reply_auto(event, &format!("已经进入聊天室{}", jid)).await;
    }

    async fn room_leave(&self, bot: &Bot, tail: &str, event: &ChatEvent) {
        let jid = tail.trim();
        if jid.is_empty() || jid.contains(char::is_whitespace) || !jid.contains('@') {
            bot.reply_auto(event, "命令参数或聊天室id不正确").await;
            return;
        }
        if bot.leave_room(jid).await {
            bot.reply_auto(event, &format!("已经退出群聊{}", jid)).await;
        } else {
            bot.reply_auto(event, ROOM_MISS).await;
        }
    }
}

fn room_help(bot: &Bot) -> String {
    let cmd = bot.cmd_string("room");
    [
        "==聊天室命令==".to_string(),
        format!("{} help                         显示本信息", cmd),
        format!("{} send <Rid|all> <Message>     让机器人在聊天室中发送消息", cmd),
        format!("{} nick <Rid|all> <NickName>    修改机器人在聊天室的昵称", cmd),
        format!("{} invite <jid> <Rid> [Reason]  邀请好友进入聊天室", cmd),
        String::new(),
        format!("{} list-blocks <Rid|all>        查看聊天室屏蔽列表", cmd),
        format!("{} block <Rid|all> <Who>        屏蔽Who，不再响应其消息", cmd),
        format!("{} unblock <Rid|all> <Who>      重新响应Who的消息", cmd),
        String::new(),
        format!("{} list                         列出机器人当前所在的聊天室", cmd),
        format!("{} join <Rid> <Nick> [Password] 加入聊天室", cmd),
        format!("{} leave <Rid>                  离开聊天室", cmd),
        String::new(),
        "注: Rid 请使用聊天室jid, all表示所有的聊天室。".to_string(),
    ]
    .join("\n")
}
