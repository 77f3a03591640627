use tracing::{info, warn};

use super::parser::{split_fields, split_verb};
use super::{write, AdminPlugin, UNSUPPORTED};
use crate::application::bot::Bot;
use crate::domain::entities::{cron_id, ChatEvent, CronEntry, CRON_SPEC_FIELDS};
use crate::infrastructure::scheduler::job;

const ADD_FAILED: &str = "添加新任务失败，请检查消息格式是否正确．";

impl AdminPlugin {
    pub(super) async fn cron_command(&self, bot: &Bot, cmd: &str, event: &ChatEvent) {
        let (verb, tail) = split_verb(cmd);
        match verb {
            "" | "help" => bot.reply_auto(event, &cron_help(bot)).await,
            "list" => self.cron_list(bot, event).await,
            "add" => self.cron_add(bot, tail, event).await,
            "del" => self.cron_del(bot, tail, event).await,
            _ => bot.reply_auto(event, &format!("{}{}", UNSUPPORTED, cmd)).await,
        }
    }

    async fn cron_list(&self, bot: &Bot, event: &ChatEvent) {
        let mut lines = vec!["==所有计划任务列表==".to_string()];
        lines.extend(
            self.crons()
                .into_iter()
                .map(|(id, c)| format!("TaskID: {} , [{}] => [{}] : {}", id, c.spec, c.to, c.text)),
        );
        bot.reply_auto(event, &lines.join("\n")).await;
    }

    /// `add <sec> <min> <hour> <dom> <month> <dow> <target> <message>`
    async fn cron_add(&self, bot: &Bot, tail: &str, event: &ChatEvent) {
        let fields = split_fields(tail, CRON_SPEC_FIELDS + 2);
        if fields.len() != CRON_SPEC_FIELDS + 2 || !fields[CRON_SPEC_FIELDS].contains('@') {
            bot.reply_auto(event, ADD_FAILED).await;
            return;
        }
        let entry = CronEntry::new(
            fields[..CRON_SPEC_FIELDS].join(" "),
            fields[CRON_SPEC_FIELDS],
            fields[CRON_SPEC_FIELDS + 1],
        );
        let id = cron_id(&event.text);

        let outbox = bot.outbox();
        let public = bot.is_room(&entry.to);
        let (to, text) = (entry.to.clone(), entry.text.clone());
        let callback = job(move || {
            let (outbox, to, text) = (outbox.clone(), to.clone(), text.clone());
            async move {
                if public {
                    outbox.send_pub(&to, &text).await;
                } else {
                    outbox.send_auto(&to, &text).await;
                }
            }
        });

        if let Err(e) = bot.scheduler().add_func(&entry.spec, callback, id.clone()) {
            warn!("Rejected scheduled message: {}", e);
            bot.reply_auto(event, ADD_FAILED).await;
            return;
        }
        info!("Scheduled message {} to {}", id, entry.to);
        write(&self.crons).insert(id.clone(), entry);
        bot.reply_auto(event, &format!("已添加计划任务，TaskID: {}", id)).await;
    }

    async fn cron_del(&self, bot: &Bot, tail: &str, event: &ChatEvent) {
        let id = tail.trim();
        let removed = write(&self.crons).remove(id).is_some();
        if removed {
            bot.scheduler().remove_job(id);
            bot.reply_auto(event, &format!("已删除计划任务 {}", id)).await;
        } else {
            bot.reply_auto(event, &format!("计划任务 {} 不存在", id)).await;
        }
    }
}

fn cron_help(bot: &Bot) -> String {
    let cmd = bot.cmd_string("cron");
    [
        "==计划任务命令==".to_string(),
        format!("{} help                      显示本信息", cmd),
        format!("{} list                      列出所有的计划任务详情", cmd),
        format!("{} add <Spec> <jid> <msg>    添加计划任务", cmd),
        "  Spec: Seconds Minutes Hours DayofMonth Month DayofWeek".to_string(),
        format!("{} del <TaskID>              删除计划任务", cmd),
    ]
    .join("\n")
}
