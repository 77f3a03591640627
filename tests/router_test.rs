mod common;

use common::{config, say, say_in_room, started_bot, OWNER, STRANGER};
use xmppbot::application::router::{NOT_ADMIN, ROOM_MISS, UNSUPPORTED};
use xmppbot::domain::entities::{cron_id, ChatEvent, MessageKind, Permission};
use xmppbot::infrastructure::config::PluginSettings;

#[tokio::test]
async fn echoed_markup_is_sent_as_plain_text() {
    let mut config = config();
    config.plugins.insert("about".to_string(), PluginSettings::enabled());
    let (bot, transport) = started_bot(config).await;
    let payload = "<a href='x'></body></html></message><presence type='unavailable'/><message to='v@x'><body>pwn";

    say(&bot, STRANGER, &format!("--about {}", payload)).await;
    say(&bot, OWNER, &format!("--bot {}", payload)).await;
    say(&bot, OWNER, &format!("--room {}", payload)).await;

    assert!(transport.raw().is_empty());
    assert!(transport.texts_to("v@x").is_empty());
    assert_eq!(transport.last_text_to(STRANGER), Some(format!("{}{}", UNSUPPORTED, payload)));
    assert_eq!(
        transport.texts_to(OWNER),
        vec![format!("{}{}", UNSUPPORTED, payload), format!("{}{}", UNSUPPORTED, payload)]
    );
}

#[tokio::test]
async fn non_admin_cannot_add_admins() {
    let (bot, transport) = started_bot(config()).await;

    say(&bot, STRANGER, "--admin add b@y").await;

    assert_eq!(transport.texts_to(STRANGER), vec![NOT_ADMIN.to_string()]);
    assert!(!bot.is_admin("b@y"));
    assert_eq!(bot.admin().admins(), vec!["owner@x".to_string()]);
    assert!(transport.requested().is_empty());
}

#[tokio::test]
async fn admin_group_is_closed_to_non_admins() {
    let (bot, transport) = started_bot(config()).await;

    say(&bot, STRANGER, "--admin del owner@x").await;
    say(&bot, STRANGER, "--admin list").await;

    assert_eq!(transport.texts_to(STRANGER), vec![NOT_ADMIN.to_string(); 2]);
    assert_eq!(bot.admin().admins(), vec!["owner@x".to_string()]);
    assert!(transport.revoked().is_empty());
}

#[tokio::test]
async fn cron_and_plugin_groups_are_closed_to_non_admins() {
    let mut config = config();
    config.plugins.insert("sample".to_string(), PluginSettings::enabled());
    let (bot, transport) = started_bot(config).await;
    let jobs = bot.scheduler().jobs();

    say(&bot, STRANGER, "--cron add 0 0 12 * * * room@x hello").await;
    say(&bot, STRANGER, "--plugin disable sample").await;

    assert_eq!(transport.texts_to(STRANGER), vec![NOT_ADMIN.to_string(); 2]);
    assert!(bot.admin().crons().is_empty());
    assert_eq!(bot.scheduler().jobs(), jobs);
    assert!(bot.plugin("sample").is_some());
}

#[tokio::test]
async fn admin_adds_and_removes_admins() {
    let (bot, transport) = started_bot(config()).await;

    say(&bot, OWNER, "--admin add b@y").await;
    assert!(bot.is_admin("b@y/any"));
    assert_eq!(transport.requested(), vec!["b@y".to_string()]);
    assert_eq!(transport.texts_to("b@y").len(), 1);

    say(&bot, OWNER, "--admin add b@y").await;
    assert!(transport.last_text_to(OWNER).is_some_and(|t| t.contains("已是管理员")));

    say(&bot, OWNER, "--admin del owner@x").await;
    assert!(bot.is_admin("owner@x"));

    say(&bot, OWNER, "--admin del b@y").await;
    assert!(!bot.is_admin("b@y"));
    assert_eq!(transport.last_text_to(OWNER).as_deref(), Some("已取消 b@y 的管理员身份!"));
}

#[tokio::test]
async fn room_join_records_password_and_calls_transport() {
    let (bot, transport) = started_bot(config()).await;

    say(&bot, OWNER, "--room join c@rooms d password123").await;

    let room = bot.admin().room("c@rooms").expect("joined");
    assert_eq!(room.nickname, "d");
    assert_eq!(room.password.as_deref(), Some("password123"));
    assert_eq!(
        transport.joins(),
        vec![("c@rooms".to_string(), "d".to_string(), Some("password123".to_string()))]
    );
    assert_eq!(transport.last_text_to(OWNER).as_deref(), Some("已经进入聊天室c@rooms"));
}

#[tokio::test]
async fn room_leave_and_unknown_selector() {
    let (bot, transport) = started_bot(config()).await;

    say(&bot, OWNER, "--room leave dev@rooms").await;
    assert!(!bot.is_room("dev@rooms"));
    assert_eq!(transport.leaves(), vec!["dev@rooms".to_string()]);

    say(&bot, OWNER, "--room leave dev@rooms").await;
    assert_eq!(transport.last_text_to(OWNER).as_deref(), Some(ROOM_MISS));

    say(&bot, OWNER, "--room send nowhere@rooms hi").await;
    assert_eq!(transport.last_text_to(OWNER).as_deref(), Some(ROOM_MISS));
    assert!(transport.texts_to("nowhere@rooms").is_empty());
}

#[tokio::test]
async fn room_send_all_fans_out() {
    let (bot, transport) = started_bot(config()).await;

    say(&bot, OWNER, "--room send all hello everyone").await;

    for room in ["lounge@rooms", "dev@rooms"] {
        let sent: Vec<_> = transport.sent().into_iter().filter(|s| s.to == room).collect();
        assert_eq!(sent.len(), 1, "{}", room);
        assert_eq!(sent[0].kind, MessageKind::GroupChat);
        assert_eq!(sent[0].text, "hello everyone");
    }
}

#[tokio::test]
async fn block_is_idempotent() {
    let (bot, transport) = started_bot(config()).await;

    for _ in 0..3 {
        say(&bot, OWNER, "--room block lounge@rooms troll").await;
    }

    let room = bot.admin().room("lounge@rooms").expect("room");
    assert_eq!(room.list_blocks(), ["troll".to_string()]);
    assert_eq!(transport.texts_to("lounge@rooms").len(), 1);
    assert!(bot.is_blocked(&ChatEvent::group_chat("lounge@rooms/troll", "spam")));

    say(&bot, OWNER, "--room unblock all troll").await;
    assert!(!bot.is_blocked(&ChatEvent::group_chat("lounge@rooms/troll", "spam")));
}

#[tokio::test]
async fn room_commands_are_open_to_non_admin_friends_and_occupants() {
    let (bot, transport) = started_bot(config()).await;

    say(&bot, STRANGER, "--room list").await;
    let reply = transport.last_text_to(STRANGER).expect("room list");
    assert_ne!(reply, NOT_ADMIN);
    assert!(reply.contains("lounge@rooms"));

    say_in_room(&bot, "lounge@rooms/someone", "--room list").await;
    assert_eq!(transport.texts_to("lounge@rooms/someone").len(), 1);
    assert_ne!(transport.last_text_to("lounge@rooms/someone").as_deref(), Some(NOT_ADMIN));
}

#[tokio::test]
async fn perm_change_closes_room_channel() {
    let (bot, transport) = started_bot(config()).await;

    say_in_room(&bot, "lounge@rooms/someone", "--room list").await;
    assert_eq!(transport.texts_to("lounge@rooms/someone").len(), 1);

    say(&bot, OWNER, "--bot perm room chat,admin").await;
    assert_eq!(
        bot.admin().perm("room"),
        Permission::CHAT_TALK | Permission::ADMIN_PERM
    );

    transport.clear();
    say_in_room(&bot, "lounge@rooms/someone", "--room join x@rooms n").await;
    assert!(transport.joins().is_empty());
    assert_eq!(transport.texts_to("lounge@rooms/someone"), vec![NOT_ADMIN.to_string()]);
    assert!(transport.texts_to("lounge@rooms").is_empty());

    say(&bot, OWNER, "--room join x@rooms n").await;
    assert_eq!(transport.joins().len(), 1);
}

#[tokio::test]
async fn invalid_perm_is_rejected() {
    let (bot, transport) = started_bot(config()).await;

    say(&bot, OWNER, "--bot perm room 9").await;

    assert_eq!(bot.admin().perm("room"), Permission::ALL_TALK);
    assert!(transport.last_text_to(OWNER).is_some_and(|t| t.starts_with("无效的权限值")));
}

#[tokio::test]
async fn cron_add_then_del_by_hash() {
    let (bot, transport) = started_bot(config()).await;
    let add = "--cron add 0 0 12 * * * room@x hello";
    let id = cron_id(add);

    say(&bot, OWNER, add).await;
    assert!(bot.scheduler().contains(&id));
    assert_eq!(bot.admin().crons().len(), 1);
    assert_eq!(bot.admin().crons()[0].1.to, "room@x");
    assert!(transport.last_text_to(OWNER).is_some_and(|t| t.ends_with(&id)));

    say(&bot, OWNER, &format!("--cron del {}", id)).await;
    assert!(!bot.scheduler().contains(&id));
    assert!(bot.admin().crons().is_empty());

    say(&bot, OWNER, &format!("--cron del {}", id)).await;
    assert_eq!(transport.last_text_to(OWNER), Some(format!("计划任务 {} 不存在", id)));
}

#[tokio::test]
async fn identical_cron_add_replaces_the_job() {
    let (bot, _transport) = started_bot(config()).await;
    let add = "--cron add */5 * * * * * room@x tick";

    say(&bot, OWNER, add).await;
    say(&bot, OWNER, add).await;

    assert_eq!(bot.admin().crons().len(), 1);
    let keepalive = 1;
    assert_eq!(bot.scheduler().jobs().len(), 1 + keepalive);
}

#[tokio::test]
async fn malformed_cron_is_not_registered() {
    let (bot, transport) = started_bot(config()).await;
    let before = bot.scheduler().jobs();

    for text in [
        "--cron add 0 0 12 * * room@x hello",
        "--cron add 0 0 12 * * * roomx hello",
        "--cron add 0 0 noon * * * room@x hello",
    ] {
        say(&bot, OWNER, text).await;
    }

    assert!(bot.admin().crons().is_empty());
    assert_eq!(bot.scheduler().jobs(), before);
    let replies = transport.texts_to(OWNER);
    assert_eq!(replies.len(), 3);
    assert!(replies.iter().all(|r| r.starts_with("添加新任务失败")));
}

#[tokio::test]
async fn unknown_verbs_and_delayed_messages() {
    let (bot, transport) = started_bot(config()).await;

    say(&bot, OWNER, "--bot dance").await;
    assert_eq!(transport.last_text_to(OWNER), Some(format!("{}dance", UNSUPPORTED)));

    transport.clear();
    let replay = ChatEvent::chat(OWNER, "--admin add z@y").with_stamp(chrono::Utc::now());
    bot.dispatch_chat(&replay).await;
    assert!(!bot.is_admin("z@y"));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn plugin_set_and_get_options() {
    let mut config = config();
    config.plugins.insert("sample".to_string(), PluginSettings::enabled());
    let (bot, transport) = started_bot(config).await;

    say(&bot, OWNER, "--plugin set sample.level 3").await;
    assert_eq!(transport.last_text_to(OWNER).as_deref(), Some("已设置 sample.level = 3"));

    say(&bot, OWNER, "--plugin get sample").await;
    let reply = transport.last_text_to(OWNER).expect("reply");
    assert!(reply.starts_with("==sample模块属性=="));
    assert!(reply.contains("sample.level"));
    assert!(reply.ends_with(": 3"));

    say(&bot, OWNER, "--plugin set nonsense").await;
    assert!(transport.last_text_to(OWNER).is_some_and(|t| t.starts_with("命令格式错误")));

    say(&bot, OWNER, "--plugin set admin.cmd_prefix !").await;
    assert!(bot.is_cmd("!room list"));
    assert!(!bot.is_cmd("--room list"));
    assert_eq!(bot.cmd_string("room"), "!room");
}

#[tokio::test]
async fn help_lists_active_plugins() {
    let mut config = config();
    config.plugins.insert("sample".to_string(), PluginSettings::enabled());
    let (bot, transport) = started_bot(config).await;

    say(&bot, STRANGER, "--help").await;
    let reply = transport.last_text_to(STRANGER).expect("help");
    assert!(reply.starts_with("==所有模块帮助=="));
    assert!(reply.contains("==admin模块=="));
    assert!(reply.contains("sample help"));

    say(&bot, STRANGER, "--help sample").await;
    assert_eq!(transport.last_text_to(STRANGER).as_deref(), Some("==sample帮助==\nsample help"));
}

#[tokio::test]
async fn help_answers_in_rooms_and_ignores_unknown_names() {
    let (bot, transport) = started_bot(config()).await;

    say_in_room(&bot, "lounge@rooms/someone", "--help").await;
    let reply = transport.last_text_to("lounge@rooms/someone").expect("help");
    assert!(reply.starts_with("==所有模块帮助=="));

    transport.clear();
    say(&bot, STRANGER, "--help nosuch").await;
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn friends_and_unsubscribe_protect_super_admin() {
    let (bot, transport) = started_bot(config()).await;

    say(&bot, OWNER, "--bot unsubscribe owner@x").await;
    assert!(bot.is_friend("owner@x"));

    bot.admin().add_admin("friend@x");
    say(&bot, OWNER, "--bot unsubscribe friend@x").await;
    assert!(!bot.is_friend("friend@x"));
    assert!(!bot.is_admin("friend@x"));
    assert_eq!(transport.revoked(), vec!["friend@x".to_string()]);

    say(&bot, OWNER, "--bot subscribe new@x").await;
    assert_eq!(transport.requested(), vec!["new@x".to_string()]);
}
