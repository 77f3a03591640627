mod common;

use common::{config, factories, say, RecordingTransport, OWNER, STRANGER};
use reqwest::StatusCode;
use xmppbot::application::router::NOT_ADMIN;
use xmppbot::domain::entities::MessageKind;
use xmppbot::infrastructure::config::{Config, PluginSettings};
use xmppbot::plugins::notify;
use xmppbot::Bot;

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("free port")
}

fn notify_config(port: u16, allows: &[&str]) -> Config {
    let allows = allows.iter().map(|a| serde_yaml::Value::from(*a)).collect();
    let mut config = config();
    config.plugins.insert(
        "notify".to_string(),
        PluginSettings::enabled()
            .with_option("listen", format!("127.0.0.1:{}", port))
            .with_option("authuser", "hook")
            .with_option("authpass", "s3cret")
            .with_option("allows", serde_yaml::Value::Sequence(allows)),
    );
    config
}

async fn notify_bot(port: u16, allows: &[&str]) -> (Bot, std::sync::Arc<RecordingTransport>) {
    let mut factories = factories();
    factories.register("notify", notify::create);
    let (transport, _tx) = RecordingTransport::new(Vec::new());
    let bot = Bot::new(transport.clone(), notify_config(port, allows), factories);
    bot.start().await.expect("start");
    transport.clear();
    (bot, transport)
}

async fn post(port: u16, jid: &str, pass: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/{}/", port, jid))
        .basic_auth("hook", Some(pass))
        .form(&[("subject", "deploy"), ("body", "build 42 is live")])
        .send()
        .await
        .expect("request")
}

#[tokio::test]
async fn authorized_notice_reaches_friend_and_room() {
    let port = free_port();
    let (bot, transport) = notify_bot(port, &["127.0.0.1"]).await;

    let response = post(port, "friend@x", "s3cret").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.expect("body"), "notify sent to friend@x\n");

    let response = post(port, "lounge@rooms", "s3cret").await;
    assert_eq!(response.status(), StatusCode::OK);

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!((sent[0].to.as_str(), &sent[0].kind), ("friend@x", &MessageKind::Chat));
    assert_eq!(sent[0].text, "通知：deploy\nbuild 42 is live");
    assert_eq!((sent[1].to.as_str(), &sent[1].kind), ("lounge@rooms", &MessageKind::GroupChat));

    bot.stop().await;
}

#[tokio::test]
async fn bad_credentials_and_unknown_clients_are_refused() {
    let port = free_port();
    let (bot, transport) = notify_bot(port, &["127.0.0.1"]).await;

    let response = post(port, "friend@x", "guess").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(reqwest::header::WWW_AUTHENTICATE));
    bot.stop().await;

    let port = free_port();
    let (other, _) = notify_bot(port, &["10.0.0.0/8"]).await;
    assert_eq!(post(port, "friend@x", "s3cret").await.status(), StatusCode::NOT_FOUND);
    other.stop().await;

    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn allow_list_commands_need_an_admin() {
    let (bot, transport) = notify_bot(free_port(), &["127.0.0.1"]).await;

    say(&bot, STRANGER, "--notify add-allow 10.0.0.1").await;
    assert_eq!(transport.texts_to(STRANGER), vec![NOT_ADMIN.to_string()]);

    say(&bot, OWNER, "--notify add-allow 10.0.0.1").await;
    say(&bot, OWNER, "--notify add-allow 10.0.0.1").await;
    say(&bot, OWNER, "--notify list-allows").await;
    let replies = transport.texts_to(OWNER);
    assert_eq!(replies[0], "您已添加 10.0.0.1 到ip地址列表!");
    assert!(replies[1].contains("已经存在"));
    assert_eq!(replies[2], "==允许的ip地址列表==\n 1: 127.0.0.1\n 2: 10.0.0.1");

    say(&bot, OWNER, "--notify del-allow 10.0.0.1").await;
    assert_eq!(transport.last_text_to(OWNER).as_deref(), Some("禁用了ip地址：10.0.0.1"));

    bot.stop().await;
}
