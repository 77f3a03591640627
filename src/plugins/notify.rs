//! Notify plugin - forwards notices posted over HTTP to friends or rooms
//!
//! `POST /<jid>/` with form fields `subject` and `body`, HTTP basic auth and
//! a client address on the allow list. Room addresses receive a public
//! message, anything else a direct message.

use async_trait::async_trait;
use axum::extract::rejection::FormRejection;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ipnet::IpNet;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::bot::Bot;
use crate::application::errors::PluginError;
use crate::application::outbox::Outbox;
use crate::application::router::parser::split_verb;
use crate::application::router::{AdminPlugin, UNSUPPORTED};
use crate::domain::entities::{split_jid, ChatEvent, MessageKind, Permission};
use crate::infrastructure::config::PluginSettings;
use crate::plugins::trait_def::{describe, parse_bool, Plugin};

const DEFAULT_LISTEN: &str = "127.0.0.1:8765";
const REALM: &str = "Basic realm=\"xmppbot\"";

pub fn create(name: &str, settings: &PluginSettings) -> Result<Arc<dyn Plugin>, PluginError> {
    let listen = settings
        .get_str("listen")
        .unwrap_or(DEFAULT_LISTEN)
        .parse::<SocketAddr>()
        .map_err(|e| PluginError::InvalidOption {
            plugin: name.to_string(),
            reason: format!("listen: {}", e),
        })?;
    Ok(Arc::new(NotifyPlugin {
        name: name.to_string(),
        listen,
        gate: Arc::new(RwLock::new(Gate::from_settings(settings))),
        server: Mutex::new(None),
    }))
}

/// Credentials and client allow list checked before a notice is forwarded
#[derive(Debug, Clone)]
struct Gate {
    authuser: String,
    authpass: String,
    allows: Vec<String>,
    /// Take the client address from `X-Real-IP` / `X-Forwarded-For`
    behind_proxy: bool,
}

impl Gate {
    fn from_settings(settings: &PluginSettings) -> Self {
        Self {
            authuser: settings.get_str("authuser").unwrap_or_default().to_string(),
            authpass: settings.get_str("authpass").unwrap_or_default().to_string(),
            allows: settings.get_str_list("allows"),
            behind_proxy: settings.get_bool("behind-proxy", false),
        }
    }

    /// An entry is either a single address or a network in CIDR form
    fn ip_allowed(&self, ip: IpAddr) -> bool {
        self.allows.iter().any(|entry| match entry.parse::<IpNet>() {
            Ok(net) => net.contains(&ip),
            Err(_) => entry.parse::<IpAddr>().is_ok_and(|host| host == ip),
        })
    }

    /// Compare an `Authorization: Basic ...` header value. An empty
    /// configured password never matches.
    fn credentials_match(&self, authorization: Option<&str>) -> bool {
        if self.authpass.is_empty() {
            return false;
        }
        let Some(encoded) = authorization.and_then(|v| v.strip_prefix("Basic ")) else {
            return false;
        };
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(pair) = String::from_utf8(decoded) else {
            return false;
        };
        matches!(pair.split_once(':'), Some((user, pass)) if user == self.authuser && pass == self.authpass)
    }

    fn client_ip(&self, headers: &HeaderMap, peer: SocketAddr) -> Option<IpAddr> {
        if !self.behind_proxy {
            return Some(peer.ip());
        }
        let header_ip = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| v.parse::<IpAddr>().ok())
        };
        header_ip("x-real-ip")
            .or_else(|| header_ip("x-forwarded-for"))
            .unwrap_or(Some(peer.ip()))
    }

    /// Status to answer with when the request may not pass
    fn admit(&self, headers: &HeaderMap, peer: SocketAddr) -> Result<(), StatusCode> {
        let ip = self.client_ip(headers, peer);
        let allowed = ip.is_some_and(|ip| self.ip_allowed(ip));
        debug!("notify client {:?} allowed: {}", ip, allowed);
        if !allowed {
            return Err(StatusCode::NOT_FOUND);
        }
        let authorization = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
        if !self.credentials_match(authorization) {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Notice {
    subject: String,
    body: String,
}

impl Notice {
    fn text(&self) -> String {
        format!("通知：{}\n{}", self.subject, self.body)
    }
}

#[derive(Clone)]
struct NotifyState {
    gate: Arc<RwLock<Gate>>,
    outbox: Outbox,
    router: Arc<AdminPlugin>,
}

async fn notify_handler(
    State(state): State<NotifyState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(jid): Path<String>,
    headers: HeaderMap,
    form: Result<Form<Notice>, FormRejection>,
) -> Response {
    let admitted = state.gate.read().unwrap_or_else(PoisonError::into_inner).admit(&headers, peer);
    match admitted {
        Ok(()) => {}
        Err(status) if status == StatusCode::UNAUTHORIZED => {
            return (StatusCode::UNAUTHORIZED, [(header::WWW_AUTHENTICATE, REALM)], "Unauthorized").into_response();
        }
        Err(status) => return status.into_response(),
    }
    let Ok(Form(notice)) = form else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let bare = split_jid(&jid).0;
    if state.router.is_room(bare) {
        state.outbox.send_pub(bare, &notice.text()).await;
    } else {
        state.outbox.send_auto(&jid, &notice.text()).await;
    }
    info!("Notice forwarded to {}", jid);
    format!("notify sent to {}\n", jid).into_response()
}

pub struct NotifyPlugin {
    name: String,
    listen: SocketAddr,
    gate: Arc<RwLock<Gate>>,
    server: Mutex<Option<JoinHandle<()>>>,
}

impl NotifyPlugin {
    fn gate(&self) -> Gate {
        self.gate.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn gate_mut(&self) -> RwLockWriteGuard<'_, Gate> {
        self.gate.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn command(&self, bot: &Bot, cmd: &str, event: &ChatEvent) {
        let prefix = bot.cmd_string(&self.name);
        match split_verb(cmd) {
            ("" | "help", _) => {
                let text = [
                    "==通知转发命令==".to_string(),
                    format!("{} help            显示本信息", prefix),
                    format!("{} list-allows     列出允许访问的ip地址", prefix),
                    format!("{} add-allow <ip>  添加新的ip地址到可允许访问列表", prefix),
                    format!("{} del-allow <ip>  从允许访问列表中删除一个ip地址", prefix),
                ]
                .join("\n");
                bot.reply_auto(event, &text).await;
            }
            ("list-allows", "") => {
                let lines: Vec<String> = self
                    .gate()
                    .allows
                    .iter()
                    .enumerate()
                    .map(|(i, ip)| format!("{:2}: {}", i + 1, ip))
                    .collect();
                bot.reply_auto(event, &format!("==允许的ip地址列表==\n{}", lines.join("\n"))).await;
            }
            ("add-allow", ip) if !ip.is_empty() => {
                let text = {
                    let mut gate = self.gate_mut();
                    if gate.allows.iter().any(|a| a == ip) {
                        format!("{} 已经存在于ip地址列表中，不需再次增加！", ip)
                    } else {
                        gate.allows.push(ip.to_string());
                        format!("您已添加 {} 到ip地址列表!", ip)
                    }
                };
                bot.reply_auto(event, &text).await;
            }
            ("del-allow", ip) if !ip.is_empty() => {
                let text = {
                    let mut gate = self.gate_mut();
                    let before = gate.allows.len();
                    gate.allows.retain(|a| a != ip);
                    if gate.allows.len() < before {
                        format!("禁用了ip地址：{}", ip)
                    } else {
                        format!("ip地址 {} 不在列表中!", ip)
                    }
                };
                bot.reply_auto(event, &text).await;
            }
            _ => bot.reply_auto(event, &format!("{}{}", UNSUPPORTED, cmd)).await,
        }
    }
}

#[async_trait]
impl Plugin for NotifyPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> &str {
        "通知转发模块，自动转发通过http协议接收到的消息。"
    }

    fn help(&self, bot: &Bot) -> String {
        [
            "通知转发模块，可将通过http协议接收到的消息转发给好友或聊天室．".to_string(),
            "支持以下命令:".to_string(),
            format!("{}    通知模块命令{}", bot.cmd_string(&self.name), bot.show_perm(&self.name)),
        ]
        .join("\n")
    }

    async fn start(&self, bot: &Bot) {
        info!("[{}] Starting...", self.name);
        bot.set_perm(&self.name, Permission::CHAT_TALK | Permission::ADMIN_PERM);

        let listener = match tokio::net::TcpListener::bind(self.listen).await {
            Ok(listener) => listener,
            Err(e) => {
                warn!("[{}] Cannot listen on {}: {}", self.name, self.listen, e);
                return;
            }
        };
        let state = NotifyState {
            gate: self.gate.clone(),
            outbox: bot.outbox(),
            router: bot.admin_handle(),
        };
        let app = Router::new()
            .route("/{jid}", post(notify_handler))
            .route("/{jid}/", post(notify_handler))
            .with_state(state);
        let name = self.name.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await {
                warn!("[{}] Server stopped: {}", name, e);
            }
        });
        info!("[{}] Listening on {}", self.name, self.listen);

        if let Some(previous) = self.server.lock().unwrap_or_else(PoisonError::into_inner).replace(handle) {
            previous.abort();
        }
    }

    async fn stop(&self, _bot: &Bot) {
        info!("[{}] Stop", self.name);
        if let Some(handle) = self.server.lock().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
    }

    async fn restart(&self, bot: &Bot) {
        if let Some(settings) = bot.plugin_settings(&self.name) {
            *self.gate_mut() = Gate::from_settings(&settings);
        }
    }

    async fn on_chat(&self, bot: &Bot, event: &ChatEvent) {
        if !event.is_live_text() || event.kind == MessageKind::GroupChat {
            return;
        }
        let Some(rest) = event.text.strip_prefix(&bot.cmd_string(&self.name)) else {
            return;
        };
        if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
            return;
        }
        if bot.has_permission(&self.name, event).await {
            self.command(bot, rest.trim(), event).await;
        }
    }

    fn options(&self) -> BTreeMap<String, String> {
        let gate = self.gate();
        BTreeMap::from([
            ("authuser".to_string(), describe(&gate.authuser, "认证用户名")),
            ("authpass".to_string(), describe(&gate.authpass, "认证密码")),
            ("behind-proxy".to_string(), describe(gate.behind_proxy, "是否信任代理转发的客户端地址")),
        ])
    }

    fn set_option(&self, key: &str, value: &str) {
        let mut gate = self.gate_mut();
        match key {
            "authuser" => gate.authuser = value.to_string(),
            "authpass" => gate.authpass = value.to_string(),
            "behind-proxy" => gate.behind_proxy = parse_bool(value),
            _ => {}
        }
    }
}
