//! Configuration management

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::application::errors::ConfigError;
use crate::domain::entities::PresenceState;

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub setup: SetupConfig,
    /// Plugin name to its settings, in name order
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginSettings>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AccountConfig {
    pub username: String,
    pub password: String,
    pub resource: String,
    pub server: String,
    pub port: u16,
    pub no_tls: bool,
    pub self_signed: bool,
    pub session: bool,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            resource: "xmppbot".to_string(),
            server: String::new(),
            port: 5222,
            no_tls: false,
            self_signed: false,
            session: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SetupConfig {
    /// Super admins; they can never be removed from chat
    pub admin: Vec<String>,
    pub debug: bool,
    pub auto_subscribe: bool,
    pub cmd_prefix: String,
    pub status: String,
    pub status_message: String,
    pub rooms: Vec<RoomConfig>,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            admin: Vec::new(),
            debug: false,
            auto_subscribe: true,
            cmd_prefix: "--".to_string(),
            status: "chat".to_string(),
            status_message: String::new(),
            rooms: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RoomConfig {
    pub jid: String,
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Per-plugin settings: the `enable` switch plus free-form options
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginSettings {
    #[serde(default)]
    pub enable: bool,
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_yaml::Value>,
}

impl PluginSettings {
    pub fn enabled() -> Self {
        Self {
            enable: true,
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_yaml::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.options.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.options.get(key).and_then(|v| v.as_u64()).unwrap_or(default)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }

    /// A sequence of strings; missing keys and other value types yield nothing
    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        self.options
            .get(key)
            .and_then(|v| v.as_sequence())
            .map(|items| items.iter().filter_map(|i| i.as_str()).map(str::to_string).collect())
            .unwrap_or_default()
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load_env() -> Self {
        // Load from environment variables
        let mut config = Config::default();

        if let Ok(username) = std::env::var("XMPPBOT_USERNAME") {
            config.account.username = username;
        }

        if let Ok(password) = std::env::var("XMPPBOT_PASSWORD") {
            config.account.password = password;
        }

        if let Ok(prefix) = std::env::var("XMPPBOT_PREFIX") {
            config.setup.cmd_prefix = prefix;
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.setup.cmd_prefix.trim().is_empty() {
            return Err(ConfigError::MissingField("setup.cmd-prefix".to_string()));
        }
        self.setup
            .status
            .parse::<PresenceState>()
            .map_err(ConfigError::InvalidValue)?;
        for room in &self.setup.rooms {
            if !room.jid.contains('@') {
                return Err(ConfigError::InvalidValue(format!("room jid '{}'", room.jid)));
            }
        }
        Ok(())
    }

    /// Full address of the bot session
    pub fn bot_full_jid(&self) -> String {
        format!("{}/{}", self.account.username, self.account.resource)
    }

    pub fn plugin(&self, name: &str) -> Option<&PluginSettings> {
        self.plugins.get(name)
    }

    pub fn is_plugin_enabled(&self, name: &str) -> bool {
        self.plugin(name).map(|p| p.enable).unwrap_or(false)
    }

    /// Sample configuration written by `init-config`
    pub fn sample() -> Self {
        let mut config = Config::default();
        config.account.username = "bot@example.org".to_string();
        config.account.server = "example.org".to_string();
        config.setup.admin = vec!["owner@example.org".to_string()];
        config.setup.rooms = vec![RoomConfig {
            jid: "lounge@conference.example.org".to_string(),
            nickname: "xmppbot".to_string(),
            password: None,
        }];
        config.plugins.insert("about".to_string(), PluginSettings::enabled());
        config.plugins.insert(
            "url-helper".to_string(),
            PluginSettings::enabled()
                .with_option("chat", true)
                .with_option("room", true)
                .with_option("timeout", 5u64),
        );
        config.plugins.insert(
            "logger".to_string(),
            PluginSettings::enabled()
                .with_option("chat", true)
                .with_option("room", true)
                .with_option("dbname", "xmppbot.db"),
        );
        config.plugins.insert(
            "tuling".to_string(),
            PluginSettings::default().with_option("key", ""),
        );
        config.plugins.insert(
            "notify".to_string(),
            PluginSettings::default()
                .with_option("listen", "127.0.0.1:8765")
                .with_option("authuser", "notify")
                .with_option("authpass", "")
                .with_option(
                    "allows",
                    serde_yaml::Value::Sequence(vec!["127.0.0.1".into(), "192.168.0.0/16".into()]),
                ),
        );
        config.plugins.insert(
            "auto-reply".to_string(),
            PluginSettings::default()
                .with_option("jokes", "data/jokes.txt")
                .with_option("random", "data/random.txt"),
        );
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
account:
  username: bot@x
  password: secret
  resource: home
setup:
  admin: [owner@x]
  cmd-prefix: "--"
  auto-subscribe: false
  status: dnd
  rooms:
    - jid: c@rooms
      nickname: d
      password: pw
    - jid: e@rooms
      nickname: f
plugins:
  logger:
    enable: true
    chat: true
    dbname: /tmp/log.db
  tuling:
    enable: false
    key: abc
"#;

    #[test]
    fn parses_kebab_case_yaml() {
        let config = Config::from_yaml(SAMPLE).expect("config");
        assert_eq!(config.bot_full_jid(), "bot@x/home");
        assert_eq!(config.account.port, 5222);
        assert!(!config.setup.auto_subscribe);
        assert_eq!(config.setup.rooms.len(), 2);
        assert_eq!(config.setup.rooms[0].password.as_deref(), Some("pw"));
        assert_eq!(config.setup.rooms[1].password, None);

        let logger = config.plugin("logger").expect("logger");
        assert!(logger.enable);
        assert!(logger.get_bool("chat", false));
        assert!(!logger.get_bool("room", false));
        assert_eq!(logger.get_str("dbname"), Some("/tmp/log.db"));
        assert!(!config.is_plugin_enabled("tuling"));
        assert!(!config.is_plugin_enabled("missing"));
    }

    #[test]
    fn rejects_invalid_status() {
        let err = Config::from_yaml("setup:\n  status: sleeping\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn sample_round_trips() {
        let yaml = Config::sample().to_yaml().expect("yaml");
        let config = Config::from_yaml(&yaml).expect("config");
        assert!(config.is_plugin_enabled("about"));
        assert_eq!(config.plugin("url-helper").map(|p| p.get_u64("timeout", 0)), Some(5));
        assert_eq!(
            config.plugin("notify").map(|p| p.get_str_list("allows")),
            Some(vec!["127.0.0.1".to_string(), "192.168.0.0/16".to_string()])
        );
    }
}
