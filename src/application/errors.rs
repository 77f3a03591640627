//! Application layer errors

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Plugin lifecycle errors
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Unknown plugin: {0}")]
    Unknown(String),

    #[error("Plugin '{0}' is not enabled in the configuration")]
    NotConfigured(String),

    #[error("Plugin '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Plugin '{0}' environment check failed")]
    Environment(String),

    #[error("Invalid option for plugin '{plugin}': {reason}")]
    InvalidOption { plugin: String, reason: String },
}

/// Scheduler errors
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid schedule '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
