//! Capability modules managed by the bot
//!
//! Every plugin implements [`Plugin`]; [`PluginFactories::builtin`] lists the
//! ones that can be enabled from the configuration.

pub mod about;
pub mod auto_reply;
pub mod echo;
pub mod logger;
pub mod manager;
pub mod notify;
pub mod trait_def;
pub mod tuling;
pub mod url_helper;

pub use manager::{PluginFactories, PluginFactory, PluginManager};
pub use trait_def::Plugin;
