//! xmppbot - chat-bot orchestration core
//!
//! The [`Bot`] owns the transport, the scheduler and the plugin registry and
//! dispatches every inbound event to the built-in admin router first, then to
//! the enabled plugins.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;

pub use application::Bot;
