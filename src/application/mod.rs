//! Application layer - Orchestration and command handling
//!
//! This layer contains:
//! - Bot: the orchestrator owning transport, scheduler and plugin registry
//! - Router: the built-in `admin` plugin parsing prefixed commands
//! - Outbox: outbound send path shared with scheduled jobs
//! - Errors: Domain-specific errors

pub mod bot;
pub mod errors;
pub mod outbox;
pub mod router;

pub use bot::Bot;
