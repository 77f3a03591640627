//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Scheduler: cron-style timers for keep-alive and scheduled messages
//! - Adapters: Transport integrations (console)

pub mod adapters;
pub mod config;
pub mod scheduler;
