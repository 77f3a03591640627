//! Domain layer - Core business logic with no external dependencies
//!
//! This layer contains:
//! - Entities: Core business objects (Room, Permission, ChatEvent, CronEntry)
//! - Traits: Abstractions for infrastructure (Transport)

pub mod entities;
pub mod traits;
