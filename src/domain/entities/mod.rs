//! Domain entities - Core business objects with no external dependencies

pub mod cron;
pub mod event;
pub mod permission;
pub mod room;
pub mod status;

pub use cron::{cron_id, CronEntry, CRON_SPEC_FIELDS};
pub use event::{bare_jid, split_jid, ChatEvent, Contact, Event, MessageKind, PresenceEvent};
pub use permission::{Access, Permission, PermissionTable};
pub use room::{Room, RoomRegistry};
pub use status::PresenceState;
