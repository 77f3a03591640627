//! Command-group permission masks

use std::collections::HashMap;
use std::fmt;

use super::event::MessageKind;

/// Bit set over {ChatTalk, RoomTalk, AdminPerm}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Permission(u8);

impl Permission {
    /// No access at all
    pub const NONE: Permission = Permission(0);
    /// May be issued in a direct message
    pub const CHAT_TALK: Permission = Permission(1);
    /// May be issued in a room message
    pub const ROOM_TALK: Permission = Permission(2);
    pub const ALL_TALK: Permission = Permission(1 | 2);
    /// Sender must be an admin
    pub const ADMIN_PERM: Permission = Permission(4);
    pub const ALL: Permission = Permission(1 | 2 | 4);

    /// Build a mask from its integer form, rejecting anything outside `1..=7`.
    pub fn from_bits(bits: u8) -> Option<Self> {
        if (1..=Self::ALL.0).contains(&bits) {
            Some(Permission(bits))
        } else {
            None
        }
    }

    pub fn contains(self, other: Permission) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Parse either an integer (`5`) or a comma separated list of
    /// `chat`, `room`, `admin`. Unknown names are ignored; the result must
    /// still be a valid non-empty mask.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Ok(bits) = input.parse::<u8>() {
            return Self::from_bits(bits);
        }
        let bits = input
            .split(',')
            .fold(0u8, |acc, name| match name.trim().to_lowercase().as_str() {
                "chat" => acc | Self::CHAT_TALK.0,
                "room" => acc | Self::ROOM_TALK.0,
                "admin" => acc | Self::ADMIN_PERM.0,
                _ => acc,
            });
        Self::from_bits(bits)
    }

    /// Whether a message of this kind may carry the command
    pub fn allows_channel(self, kind: &MessageKind) -> bool {
        match kind {
            MessageKind::Chat => self.contains(Self::CHAT_TALK),
            MessageKind::GroupChat => self.contains(Self::ROOM_TALK),
            _ => false,
        }
    }

    pub fn requires_admin(self) -> bool {
        self.contains(Self::ADMIN_PERM)
    }
}

impl std::ops::BitOr for Permission {
    type Output = Permission;

    fn bitor(self, rhs: Permission) -> Permission {
        Permission(self.0 | rhs.0)
    }
}

impl fmt::Display for Permission {
    /// Rendered as `(chat,room,admin)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::CHAT_TALK) {
            names.push("chat");
        }
        if self.contains(Self::ROOM_TALK) {
            names.push("room");
        }
        if self.contains(Self::ADMIN_PERM) {
            names.push("admin");
        }
        write!(f, "({})", names.join(","))
    }
}

/// Outcome of a permission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub channel_allowed: bool,
    pub perm_allowed: bool,
}

impl Access {
    pub fn granted(self) -> bool {
        self.channel_allowed && self.perm_allowed
    }
}

/// Command group name to mask. Groups without an entry have no access.
#[derive(Debug, Clone, Default)]
pub struct PermissionTable {
    masks: HashMap<String, Permission>,
}

impl PermissionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Masks of the router's own command groups
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.set("help", Permission::ALL_TALK);
        table.set("room", Permission::ALL_TALK);
        table.set("admin", Permission::CHAT_TALK | Permission::ADMIN_PERM);
        table.set("bot", Permission::CHAT_TALK | Permission::ADMIN_PERM);
        table.set("cron", Permission::CHAT_TALK | Permission::ADMIN_PERM);
        table.set("plugin", Permission::CHAT_TALK | Permission::ADMIN_PERM);
        table
    }

    pub fn get(&self, group: &str) -> Permission {
        self.masks.get(group).copied().unwrap_or(Permission::NONE)
    }

    pub fn set(&mut self, group: impl Into<String>, mask: Permission) {
        self.masks.insert(group.into(), mask);
    }

    /// Evaluate `group` for a message of `kind` whose sender admin status is
    /// `sender_is_admin`.
    pub fn evaluate(&self, group: &str, kind: &MessageKind, sender_is_admin: bool) -> Access {
        let mask = self.get(group);
        Access {
            channel_allowed: mask.allows_channel(kind),
            perm_allowed: !mask.requires_admin() || sender_is_admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_integers_in_range() {
        assert_eq!(Permission::parse("5"), Some(Permission::CHAT_TALK | Permission::ADMIN_PERM));
        assert_eq!(Permission::parse("7"), Some(Permission::ALL));
        assert_eq!(Permission::parse("0"), None);
        assert_eq!(Permission::parse("8"), None);
    }

    #[test]
    fn parse_accepts_symbolic_names() {
        assert_eq!(
            Permission::parse("chat,admin"),
            Some(Permission::CHAT_TALK | Permission::ADMIN_PERM)
        );
        assert_eq!(Permission::parse("Room"), Some(Permission::ROOM_TALK));
        assert_eq!(Permission::parse("bogus"), None);
    }

    #[test]
    fn empty_mask_denies_everywhere() {
        let table = PermissionTable::new();
        assert!(!table.evaluate("unset", &MessageKind::Chat, true).granted());
        assert!(!table.evaluate("unset", &MessageKind::GroupChat, true).granted());
    }

    #[test]
    fn admin_bit_requires_admin_sender() {
        let table = PermissionTable::with_defaults();
        let access = table.evaluate("bot", &MessageKind::Chat, false);
        assert!(access.channel_allowed);
        assert!(!access.perm_allowed);
        assert!(table.evaluate("bot", &MessageKind::Chat, true).granted());
        assert!(!table.evaluate("bot", &MessageKind::GroupChat, true).granted());
    }

    #[test]
    fn room_group_is_open_to_non_admins() {
        let table = PermissionTable::with_defaults();
        assert_eq!(table.get("room"), Permission::ALL_TALK);
        assert!(table.evaluate("room", &MessageKind::Chat, false).granted());
        assert!(table.evaluate("room", &MessageKind::GroupChat, false).granted());
    }

    #[test]
    fn display_lists_names() {
        assert_eq!(Permission::ALL.to_string(), "(chat,room,admin)");
        assert_eq!(Permission::NONE.to_string(), "()");
    }
}
