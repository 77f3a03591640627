//! Joined multi-user chat rooms

/// One joined room with the bot's nickname and the per-room ignore list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub jid: String,
    pub nickname: String,
    pub password: Option<String>,
    blocks: Vec<String>,
}

impl Room {
    pub fn new(jid: impl Into<String>, nickname: impl Into<String>, password: Option<String>) -> Self {
        Self {
            jid: jid.into(),
            nickname: nickname.into(),
            password: password.filter(|p| !p.is_empty()),
            blocks: Vec::new(),
        }
    }

    pub fn set_nickname(&mut self, nickname: impl Into<String>) {
        self.nickname = nickname.into();
    }

    /// Ignore messages from `nick`. Returns false if it was already blocked.
    pub fn block(&mut self, nick: &str) -> bool {
        if self.is_blocked(nick) {
            return false;
        }
        self.blocks.push(nick.to_string());
        true
    }

    /// Returns false if `nick` was not blocked.
    pub fn unblock(&mut self, nick: &str) -> bool {
        let before = self.blocks.len();
        self.blocks.retain(|b| b != nick);
        before != self.blocks.len()
    }

    pub fn is_blocked(&self, nick: &str) -> bool {
        self.blocks.iter().any(|b| b == nick)
    }

    /// Blocked nicknames in the order they were added
    pub fn list_blocks(&self) -> &[String] {
        &self.blocks
    }

    /// Full address of the bot as an occupant of this room
    pub fn occupant_jid(&self) -> String {
        format!("{}/{}", self.jid, self.nickname)
    }
}

/// Rooms the bot currently sits in, keyed by address
#[derive(Debug, Default, Clone)]
pub struct RoomRegistry {
    rooms: Vec<Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a joined room. Joining an address that is already present
    /// updates nickname and password in place and keeps its block list.
    pub fn join(&mut self, jid: &str, nickname: &str, password: Option<String>) -> &Room {
        let password = password.filter(|p| !p.is_empty());
        let idx = match self.rooms.iter().position(|r| r.jid == jid) {
            Some(idx) => {
                let room = &mut self.rooms[idx];
                room.set_nickname(nickname);
                room.password = password;
                idx
            }
            None => {
                self.rooms.push(Room::new(jid, nickname, password));
                self.rooms.len() - 1
            }
        };
        &self.rooms[idx]
    }

    pub fn leave(&mut self, jid: &str) -> Option<Room> {
        let idx = self.rooms.iter().position(|r| r.jid == jid)?;
        Some(self.rooms.remove(idx))
    }

    pub fn get(&self, jid: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.jid == jid)
    }

    pub fn get_mut(&mut self, jid: &str) -> Option<&mut Room> {
        self.rooms.iter_mut().find(|r| r.jid == jid)
    }

    pub fn contains(&self, jid: &str) -> bool {
        self.get(jid).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.iter()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.rooms.iter().map(|r| r.jid.clone()).collect()
    }
}
