use std::fmt;
use std::str::FromStr;

/// Presence `show` values accepted by `--bot status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Away,
    Chat,
    Dnd,
    Xa,
}

impl PresenceState {
    pub const VALID: &'static str = "away, chat, dnd, xa";

    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceState::Away => "away",
            PresenceState::Chat => "chat",
            PresenceState::Dnd => "dnd",
            PresenceState::Xa => "xa",
        }
    }
}

impl FromStr for PresenceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "away" => Ok(PresenceState::Away),
            "chat" => Ok(PresenceState::Chat),
            "dnd" => Ok(PresenceState::Dnd),
            "xa" => Ok(PresenceState::Xa),
            other => Err(format!("invalid presence state '{}', allowed are: {}", other, Self::VALID)),
        }
    }
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
