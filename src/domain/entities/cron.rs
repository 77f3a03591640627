use sha2::{Digest, Sha256};

/// Number of schedule fields: seconds, minutes, hours, day-of-month, month, day-of-week
pub const CRON_SPEC_FIELDS: usize = 6;

/// A scheduled message registered from chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronEntry {
    pub spec: String,
    pub to: String,
    pub text: String,
}

impl CronEntry {
    pub fn new(spec: impl Into<String>, to: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            to: to.into(),
            text: text.into(),
        }
    }
}

/// Stable id of a scheduled message: hex SHA-256 of the literal command text.
///
/// Identical commands map to the same id; any textual difference, including
/// whitespace, yields a different one.
pub fn cron_id(command: &str) -> String {
    format!("{:x}", Sha256::digest(command.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic_and_literal() {
        let a = cron_id("--cron add 0 0 12 * * * room@x hello");
        assert_eq!(a, cron_id("--cron add 0 0 12 * * * room@x hello"));
        assert_ne!(a, cron_id("--cron add 0 0 12 * * *  room@x hello"));
        assert_eq!(a.len(), 64);
    }
}
