use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::roles;
use crate::config::SessionConfig;

/// Identifies one live session (one caller on one node).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    /// Fresh random id for a new connection.
    pub fn generate() -> Self {
        SessionId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        SessionId(s.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// # User Session
///
/// The caller-facing state the chains subsystem needs: who is calling, what their
/// terminal can do, and what line they came in on.
///
/// ```rust
/// use chainbbs::bbs::session::{Session, SessionId};
///
/// let session = Session::new(SessionId::from("node1"), "alice", 1).remote(true);
/// assert!(session.using_modem);
/// assert!(!session.is_sysop());
/// ```
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub username: String,
    pub user_level: u8,
    /// Terminal understands ANSI.
    pub ansi: bool,
    /// Caller is remote (serial/modem) rather than at the local console.
    pub using_modem: bool,
    pub modem_speed: u32,
    pub primary_port: u8,
    pub login_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// Create a local ANSI session with no line parameters.
    pub fn new(id: SessionId, username: impl Into<String>, user_level: u8) -> Self {
        let now = Utc::now();
        Session {
            id,
            username: username.into(),
            user_level,
            ansi: true,
            using_modem: false,
            modem_speed: 0,
            primary_port: 0,
            login_time: now,
            last_activity: now,
        }
    }

    /// Create a session answering on the configured line.
    pub fn from_config(
        id: SessionId,
        username: impl Into<String>,
        user_level: u8,
        line: &SessionConfig,
    ) -> Self {
        let mut session = Session::new(id, username, user_level);
        session.ansi = line.ansi;
        session.modem_speed = line.modem_speed;
        session.primary_port = line.primary_port;
        session
    }

    pub fn remote(mut self, using_modem: bool) -> Self {
        self.using_modem = using_modem;
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    pub fn is_sysop(&self) -> bool {
        roles::is_sysop(self.user_level)
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Seconds remaining before a `timeout_minutes` session limit, never negative.
    pub fn seconds_left(&self, timeout_minutes: u32) -> i64 {
        let deadline = self.login_time + chrono::Duration::minutes(i64::from(timeout_minutes));
        (deadline - Utc::now()).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_copies_line_parameters() {
        let line = SessionConfig {
            modem_speed: 14400,
            primary_port: 2,
            ansi: false,
            exclusive_transport: true,
        };
        let s = Session::from_config(SessionId::from("a"), "bob", roles::LEVEL_SYSOP, &line);
        assert_eq!(s.modem_speed, 14400);
        assert_eq!(s.primary_port, 2);
        assert!(!s.ansi);
        assert!(s.is_sysop());
        assert!(!s.using_modem);
    }

    #[test]
    fn seconds_left_counts_down_and_clamps() {
        let mut s = Session::new(SessionId::from("a"), "bob", 1);
        let left = s.seconds_left(10);
        assert!(left > 590 && left <= 600);
        s.login_time = Utc::now() - chrono::Duration::minutes(30);
        assert_eq!(s.seconds_left(10), 0);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
