//! Role and privilege levels, and the per-chain access check.
//!
//! The BBS uses simple numeric levels that map to human‑readable roles. Higher values
//! imply a superset of lower capabilities. Use [role_name] for display.
use log::warn;

use super::session::Session;

/// Role / privilege level constants
pub const LEVEL_USER: u8 = 1;
pub const LEVEL_COSYSOP: u8 = 5;
pub const LEVEL_SYSOP: u8 = 10;

/// Return the human‑readable role name for a numeric level.
pub fn role_name(level: u8) -> &'static str {
    match level {
        l if l >= LEVEL_SYSOP => "Sysop",
        l if l >= LEVEL_COSYSOP => "CoSysop",
        _ => "User",
    }
}

pub fn is_sysop(level: u8) -> bool {
    level >= LEVEL_SYSOP
}

/// Decides whether a session may see a chain, given the chain's access expression.
pub trait AccessControl: Send + Sync {
    fn permits(&self, session: &Session, acs: &str) -> bool;
}

/// Level-based access: an empty expression admits everyone; otherwise the
/// expression is a minimum level, either numeric (`"5"`) or a role name
/// (`"cosysop"`, `"sysop"`, `"user"`). Anything else admits no one.
#[derive(Debug, Default, Clone, Copy)]
pub struct LevelAccess;

impl LevelAccess {
    fn required_level(acs: &str) -> Option<u8> {
        let acs = acs.trim();
        if let Ok(n) = acs.parse::<u8>() {
            return Some(n);
        }
        match acs.to_ascii_lowercase().as_str() {
            "user" => Some(LEVEL_USER),
            "cosysop" => Some(LEVEL_COSYSOP),
            "sysop" => Some(LEVEL_SYSOP),
            _ => None,
        }
    }
}

impl AccessControl for LevelAccess {
    fn permits(&self, session: &Session, acs: &str) -> bool {
        if acs.trim().is_empty() {
            return true;
        }
        match Self::required_level(acs) {
            Some(level) => session.user_level >= level,
            None => {
                warn!("unrecognised access expression '{}'; denying", acs);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbs::session::SessionId;

    fn session(level: u8) -> Session {
        Session::new(SessionId::from("t"), "u", level)
    }

    #[test]
    fn role_names() {
        assert_eq!(role_name(LEVEL_USER), "User");
        assert_eq!(role_name(LEVEL_COSYSOP), "CoSysop");
        assert_eq!(role_name(LEVEL_SYSOP), "Sysop");
        assert_eq!(role_name(255), "Sysop");
        assert!(is_sysop(LEVEL_SYSOP));
        assert!(!is_sysop(LEVEL_COSYSOP));
    }

    #[test]
    fn level_access() {
        let acs = LevelAccess;
        assert!(acs.permits(&session(0), ""));
        assert!(acs.permits(&session(5), "5"));
        assert!(!acs.permits(&session(4), "5"));
        assert!(acs.permits(&session(10), "SYSOP"));
        assert!(!acs.permits(&session(5), "sysop"));
        assert!(!acs.permits(&session(10), "user.age > 18"));
    }
}
