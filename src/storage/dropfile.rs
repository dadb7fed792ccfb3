//! `chain.txt`: the interchange file a door program reads to learn who is calling.
//!
//! One value per line, in this order:
//!
//! 1. username
//! 2. user level
//! 3. sysop flag (`1`/`0`)
//! 4. ANSI flag (`1`/`0`)
//! 5. remote flag (`1`/`0`)
//! 6. seconds left in the session
//! 7. data directory
//! 8. sysop log path (empty when not configured)
//! 9. modem speed
//! 10. primary port
//! 11. system name
//! 12. sysop name
//! 13. login time, seconds since midnight (UTC)
//! 14. session id
use chrono::Timelike;

use crate::bbs::session::Session;
use crate::config::Config;

pub const CHAIN_FILE_NAME: &str = "chain.txt";

#[cfg(windows)]
const LINE_END: &str = "\r\n";
#[cfg(not(windows))]
const LINE_END: &str = "\n";

fn flag(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

pub fn chain_file_contents(session: &Session, config: &Config) -> String {
    let fields = [
        session.username.clone(),
        session.user_level.to_string(),
        flag(session.is_sysop()).to_string(),
        flag(session.ansi).to_string(),
        flag(session.using_modem).to_string(),
        session.seconds_left(config.bbs.session_timeout).to_string(),
        config.storage.data_dir.clone(),
        config.logging.sysop_file.clone().unwrap_or_default(),
        session.modem_speed.to_string(),
        session.primary_port.to_string(),
        config.bbs.name.clone(),
        config.bbs.sysop.clone(),
        session.login_time.num_seconds_from_midnight().to_string(),
        session.id.to_string(),
    ];
    let mut out = fields.join(LINE_END);
    out.push_str(LINE_END);
    out
}
