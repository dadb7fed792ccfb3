//! Capability bits a chain may request from the launcher.
use bitflags::bitflags;

bitflags! {
    /// Platform behaviours requested for one launch.
    ///
    /// The FOSSIL and COM I/O bits are carried for compatibility with DOS-era door
    /// programs. A platform that cannot honour a bit logs the omission and launches
    /// anyway.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExecutionFlags: u32 {
        /// Redirect the door's FOSSIL driver calls to the session.
        const FOSSIL = 0x0001;
        /// Redirect direct COM port I/O to the session.
        const COMIO = 0x0002;
        /// Switch the local console to code page 437 while the door runs.
        const LOCAL_CONSOLE_CP437 = 0x0004;
    }
}

/// Capabilities the current target can honour.
fn supported_here() -> ExecutionFlags {
    if cfg!(windows) {
        ExecutionFlags::LOCAL_CONSOLE_CP437
    } else {
        ExecutionFlags::empty()
    }
}

/// Capability query consulted by the launcher before spawning.
///
/// Returns true when every bit in `flag` is available on this platform. The empty
/// set is always supported.
pub fn platform_supports(flag: ExecutionFlags) -> bool {
    supported_here().contains(flag)
}

impl ExecutionFlags {
    /// Individual requested bits rejected by `supports`, by name.
    pub fn unsupported_by(self, supports: fn(ExecutionFlags) -> bool) -> Vec<&'static str> {
        self.iter_names()
            .filter(|(_, bit)| !supports(*bit))
            .map(|(name, _)| name)
            .collect()
    }
}
