//! Platform command interpreter and console hooks.
#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::{enter_cp437, ShellSpawner, PLATFORM_NAME};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::{enter_cp437, ShellSpawner, PLATFORM_NAME};
