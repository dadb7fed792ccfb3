//! Instance registry: which session occupies which activity slot.
//!
//! A slot names an activity such as "running chain #5". The chains menu consults
//! the registry before launching a door so two callers don't end up in a
//! single-user door at once, and offers a join when the door allows company.
//!
//! The registry is shared by every session worker as `Arc<dyn InstanceRegistry>`.
//! [`InMemoryInstanceRegistry`] covers sessions inside one process;
//! [`FileInstanceRegistry`] keeps the table in the data directory so separate
//! session processes see each other.
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use super::session::SessionId;
use crate::storage::{with_file_lock, write_atomic};
use crate::validation::secure_json_parse;

const MAX_TABLE_BYTES: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlotKind {
    MainMenu,
    Chains,
    Messages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    pub kind: SlotKind,
    pub index: usize,
}

impl Slot {
    pub fn new(kind: SlotKind, index: usize) -> Self {
        Slot { kind, index }
    }

    /// Slot for the chain at 1-based catalog `number`.
    pub fn chain(number: usize) -> Self {
        Slot::new(SlotKind::Chains, number)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.kind, self.index)
    }
}

pub trait InstanceRegistry: Send + Sync {
    /// Earliest session registered in the slot.
    fn find_occupant(&self, kind: SlotKind, index: usize) -> Option<SessionId>;

    /// `Some` registers the session in the slot (idempotent); `None` clears it.
    fn set_occupant(&self, kind: SlotKind, index: usize, occupant: Option<SessionId>);

    /// Every session in the slot, earliest first.
    fn occupants(&self, kind: SlotKind, index: usize) -> Vec<SessionId>;

    /// Remove one session from the slot.
    fn release(&self, kind: SlotKind, index: usize, session: &SessionId);

    /// Register `session` only if no other session holds the slot. On conflict the
    /// registry is left untouched and the occupying session is returned.
    fn claim_exclusive(
        &self,
        kind: SlotKind,
        index: usize,
        session: &SessionId,
    ) -> Result<(), SessionId>;
}

/// Process-local registry. All slots share one mutex, which also serialises every
/// individual slot.
#[derive(Debug, Default)]
pub struct InMemoryInstanceRegistry {
    slots: Mutex<BTreeMap<Slot, Vec<SessionId>>>,
}

impl InMemoryInstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<dyn InstanceRegistry> {
        Arc::new(Self::new())
    }

    fn slots(&self) -> MutexGuard<'_, BTreeMap<Slot, Vec<SessionId>>> {
        // a panicking holder cannot leave the map half-updated
        self.slots.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl InstanceRegistry for InMemoryInstanceRegistry {
    fn find_occupant(&self, kind: SlotKind, index: usize) -> Option<SessionId> {
        self.slots()
            .get(&Slot::new(kind, index))
            .and_then(|who| who.first().cloned())
    }

    fn set_occupant(&self, kind: SlotKind, index: usize, occupant: Option<SessionId>) {
        let slot = Slot::new(kind, index);
        let mut slots = self.slots();
        match occupant {
            Some(session) => {
                let who = slots.entry(slot).or_default();
                if !who.contains(&session) {
                    debug!("instance {} enters {}", session, slot);
                    who.push(session);
                }
            }
            None => {
                slots.remove(&slot);
            }
        }
    }

    fn occupants(&self, kind: SlotKind, index: usize) -> Vec<SessionId> {
        self.slots()
            .get(&Slot::new(kind, index))
            .cloned()
            .unwrap_or_default()
    }

    fn release(&self, kind: SlotKind, index: usize, session: &SessionId) {
        let slot = Slot::new(kind, index);
        let mut slots = self.slots();
        if let Some(who) = slots.get_mut(&slot) {
            who.retain(|s| s != session);
            debug!("instance {} leaves {}", session, slot);
            if who.is_empty() {
                slots.remove(&slot);
            }
        }
    }

    fn claim_exclusive(
        &self,
        kind: SlotKind,
        index: usize,
        session: &SessionId,
    ) -> Result<(), SessionId> {
        let slot = Slot::new(kind, index);
        let mut slots = self.slots();
        let who = slots.entry(slot).or_default();
        if let Some(other) = who.iter().find(|s| *s != session) {
            return Err(other.clone());
        }
        if who.is_empty() {
            debug!("instance {} claims {}", session, slot);
            who.push(session.clone());
        }
        Ok(())
    }
}

/// One session in one slot, as stored in `instances.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct InstanceEntry {
    slot: Slot,
    session: SessionId,
    /// Process running the session; entries of processes that have gone away
    /// are dropped on the next update.
    pid: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct InstanceTable {
    #[serde(default)]
    entries: Vec<InstanceEntry>,
}

impl InstanceTable {
    fn sessions_in(&self, slot: Slot) -> impl Iterator<Item = &SessionId> {
        self.entries
            .iter()
            .filter(move |e| e.slot == slot)
            .map(|e| &e.session)
    }

    fn prune_dead(&mut self) {
        self.entries.retain(|e| {
            let alive = process_alive(e.pid);
            if !alive {
                warn!("dropping stale instance {} in {} (pid {} gone)", e.session, e.slot, e.pid);
            }
            alive
        });
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

/// Registry shared between session processes through a JSON table in the data
/// directory.
///
/// Updates hold the table's `fs2` lock across read, modify and the atomic
/// rewrite, so [`InstanceRegistry::claim_exclusive`] checks and registers as one
/// step across processes. When the table cannot be read or written the error
/// is logged and the registry behaves as if every slot were free.
#[derive(Debug, Clone)]
pub struct FileInstanceRegistry {
    path: PathBuf,
    pid: u32,
}

impl FileInstanceRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileInstanceRegistry {
            path: path.into(),
            pid: std::process::id(),
        }
    }

    pub fn shared(path: impl Into<PathBuf>) -> Arc<dyn InstanceRegistry> {
        Arc::new(Self::new(path))
    }

    /// Record entries under a different process id.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<InstanceTable> {
        match fs::read_to_string(&self.path) {
            Ok(data) => secure_json_parse(&data, MAX_TABLE_BYTES)
                .map_err(|e| anyhow!("Failed to parse {}: {}", self.path.display(), e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(InstanceTable::default()),
            Err(e) => Err(anyhow!("Failed reading {}: {}", self.path.display(), e)),
        }
    }

    fn read(&self) -> InstanceTable {
        let mut table = self.load().unwrap_or_else(|e| {
            error!("instance table unavailable: {:#}", e);
            InstanceTable::default()
        });
        table.prune_dead();
        table
    }

    fn update<T>(&self, f: impl FnOnce(&mut InstanceTable) -> T) -> Result<T> {
        with_file_lock(&self.path, || {
            let mut table = self.load()?;
            table.prune_dead();
            let result = f(&mut table);
            write_atomic(&self.path, &serde_json::to_string_pretty(&table)?)?;
            Ok(result)
        })
    }

    /// Every occupied slot with its sessions, earliest first.
    pub fn snapshot(&self) -> Vec<(Slot, Vec<SessionId>)> {
        let mut slots: BTreeMap<Slot, Vec<SessionId>> = BTreeMap::new();
        for entry in self.read().entries {
            slots.entry(entry.slot).or_default().push(entry.session);
        }
        slots.into_iter().collect()
    }
}

impl InstanceRegistry for FileInstanceRegistry {
    fn find_occupant(&self, kind: SlotKind, index: usize) -> Option<SessionId> {
        self.read().sessions_in(Slot::new(kind, index)).next().cloned()
    }

    fn set_occupant(&self, kind: SlotKind, index: usize, occupant: Option<SessionId>) {
        let slot = Slot::new(kind, index);
        let pid = self.pid;
        let updated = self.update(|table| match occupant {
            Some(session) => {
                if !table.sessions_in(slot).any(|s| *s == session) {
                    debug!("instance {} enters {}", session, slot);
                    table.entries.push(InstanceEntry { slot, session, pid });
                }
            }
            None => table.entries.retain(|e| e.slot != slot),
        });
        if let Err(e) = updated {
            error!("failed to update {} in instance table: {:#}", slot, e);
        }
    }

    fn occupants(&self, kind: SlotKind, index: usize) -> Vec<SessionId> {
        self.read()
            .sessions_in(Slot::new(kind, index))
            .cloned()
            .collect()
    }

    fn release(&self, kind: SlotKind, index: usize, session: &SessionId) {
        let slot = Slot::new(kind, index);
        let updated = self.update(|table| {
            table
                .entries
                .retain(|e| !(e.slot == slot && e.session == *session));
        });
        match updated {
            Ok(()) => debug!("instance {} leaves {}", session, slot),
            Err(e) => error!("failed to release {} for {}: {:#}", slot, session, e),
        }
    }

    fn claim_exclusive(
        &self,
        kind: SlotKind,
        index: usize,
        session: &SessionId,
    ) -> Result<(), SessionId> {
        let slot = Slot::new(kind, index);
        let pid = self.pid;
        let claimed = self.update(|table| {
            if let Some(other) = table.sessions_in(slot).find(|s| *s != session) {
                return Err(other.clone());
            }
            if table.sessions_in(slot).next().is_none() {
                debug!("instance {} claims {}", session, slot);
                table.entries.push(InstanceEntry {
                    slot,
                    session: session.clone(),
                    pid,
                });
            }
            Ok(())
        });
        claimed.unwrap_or_else(|e| {
            error!("instance table unavailable, not reserving {}: {:#}", slot, e);
            Ok(())
        })
    }
}

/// Releases a session's slot registration when dropped.
pub struct SlotOccupancy {
    registry: Arc<dyn InstanceRegistry>,
    slot: Slot,
    session: SessionId,
}

impl SlotOccupancy {
    /// Wrap a registration that has already been made.
    pub fn held(registry: Arc<dyn InstanceRegistry>, slot: Slot, session: SessionId) -> Self {
        SlotOccupancy {
            registry,
            slot,
            session,
        }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }
}

impl Drop for SlotOccupancy {
    fn drop(&mut self) {
        self.registry
            .release(self.slot.kind, self.slot.index, &self.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SessionId {
        SessionId::from(s)
    }

    #[test]
    fn set_find_and_clear() {
        let reg = InMemoryInstanceRegistry::new();
        assert_eq!(reg.find_occupant(SlotKind::Chains, 5), None);
        reg.set_occupant(SlotKind::Chains, 5, Some(id("a")));
        reg.set_occupant(SlotKind::Chains, 5, Some(id("b")));
        reg.set_occupant(SlotKind::Chains, 5, Some(id("a")));
        assert_eq!(reg.find_occupant(SlotKind::Chains, 5), Some(id("a")));
        assert_eq!(reg.occupants(SlotKind::Chains, 5), vec![id("a"), id("b")]);
        assert_eq!(reg.find_occupant(SlotKind::Chains, 4), None);
        assert_eq!(reg.find_occupant(SlotKind::Messages, 5), None);

        reg.release(SlotKind::Chains, 5, &id("a"));
        assert_eq!(reg.find_occupant(SlotKind::Chains, 5), Some(id("b")));

        reg.set_occupant(SlotKind::Chains, 5, None);
        assert!(reg.occupants(SlotKind::Chains, 5).is_empty());
        assert_eq!(reg.find_occupant(SlotKind::Chains, 5), None);
    }

    #[test]
    fn exclusive_claim_conflicts_leave_registry_untouched() {
        let reg = InMemoryInstanceRegistry::new();
        reg.set_occupant(SlotKind::Chains, 5, Some(id("a")));
        assert_eq!(reg.claim_exclusive(SlotKind::Chains, 5, &id("b")), Err(id("a")));
        assert_eq!(reg.occupants(SlotKind::Chains, 5), vec![id("a")]);

        // re-claiming your own slot is fine
        assert_eq!(reg.claim_exclusive(SlotKind::Chains, 5, &id("a")), Ok(()));
        assert_eq!(reg.occupants(SlotKind::Chains, 5), vec![id("a")]);

        assert_eq!(reg.claim_exclusive(SlotKind::Chains, 6, &id("b")), Ok(()));
        assert_eq!(reg.find_occupant(SlotKind::Chains, 6), Some(id("b")));
    }

    #[test]
    fn occupancy_guard_releases_on_drop() {
        let reg: Arc<dyn InstanceRegistry> = InMemoryInstanceRegistry::shared();
        reg.set_occupant(SlotKind::Chains, 2, Some(id("a")));
        reg.set_occupant(SlotKind::Chains, 2, Some(id("b")));
        {
            let _held = SlotOccupancy::held(reg.clone(), Slot::chain(2), id("b"));
        }
        assert_eq!(reg.occupants(SlotKind::Chains, 2), vec![id("a")]);
    }

    #[test]
    fn only_one_of_many_racing_claims_wins() {
        let reg: Arc<dyn InstanceRegistry> = InMemoryInstanceRegistry::shared();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    reg.claim_exclusive(SlotKind::Chains, 1, &SessionId::new(format!("s{i}")))
                        .is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(reg.occupants(SlotKind::Chains, 1).len(), 1);
    }

    fn table_in(dir: &tempfile::TempDir) -> FileInstanceRegistry {
        FileInstanceRegistry::new(dir.path().join("instances.json"))
    }

    #[test]
    fn file_registry_set_find_release() {
        let dir = tempfile::tempdir().unwrap();
        let reg = table_in(&dir);
        assert_eq!(reg.find_occupant(SlotKind::Chains, 1), None);
        reg.set_occupant(SlotKind::Chains, 1, Some(id("a")));
        reg.set_occupant(SlotKind::Chains, 1, Some(id("b")));
        reg.set_occupant(SlotKind::Chains, 1, Some(id("a")));
        assert_eq!(reg.occupants(SlotKind::Chains, 1), vec![id("a"), id("b")]);
        assert_eq!(
            reg.snapshot(),
            vec![(Slot::chain(1), vec![id("a"), id("b")])]
        );

        reg.release(SlotKind::Chains, 1, &id("a"));
        assert_eq!(reg.find_occupant(SlotKind::Chains, 1), Some(id("b")));
        reg.set_occupant(SlotKind::Chains, 1, None);
        assert!(reg.snapshot().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn entries_of_exited_processes_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let gone = child.id();
        child.wait().unwrap();

        table_in(&dir)
            .with_pid(gone)
            .set_occupant(SlotKind::Chains, 3, Some(id("crashed")));

        let reg = table_in(&dir);
        assert_eq!(reg.find_occupant(SlotKind::Chains, 3), None);
        assert_eq!(reg.claim_exclusive(SlotKind::Chains, 3, &id("b")), Ok(()));
        assert_eq!(reg.occupants(SlotKind::Chains, 3), vec![id("b")]);
    }
}
