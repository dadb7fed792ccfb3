//! Test doubles & fixtures shared by the integration tests.
#![allow(dead_code)] // each test binary uses a different subset

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chainbbs::bbs::terminal::Terminal;
use chainbbs::config::Config;
use chainbbs::exec::{ProcessSpawner, RawStatus, RemoteIo, SpawnError, WaitError};
use chainbbs::storage::catalog::{Chain, ChainCatalog};
use chainbbs::storage::Storage;

/// Terminal fed from a script of input lines; records output and transport calls.
#[derive(Debug, Default)]
pub struct ScriptedTerminal {
    input: VecDeque<String>,
    pub output: String,
    pub closes: usize,
    pub opens: usize,
}

impl ScriptedTerminal {
    pub fn new(lines: &[&str]) -> Self {
        ScriptedTerminal {
            input: lines.iter().map(|l| l.to_string()).collect(),
            ..Default::default()
        }
    }
}

impl RemoteIo for ScriptedTerminal {
    fn close(&mut self, _temporary: bool) {
        self.closes += 1;
    }

    fn open(&mut self) -> io::Result<()> {
        self.opens += 1;
        Ok(())
    }
}

impl Terminal for ScriptedTerminal {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.output.push_str(text);
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.input.pop_front())
    }
}

/// Bare transport that only counts close/open calls.
#[derive(Debug, Default)]
pub struct CountingIo {
    pub closes: usize,
    pub opens: usize,
}

impl RemoteIo for CountingIo {
    fn close(&mut self, _temporary: bool) {
        self.closes += 1;
    }

    fn open(&mut self) -> io::Result<()> {
        self.opens += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SpawnCalls {
    pub spawns: AtomicUsize,
    pub waits: AtomicUsize,
    pub command_lines: Mutex<Vec<String>>,
}

impl SpawnCalls {
    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }

    pub fn last_command_line(&self) -> Option<String> {
        self.command_lines.lock().unwrap().last().cloned()
    }
}

/// Scripted process spawner; never touches the OS.
#[derive(Debug, Clone)]
pub struct MockSpawner {
    pub calls: Arc<SpawnCalls>,
    fail_spawn: bool,
    fail_wait: bool,
    interrupts: Arc<AtomicUsize>,
    status: i32,
}

impl MockSpawner {
    /// Spawns succeed and the child exits with raw status `status`.
    pub fn exiting(status: i32) -> Self {
        MockSpawner {
            calls: Arc::new(SpawnCalls::default()),
            fail_spawn: false,
            fail_wait: false,
            interrupts: Arc::new(AtomicUsize::new(0)),
            status,
        }
    }

    pub fn failing_spawn() -> Self {
        MockSpawner {
            fail_spawn: true,
            ..Self::exiting(0)
        }
    }

    pub fn failing_wait() -> Self {
        MockSpawner {
            fail_wait: true,
            ..Self::exiting(0)
        }
    }

    /// The first `n` waits report an interrupted wait.
    pub fn interrupted(mut self, n: usize) -> Self {
        self.interrupts = Arc::new(AtomicUsize::new(n));
        self
    }
}

impl ProcessSpawner for MockSpawner {
    type Child = ();

    fn spawn(&self, command_line: &str) -> Result<(), SpawnError> {
        self.calls.spawns.fetch_add(1, Ordering::SeqCst);
        self.calls
            .command_lines
            .lock()
            .unwrap()
            .push(command_line.to_string());
        if self.fail_spawn {
            return Err(SpawnError(io::Error::new(
                io::ErrorKind::Other,
                "Resource temporarily unavailable",
            )));
        }
        Ok(())
    }

    fn wait(&self, _child: &mut ()) -> Result<RawStatus, WaitError> {
        self.calls.waits.fetch_add(1, Ordering::SeqCst);
        if self
            .interrupts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(WaitError::Interrupted);
        }
        if self.fail_wait {
            return Err(WaitError::Failed(io::Error::new(
                io::ErrorKind::Other,
                "No child processes",
            )));
        }
        Ok(RawStatus::from_raw(self.status))
    }
}

/// Temp data directory with a saved catalog, plus a config pointing at it.
pub fn data_dir_with(chains: Vec<Chain>) -> (tempfile::TempDir, Config, Storage) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut config = Config::default();
    config.storage.data_dir = tmp.path().to_string_lossy().to_string();
    let storage = Storage::from_config(&config).expect("storage");
    storage
        .save_catalog(&ChainCatalog::new(chains))
        .expect("save catalog");
    (tmp, config, storage)
}
