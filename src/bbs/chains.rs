//! # Chains Menu
//!
//! The external-program ("chain" or "door") menu. A session sees the catalog
//! filtered down to what its terminal, line and access level allow, picks a chain
//! by number, and the menu hands the session's line over to the door through the
//! [`Launcher`](crate::exec::Launcher).
//!
//! Before a launch the menu consults the [`InstanceRegistry`]: a single-user chain
//! already running on another instance is refused, a multi-user one offers to let
//! the caller join. The registration is dropped when the run finishes, whatever
//! the outcome.
//!
//! ```rust,no_run
//! use chainbbs::bbs::chains::ChainsMenu;
//! use chainbbs::bbs::instance::InMemoryInstanceRegistry;
//! use chainbbs::bbs::session::{Session, SessionId};
//! use chainbbs::bbs::terminal::ConsoleTerminal;
//! use chainbbs::config::Config;
//! use chainbbs::exec::Launcher;
//! use chainbbs::storage::Storage;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let storage = Storage::from_config(&config)?;
//!     let session = Session::new(SessionId::generate(), "sysop", 10);
//!     let mut menu = ChainsMenu::new(
//!         config,
//!         storage,
//!         InMemoryInstanceRegistry::shared(),
//!         Launcher::shell(),
//!         session,
//!     )?;
//!     menu.run(&mut ConsoleTerminal)
//! }
//! ```
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use super::instance::{InstanceRegistry, Slot, SlotOccupancy};
use super::roles::{AccessControl, LevelAccess};
use super::session::{Session, SessionId};
use super::terminal::Terminal;
use crate::config::Config;
use crate::exec::{CommandLine, ExecutionResult, Launcher, ProcessSpawner};
use crate::storage::catalog::{Chain, ChainCatalog};
use crate::storage::Storage;

/// One visible chain and where it lives in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    /// 0-based catalog position.
    pub catalog_index: usize,
    pub chain: Chain,
}

impl ChainEntry {
    pub fn slot(&self) -> Slot {
        Slot::chain(self.catalog_index + 1)
    }
}

/// The chains a session may pick from, in catalog order. Menu number `n` is
/// entry `n - 1`.
pub type ChainsMap = Vec<ChainEntry>;

/// Filter the catalog for a session: ANSI-only chains need an ANSI terminal,
/// local-only chains are hidden from modem callers, and the access expression
/// must admit the session.
pub fn build_chains_map(
    catalog: &ChainCatalog,
    session: &Session,
    access: &dyn AccessControl,
) -> ChainsMap {
    catalog
        .chains()
        .iter()
        .enumerate()
        .filter(|(_, c)| !(c.ansi && !session.ansi))
        .filter(|(_, c)| !(c.local_only && session.using_modem))
        .filter(|(_, c)| access.permits(session, &c.acs))
        .map(|(catalog_index, chain)| ChainEntry {
            catalog_index,
            chain: chain.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// 1-based menu number.
    Run(usize),
    Quit,
    List,
    Edit,
    Unknown,
}

/// Interpret one line typed at the chains prompt.
pub fn parse_selection(input: &str, count: usize, sysop: bool) -> Selection {
    let input = input.trim();
    match input.to_ascii_uppercase().as_str() {
        "Q" => return Selection::Quit,
        "?" => return Selection::List,
        "*" if sysop => return Selection::Edit,
        _ => {}
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Selection::Run(n),
        _ => Selection::Unknown,
    }
}

/// What happened to a chain request.
#[derive(Debug)]
pub enum RunOutcome {
    /// The door ran (or failed to start); carries the launcher's result.
    Launched(ExecutionResult),
    /// A single-user chain is held by another instance.
    Busy { occupant: SessionId },
    /// The caller chose not to join a running multi-user chain.
    Declined,
}

pub struct ChainsMenu<S> {
    config: Config,
    storage: Storage,
    registry: Arc<dyn InstanceRegistry>,
    launcher: Launcher<S>,
    access: Box<dyn AccessControl>,
    session: Session,
    catalog: ChainCatalog,
}

impl<S: ProcessSpawner> ChainsMenu<S> {
    pub fn new(
        config: Config,
        storage: Storage,
        registry: Arc<dyn InstanceRegistry>,
        launcher: Launcher<S>,
        session: Session,
    ) -> Result<Self> {
        let catalog = storage.load_catalog()?;
        Ok(ChainsMenu {
            config,
            storage,
            registry,
            launcher,
            access: Box::new(LevelAccess),
            session,
            catalog,
        })
    }

    pub fn with_access(mut self, access: Box<dyn AccessControl>) -> Self {
        self.access = access;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn catalog(&self) -> &ChainCatalog {
        &self.catalog
    }

    pub fn chains_map(&self) -> ChainsMap {
        build_chains_map(&self.catalog, &self.session, self.access.as_ref())
    }

    /// Run the menu until the caller quits or hangs up.
    pub fn run<T: Terminal>(&mut self, term: &mut T) -> Result<()> {
        let mut map = self.chains_map();
        if map.is_empty() {
            term.write_str("\r\nSorry, no external programs available.\r\n")?;
            return Ok(());
        }

        self.show_chains(term, &map)?;
        loop {
            let edit = if self.session.is_sysop() { "*=ChainEdit, " } else { "" };
            term.write_str(&format!(
                "\r\nWhich Chain (1-{}, Q=Quit, {}?=List): ",
                map.len(),
                edit
            ))?;
            let Some(line) = term.read_line()? else {
                debug!("{} hung up at chains prompt", self.session.id);
                break;
            };
            self.session.update_activity();

            match parse_selection(&line, map.len(), self.session.is_sysop()) {
                Selection::Quit => break,
                Selection::List | Selection::Unknown => self.show_chains(term, &map)?,
                Selection::Edit => {
                    self.catalog = self.storage.load_catalog()?;
                    info!(target: "sysop", "{}: reloaded chain catalog", self.session.username);
                    map = self.chains_map();
                    term.write_str(&format!(
                        "\r\nChain catalog reloaded ({} chains).\r\n",
                        self.catalog.len()
                    ))?;
                    if map.is_empty() {
                        term.write_str("Sorry, no external programs available.\r\n")?;
                        break;
                    }
                    self.show_chains(term, &map)?;
                }
                Selection::Run(n) => {
                    let entry = map[n - 1].clone();
                    self.run_chain(term, &entry)?;
                }
            }
        }
        Ok(())
    }

    pub fn show_chains<T: Terminal>(&self, term: &mut T, map: &ChainsMap) -> Result<()> {
        let mut out = String::from("\r\nExternal programs\r\n\r\n");
        if self.catalog.has_registered_chains() {
            out.push_str(&format!(
                "  Num  {:<41} {:<21} {:>5}\r\n",
                "Description", "Sponsored by", "Usage"
            ));
            for (i, entry) in map.iter().enumerate() {
                let mut sponsors = self.sponsor_names(&entry.chain).into_iter();
                let first = sponsors.next();
                out.push_str(&format!(
                    " {:>3}{} {:<41.41} {:<21.21} {:>5}\r\n",
                    i + 1,
                    multi_user_marker(&entry.chain),
                    entry.chain.description,
                    first.as_deref().unwrap_or("Available"),
                    entry.chain.usage
                ));
                for name in sponsors {
                    out.push_str(&format!("      {:<41} {:<21.21}\r\n", "", name));
                }
            }
        } else {
            for (i, entry) in map.iter().enumerate() {
                if self.config.bbs.show_chain_usage {
                    out.push_str(&format!(
                        "{:>3}{} {:<40} {:>6}\r\n",
                        i + 1,
                        multi_user_marker(&entry.chain),
                        entry.chain.description,
                        entry.chain.usage
                    ));
                } else {
                    out.push_str(&format!(
                        "{:>3}{} {}\r\n",
                        i + 1,
                        multi_user_marker(&entry.chain),
                        entry.chain.description
                    ));
                }
            }
        }
        term.write_str(&out)?;
        Ok(())
    }

    /// Display names of a chain's sponsors that still have a user record. An
    /// unresolvable first sponsor leaves the chain shown as available.
    fn sponsor_names(&self, chain: &Chain) -> Vec<String> {
        let lookup = |name: &String| match self.storage.get_user(name) {
            Ok(user) => user.map(|u| u.username),
            Err(e) => {
                warn!("sponsor {} of {} unreadable: {:#}", name, chain.description, e);
                None
            }
        };
        let mut names = Vec::new();
        let mut regby = chain.regby.iter();
        match regby.next().and_then(lookup) {
            Some(first) => names.push(first),
            None => return names,
        }
        names.extend(regby.filter_map(lookup));
        names
    }

    /// Run the chain shown as menu number `number` (1-based).
    pub fn run_chain_number<T: Terminal>(&mut self, term: &mut T, number: usize) -> Result<RunOutcome> {
        let map = self.chains_map();
        let entry = number
            .checked_sub(1)
            .and_then(|i| map.get(i))
            .cloned()
            .with_context(|| format!("no chain #{} on this menu ({} shown)", number, map.len()))?;
        self.run_chain(term, &entry)
    }

    pub fn run_chain<T: Terminal>(&mut self, term: &mut T, entry: &ChainEntry) -> Result<RunOutcome> {
        let slot = entry.slot();
        let chain = &entry.chain;
        let me = self.session.id.clone();

        if chain.multi_user {
            let other = self
                .registry
                .occupants(slot.kind, slot.index)
                .into_iter()
                .find(|s| *s != me);
            if let Some(other) = other {
                term.write_str(&format!(
                    "\r\nChain {} is in use on instance {}. Care to join in? ",
                    chain.description, other
                ))?;
                if !term.yes_no()? {
                    return Ok(RunOutcome::Declined);
                }
            }
            self.registry.set_occupant(slot.kind, slot.index, Some(me.clone()));
        } else if let Err(occupant) = self.registry.claim_exclusive(slot.kind, slot.index, &me) {
            info!("{} refused {}: held by {}", me, slot, occupant);
            term.write_str(&format!(
                "\r\nChain {} is in use on instance {}. Try again later.\r\n",
                chain.description, occupant
            ))?;
            return Ok(RunOutcome::Busy { occupant });
        }
        let _occupancy = SlotOccupancy::held(self.registry.clone(), slot, me);
        let _temp = self.storage.session_temp(&self.session.id);

        self.record_run(entry);

        let chain_file = self.storage.create_chain_file(&self.session, &self.config)?;
        let speed = self.session.modem_speed.to_string();
        let command_line = CommandLine::new(chain.filename.as_str())
            .args([
                chain_file.display().to_string(),
                speed.clone(),
                self.session.primary_port.to_string(),
                speed,
            ])
            .expand();

        let result = self.launcher.launch(&command_line, chain.exec_flags(), term);

        match &result {
            Ok(status) => info!("{} left {}: {}", self.session.username, chain.description, status),
            Err(e) => warn!("{} could not run {}: {}", self.session.username, chain.description, e),
        }

        if chain.pause {
            term.pause()?;
        }
        Ok(RunOutcome::Launched(result))
    }

    /// Usage counter, sysop log and the caller's run count. Failures here are
    /// logged; the door still runs.
    fn record_run(&mut self, entry: &ChainEntry) {
        match self.storage.increment_chain_usage(entry.catalog_index) {
            Ok(usage) => {
                if let Err(e) = self.catalog.increment_usage(entry.catalog_index) {
                    debug!("in-memory catalog out of step: {}", e);
                }
                debug!("{} usage now {}", entry.chain.description, usage);
            }
            Err(e) => warn!("failed to update usage for {}: {:#}", entry.chain.description, e),
        }

        info!(target: "sysop", "{}: !Ran \"{}\"", self.session.username, entry.chain.description);

        if let Err(e) = self.storage.record_chain_run(&self.session.username) {
            warn!("failed to count chain run for {}: {:#}", self.session.username, e);
        }
    }
}

fn multi_user_marker(chain: &Chain) -> char {
    if chain.multi_user {
        '+'
    } else {
        ' '
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbs::roles::{LEVEL_SYSOP, LEVEL_USER};

    fn catalog() -> ChainCatalog {
        let mut ansi = Chain::new("Ansi Door", "ansi");
        ansi.ansi = true;
        let mut local = Chain::new("Local Door", "local");
        local.local_only = true;
        let mut sysop = Chain::new("Sysop Door", "sysop");
        sysop.acs = "sysop".into();
        ChainCatalog::new(vec![Chain::new("Plain", "plain"), ansi, local, sysop])
    }

    fn indices(map: &ChainsMap) -> Vec<usize> {
        map.iter().map(|e| e.catalog_index).collect()
    }

    #[test]
    fn map_hides_what_the_session_cannot_use() {
        let cat = catalog();
        let local_user = Session::new(SessionId::from("a"), "u", LEVEL_USER);
        assert_eq!(indices(&build_chains_map(&cat, &local_user, &LevelAccess)), vec![0, 1, 2]);

        let modem_plain = Session::new(SessionId::from("b"), "u", LEVEL_USER)
            .remote(true)
            .with_ansi(false);
        assert_eq!(indices(&build_chains_map(&cat, &modem_plain, &LevelAccess)), vec![0]);

        let sysop = Session::new(SessionId::from("c"), "s", LEVEL_SYSOP);
        let map = build_chains_map(&cat, &sysop, &LevelAccess);
        assert_eq!(indices(&map), vec![0, 1, 2, 3]);
        assert_eq!(map[3].slot(), Slot::chain(4));
    }

    #[test]
    fn selection_parsing() {
        assert_eq!(parse_selection(" 2 ", 3, false), Selection::Run(2));
        assert_eq!(parse_selection("0", 3, false), Selection::Unknown);
        assert_eq!(parse_selection("4", 3, false), Selection::Unknown);
        assert_eq!(parse_selection("q", 3, false), Selection::Quit);
        assert_eq!(parse_selection("?", 3, false), Selection::List);
        assert_eq!(parse_selection("*", 3, false), Selection::Unknown);
        assert_eq!(parse_selection("*", 3, true), Selection::Edit);
        assert_eq!(parse_selection("lord", 3, true), Selection::Unknown);
        assert_eq!(parse_selection("", 3, true), Selection::Unknown);
    }
}
