//! Chain catalog: the ordered list of door programs offered on the chains menu.
//!
//! Persisted as `chains.json`:
//!
//! ```json
//! { "chains": [ { "filename": "doors/lord %1", "description": "Legend of the Red Dragon",
//!                 "ansi": true, "multi_user": false, "usage": 12 } ] }
//! ```
//!
//! Order is significant: a chain's 1-based position is its number and its instance
//! slot index.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exec::ExecutionFlags;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    /// Command line template; see [`crate::exec::CommandLine`].
    pub filename: String,
    pub description: String,
    /// Only offered to ANSI-capable terminals.
    #[serde(default)]
    pub ansi: bool,
    /// Hidden from remote (modem) sessions.
    #[serde(default)]
    pub local_only: bool,
    /// Several sessions may run this chain at once.
    #[serde(default)]
    pub multi_user: bool,
    /// Pause the screen after the door exits.
    #[serde(default)]
    pub pause: bool,
    /// Access expression checked before the chain is listed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub acs: String,
    /// Usernames of the sponsors who registered this door.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regby: Vec<String>,
    #[serde(default)]
    pub usage: u32,
    #[serde(default)]
    pub fossil: bool,
    #[serde(default)]
    pub comio: bool,
    #[serde(default)]
    pub local_console_cp437: bool,
}

impl Chain {
    pub fn new(description: impl Into<String>, filename: impl Into<String>) -> Self {
        Chain {
            filename: filename.into(),
            description: description.into(),
            ansi: false,
            local_only: false,
            multi_user: false,
            pause: false,
            acs: String::new(),
            regby: Vec::new(),
            usage: 0,
            fossil: false,
            comio: false,
            local_console_cp437: false,
        }
    }

    pub fn is_registered(&self) -> bool {
        !self.regby.is_empty()
    }

    pub fn exec_flags(&self) -> ExecutionFlags {
        let mut flags = ExecutionFlags::empty();
        flags.set(ExecutionFlags::FOSSIL, self.fossil);
        flags.set(ExecutionFlags::COMIO, self.comio);
        flags.set(ExecutionFlags::LOCAL_CONSOLE_CP437, self.local_console_cp437);
        flags
    }
}

impl From<&Chain> for ExecutionFlags {
    fn from(chain: &Chain) -> Self {
        chain.exec_flags()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("no chain at index {index} (catalog has {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCatalog {
    #[serde(default)]
    chains: Vec<Chain>,
}

impl ChainCatalog {
    pub fn new(chains: Vec<Chain>) -> Self {
        ChainCatalog { chains }
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Chain at 0-based `index`.
    pub fn at(&self, index: usize) -> Result<&Chain, CatalogError> {
        self.chains.get(index).ok_or(CatalogError::IndexOutOfRange {
            index,
            len: self.chains.len(),
        })
    }

    pub fn has_registered_chains(&self) -> bool {
        self.chains.iter().any(Chain::is_registered)
    }

    /// Bump the usage counter of the chain at `index`; returns the new count.
    pub fn increment_usage(&mut self, index: usize) -> Result<u32, CatalogError> {
        let len = self.chains.len();
        let chain = self
            .chains
            .get_mut(index)
            .ok_or(CatalogError::IndexOutOfRange { index, len })?;
        chain.usage = chain.usage.saturating_add(1);
        Ok(chain.usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_flags_follow_descriptor_bits() {
        let mut c = Chain::new("Door", "door");
        assert!(c.exec_flags().is_empty());
        c.fossil = true;
        c.local_console_cp437 = true;
        assert_eq!(
            c.exec_flags(),
            ExecutionFlags::FOSSIL | ExecutionFlags::LOCAL_CONSOLE_CP437
        );
        assert_eq!(ExecutionFlags::from(&c), c.exec_flags());
    }

    #[test]
    fn usage_increment_and_bounds() {
        let mut cat = ChainCatalog::new(vec![Chain::new("A", "a"), Chain::new("B", "b")]);
        assert_eq!(cat.increment_usage(1), Ok(1));
        assert_eq!(cat.increment_usage(1), Ok(2));
        assert_eq!(cat.at(1).unwrap().usage, 2);
        assert_eq!(cat.at(0).unwrap().usage, 0);
        assert_eq!(
            cat.increment_usage(2),
            Err(CatalogError::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn sparse_json_uses_defaults() {
        let cat: ChainCatalog = serde_json::from_str(
            r#"{"chains":[{"filename":"doors/lord %1","description":"LORD","regby":["alice"]}]}"#,
        )
        .unwrap();
        let c = cat.at(0).unwrap();
        assert!(!c.multi_user && !c.ansi && !c.pause);
        assert_eq!(c.usage, 0);
        assert!(cat.has_registered_chains());
    }
}
