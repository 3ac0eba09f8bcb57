//! Stateful test doubles for the table backend.
//!
//! `MockBackend` hands out `MockTable`s that report back when they are
//! dropped, so tests can assert a table was released exactly once.

use crate::error::SourceError;
use crate::source::{Counters, Policy, TableBackend, TableSource};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct MockChain {
    pub name: String,
    pub policy: Option<Policy>,
    pub refs: Result<u32, SourceError>,
    pub rules: Result<usize, SourceError>,
}

impl MockChain {
    pub fn builtin(name: &str, policy: &str, packets: u64, bytes: u64) -> Self {
        Self {
            name: name.to_string(),
            policy: Some(Policy {
                target: policy.to_string(),
                counters: Counters { packets, bytes },
            }),
            refs: Ok(0),
            rules: Ok(0),
        }
    }

    pub fn user(name: &str) -> Self {
        Self {
            name: name.to_string(),
            policy: None,
            refs: Ok(0),
            rules: Ok(0),
        }
    }

    pub fn with_refs(mut self, refs: u32) -> Self {
        self.refs = Ok(refs);
        self
    }

    pub fn failing_refs(mut self) -> Self {
        self.refs = Err(SourceError::Other("no such chain".into()));
        self
    }

    pub fn with_rules(mut self, count: usize) -> Self {
        self.rules = Ok(count);
        self
    }

    pub fn failing_rules(mut self, err: SourceError) -> Self {
        self.rules = Err(err);
        self
    }
}

#[derive(Debug)]
pub struct MockTable {
    chains: Vec<MockChain>,
    list_error: Option<SourceError>,
    released: Rc<Cell<usize>>,
}

impl MockTable {
    pub fn new(chains: Vec<MockChain>) -> Self {
        Self {
            chains,
            list_error: None,
            released: Rc::new(Cell::new(0)),
        }
    }

    fn chain(&self, name: &str) -> Option<&MockChain> {
        self.chains.iter().find(|c| c.name == name)
    }
}

impl TableSource for MockTable {
    type Rule = usize;

    fn chains(&self) -> Result<Vec<String>, SourceError> {
        match &self.list_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.chains.iter().map(|c| c.name.clone()).collect()),
        }
    }

    fn policy(&self, chain: &str) -> Option<Policy> {
        self.chain(chain).and_then(|c| c.policy.clone())
    }

    fn references(&self, chain: &str) -> Result<u32, SourceError> {
        self.chain(chain)
            .ok_or_else(|| SourceError::Other("no such chain".into()))?
            .refs
            .clone()
    }

    fn rules(&self, chain: &str) -> Result<Vec<usize>, SourceError> {
        let count = self
            .chain(chain)
            .ok_or_else(|| SourceError::Other("no such chain".into()))?
            .rules
            .clone()?;
        Ok((0..count).collect())
    }
}

impl Drop for MockTable {
    fn drop(&mut self) {
        self.released.set(self.released.get() + 1);
    }
}

#[derive(Debug, Default)]
pub struct MockBackend {
    pub chains: Vec<MockChain>,
    pub init_error: Option<SourceError>,
    pub open_error: Option<SourceError>,
    pub list_error: Option<SourceError>,
    pub opened: Rc<Cell<usize>>,
    pub released: Rc<Cell<usize>>,
}

impl MockBackend {
    pub fn new(chains: Vec<MockChain>) -> Self {
        Self {
            chains,
            ..Self::default()
        }
    }

    /// The four-chain `filter` table used across the tests
    pub fn filter() -> Self {
        Self::new(vec![
            MockChain::builtin("INPUT", "ACCEPT", 120, 9600).with_rules(10),
            MockChain::builtin("FORWARD", "DROP", 0, 0),
            MockChain::builtin("OUTPUT", "ACCEPT", 80, 6400).with_rules(1),
            MockChain::user("LOGDROP").with_refs(2).with_rules(2),
        ])
    }
}

impl TableBackend for MockBackend {
    type Table = MockTable;

    fn init(&mut self) -> Result<(), SourceError> {
        match &self.init_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn open(&self, _table: &str) -> Result<MockTable, SourceError> {
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        self.opened.set(self.opened.get() + 1);
        Ok(MockTable {
            chains: self.chains.clone(),
            list_error: self.list_error.clone(),
            released: Rc::clone(&self.released),
        })
    }
}
