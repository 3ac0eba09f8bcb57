use crate::error::SourceError;
use std::future::Future;

/// Packet and byte counters of a chain's policy slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub packets: u64,
    pub bytes: u64,
}

/// Default policy of a builtin chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub target: String,
    pub counters: Counters,
}

/// Read access to one opened firewall table.
///
/// Dropping the value closes the table, so a handle is released exactly once
/// whichever way the run ends.
pub trait TableSource {
    /// Opaque rule handle. Rule contents are never decoded.
    type Rule;

    /// Chain names in the table's native order
    fn chains(&self) -> Result<Vec<String>, SourceError>;

    /// Default policy and counters, or `None` for a user-defined chain
    fn policy(&self, chain: &str) -> Option<Policy>;

    /// Number of jumps into the chain from elsewhere in the table
    fn references(&self, chain: &str) -> Result<u32, SourceError>;

    /// Rules of the chain, first to last
    fn rules(&self, chain: &str) -> Result<Vec<Self::Rule>, SourceError>;
}

/// Opens tables by name
pub trait TableBackend {
    type Table: TableSource;

    /// Prepare the firewall subsystem before the first open
    fn init(&mut self) -> Result<(), SourceError>;

    fn open(&self, table: &str) -> impl Future<Output = Result<Self::Table, SourceError>>;
}
