use thiserror::Error;

/// xtables exit status for a resource problem; callers may retry on it
pub const RESOURCE_PROBLEM: i32 = 4;
/// Exit status for every other failure
pub const OTHER_PROBLEM: i32 = 1;

/// libiptc's text for ENOENT
pub const NO_SUCH_CHAIN: &str = "No chain/target/match by that name";

/// Failures reported by a table backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The firewall subsystem itself is unusable
    #[error("{0}")]
    Setup(String),

    /// Temporary condition such as a held xtables lock
    #[error("Resource temporarily unavailable: {0}")]
    Busy(String),

    #[error("{0}")]
    Other(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Busy(_))
    }
}

/// Why a run failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("{0}")]
    Setup(String),

    #[error("failed to initialize iptables table '{table}': {source}")]
    TableOpen {
        table: String,
        #[source]
        source: SourceError,
    },

    #[error("{}", not_found_message(.chain.as_deref()))]
    NotFound { chain: Option<String> },

    #[error("{0}")]
    Transient(SourceError),

    #[error("{0}")]
    Enumeration(SourceError),
}

fn not_found_message(chain: Option<&str>) -> String {
    match chain {
        Some(chain) => format!("{}: {}", chain, NO_SUCH_CHAIN),
        None => NO_SUCH_CHAIN.to_string(),
    }
}

impl RunError {
    /// Map a failed backend `init` onto the run taxonomy
    pub fn from_init(err: SourceError) -> Self {
        match err {
            err @ SourceError::Busy(_) => RunError::Transient(err),
            SourceError::Setup(reason) | SourceError::Other(reason) => RunError::Setup(reason),
        }
    }

    /// Map a failed `open` onto the run taxonomy
    pub fn from_open(table: &str, err: SourceError) -> Self {
        match err {
            SourceError::Setup(reason) => RunError::Setup(reason),
            err @ SourceError::Busy(_) => RunError::Transient(err),
            err @ SourceError::Other(_) => RunError::TableOpen {
                table: table.to_string(),
                source: err,
            },
        }
    }

    /// Map a failed chain or rule query onto the run taxonomy
    pub fn from_query(err: SourceError) -> Self {
        if err.is_transient() {
            RunError::Transient(err)
        } else {
            RunError::Enumeration(err)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, RunError::Transient(_))
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_transient() {
            RESOURCE_PROBLEM
        } else {
            OTHER_PROBLEM
        }
    }
}
