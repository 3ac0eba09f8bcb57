use crate::document::ResultDocument;
use crate::error::RunError;
use crate::source::TableBackend;
use crate::traverse::{Traversal, traverse};
use tracing::{info, warn};

/// How failures surface, decided once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Run from a shell: failures print a diagnostic and skip the document
    Interactive,
    /// Run behind a web server: failures are embedded in the document
    Service,
}

impl Mode {
    /// Service mode when a CGI gateway interface is announced
    pub fn detect(gateway_interface: Option<&str>) -> Self {
        match gateway_interface {
            Some(gw) if !gw.trim().is_empty() => Mode::Service,
            _ => Mode::Interactive,
        }
    }
}

/// One snapshot request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub table: String,
    pub chain: Option<String>,
    pub pretty: bool,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            table: "filter".to_string(),
            chain: None,
            pretty: false,
        }
    }
}

/// What the sink has to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A serialized document; `error` is set when the run failed
    Document {
        body: String,
        error: Option<RunError>,
    },
    /// Interactive failure: a diagnostic line and nothing on stdout
    Abort { diagnostic: String, exit_code: i32 },
}

impl Reply {
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Document { error: None, .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Reply::Document { error: None, .. } => 0,
            Reply::Document { error: Some(err), .. } => err.exit_code(),
            Reply::Abort { exit_code, .. } => *exit_code,
        }
    }
}

/// Run one request against a backend and settle the outcome for `mode`
pub async fn dispatch<B: TableBackend>(backend: &mut B, request: &Request, mode: Mode) -> Reply {
    let mut doc = ResultDocument::new();
    let outcome = collect(backend, request, &mut doc).await;
    settle(mode, doc, outcome, request.pretty)
}

async fn collect<B: TableBackend>(
    backend: &mut B,
    request: &Request,
    doc: &mut ResultDocument,
) -> Result<Traversal, RunError> {
    backend.init().map_err(RunError::from_init)?;

    let table = backend
        .open(&request.table)
        .await
        .map_err(|e| RunError::from_open(&request.table, e))?;

    let result = traverse(&table, request.chain.as_deref(), doc);
    drop(table);
    result
}

/// The single place failures are surfaced. Also used by callers that fail
/// before a backend exists, such as an unreadable config.
pub fn settle(
    mode: Mode,
    mut doc: ResultDocument,
    outcome: Result<Traversal, RunError>,
    pretty: bool,
) -> Reply {
    match outcome {
        Ok(visited) => {
            info!(chains = visited.chains, rules = visited.rules, "snapshot complete");
            Reply::Document {
                body: doc.render(pretty),
                error: None,
            }
        }
        Err(err) => {
            warn!(error = %err, ?mode, "snapshot failed");
            match mode {
                Mode::Interactive => Reply::Abort {
                    diagnostic: err.to_string(),
                    exit_code: err.exit_code(),
                },
                Mode::Service => {
                    doc.set_error(&err.to_string());
                    Reply::Document {
                        body: doc.render(pretty),
                        error: Some(err),
                    }
                }
            }
        }
    }
}
