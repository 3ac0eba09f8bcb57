mod cgi;
mod config;

use clap::Parser;
use cgi::{GATEWAY_INTERFACE, QUERY_STRING, QueryParams};
use config::{Overrides, ServerConfig, Settings};
use ng_core::{Mode, PROTOCOL, Reply, ResultDocument, RunError, dispatch, settle};
use ng_ipt::IptablesSave;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "netgraph-server")]
#[command(version, about = "Firewall table snapshot as JSON, from a shell or as a CGI endpoint", long_about = None)]
struct Cli {
    /// Table to inspect
    #[arg(short, long)]
    table: Option<String>,
    /// Only report this chain
    #[arg(short, long)]
    chain: Option<String>,
    /// Inspect the IPv6 tables
    #[arg(short = '6', long)]
    ipv6: bool,
    /// Save tool to run instead of iptables-save / ip6tables-save
    #[arg(long)]
    save_binary: Option<PathBuf>,
    /// Pretty-print the document
    #[arg(long)]
    pretty: bool,
    /// Configuration file
    #[arg(long, env = "NETGRAPH_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            table: self.table.clone(),
            chain: self.chain.clone(),
            ipv6: self.ipv6,
            save_binary: self.save_binary.clone(),
            pretty: self.pretty,
        }
    }
}

fn main() -> ExitCode {
    // stdout carries the document; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .init();

    let mode = Mode::detect(std::env::var(GATEWAY_INTERFACE).ok().as_deref());
    let query = match mode {
        Mode::Service => cgi::parse_query(&std::env::var(QUERY_STRING).unwrap_or_default()),
        Mode::Interactive => QueryParams::default(),
    };

    let reply = match parse_args(mode, std::env::args_os(), &query) {
        Ok(cli) => run(&cli, mode, &query),
        Err(reply) => reply,
    };

    let stdout = io::stdout();
    let stderr = io::stderr();
    if let Err(e) = emit(mode, &reply, &mut stdout.lock(), &mut stderr.lock()) {
        eprintln!("{}: failed to write reply: {}", PROTOCOL, e);
        return ExitCode::FAILURE;
    }

    ExitCode::from(u8::try_from(reply.exit_code()).unwrap_or(1))
}

/// Parse the command line. A web server may pass query words as arguments,
/// so in service mode a bad command line becomes an error document instead
/// of a usage message.
fn parse_args<I, T>(mode: Mode, args: I, query: &QueryParams) -> Result<Cli, Reply>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(cli),
        Err(e) => match mode {
            Mode::Interactive => e.exit(),
            Mode::Service => {
                let rendered = e.to_string();
                let message = rendered.lines().next().unwrap_or_default();
                Err(setup_failure(
                    mode,
                    message.trim_start_matches("error: ").to_string(),
                    query.pretty.unwrap_or(false),
                ))
            }
        },
    }
}

fn setup_failure(mode: Mode, message: String, pretty: bool) -> Reply {
    settle(mode, ResultDocument::new(), Err(RunError::Setup(message)), pretty)
}

fn run(cli: &Cli, mode: Mode, query: &QueryParams) -> Reply {
    let config = match ServerConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let pretty = query.pretty.unwrap_or(cli.pretty);
            return setup_failure(mode, format!("{:#}", e), pretty);
        }
    };

    let settings = Settings::resolve(&config, &cli.overrides(), query);
    debug!(?mode, ?settings, "resolved settings");
    let mut backend = IptablesSave::new(settings.family);
    if let Some(binary) = settings.save_binary {
        backend = backend.with_binary(binary);
    }

    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(dispatch(&mut backend, &settings.request, mode)),
        Err(e) => setup_failure(
            mode,
            format!("Failed to start runtime: {}", e),
            settings.request.pretty,
        ),
    }
}

/// Write the reply: the document to `out`, an interactive diagnostic to `err`
fn emit<W: Write, E: Write>(
    mode: Mode,
    reply: &Reply,
    out: &mut W,
    err: &mut E,
) -> io::Result<()> {
    match (mode, reply) {
        (_, Reply::Abort { diagnostic, .. }) => {
            writeln!(err, "{}: {}", PROTOCOL, diagnostic)?;
        }
        (Mode::Interactive, Reply::Document { body, .. }) => {
            writeln!(out, "{}", body)?;
        }
        (Mode::Service, Reply::Document { .. }) => {
            cgi::write_response(out, reply)?;
        }
    }

    out.flush()
}
