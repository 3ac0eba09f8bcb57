use ng_core::{PROTOCOL, Reply};
use std::io::{self, Write};

pub const GATEWAY_INTERFACE: &str = "GATEWAY_INTERFACE";
pub const QUERY_STRING: &str = "QUERY_STRING";

/// Request parameters carried in a CGI query string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub table: Option<String>,
    pub chain: Option<String>,
    pub pretty: Option<bool>,
}

/// Parse `table`, `chain` and `pretty` out of a form-urlencoded query.
/// Unknown keys are ignored and empty values count as absent.
pub fn parse_query(query: &str) -> QueryParams {
    let mut params = QueryParams::default();

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "table" => params.table = Some(value.into_owned()),
            "chain" => params.chain = Some(value.into_owned()),
            "pretty" => params.pretty = Some(matches!(value.as_ref(), "1" | "true" | "yes")),
            _ => {}
        }
    }

    params
}

fn server_string() -> String {
    format!("{}/{}", PROTOCOL, env!("CARGO_PKG_VERSION"))
}

/// Write a complete non-parsed-header response for a service-mode reply.
/// An abort has no body; the caller reports it on stderr instead.
pub fn write_response<W: Write>(out: &mut W, reply: &Reply) -> io::Result<()> {
    let Reply::Document { body, .. } = reply else {
        return Ok(());
    };

    let (code, reason) = if reply.is_success() {
        (200, "OK")
    } else {
        (500, "Application Error")
    };

    write!(out, "HTTP/1.1 {} {}\r\n", code, reason)?;
    write!(out, "Server: {}\r\n", server_string())?;
    write!(out, "Content-Type: application/json\r\n")?;
    write!(out, "Content-Length: {}\r\n", body.len())?;
    write!(out, "\r\n")?;
    out.write_all(body.as_bytes())
}
