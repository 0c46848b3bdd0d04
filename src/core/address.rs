// Parsing of `pf://` platefile URLs into transport and routing fields.
use std::fmt;
use std::str::FromStr;

use url::Host;

use crate::core::error::{Error, ErrorKind};

pub const SCHEME: &str = "pf";
pub const DEFAULT_HOSTNAME: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5672;

/// A parsed platefile URL.
///
/// Accepted forms:
/// - `pf://<routing_key>/<platefile_name>` (default host and port)
/// - `pf://<host>[:<port>]/<routing_key>/<platefile_name>`
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PlatefileAddress {
    hostname: String,
    port: u16,
    routing_key: String,
    platefile_name: String,
}

impl PlatefileAddress {
    pub fn new(
        hostname: impl Into<String>,
        port: u16,
        routing_key: impl Into<String>,
        platefile_name: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            routing_key: routing_key.into(),
            platefile_name: platefile_name.into(),
        }
    }

    /// Segments are split on `/` from the raw text and kept verbatim. Nothing
    /// is percent-decoded, and `.`/`..` segments are rejected, not resolved.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let Some(rest) = raw.strip_prefix("pf://") else {
            return Err(invalid(raw, "platefile url must start with pf://"));
        };
        if rest.contains(['?', '#']) {
            return Err(invalid(raw, "platefile url must not carry a query or fragment"));
        }
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(invalid(raw, "platefile url has an empty path segment"));
        }
        if segments
            .iter()
            .any(|segment| *segment == "." || *segment == "..")
        {
            return Err(invalid(raw, "platefile url must not contain dot segments"));
        }

        match segments.as_slice() {
            [routing_key, platefile_name] => {
                if routing_key.contains('@') {
                    return Err(invalid(raw, "platefile url must not carry user info"));
                }
                if routing_key.contains(':') {
                    return Err(invalid(raw, "a port requires an explicit host segment")
                        .with_hint("Use pf://<host>:<port>/<routing_key>/<platefile_name>."));
                }
                Ok(Self::new(
                    DEFAULT_HOSTNAME,
                    DEFAULT_PORT,
                    *routing_key,
                    *platefile_name,
                ))
            }
            [authority, routing_key, platefile_name] => {
                let (hostname, port) = parse_authority(raw, authority)?;
                Ok(Self::new(hostname, port, *routing_key, *platefile_name))
            }
            _ => Err(invalid(raw, "platefile url must have 2 or 3 segments")),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn platefile_name(&self) -> &str {
        &self.platefile_name
    }
}

impl FromStr for PlatefileAddress {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl fmt::Display for PlatefileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SCHEME}://{}:{}/{}/{}",
            self.hostname, self.port, self.routing_key, self.platefile_name
        )
    }
}

/// Splits `host[:port]` (IPv6 hosts in brackets) and validates both halves.
fn parse_authority<'a>(raw: &str, authority: &'a str) -> Result<(&'a str, u16), Error> {
    if authority.contains('@') {
        return Err(invalid(raw, "platefile url must not carry user info"));
    }
    let (hostname, port) = match authority.strip_prefix('[') {
        Some(bracketed) => {
            let Some(close) = bracketed.find(']') else {
                return Err(invalid(raw, "unterminated IPv6 host"));
            };
            let after = &bracketed[close + 1..];
            let port = match after.strip_prefix(':') {
                Some(port) => Some(port),
                None if after.is_empty() => None,
                None => return Err(invalid(raw, "unexpected text after IPv6 host")),
            };
            (&authority[..close + 2], port)
        }
        None => match authority.split_once(':') {
            Some((hostname, port)) => (hostname, Some(port)),
            None => (authority, None),
        },
    };
    if hostname.is_empty() {
        return Err(invalid(raw, "platefile url is missing its host"));
    }
    Host::parse(hostname).map_err(|err| {
        invalid(raw, &format!("invalid host {hostname:?}")).with_source(err)
    })?;
    let port = match port {
        None => DEFAULT_PORT,
        Some(port) if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) => {
            return Err(invalid_port(raw, port));
        }
        Some(port) => port
            .parse::<u16>()
            .map_err(|err| invalid_port(raw, port).with_source(err))?,
    };
    Ok((hostname, port))
}

fn invalid_port(raw: &str, port: &str) -> Error {
    Error::new(ErrorKind::Argument)
        .with_message(format!("invalid port {port:?} in platefile url: {raw}"))
        .with_hint("Ports must be integers in 0..=65535.")
}

fn invalid(raw: &str, message: &str) -> Error {
    Error::new(ErrorKind::InvalidAddress).with_message(format!("{message}: {raw}"))
}
