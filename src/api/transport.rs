//! Purpose: Carry index RPCs between a `RemoteIndex` session and the index service.
//! Exports: `IndexTransport` (the seam), `HttpTransport` (JSON over HTTP via ureq).
//! Role: Request/reply delivery only; message shapes live in `wire`, policy in `RemoteIndex`.
//! Invariants: One `call` is one blocking request and one reply; no retries at this layer.
//! Invariants: Service error envelopes map onto `ErrorKind`; I/O failures map to `Transport`.
#![allow(clippy::result_large_err)]

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::wire::IndexMethod;
use crate::core::address::PlatefileAddress;
use crate::core::error::{Error, ErrorKind};

type ApiResult<T> = Result<T, Error>;

pub const REPLY_CHANNEL_HEADER: &str = "X-Reply-Channel";

/// Delivers one request to the index service and blocks for its reply.
///
/// Implementations must be usable from whichever thread owns the
/// `RemoteIndex`, hence the `Send` bound.
pub trait IndexTransport: Send {
    /// Binds the private channel that replies for this client are routed to.
    fn bind(&mut self, reply_channel: &str) -> ApiResult<()> {
        let _ = reply_channel;
        Ok(())
    }

    fn call(&mut self, method: IndexMethod, request: Value) -> ApiResult<Value>;

    /// Releases the reply channel. Called once when the session is dropped.
    fn unbind(&mut self) {}
}

/// `IndexTransport` that posts JSON requests to
/// `http://<host>:<port>/v0/index/<routing_key>/<method>`.
pub struct HttpTransport {
    base_url: Url,
    routing_key: String,
    reply_channel: Option<String>,
    token: Option<String>,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: RemoteError,
}

#[derive(Deserialize)]
struct RemoteError {
    kind: String,
    message: Option<String>,
    hint: Option<String>,
}

impl HttpTransport {
    pub fn connect(address: &PlatefileAddress) -> ApiResult<Self> {
        let base_url = base_url_for(address)?;
        Ok(Self {
            base_url,
            routing_key: address.routing_key().to_string(),
            reply_channel: None,
            token: None,
            agent: ureq::AgentBuilder::new().build(),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::AgentBuilder::new().timeout(timeout).build();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn method_url(&self, method: IndexMethod) -> ApiResult<Url> {
        build_url(
            &self.base_url,
            &["v0", "index", &self.routing_key, method.as_str()],
        )
    }

    fn request(&self, url: &Url) -> ureq::Request {
        let mut request = self
            .agent
            .post(url.as_str())
            .set("Accept", "application/json")
            .set("Content-Type", "application/json");
        if let Some(channel) = &self.reply_channel {
            request = request.set(REPLY_CHANNEL_HEADER, channel);
        }
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        request
    }
}

impl IndexTransport for HttpTransport {
    fn bind(&mut self, reply_channel: &str) -> ApiResult<()> {
        self.reply_channel = Some(reply_channel.to_string());
        Ok(())
    }

    fn call(&mut self, method: IndexMethod, request: Value) -> ApiResult<Value> {
        let url = self.method_url(method)?;
        let payload = serde_json::to_string(&request).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode request json")
                .with_source(err)
        })?;
        match self.request(&url).send_string(&payload) {
            Ok(resp) => read_json_response(resp),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Transport)
                .with_message("request failed")
                .with_source(err)),
        }
    }

    fn unbind(&mut self) {
        self.reply_channel = None;
    }
}

fn base_url_for(address: &PlatefileAddress) -> ApiResult<Url> {
    let raw = format!("http://{}:{}/", address.hostname(), address.port());
    Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::InvalidAddress)
            .with_message(format!("host is not reachable over http: {}", address.hostname()))
            .with_source(err)
    })
}

fn build_url(base_url: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Internal).with_message("index base url cannot be a base")
        })?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn read_json_response(response: ureq::Response) -> ApiResult<Value> {
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Transport)
            .with_message("failed to read reply body")
            .with_source(err)
    })?;
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Transport)
            .with_message("invalid reply json")
            .with_source(err)
    })
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
        return error_from_remote(envelope.error);
    }
    let kind = error_kind_from_status(status);
    Error::new(kind).with_message(format!("index service error status {status}"))
}

fn error_from_remote(remote: RemoteError) -> Error {
    let mut err = Error::new(parse_error_kind(&remote.kind));
    if let Some(message) = remote.message {
        err = err.with_message(message);
    }
    if let Some(hint) = remote.hint {
        err = err.with_hint(hint);
    }
    err
}

pub(crate) fn parse_error_kind(kind: &str) -> ErrorKind {
    match kind {
        "Internal" => ErrorKind::Internal,
        "InvalidAddress" => ErrorKind::InvalidAddress,
        "Argument" => ErrorKind::Argument,
        "NotFound" => ErrorKind::NotFound,
        "TileNotFound" => ErrorKind::TileNotFound,
        "AlreadyExists" => ErrorKind::AlreadyExists,
        "Transport" => ErrorKind::Transport,
        _ => ErrorKind::Internal,
    }
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 413 | 422 => ErrorKind::Argument,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::AlreadyExists,
        _ => ErrorKind::Transport,
    }
}
