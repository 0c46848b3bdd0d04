//! Purpose: Own the connection to the index service for one `RemoteIndex`.
//! Exports: `Session`, `PlatefileIdentity`.
//! Role: Binds a private reply channel, negotiates open/create, and marshals every RPC.
//! Invariants: Reply channel names are unique per instance (`remote_index_<name>_<hex>`).
//! Invariants: Every RPC error is tagged with the method name it came from.
//! Invariants: The reply channel is unbound exactly once, when the session drops.
#![allow(clippy::result_large_err)]

use getrandom::fill as fill_random;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::transport::IndexTransport;
use super::wire::{CreateRequest, IndexMethod, OpenReply, OpenRequest};
use crate::core::error::{Error, ErrorKind};
use crate::core::index::IndexHeader;

type ApiResult<T> = Result<T, Error>;

const REPLY_CHANNEL_PREFIX: &str = "remote_index_";

/// Authoritative identity returned by the service on open/create.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlatefileIdentity {
    pub header: IndexHeader,
    pub short_name: String,
    pub full_name: String,
}

impl From<OpenReply> for PlatefileIdentity {
    fn from(reply: OpenReply) -> Self {
        Self {
            header: reply.index_header,
            short_name: reply.short_plate_filename,
            full_name: reply.full_plate_filename,
        }
    }
}

pub struct Session {
    transport: Box<dyn IndexTransport>,
    reply_channel: String,
}

impl Session {
    pub fn establish(platefile_name: &str, mut transport: Box<dyn IndexTransport>) -> ApiResult<Self> {
        let reply_channel = unique_reply_channel(platefile_name)?;
        transport.bind(&reply_channel).map_err(|err| {
            err.with_message(format!("failed to bind reply channel {reply_channel}"))
        })?;
        tracing::debug!(reply_channel = %reply_channel, "bound index reply channel");
        Ok(Self {
            transport,
            reply_channel,
        })
    }

    pub fn reply_channel(&self) -> &str {
        &self.reply_channel
    }

    pub fn open(&mut self, platefile_name: &str) -> ApiResult<PlatefileIdentity> {
        let request = OpenRequest {
            plate_name: platefile_name.to_string(),
        };
        let reply: OpenReply = self.call(IndexMethod::Open, &request)?;
        Ok(reply.into())
    }

    /// Asks the service to create a platefile. The template's id is cleared;
    /// ids are only ever assigned by the service.
    pub fn create(
        &mut self,
        platefile_name: &str,
        mut template: IndexHeader,
    ) -> ApiResult<PlatefileIdentity> {
        template.platefile_id = 0;
        let request = CreateRequest {
            plate_name: platefile_name.to_string(),
            index_header: template,
        };
        let reply: OpenReply = self.call(IndexMethod::Create, &request)?;
        Ok(reply.into())
    }

    /// Sends one request and decodes its reply. Decode failures are
    /// malformed replies and surface as `Transport` errors.
    pub fn call<T, R>(&mut self, method: IndexMethod, request: &T) -> ApiResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let body = serde_json::to_value(request).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode request")
                .with_operation(method.as_str())
                .with_source(err)
        })?;
        let reply = self
            .transport
            .call(method, body)
            .map_err(|err| err.with_operation(method.as_str()))?;
        serde_json::from_value(reply).map_err(|err| {
            Error::new(ErrorKind::Transport)
                .with_message("malformed reply")
                .with_operation(method.as_str())
                .with_source(err)
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.transport.unbind();
    }
}

fn unique_reply_channel(platefile_name: &str) -> ApiResult<String> {
    let mut bytes = [0u8; 8];
    fill_random(&mut bytes).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message(format!("failed to generate reply channel suffix: {err}"))
    })?;
    let mut name = String::with_capacity(REPLY_CHANNEL_PREFIX.len() + platefile_name.len() + 17);
    name.push_str(REPLY_CHANNEL_PREFIX);
    name.push_str(platefile_name);
    name.push('_');
    for byte in bytes {
        name.push_str(&format!("{byte:02x}"));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::unique_reply_channel;

    #[test]
    fn reply_channels_are_scoped_and_unique() {
        let first = unique_reply_channel("earth.plate").expect("name");
        let second = unique_reply_channel("earth.plate").expect("name");
        assert!(first.starts_with("remote_index_earth.plate_"));
        assert_eq!(first.len(), "remote_index_earth.plate_".len() + 16);
        assert_ne!(first, second);
    }
}
