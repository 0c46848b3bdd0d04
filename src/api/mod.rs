//! Purpose: Define the public Rust API boundary for platefile index clients.
//! Exports: `RemoteIndex`, its options, the transport seam, and the wire message shapes.
//! Role: Public, additive-only surface over the `core` data model.
//! Invariants: All service traffic goes through `Session`, which owns the transport.
//! Invariants: Transports are pluggable; `HttpTransport` is the built-in one.

mod remote_index;
mod session;
#[cfg(test)]
mod testing;
mod transport;
pub mod wire;

pub use crate::core::address::{DEFAULT_HOSTNAME, DEFAULT_PORT, PlatefileAddress};
pub use crate::core::error::{Error, ErrorKind, to_exit_code};
pub use crate::core::index::{
    IndexHeader, IndexRecord, RecordStatus, TileCoordinate, TileHeader, TileRegion, TransactionId,
};
pub use crate::core::queue::{DEFAULT_WRITE_QUEUE_THRESHOLD, PendingWriteUpdate};
pub use remote_index::{RemoteIndex, RemoteIndexOptions};
pub use session::{PlatefileIdentity, Session};
pub use transport::{HttpTransport, IndexTransport, REPLY_CHANNEL_HEADER};
pub use wire::IndexMethod;
