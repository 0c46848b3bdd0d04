//! Purpose: Define the request/reply message shapes of the index RPC service.
//! Exports: `IndexMethod` plus one serde struct per request and reply.
//! Role: Single source of truth for field names on the wire; transports carry these as JSON.
//! Invariants: Every request after open/create carries the service-assigned `platefile_id`.
//! Invariants: Multi-read replies use parallel arrays that must be the same length.

use serde::{Deserialize, Serialize};

use crate::core::index::{IndexHeader, IndexRecord, TileHeader, TransactionId};
use crate::core::queue::PendingWriteUpdate;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum IndexMethod {
    Open,
    Create,
    Read,
    MultiRead,
    WriteRequest,
    WriteUpdateBatch,
    WriteComplete,
    ValidTiles,
    NumLevels,
    TransactionRequest,
    TransactionComplete,
    TransactionFailed,
    TransactionCursor,
}

impl IndexMethod {
    pub const ALL: [IndexMethod; 13] = [
        IndexMethod::Open,
        IndexMethod::Create,
        IndexMethod::Read,
        IndexMethod::MultiRead,
        IndexMethod::WriteRequest,
        IndexMethod::WriteUpdateBatch,
        IndexMethod::WriteComplete,
        IndexMethod::ValidTiles,
        IndexMethod::NumLevels,
        IndexMethod::TransactionRequest,
        IndexMethod::TransactionComplete,
        IndexMethod::TransactionFailed,
        IndexMethod::TransactionCursor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IndexMethod::Open => "open",
            IndexMethod::Create => "create",
            IndexMethod::Read => "read",
            IndexMethod::MultiRead => "multi_read",
            IndexMethod::WriteRequest => "write_request",
            IndexMethod::WriteUpdateBatch => "write_update_batch",
            IndexMethod::WriteComplete => "write_complete",
            IndexMethod::ValidTiles => "valid_tiles",
            IndexMethod::NumLevels => "num_levels",
            IndexMethod::TransactionRequest => "transaction_request",
            IndexMethod::TransactionComplete => "transaction_complete",
            IndexMethod::TransactionFailed => "transaction_failed",
            IndexMethod::TransactionCursor => "transaction_cursor",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.as_str() == name)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenRequest {
    pub plate_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRequest {
    pub plate_name: String,
    pub index_header: IndexHeader,
}

/// Reply to both open and create.
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenReply {
    pub index_header: IndexHeader,
    pub short_plate_filename: String,
    pub full_plate_filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadRequest {
    pub platefile_id: i32,
    pub col: u32,
    pub row: u32,
    pub level: u32,
    pub transaction_id: TransactionId,
    pub exact_transaction_match: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadReply {
    pub index_record: IndexRecord,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MultiReadRequest {
    pub platefile_id: i32,
    pub col: u32,
    pub row: u32,
    pub level: u32,
    pub begin_transaction_id: TransactionId,
    pub end_transaction_id: TransactionId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MultiReadReply {
    pub transaction_ids: Vec<TransactionId>,
    pub index_records: Vec<IndexRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteRequest {
    pub platefile_id: i32,
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteReply {
    pub blob_id: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteUpdateBatch {
    pub write_updates: Vec<PendingWriteUpdate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteComplete {
    pub platefile_id: i32,
    pub blob_id: i32,
    pub blob_offset: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidTilesRequest {
    pub platefile_id: i32,
    pub level: u32,
    pub region_col: u32,
    pub region_row: u32,
    pub region_width: u32,
    pub region_height: u32,
    pub begin_transaction_id: TransactionId,
    pub end_transaction_id: TransactionId,
    pub min_num_matches: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidTilesReply {
    pub tile_headers: Vec<TileHeader>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NumLevelsRequest {
    pub platefile_id: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NumLevelsReply {
    pub num_levels: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub platefile_id: i32,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id_override: Option<TransactionId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionReply {
    pub transaction_id: TransactionId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionComplete {
    pub platefile_id: i32,
    pub transaction_id: TransactionId,
    pub update_read_cursor: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionFailed {
    pub platefile_id: i32,
    pub transaction_id: TransactionId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionCursorRequest {
    pub platefile_id: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionCursorReply {
    pub transaction_id: TransactionId,
}

/// Reply body for methods that only acknowledge.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Ack {}
