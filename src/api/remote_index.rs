//! Purpose: Client for a remote platefile index: reads, batched writes, and transactions.
//! Exports: `RemoteIndex`, `RemoteIndexOptions`.
//! Role: Enforces flush-before-operation ordering on top of a `Session`.
//! Invariants: Queued updates are flushed before any read, query, write-complete,
//! Invariants: or transaction call except `transaction_cursor`; `write_request` never flushes.
//! Invariants: `platefile_id` is fixed by the service at open/create and never changes.
//! Invariants: Dropping the index makes one best-effort flush of anything still queued.
#![allow(clippy::result_large_err)]

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::session::{PlatefileIdentity, Session};
use super::transport::{HttpTransport, IndexTransport};
use super::wire::{
    Ack, IndexMethod, MultiReadReply, MultiReadRequest, NumLevelsReply, NumLevelsRequest,
    ReadReply, ReadRequest, TransactionComplete, TransactionCursorReply,
    TransactionCursorRequest, TransactionFailed, TransactionReply, TransactionRequest,
    ValidTilesReply, ValidTilesRequest, WriteComplete, WriteReply, WriteRequest,
    WriteUpdateBatch,
};
use crate::core::address::PlatefileAddress;
use crate::core::error::{Error, ErrorKind};
use crate::core::index::{
    IndexHeader, IndexRecord, TileCoordinate, TileHeader, TileRegion, TransactionId,
};
use crate::core::queue::{DEFAULT_WRITE_QUEUE_THRESHOLD, PendingWriteUpdate, WriteQueue};

type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteIndexOptions {
    pub write_queue_threshold: usize,
    pub token: Option<String>,
    pub timeout: Option<Duration>,
}

impl RemoteIndexOptions {
    pub fn new() -> Self {
        Self {
            write_queue_threshold: DEFAULT_WRITE_QUEUE_THRESHOLD,
            token: None,
            timeout: None,
        }
    }

    pub fn with_write_queue_threshold(mut self, threshold: usize) -> Self {
        self.write_queue_threshold = threshold;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn validate(&self) -> ApiResult<()> {
        if self.write_queue_threshold == 0 {
            return Err(Error::new(ErrorKind::Argument)
                .with_message("write queue threshold must be greater than zero")
                .with_hint("Use 1 to send every update immediately."));
        }
        Ok(())
    }

    fn http_transport(&self, address: &PlatefileAddress) -> ApiResult<HttpTransport> {
        let mut transport = HttpTransport::connect(address)?;
        if let Some(token) = &self.token {
            transport = transport.with_token(token.clone());
        }
        if let Some(timeout) = self.timeout {
            transport = transport.with_timeout(timeout);
        }
        Ok(transport)
    }
}

impl Default for RemoteIndexOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A platefile index living behind the index service.
///
/// Not internally synchronized: state-changing calls take `&mut self`, so
/// share an instance across threads behind a `Mutex`.
pub struct RemoteIndex {
    address: PlatefileAddress,
    session: Session,
    identity: PlatefileIdentity,
    platefile_id: i32,
    queue: WriteQueue,
}

impl RemoteIndex {
    /// Opens an existing platefile over HTTP.
    pub fn open(url: &str) -> ApiResult<Self> {
        Self::open_with_options(url, RemoteIndexOptions::default())
    }

    pub fn open_with_options(url: &str, options: RemoteIndexOptions) -> ApiResult<Self> {
        options.validate()?;
        let address = PlatefileAddress::parse(url)?;
        let transport = options.http_transport(&address)?;
        Self::open_with_transport(address, Box::new(transport), options)
    }

    /// Creates a new platefile over HTTP from a header template.
    pub fn create(url: &str, header: IndexHeader) -> ApiResult<Self> {
        Self::create_with_options(url, header, RemoteIndexOptions::default())
    }

    pub fn create_with_options(
        url: &str,
        header: IndexHeader,
        options: RemoteIndexOptions,
    ) -> ApiResult<Self> {
        options.validate()?;
        let address = PlatefileAddress::parse(url)?;
        let transport = options.http_transport(&address)?;
        Self::create_with_transport(address, Box::new(transport), header, options)
    }

    pub fn open_with_transport(
        address: PlatefileAddress,
        transport: Box<dyn IndexTransport>,
        options: RemoteIndexOptions,
    ) -> ApiResult<Self> {
        options.validate()?;
        let mut session = Session::establish(address.platefile_name(), transport)?;
        let identity = session.open(address.platefile_name())?;
        tracing::info!(
            platefile = %address.platefile_name(),
            platefile_id = identity.header.platefile_id,
            "opened remote platefile"
        );
        Ok(Self::from_parts(address, session, identity, &options))
    }

    pub fn create_with_transport(
        address: PlatefileAddress,
        transport: Box<dyn IndexTransport>,
        header: IndexHeader,
        options: RemoteIndexOptions,
    ) -> ApiResult<Self> {
        options.validate()?;
        let mut session = Session::establish(address.platefile_name(), transport)?;
        let identity = session.create(address.platefile_name(), header)?;
        tracing::info!(
            platefile = %address.platefile_name(),
            platefile_id = identity.header.platefile_id,
            "created remote platefile"
        );
        Ok(Self::from_parts(address, session, identity, &options))
    }

    fn from_parts(
        address: PlatefileAddress,
        session: Session,
        identity: PlatefileIdentity,
        options: &RemoteIndexOptions,
    ) -> Self {
        Self {
            platefile_id: identity.header.platefile_id,
            address,
            session,
            identity,
            queue: WriteQueue::new(options.write_queue_threshold),
        }
    }

    // ----- header accessors -----

    pub fn address(&self) -> &PlatefileAddress {
        &self.address
    }

    pub fn reply_channel(&self) -> &str {
        self.session.reply_channel()
    }

    pub fn index_header(&self) -> &IndexHeader {
        &self.identity.header
    }

    pub fn platefile_id(&self) -> i32 {
        self.platefile_id
    }

    pub fn version(&self) -> i32 {
        self.identity.header.version
    }

    pub fn tile_size(&self) -> u32 {
        self.identity.header.tile_size
    }

    pub fn tile_filetype(&self) -> &str {
        &self.identity.header.tile_filetype
    }

    pub fn pixel_format(&self) -> i32 {
        self.identity.header.pixel_format
    }

    pub fn channel_type(&self) -> i32 {
        self.identity.header.channel_type
    }

    /// Full platefile name as reported by the service.
    pub fn platefile_name(&self) -> &str {
        &self.identity.full_name
    }

    pub fn short_platefile_name(&self) -> &str {
        &self.identity.short_name
    }

    pub fn pending_writes(&self) -> usize {
        self.queue.len()
    }

    // ----- write batching -----

    /// Sends every queued update in one batch. No-op when nothing is queued.
    ///
    /// If the batch is rejected the updates stay queued, in order, ahead of
    /// anything queued afterwards.
    pub fn flush(&mut self) -> ApiResult<()> {
        if self.queue.is_empty() {
            return Ok(());
        }
        let request = WriteUpdateBatch {
            write_updates: self.queue.drain(),
        };
        tracing::debug!(
            platefile_id = self.platefile_id,
            updates = request.write_updates.len(),
            threshold = self.queue.threshold(),
            "flushing write queue"
        );
        match self.rpc::<_, Ack>(IndexMethod::WriteUpdateBatch, &request) {
            Ok(_) => Ok(()),
            Err(err) => {
                self.queue.restore(request.write_updates);
                Err(err)
            }
        }
    }

    // ----- reads and queries -----

    pub fn read(
        &mut self,
        coord: TileCoordinate,
        transaction_id: TransactionId,
        exact_match: bool,
    ) -> ApiResult<IndexRecord> {
        self.flush()?;
        let request = ReadRequest {
            platefile_id: self.platefile_id,
            col: coord.col,
            row: coord.row,
            level: coord.level,
            transaction_id,
            exact_transaction_match: exact_match,
        };
        let reply: ReadReply = self
            .rpc(IndexMethod::Read, &request)
            .map_err(|err| tile_error(err, coord, transaction_id))?;
        Ok(reply.index_record)
    }

    /// Every version of one tile within `[begin, end]`, in the order the
    /// service returns them.
    pub fn multi_read(
        &mut self,
        coord: TileCoordinate,
        begin: TransactionId,
        end: TransactionId,
    ) -> ApiResult<Vec<(TransactionId, IndexRecord)>> {
        ensure_range(begin, end, "multi_read")?;
        self.flush()?;
        let request = MultiReadRequest {
            platefile_id: self.platefile_id,
            col: coord.col,
            row: coord.row,
            level: coord.level,
            begin_transaction_id: begin,
            end_transaction_id: end,
        };
        let reply: MultiReadReply = self
            .rpc(IndexMethod::MultiRead, &request)
            .map_err(|err| tile_error(err, coord, begin))?;
        if reply.transaction_ids.len() != reply.index_records.len() {
            return Err(Error::new(ErrorKind::Transport)
                .with_message(format!(
                    "malformed reply: {} transaction ids for {} records",
                    reply.transaction_ids.len(),
                    reply.index_records.len()
                ))
                .with_operation(IndexMethod::MultiRead.as_str())
                .with_platefile_id(self.platefile_id)
                .with_tile(coord));
        }
        Ok(reply
            .transaction_ids
            .into_iter()
            .zip(reply.index_records)
            .collect())
    }

    /// Tiles in `region` at `level` with at least `min_num_matches` valid
    /// records inside `[begin, end]`.
    pub fn valid_tiles(
        &mut self,
        level: u32,
        region: TileRegion,
        begin: TransactionId,
        end: TransactionId,
        min_num_matches: u32,
    ) -> ApiResult<Vec<TileHeader>> {
        ensure_range(begin, end, "valid_tiles")?;
        self.flush()?;
        let request = ValidTilesRequest {
            platefile_id: self.platefile_id,
            level,
            region_col: region.col,
            region_row: region.row,
            region_width: region.width,
            region_height: region.height,
            begin_transaction_id: begin,
            end_transaction_id: end,
            min_num_matches,
        };
        let reply: ValidTilesReply = self.rpc(IndexMethod::ValidTiles, &request)?;
        Ok(reply.tile_headers)
    }

    pub fn num_levels(&mut self) -> ApiResult<u32> {
        self.flush()?;
        let request = NumLevelsRequest {
            platefile_id: self.platefile_id,
        };
        let reply: NumLevelsReply = self.rpc(IndexMethod::NumLevels, &request)?;
        Ok(reply.num_levels)
    }

    // ----- three-phase write -----

    /// Phase 1: reserve `size` bytes of blob storage. Returns the blob id
    /// the payload must be written to.
    pub fn write_request(&mut self, size: u64) -> ApiResult<i32> {
        let request = WriteRequest {
            platefile_id: self.platefile_id,
            size,
        };
        let reply: WriteReply = self.rpc(IndexMethod::WriteRequest, &request)?;
        Ok(reply.blob_id)
    }

    /// Phase 2: stage the index entry for a tile just written.
    ///
    /// The update is queued before any threshold flush runs. If that flush
    /// fails the error is returned but the update stays queued and goes out
    /// with the next flush, so do not call `write_update` again for it. The
    /// queue is unbounded while the service keeps rejecting batches.
    pub fn write_update(&mut self, header: TileHeader, record: IndexRecord) -> ApiResult<()> {
        let due = self.queue.push(PendingWriteUpdate {
            platefile_id: self.platefile_id,
            header,
            record,
        });
        if due {
            self.flush()?;
        }
        Ok(())
    }

    /// Phase 3: release the blob, finalized up to `blob_offset`.
    pub fn write_complete(&mut self, blob_id: i32, blob_offset: u64) -> ApiResult<()> {
        self.flush()?;
        let request = WriteComplete {
            platefile_id: self.platefile_id,
            blob_id,
            blob_offset,
        };
        let _: Ack = self.rpc(IndexMethod::WriteComplete, &request)?;
        Ok(())
    }

    // ----- transactions -----

    pub fn transaction_request(
        &mut self,
        description: &str,
        id_override: Option<TransactionId>,
    ) -> ApiResult<TransactionId> {
        self.flush()?;
        let request = TransactionRequest {
            platefile_id: self.platefile_id,
            description: description.to_string(),
            transaction_id_override: id_override,
        };
        let reply: TransactionReply = self.rpc(IndexMethod::TransactionRequest, &request)?;
        tracing::debug!(
            platefile_id = self.platefile_id,
            transaction_id = reply.transaction_id.get(),
            "opened transaction"
        );
        Ok(reply.transaction_id)
    }

    pub fn transaction_complete(
        &mut self,
        transaction_id: TransactionId,
        update_read_cursor: bool,
    ) -> ApiResult<()> {
        self.flush()?;
        let request = TransactionComplete {
            platefile_id: self.platefile_id,
            transaction_id,
            update_read_cursor,
        };
        let _: Ack = self
            .rpc(IndexMethod::TransactionComplete, &request)
            .map_err(|err| err.with_transaction(transaction_id))?;
        Ok(())
    }

    pub fn transaction_failed(&mut self, transaction_id: TransactionId) -> ApiResult<()> {
        self.flush()?;
        let request = TransactionFailed {
            platefile_id: self.platefile_id,
            transaction_id,
        };
        let _: Ack = self
            .rpc(IndexMethod::TransactionFailed, &request)
            .map_err(|err| err.with_transaction(transaction_id))?;
        Ok(())
    }

    /// Newest transaction visible to non-exact reads. Only committed state
    /// matters here, so the write queue is left alone.
    pub fn transaction_cursor(&mut self) -> ApiResult<TransactionId> {
        let request = TransactionCursorRequest {
            platefile_id: self.platefile_id,
        };
        let reply: TransactionCursorReply = self.rpc(IndexMethod::TransactionCursor, &request)?;
        Ok(reply.transaction_id)
    }

    fn rpc<T, R>(&mut self, method: IndexMethod, request: &T) -> ApiResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let platefile_id = self.platefile_id;
        tracing::debug!(method = method.as_str(), platefile_id, "index rpc");
        self.session
            .call(method, request)
            .map_err(|err| err.with_platefile_id(platefile_id))
    }
}

impl Drop for RemoteIndex {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            tracing::warn!(
                platefile_id = self.platefile_id,
                dropped = self.queue.len(),
                error = %err,
                "failed to flush write queue on close"
            );
        }
    }
}

fn tile_error(err: Error, coord: TileCoordinate, transaction_id: TransactionId) -> Error {
    let err = err.with_tile(coord).with_transaction(transaction_id);
    if err.kind() == ErrorKind::NotFound {
        err.with_kind(ErrorKind::TileNotFound)
    } else {
        err
    }
}

fn ensure_range(begin: TransactionId, end: TransactionId, operation: &'static str) -> ApiResult<()> {
    if begin > end {
        return Err(Error::new(ErrorKind::Argument)
            .with_message(format!("transaction range is reversed: {begin} > {end}"))
            .with_operation(operation));
    }
    Ok(())
}
