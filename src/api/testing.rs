// In-memory transport that records every call, for unit tests.
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use super::transport::IndexTransport;
use super::wire::IndexMethod;
use crate::core::error::Error;

type Responder = Box<dyn FnMut(IndexMethod, &Value) -> Option<Result<Value, Error>> + Send>;

#[derive(Debug, Default)]
pub(crate) struct CallLog {
    pub calls: Vec<(IndexMethod, Value)>,
    pub bound: Option<String>,
    pub unbound: bool,
}

impl CallLog {
    pub fn methods(&self) -> Vec<IndexMethod> {
        self.calls.iter().map(|(method, _)| *method).collect()
    }
}

pub(crate) struct RecordingTransport {
    log: Arc<Mutex<CallLog>>,
    responder: Responder,
}

impl RecordingTransport {
    pub fn new() -> (Self, Arc<Mutex<CallLog>>) {
        Self::with_responder(|_, _| None)
    }

    /// The responder may answer any call; `None` falls back to `canned_reply`.
    pub fn with_responder<F>(responder: F) -> (Self, Arc<Mutex<CallLog>>)
    where
        F: FnMut(IndexMethod, &Value) -> Option<Result<Value, Error>> + Send + 'static,
    {
        let log = Arc::new(Mutex::new(CallLog::default()));
        let transport = Self {
            log: Arc::clone(&log),
            responder: Box::new(responder),
        };
        (transport, log)
    }
}

impl IndexTransport for RecordingTransport {
    fn bind(&mut self, reply_channel: &str) -> Result<(), Error> {
        self.log.lock().expect("log").bound = Some(reply_channel.to_string());
        Ok(())
    }

    fn call(&mut self, method: IndexMethod, request: Value) -> Result<Value, Error> {
        let reply = (self.responder)(method, &request);
        self.log.lock().expect("log").calls.push((method, request));
        reply.unwrap_or_else(|| Ok(canned_reply(method)))
    }

    fn unbind(&mut self) {
        self.log.lock().expect("log").unbound = true;
    }
}

pub(crate) fn canned_reply(method: IndexMethod) -> Value {
    match method {
        IndexMethod::Open | IndexMethod::Create => json!({
            "index_header": {
                "platefile_id": 7,
                "tile_size": 256,
                "tile_filetype": "png",
                "pixel_format": 5,
                "channel_type": 1,
                "version": 2
            },
            "short_plate_filename": "earth.plate",
            "full_plate_filename": "/plates/earth.plate"
        }),
        IndexMethod::Read => json!({
            "index_record": {"blob_id": 1, "blob_offset": 0, "size": 10, "status": "valid"}
        }),
        IndexMethod::MultiRead => json!({
            "transaction_ids": [1],
            "index_records": [{"blob_id": 1, "blob_offset": 0, "size": 10}]
        }),
        IndexMethod::WriteRequest => json!({"blob_id": 42}),
        IndexMethod::ValidTiles => json!({"tile_headers": []}),
        IndexMethod::NumLevels => json!({"num_levels": 5}),
        IndexMethod::TransactionRequest => json!({"transaction_id": 12}),
        IndexMethod::TransactionCursor => json!({"transaction_id": 11}),
        IndexMethod::WriteUpdateBatch
        | IndexMethod::WriteComplete
        | IndexMethod::TransactionComplete
        | IndexMethod::TransactionFailed => json!({}),
    }
}
