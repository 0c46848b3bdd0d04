// Error model shared by address parsing, the transport, and the index client.
use std::error::Error as StdError;
use std::fmt;

use crate::core::index::{TileCoordinate, TransactionId};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    InvalidAddress,
    Argument,
    NotFound,
    TileNotFound,
    AlreadyExists,
    Transport,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    operation: Option<&'static str>,
    platefile_id: Option<i32>,
    tile: Option<TileCoordinate>,
    transaction: Option<TransactionId>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            operation: None,
            platefile_id: None,
            tile: None,
            transaction: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn operation(&self) -> Option<&'static str> {
        self.operation
    }

    pub fn platefile_id(&self) -> Option<i32> {
        self.platefile_id
    }

    pub fn tile(&self) -> Option<TileCoordinate> {
        self.tile
    }

    pub fn transaction(&self) -> Option<TransactionId> {
        self.transaction
    }

    /// Re-tags the error, keeping all context.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_operation(mut self, operation: &'static str) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn with_platefile_id(mut self, platefile_id: i32) -> Self {
        self.platefile_id = Some(platefile_id);
        self
    }

    pub fn with_tile(mut self, tile: TileCoordinate) -> Self {
        self.tile = Some(tile);
        self
    }

    pub fn with_transaction(mut self, transaction: TransactionId) -> Self {
        self.transaction = Some(transaction);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(operation) = self.operation {
            write!(f, " (operation: {operation})")?;
        }
        if let Some(platefile_id) = self.platefile_id {
            write!(f, " (platefile: {platefile_id})")?;
        }
        if let Some(tile) = self.tile {
            write!(f, " (tile: {tile})")?;
        }
        if let Some(transaction) = self.transaction {
            write!(f, " (transaction: {transaction})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Argument => 2,
        ErrorKind::InvalidAddress => 3,
        ErrorKind::NotFound => 4,
        ErrorKind::TileNotFound => 5,
        ErrorKind::AlreadyExists => 6,
        ErrorKind::Transport => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, to_exit_code};
    use crate::core::index::{TileCoordinate, TransactionId};

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Argument, 2),
            (ErrorKind::InvalidAddress, 3),
            (ErrorKind::NotFound, 4),
            (ErrorKind::TileNotFound, 5),
            (ErrorKind::AlreadyExists, 6),
            (ErrorKind::Transport, 7),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn display_includes_context() {
        let err = Error::new(ErrorKind::TileNotFound)
            .with_message("no record")
            .with_operation("read")
            .with_platefile_id(7)
            .with_tile(TileCoordinate::new(1, 2, 3))
            .with_transaction(TransactionId(9));
        assert_eq!(
            err.to_string(),
            "TileNotFound: no record (operation: read) (platefile: 7) (tile: 1,2@3) (transaction: 9)"
        );
    }

    #[test]
    fn with_kind_keeps_context() {
        let err = Error::new(ErrorKind::NotFound)
            .with_message("missing")
            .with_platefile_id(3)
            .with_kind(ErrorKind::TileNotFound);
        assert_eq!(err.kind(), ErrorKind::TileNotFound);
        assert_eq!(err.message(), Some("missing"));
        assert_eq!(err.platefile_id(), Some(3));
    }
}
