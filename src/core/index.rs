// Platefile index data model: header, tile addressing, versions, and records.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Platefile-level metadata returned by the index service on open/create.
///
/// `platefile_id` is assigned by the service and stays 0 until then.
/// `pixel_format` and `channel_type` are opaque codes owned by the image layer.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexHeader {
    #[serde(default)]
    pub platefile_id: i32,
    pub tile_size: u32,
    pub tile_filetype: String,
    pub pixel_format: i32,
    pub channel_type: i32,
    #[serde(default)]
    pub version: i32,
}

impl IndexHeader {
    pub fn new(tile_size: u32, tile_filetype: impl Into<String>) -> Self {
        Self {
            platefile_id: 0,
            tile_size,
            tile_filetype: tile_filetype.into(),
            pixel_format: 0,
            channel_type: 0,
            version: 0,
        }
    }

    pub fn with_pixel_format(mut self, pixel_format: i32) -> Self {
        self.pixel_format = pixel_format;
        self
    }

    pub fn with_channel_type(mut self, channel_type: i32) -> Self {
        self.channel_type = channel_type;
        self
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct TileCoordinate {
    pub col: u32,
    pub row: u32,
    pub level: u32,
}

impl TileCoordinate {
    pub fn new(col: u32, row: u32, level: u32) -> Self {
        Self { col, row, level }
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}@{}", self.col, self.row, self.level)
    }
}

/// A platefile version. Id 0 never carries data.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TransactionId(pub i32);

impl TransactionId {
    pub fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for TransactionId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Valid,
    Locked,
    Invalid,
    #[serde(other)]
    Unknown,
}

/// Where one version of one tile lives in blob storage.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub blob_id: i32,
    pub blob_offset: u64,
    pub size: u64,
    #[serde(default)]
    pub status: RecordStatus,
}

impl IndexRecord {
    pub fn new(blob_id: i32, blob_offset: u64, size: u64) -> Self {
        Self {
            blob_id,
            blob_offset,
            size,
            status: RecordStatus::Valid,
        }
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TileHeader {
    pub col: u32,
    pub row: u32,
    pub level: u32,
    pub transaction_id: TransactionId,
    pub filetype: String,
}

impl TileHeader {
    pub fn new(
        coord: TileCoordinate,
        transaction_id: TransactionId,
        filetype: impl Into<String>,
    ) -> Self {
        Self {
            col: coord.col,
            row: coord.row,
            level: coord.level,
            transaction_id,
            filetype: filetype.into(),
        }
    }

    pub fn coordinate(&self) -> TileCoordinate {
        TileCoordinate::new(self.col, self.row, self.level)
    }
}

/// Axis-aligned box of tiles: min corner plus extent.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TileRegion {
    pub col: u32,
    pub row: u32,
    pub width: u32,
    pub height: u32,
}

impl TileRegion {
    pub fn new(col: u32, row: u32, width: u32, height: u32) -> Self {
        Self {
            col,
            row,
            width,
            height,
        }
    }

    /// Every tile of a `level` pyramid level (2^level tiles per side).
    pub fn full_level(level: u32) -> Self {
        let side = 1u32.checked_shl(level).unwrap_or(u32::MAX);
        Self::new(0, 0, side, side)
    }

    pub fn contains(&self, col: u32, row: u32) -> bool {
        let col = u64::from(col);
        let row = u64::from(row);
        col >= u64::from(self.col)
            && col < u64::from(self.col) + u64::from(self.width)
            && row >= u64::from(self.row)
            && row < u64::from(self.row) + u64::from(self.height)
    }
}
