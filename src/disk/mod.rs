//! the simulated disk: an image file with a master boot record at offset 0
pub mod image;
pub mod mbr;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use image::DiskImage;
pub use mbr::*;

use crate::error::{FsError, Result};

/// size unit of a disk or partition request
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    Bytes,
    #[default]
    Kilobytes,
    Megabytes,
}

impl Unit {
    pub const fn multiplier(self) -> u64 {
        match self {
            Unit::Bytes => 1,
            Unit::Kilobytes => 1024,
            Unit::Megabytes => 1024 * 1024,
        }
    }

    /// scale `amount` to bytes
    pub fn to_bytes(self, amount: u64) -> Result<u64> {
        amount
            .checked_mul(self.multiplier())
            .ok_or_else(|| FsError::InvalidParameter(format!("size {amount} is too large")))
    }
}

impl FromStr for Unit {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "B" => Ok(Unit::Bytes),
            "K" => Ok(Unit::Kilobytes),
            "M" => Ok(Unit::Megabytes),
            _ => Err(FsError::InvalidParameter(format!(
                "unit must be B, K or M, got '{s}'"
            ))),
        }
    }
}
