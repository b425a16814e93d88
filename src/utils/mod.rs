use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::errors::{Result, TableformError};

/// Stable content fingerprint of a string, as an unsigned integer.
///
/// Takes the leading 128 bits of the SHA-256 digest. Used both to name
/// side-load tables (via the query hash) and to fingerprint table
/// definitions for storage as a warehouse label.
pub fn hash_string(input: &str) -> u128 {
    let digest = Sha256::digest(input.as_bytes());
    let mut prefix = [0u8; 16];
    prefix.copy_from_slice(&digest[..16]);
    u128::from_be_bytes(prefix)
}

/// Parses a partition value in `YYYY-MM-DD` form.
///
/// Partition values are kept as strings throughout the domain model; they
/// are only parsed where chronological comparison is required.
pub fn parse_partition_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| TableformError::InvalidPartitionDate {
        value: value.to_string(),
    })
}
