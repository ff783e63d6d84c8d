//! Embedding vector <-> BLOB codec.
//!
//! Fixed-width little-endian f32, no header. Dimension checking happens
//! against the metadata row, not here.

use crate::error::{SqliteError, SqliteResult};

pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub fn bytes_to_vector(bytes: &[u8]) -> SqliteResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(SqliteError::Corrupt(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
