use serde::{de::DeserializeOwned, Serialize};

use crate::errors::SGError;

/// Serialization format options for grid storage and sparse grids.
///
/// Each format has both compressed (Lz4) and uncompressed variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SerializationFormat {
    /// bincode, compact binary
    Bincode,
    /// bincode with LZ4 compression (default)
    #[default]
    BincodeLz4,
}

impl SerializationFormat {
    /// Returns true if this format uses LZ4 compression
    pub fn is_compressed(&self) -> bool {
        matches!(self, SerializationFormat::BincodeLz4)
    }
}

fn serialize_bincode<T: Serialize>(data: &T) -> Result<Vec<u8>, SGError> {
    bincode::serde::encode_to_vec(data, bincode::config::standard()).map_err(|_| SGError::SerializationFailed)
}

fn deserialize_bincode<T: DeserializeOwned>(data: &[u8]) -> Result<T, SGError> {
    let (value, _read) = bincode::serde::decode_from_slice(data, bincode::config::standard())
        .map_err(|_| SGError::DeserializationFailed)?;
    Ok(value)
}

/// Serialize data to bytes using the specified format.
/// Applies LZ4 compression if the format variant ends with Lz4.
pub fn serialize<T: Serialize>(data: &T, format: SerializationFormat) -> Result<Vec<u8>, SGError> {
    let bytes = serialize_bincode(data)?;
    if format.is_compressed() {
        Ok(lz4_flex::compress_prepend_size(&bytes))
    } else {
        Ok(bytes)
    }
}

/// Deserialize data from bytes using the specified format.
/// Applies LZ4 decompression if the format variant ends with Lz4.
pub fn deserialize<T: DeserializeOwned>(data: &[u8], format: SerializationFormat) -> Result<T, SGError> {
    if format.is_compressed() {
        let decompressed = lz4_flex::decompress_size_prepended(data)
            .map_err(|_| SGError::LZ4DecompressionFailed)?;
        deserialize_bincode(&decompressed)
    } else {
        deserialize_bincode(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{GridPoint, GridStorage};

    fn sample_storage() -> GridStorage {
        let mut storage = GridStorage::new(2);
        storage.insert(GridPoint::level_one(2)).unwrap();
        storage.insert(GridPoint::new(&[2, 1], &[3, 1])).unwrap();
        storage.insert(GridPoint::new(&[1, 2], &[1, 1])).unwrap();
        storage
    }

    #[test]
    fn test_bincode_roundtrip() {
        let storage = sample_storage();
        let bytes = storage.serialize(SerializationFormat::Bincode).unwrap();
        let result = GridStorage::deserialize(&bytes, SerializationFormat::Bincode).unwrap();
        assert_eq!(result.len(), 3);
        for (point, seq) in storage.iter() {
            let p: GridPoint = point.into();
            assert_eq!(result.find(&p), Some(seq));
            assert_eq!(result.is_leaf(seq), storage.is_leaf(seq));
        }
    }

    #[test]
    fn test_bincode_lz4_roundtrip() {
        let storage = sample_storage();
        let bytes = storage.serialize(SerializationFormat::BincodeLz4).unwrap();
        let result = GridStorage::deserialize(&bytes, SerializationFormat::BincodeLz4).unwrap();
        assert_eq!(result.len(), storage.len());
        assert_eq!(result.algorithmic_dimensions(), storage.algorithmic_dimensions());
    }

    #[test]
    fn test_corrupt_input() {
        assert!(matches!(GridStorage::deserialize(&[1, 2, 3], SerializationFormat::BincodeLz4), Err(SGError::LZ4DecompressionFailed)));
        assert!(matches!(GridStorage::deserialize(&[], SerializationFormat::Bincode), Err(SGError::DeserializationFailed)));
    }
}
