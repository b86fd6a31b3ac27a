//! Record armor. Every record the backend stores is bincode-serialized and
//! then base64-encoded, so values survive string-typed transports untouched.

use base64::{engine::general_purpose, Engine as _};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::DecodeError;

pub fn encode<T: Serialize>(record: &T) -> Result<String, DecodeError> {
    let bytes = bincode::serialize(record)?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

pub fn decode<T: DeserializeOwned>(armored: &str) -> Result<T, DecodeError> {
    let bytes = general_purpose::STANDARD.decode(armored).map_err(DecodeError::InvalidBase64)?;
    Ok(bincode::deserialize(&bytes)?)
}

/// Serialized bytes without the armor, for byte-for-byte change detection.
pub fn to_bytes<T: Serialize>(record: &T) -> Result<Vec<u8>, DecodeError> { Ok(bincode::serialize(record)?) }
