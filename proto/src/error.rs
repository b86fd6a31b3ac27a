use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    InvalidBase64(base64::DecodeError),
    #[error("value has invalid length")]
    InvalidLength,
    #[error("record serialization: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("unknown type url {0:?}")]
    UnknownTypeUrl(String),
}
