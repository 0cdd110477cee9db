use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Unsupported file type: {0} (allowed: JPEG, PNG, WebP)")]
    UnsupportedType(String),

    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("File is empty")]
    Empty,
}

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Invalid key bytes")]
    InvalidKeyBytes,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Key file error: {0}")]
    KeyFile(String),
}
