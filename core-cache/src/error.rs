use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to (de)serialize cache payload for key '{key}': {message}")]
    Serialization { key: String, message: String },

    #[error("Cache store error: {0}")]
    Store(String),

    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
