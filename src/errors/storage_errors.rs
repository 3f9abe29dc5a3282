use thiserror::Error;

/// Drive level failures surfaced by the object layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageError {
    #[error("file not found")]
    FileNotFound,

    #[error("file version not found")]
    FileVersionNotFound,

    #[error("volume not found")]
    VolumeNotFound,
}
