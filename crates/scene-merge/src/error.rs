use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("cannot fingerprint element content: {0}")]
    Fingerprint(#[from] scene_types::TypeError),
}

pub type MergeResult<T> = Result<T, MergeError>;
