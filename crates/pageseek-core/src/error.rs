use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot build an index over an empty corpus")]
    EmptyCorpus,

    #[error("no index has been built yet")]
    IndexNotBuilt,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("duplicate chunk id {0} in corpus")]
    DuplicateChunkId(u64),

    #[error("duplicate sequence index {0} in corpus")]
    DuplicateSequenceIndex(u64),

    #[error("index build cancelled")]
    Cancelled,

    #[error("Failed to parse JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] Box<figment::Error>),
}

pub type Result<T> = std::result::Result<T, Error>;
