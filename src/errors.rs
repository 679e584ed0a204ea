use thiserror::Error;

/// The full failure taxonomy surfaced to callers of the persistence core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid page entry format: {0}")]
    InvalidEntryFormat(String),

    #[error("instance not found")]
    InstanceNotFound,

    #[error("datastore {0:?} not found")]
    DatastoreKeyNotFound(String),

    #[error("persisted schema version is newer than this build supports")]
    IncompatibleVersion,

    #[error("no decoder registered for version {0}")]
    MissingDecoder(String),

    #[error("index {0:?} is not declared on this datastore")]
    MissingIndex(String),

    #[error("duplicate index name {0:?}")]
    DuplicateIndexName(String),

    #[error("nested write transaction under a read-only parent")]
    NestedWriteUnderReader,

    #[error("reentrant write into a persistence already held by this transaction")]
    NestedStoreWrite,

    #[error("reentrant write into a snapshot already held by this transaction")]
    NestedSnapshotWrite,

    #[error("read view used after its originating transaction ended")]
    StaleReadView,

    #[error("no application id supplied and no default store is configured")]
    BundleIdMissing,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("page {0} not found")]
    PageNotFound(String),

    #[error("manifest {0} not found")]
    ManifestNotFound(String),

    #[error("root {0} not found")]
    RootNotFound(String),

    #[error("corrupt on-disk structure: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, Error>;
