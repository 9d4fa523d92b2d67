#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("local store schema is invalid or corrupt")]
    Corrupt,
    #[error("local store was written by a newer promptsync (schema_version={found}, supported={supported})")]
    NewerSchema { found: u32, supported: u32 },
    #[error("local store is already open in another process")]
    DatabaseAlreadyOpen,
    #[error("store lock poisoned")]
    Poisoned,
    #[error("invalid key: {0:?}")]
    InvalidKey(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Any redb failure, tagged with the step that produced it.
    #[error("redb {step} failed: {source}")]
    Backend {
        step: &'static str,
        #[source]
        source: Box<redb::Error>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    Corrupt,
    NewerSchema,
    Busy,
    InvalidKey,
    Io,
    Codec,
    Backend,
}

impl StorageError {
    pub fn kind(&self) -> StorageErrorKind {
        match self {
            StorageError::Corrupt => StorageErrorKind::Corrupt,
            StorageError::NewerSchema { .. } => StorageErrorKind::NewerSchema,
            StorageError::DatabaseAlreadyOpen => StorageErrorKind::Busy,
            StorageError::InvalidKey(_) => StorageErrorKind::InvalidKey,
            StorageError::Io(_) => StorageErrorKind::Io,
            StorageError::Serde(_) => StorageErrorKind::Codec,
            StorageError::Poisoned | StorageError::Backend { .. } => StorageErrorKind::Backend,
        }
    }

    fn backend(step: &'static str, err: impl Into<redb::Error>) -> Self {
        StorageError::Backend {
            step,
            source: Box::new(err.into()),
        }
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(value: redb::DatabaseError) -> Self {
        match value {
            redb::DatabaseError::DatabaseAlreadyOpen => Self::DatabaseAlreadyOpen,
            other => Self::backend("open", other),
        }
    }
}

macro_rules! redb_step {
    ($($ty:ty => $step:literal),* $(,)?) => {
        $(
            impl From<$ty> for StorageError {
                fn from(value: $ty) -> Self {
                    Self::backend($step, value)
                }
            }
        )*
    };
}

redb_step! {
    redb::Error => "operation",
    redb::TransactionError => "transaction",
    redb::TableError => "table",
    redb::StorageError => "storage",
    redb::CommitError => "commit",
}
