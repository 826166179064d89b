use thiserror::Error;

/// Crate-wide error type. The reducer and heal scanner never let these
/// escape to a caller (§7): they log and continue. Only store open/migrate
/// failures and engine-stream failures are meant to propagate to `main`.
#[derive(Error, Debug)]
pub enum HealthmonError {
    #[error("store I/O error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("schema migration failed: {0}")]
    Migration(String),

    #[error("engine stream error: {0}")]
    EngineStream(String),

    #[error("inspect failed for {id}: {source}")]
    Inspect {
        id: String,
        #[source]
        source: bollard::errors::Error,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("notifier error: {0}")]
    Notify(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HealthmonError>;
