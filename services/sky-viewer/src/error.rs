//! Error types for the sky viewer bootstrap pipeline

/// Errors that can occur while bootstrapping or driving the viewer
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load visualization module: {0}")]
    Load(String),

    #[error("Viewer factory not found in module")]
    FactoryNotFound,

    #[error("Backend initialization failed: {0}")]
    BackendInit(String),

    #[error("Viewer creation failed: {0}")]
    Creation(String),

    #[error("Viewer creation failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("Viewer instance does not support {0}")]
    Unsupported(&'static str),

    #[error("Viewer instance call failed: {0}")]
    Instance(String),

    #[error("Host error: {0}")]
    Host(String),

    #[error("Viewer was torn down")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for viewer operations
pub type Result<T> = std::result::Result<T, ViewerError>;
