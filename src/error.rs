use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("login rejected with status {status}: {message}")]
    #[diagnostic(help("check COL_USER and COL_PASS"))]
    Auth { status: u16, message: String },

    #[error("login request failed: {0}")]
    AuthHttp(String),

    #[error("{context}: request failed: {message}")]
    Http { context: String, message: String },

    #[error("{context}: server returned status {status}: {message}")]
    #[diagnostic(help("rerun to resume; pages already fetched are replayed from the cache"))]
    Status {
        status: u16,
        context: String,
        message: String,
    },

    #[error("only {retrieved} of {total} name usages were returned")]
    CountMismatch { retrieved: usize, total: u64 },

    #[error("{context}: missing required field `{field}`")]
    MalformedRecord { context: String, field: String },

    #[error("{context}: unreadable response: {message}")]
    MalformedResponse { context: String, message: String },

    #[error("dataset {0} was referenced by a usage but never resolved")]
    UnknownDataset(String),

    #[error("missing configuration value: {0}")]
    #[diagnostic(help("set it in the environment or in clb-export.json"))]
    MissingConfig(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("replay cache error: {0}")]
    Cache(String),

    #[error("failed to write table {table}: {message}")]
    Table { table: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("import failed: {0}")]
    Import(String),
}
