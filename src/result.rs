use crate::network::DataType;

/// The result returned by most methods within the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed GeoPackage geometry binary: {0}")]
    Format(String),
    #[error("unsupported WKB geometry type {0}")]
    UnsupportedGeometryType(u32),
    #[error("schema validation failed: {0}")]
    SchemaValidation(String),
    #[error("attribute '{attribute}' is declared {expected} but the value is {actual}")]
    TypeMismatch {
        attribute: String,
        expected: DataType,
        actual: DataType,
    },
    #[error("transaction rolled back")]
    Transaction(#[source] rusqlite::Error),
    #[error("no path exists from node {start} to node {end}")]
    NoPath { start: i64, end: i64 },
    #[error("error when accessing the SQLite database")]
    Storage(#[from] rusqlite::Error),
    #[error("tried to create a geopackage that already exists")]
    CreateExisting,
    #[error("GeoPackage failed validation check when opening: {0}")]
    OpenValidation(String),
}

// Reads during geometry decoding hit end-of-buffer as an io error; surface
// it as the format error it really is
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Format(format!("truncated geometry binary: {}", err))
    }
}
