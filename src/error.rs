use thiserror::Error;

/// Failures that escape the ingest pipeline.
///
/// Malformed-but-readable exports never produce one of these: the pipeline
/// logs and substitutes empty tables instead. Only input that cannot be
/// read as text at all is rejected.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("input '{filename}' is not text ({reason})")]
    Undecodable { filename: String, reason: String },
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write tsv: {0}")]
    Csv(#[from] csv::Error),
}
