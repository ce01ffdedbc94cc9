use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid stream: {0}")]
    InvalidFormat(&'static str),
    #[error("compression error: {0}")]
    CompressionError(String),
    #[error("decompression error: {0}")]
    DecompressionError(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<StrataError>,
    },
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl StrataError {
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}
