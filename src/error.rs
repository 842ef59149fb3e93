use thiserror::Error;

/// Library-level error type. Configuration failures are raised before any
/// alignment work starts; everything else a worker meets is handled locally.
#[derive(Error, Debug)]
pub enum PlastError {
    #[error("no Karlin-Altschul parameters for {matrix} with gap costs open={open} extend={extend}")]
    GlobalParametersFailure {
        matrix: String,
        open: i32,
        extend: i32,
    },

    #[error("unknown scoring matrix '{0}'")]
    UnknownMatrix(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("sequence {index} not found in {database} database")]
    SequenceNotFound { database: &'static str, index: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Index(String),
}

impl From<bincode::Error> for PlastError {
    fn from(err: bincode::Error) -> Self {
        PlastError::Index(err.to_string())
    }
}

impl PlastError {
    /// True for errors caused by user-supplied settings.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PlastError::GlobalParametersFailure { .. } | PlastError::UnknownMatrix(_) | PlastError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PlastError>;
