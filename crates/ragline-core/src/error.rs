//! Error taxonomy shared by every ragline crate.
//!
//! Every expected failure is relabelled into one of the [`ErrorKind`] domains
//! with a short context prefix; the original error text is kept verbatim after
//! the prefix. Precondition violations are reported separately through
//! [`Precondition`] and are raised before any I/O happens.

use std::error::Error as StdError;
use std::fmt::Debug;
use std::path::PathBuf;

use thiserror::Error;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure domain of a wrapped error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Root category, used by the retrieval pipeline itself.
    Rag,
    DocumentProcessing,
    Index,
    Query,
    Embedding,
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error("{context}: {source}")]
    Rag { context: &'static str, source: BoxError },

    #[error("{context}: {source}")]
    DocumentProcessing { context: &'static str, source: BoxError },

    #[error("{context}: {source}")]
    Index { context: &'static str, source: BoxError },

    #[error("{context}: {source}")]
    Query { context: &'static str, source: BoxError },

    #[error("{context}: {source}")]
    Embedding { context: &'static str, source: BoxError },

    #[error(transparent)]
    Precondition(#[from] Precondition),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A required state was missing when an operation was invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("Index cannot be None")]
    MissingIndex,

    #[error("Pipeline not initialized")]
    PipelineNotInitialized,

    #[error("No index to save. Create an index first.")]
    NoIndexToSave,

    #[error("No index loaded. Create or load an index first.")]
    NoIndexLoaded,

    #[error("Index storage path {} does not exist", .0.display())]
    StorageNotFound(PathBuf),

    #[error("Embedding model not loaded. Call load_model first.")]
    ModelNotLoaded,
}

pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    pub fn new(kind: ErrorKind, context: &'static str, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        match kind {
            ErrorKind::Rag => Self::Rag { context, source },
            ErrorKind::DocumentProcessing => Self::DocumentProcessing { context, source },
            ErrorKind::Index => Self::Index { context, source },
            ErrorKind::Query => Self::Query { context, source },
            ErrorKind::Embedding => Self::Embedding { context, source },
        }
    }

    /// The failure domain, or `None` for precondition and configuration errors.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Rag { .. } => Some(ErrorKind::Rag),
            Self::DocumentProcessing { .. } => Some(ErrorKind::DocumentProcessing),
            Self::Index { .. } => Some(ErrorKind::Index),
            Self::Query { .. } => Some(ErrorKind::Query),
            Self::Embedding { .. } => Some(ErrorKind::Embedding),
            Self::Precondition(_) | Self::InvalidConfig(_) => None,
        }
    }

    /// Finds the precondition at the root of this error, if there is one.
    pub fn precondition(&self) -> Option<&Precondition> {
        if let Self::Precondition(p) = self {
            return Some(p);
        }
        let mut current = self.source();
        while let Some(err) = current {
            if let Some(p) = err.downcast_ref::<Precondition>() {
                return Some(p);
            }
            if let Some(Self::Precondition(p)) = err.downcast_ref::<Self>() {
                return Some(p);
            }
            current = err.source();
        }
        None
    }
}

/// Relabels an expected failure into the ragline taxonomy.
///
/// The full underlying error (including any backtrace `anyhow` captured) is
/// logged before relabelling.
pub trait ResultExt<T> {
    fn wrap_as(self, kind: ErrorKind, context: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<BoxError> + Debug,
{
    fn wrap_as(self, kind: ErrorKind, context: &'static str) -> Result<T> {
        self.map_err(|err| {
            tracing::error!(?kind, "{context}: {err:?}");
            RagError::new(kind, context, err)
        })
    }
}
