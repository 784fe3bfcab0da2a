use std::sync::Arc;
use thiserror::Error;

/// Result type alias using RepoError
pub type Result<T> = std::result::Result<T, RepoError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Repositories surface exactly two kinds to ordinary callers: `Technical`
/// for anything the database client rejected, and `IllegalState` for updates
/// that target a record which is missing or has no id. The remaining kinds
/// cover configuration, migrations and programming mistakes in a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoErrorKind {
    /// Underlying database failure (constraint, connectivity, SQL syntax)
    Technical,
    /// Update of a null or non-existent entity
    IllegalState,
    /// Caller supplied something the query layer cannot express
    InvalidInput,
    Config,
    Io,
    Serialization,
    Internal,
}

impl RepoErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            RepoErrorKind::Technical => "ERR_TECHNICAL",
            RepoErrorKind::IllegalState => "ERR_ILLEGAL_STATE",
            RepoErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            RepoErrorKind::Config => "ERR_CONFIG",
            RepoErrorKind::Io => "ERR_IO",
            RepoErrorKind::Serialization => "ERR_SERIALIZATION",
            RepoErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Canonical structured error type
///
/// Carries a classification, a human-readable message, optional operation
/// context, and the original cause (usually a `rusqlite::Error`).
#[derive(Debug, Clone)]
pub struct RepoError {
    kind: RepoErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    message: String,
    cause: Option<Cause>,
}

impl RepoError {
    /// Create a new error with the specified kind
    pub fn new(kind: RepoErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            message: String::new(),
            cause: None,
        }
    }

    /// Shorthand for a technical failure with a message
    pub fn technical(message: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::Technical).with_message(message)
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity ID context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach the original cause
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn kind(&self) -> RepoErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the original cause, if any
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn is_technical(&self) -> bool {
        self.kind == RepoErrorKind::Technical
    }

    pub fn is_illegal_state(&self) -> bool {
        self.kind == RepoErrorKind::IllegalState
    }
}

impl std::fmt::Display for RepoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, " caused by: {}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain failures raised by the mapping and query layers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApimError {
    /// Update called with a record whose id is empty
    #[error("Failed to update {entity} without id")]
    UpdateWithoutId { entity: &'static str },

    /// Update targeted a row that does not exist
    #[error("No {entity} found with id [{id}]")]
    NotFoundForUpdate { entity: &'static str, id: String },

    /// Record lacks a field required to create or patch it
    #[error("{entity} to create or update must have {missing}")]
    IncompleteEntity {
        entity: &'static str,
        missing: &'static str,
    },

    /// A lookup expected at most one row and found several
    #[error("More than one {entity} was found for {detail}")]
    AmbiguousResult { entity: &'static str, detail: String },

    /// IN-clause requested for an empty collection
    #[error("Cannot build an IN clause from an empty collection")]
    EmptyInClause,

    /// Identifier failed validation
    #[error("Invalid SQL identifier: '{ident}'")]
    InvalidIdentifier { ident: String },

    /// Caller-supplied sort field does not name a mapped column
    #[error("Unknown sort field '{field}' for table {table}")]
    UnknownSortField { field: String, table: String },

    /// Stored text does not name a variant of the target enum
    #[error("Invalid value '{value}' for {type_name}")]
    InvalidEnumValue {
        type_name: &'static str,
        value: String,
    },

    /// Two descriptors share a column name
    #[error("Duplicate column '{column}' in mapping for {table}")]
    DuplicateColumn { column: String, table: String },

    /// The id column is not part of the descriptor list
    #[error("Id column '{column}' is not mapped for {table}")]
    MissingIdColumn { column: String, table: String },
}

impl ApimError {
    /// Kind this failure is reported under
    pub fn kind(&self) -> RepoErrorKind {
        match self {
            ApimError::UpdateWithoutId { .. }
            | ApimError::NotFoundForUpdate { .. }
            | ApimError::IncompleteEntity { .. } => RepoErrorKind::IllegalState,
            ApimError::AmbiguousResult { .. } => RepoErrorKind::Technical,
            ApimError::EmptyInClause
            | ApimError::InvalidIdentifier { .. }
            | ApimError::UnknownSortField { .. } => RepoErrorKind::InvalidInput,
            ApimError::InvalidEnumValue { .. } => RepoErrorKind::Serialization,
            ApimError::DuplicateColumn { .. } | ApimError::MissingIdColumn { .. } => {
                RepoErrorKind::Internal
            }
        }
    }
}

impl From<ApimError> for RepoError {
    fn from(err: ApimError) -> Self {
        let base = RepoError::new(err.kind()).with_message(err.to_string());
        match &err {
            ApimError::NotFoundForUpdate { id, .. } => base.with_entity_id(id.clone()),
            _ => base,
        }
    }
}
