//! Error types for Quiver operations

use crate::EntityType;
use thiserror::Error;
use uuid::Uuid;

/// Relational storage errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type} '{key}' in tenant '{tenant}'")]
    NotFound {
        entity_type: EntityType,
        tenant: String,
        key: String,
    },

    #[error("Tool '{name}' already exists in tenant '{tenant}' with id {existing_id}")]
    DuplicateTool {
        name: String,
        tenant: String,
        existing_id: Uuid,
    },

    #[error("Insert failed for {entity_type}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Update failed for {entity_type} '{key}': {reason}")]
    UpdateFailed {
        entity_type: EntityType,
        key: String,
        reason: String,
    },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Database error: {reason}")]
    Database { reason: String },

    #[error("Connection pool error: {reason}")]
    Pool { reason: String },

    #[error("Row decode failed for column {column}: {reason}")]
    Decode { column: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Graph mirror errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// The graph service could not be reached.
    #[error("Graph service unavailable: {reason}")]
    Unavailable { reason: String },

    /// The graph service rejected a statement.
    #[error("Graph query failed [{code}]: {message}")]
    Query { code: String, message: String },

    /// The graph service answered with something we could not interpret.
    #[error("Invalid graph response: {reason}")]
    InvalidResponse { reason: String },

    /// The caller asked for something that cannot be expressed in the graph.
    #[error("Invalid graph input: {reason}")]
    InvalidInput { reason: String },

    #[error("Graph lock poisoned")]
    LockPoisoned,
}

impl GraphError {
    /// Connection and graph-side failures are expected in production and are
    /// tolerated on write paths. Everything else points at a bug.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GraphError::Unavailable { .. } | GraphError::Query { .. })
    }
}

/// LLM provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No LLM provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: i64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Embedding failed: {reason}")]
    EmbeddingFailed { reason: String },

    #[error("Chain analysis failed: {reason}")]
    AnalysisFailed { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("{entity_type} '{key}' belongs to tenant '{actual}', not '{expected}'")]
    TenantMismatch {
        entity_type: EntityType,
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Skill '{skill}' has no resolvable tools")]
    EmptyToolChain { skill: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Provider not supported: {provider}")]
    ProviderNotSupported { provider: String },
}

/// Vector operation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VectorError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: i32, got: i32 },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },
}

/// Registry operation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Result limit must be at least 1, got {requested}")]
    InvalidLimit { requested: usize },

    #[error("Unknown sync target: {target}")]
    UnknownSyncTarget { target: String },
}

/// Master error type for all Quiver errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuiverError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl QuiverError {
    /// Existing tool id when this is a duplicate-tool registration.
    pub fn duplicate_tool_id(&self) -> Option<Uuid> {
        match self {
            QuiverError::Storage(StorageError::DuplicateTool { existing_id, .. }) => {
                Some(*existing_id)
            }
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QuiverError::Storage(StorageError::NotFound { .. }))
    }
}

/// Result type alias for Quiver operations.
pub type QuiverResult<T> = Result<T, QuiverError>;

// =============================================================================
// TESTS
// =============================================================================
