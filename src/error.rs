use thiserror::Error;

/// Errors returned by the tree-scope APIs.
#[derive(Debug, Error)]
pub enum TreeScopeError {
    #[error("{entity} already responds to {name}. Please pick another name for {kind} scope.")]
    NamingConflict {
        entity: String,
        name: String,
        kind: &'static str,
    },

    #[error("cycle detected while traversing from {id} (depth {depth})")]
    CycleDetected { id: String, depth: usize },

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("unknown parent role `{0}`")]
    UnknownRole(String),

    #[error("no scope named `{0}` has been declared")]
    UnknownScope(String),

    #[error("invalid hierarchy descriptor: {0}")]
    InvalidDescriptor(String),
}

impl TreeScopeError {
    pub fn invalid_descriptor(detail: impl Into<String>) -> Self {
        Self::InvalidDescriptor(detail.into())
    }

    pub(crate) fn cycle(id: &impl std::fmt::Debug, depth: usize) -> Self {
        Self::CycleDetected {
            id: format!("{id:?}"),
            depth,
        }
    }
}
