use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Payment or promo-code admission was refused before any work started.
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The workflow definition could not be located or parsed.
    #[error("Workflow template unavailable: {0}")]
    TemplateUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
