use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Membership not found")]
    MembershipNotFound,

    #[error("No membership in this organization")]
    NotAMember,

    #[error("Permission pack not found: {0}")]
    PackNotFound(String),

    #[error("Unknown config key: {0}")]
    UnknownConfigKey(String),

    #[error("Admin role required")]
    AdminRequired,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::from(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::MembershipNotFound => {
                AppError::NotFound(anyhow::anyhow!("Membership not found"))
            }
            ServiceError::NotAMember => {
                AppError::Forbidden(anyhow::anyhow!("No membership in this organization"))
            }
            ServiceError::PackNotFound(id) => {
                AppError::NotFound(anyhow::anyhow!("Permission pack not found: {}", id))
            }
            ServiceError::UnknownConfigKey(key) => {
                AppError::NotFound(anyhow::anyhow!("Unknown config key: {}", key))
            }
            ServiceError::AdminRequired => AppError::Forbidden(anyhow::anyhow!("Admin role required")),
            ServiceError::ValidationError(e) => AppError::BadRequest(anyhow::anyhow!(e)),
        }
    }
}
