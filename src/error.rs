use crate::orchestration::RecalcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<RecalcError> for AppError {
    fn from(err: RecalcError) -> Self {
        match err {
            RecalcError::Db(e) => AppError::Database(e),
        }
    }
}

impl AppError {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("{} {}", kind, id))
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        AppError::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::not_found("trade", "t-1").to_string(),
            "Not found: trade t-1"
        );
        assert_eq!(
            AppError::invalid("fill size must be positive").to_string(),
            "Invalid input: fill size must be positive"
        );
    }

    #[test]
    fn test_recalc_error_maps_to_database() {
        let err: AppError = RecalcError::Db(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, AppError::Database(sqlx::Error::RowNotFound)));
    }
}
