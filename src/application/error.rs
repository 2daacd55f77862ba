use thiserror::Error;

use crate::{
    application::admin::email_templates::AdminEmailTemplateError,
    application::repos::RepoError, config::LoadError, domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code for the command-line tool.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::NotFound | AppError::Repo(RepoError::NotFound) => 3,
            AppError::Domain(_) | AppError::Validation(_) | AppError::Config(_) => 2,
            AppError::Infra(_) | AppError::Repo(_) | AppError::Unexpected(_) => 1,
        }
    }
}

impl From<AdminEmailTemplateError> for AppError {
    fn from(error: AdminEmailTemplateError) -> Self {
        match error {
            AdminEmailTemplateError::ConstraintViolation(field) => {
                AppError::validation(format!("`{field}` is required"))
            }
            AdminEmailTemplateError::Domain(err) => AppError::Domain(err),
            AdminEmailTemplateError::Repo(RepoError::NotFound) => AppError::NotFound,
            AdminEmailTemplateError::Repo(err) => AppError::Repo(err),
        }
    }
}
