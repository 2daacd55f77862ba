//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::email_templates::{EmailTemplateRecord, TemplateVariant};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateEmailTemplateParams {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub variants: Vec<TemplateVariant>,
}

#[derive(Debug, Clone)]
pub struct UpdateEmailTemplateParams {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub variants: Vec<TemplateVariant>,
}

#[async_trait]
pub trait EmailTemplatesRepo: Send + Sync {
    /// Lookup used by rendering: disabled templates are invisible here.
    async fn find_enabled_by_key(&self, key: &str)
    -> Result<Option<EmailTemplateRecord>, RepoError>;

    async fn find_by_key(&self, key: &str) -> Result<Option<EmailTemplateRecord>, RepoError>;

    /// All templates ordered by key.
    async fn list_templates(&self) -> Result<Vec<EmailTemplateRecord>, RepoError>;

    async fn create_template(
        &self,
        params: CreateEmailTemplateParams,
    ) -> Result<EmailTemplateRecord, RepoError>;

    /// Returns `None` when no template has `params.key`.
    async fn update_template(
        &self,
        params: UpdateEmailTemplateParams,
    ) -> Result<Option<EmailTemplateRecord>, RepoError>;

    async fn set_enabled(
        &self,
        key: &str,
        enabled: bool,
    ) -> Result<Option<EmailTemplateRecord>, RepoError>;

    /// Returns whether a template was removed.
    async fn delete_template(&self, key: &str) -> Result<bool, RepoError>;
}
