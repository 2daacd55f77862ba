use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::application::email::{TemplateCache, template_cache_tag};
use crate::application::repos::{
    CreateEmailTemplateParams, EmailTemplatesRepo, RepoError, UpdateEmailTemplateParams,
};
use crate::domain::email_templates::{
    EmailTemplateRecord, TemplateVariant, validate_key, validate_variants,
};
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum AdminEmailTemplateError {
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Also the shape of one element of a `templates import` file.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEmailTemplateCommand {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub variants: Vec<TemplateVariant>,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct UpdateEmailTemplateCommand {
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub variants: Vec<TemplateVariant>,
}

/// Outcome of [`AdminEmailTemplateService::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Clone)]
pub struct AdminEmailTemplateService {
    templates: Arc<dyn EmailTemplatesRepo>,
    cache: Option<Arc<TemplateCache>>,
}

impl AdminEmailTemplateService {
    pub fn new(templates: Arc<dyn EmailTemplatesRepo>) -> Self {
        Self {
            templates,
            cache: None,
        }
    }

    /// Drop a template from `cache` whenever it is written.
    pub fn with_template_cache(mut self, cache: Arc<TemplateCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn invalidate(&self, key: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate_by_tag(&template_cache_tag(key));
        }
    }

    pub async fn list(&self) -> Result<Vec<EmailTemplateRecord>, AdminEmailTemplateError> {
        self.templates
            .list_templates()
            .await
            .map_err(AdminEmailTemplateError::from)
    }

    pub async fn find(
        &self,
        key: &str,
    ) -> Result<Option<EmailTemplateRecord>, AdminEmailTemplateError> {
        self.templates
            .find_by_key(key)
            .await
            .map_err(AdminEmailTemplateError::from)
    }

    pub async fn create(
        &self,
        command: CreateEmailTemplateCommand,
    ) -> Result<EmailTemplateRecord, AdminEmailTemplateError> {
        let key = command.key.trim().to_string();
        validate_key(&key)?;
        let name = ensure_non_empty(&command.name, "name")?;
        let variants = normalize_variants(command.variants);
        validate_variants(&variants)?;

        let record = self
            .templates
            .create_template(CreateEmailTemplateParams {
                key,
                name,
                description: normalize_description(command.description),
                enabled: command.enabled,
                variants,
            })
            .await?;
        self.invalidate(&record.key);

        info!(
            template_key = %record.key,
            variants = record.variants.len(),
            "Created email template"
        );
        Ok(record)
    }

    pub async fn update(
        &self,
        key: &str,
        command: UpdateEmailTemplateCommand,
    ) -> Result<EmailTemplateRecord, AdminEmailTemplateError> {
        let name = ensure_non_empty(&command.name, "name")?;
        let variants = normalize_variants(command.variants);
        validate_variants(&variants)?;

        let record = self
            .templates
            .update_template(UpdateEmailTemplateParams {
                key: key.to_string(),
                name,
                description: normalize_description(command.description),
                enabled: command.enabled,
                variants,
            })
            .await?
            .ok_or(RepoError::NotFound)?;
        self.invalidate(&record.key);

        info!(
            template_key = %record.key,
            variants = record.variants.len(),
            "Updated email template"
        );
        Ok(record)
    }

    /// Create the template, or update it if `command.key` already exists.
    pub async fn upsert(
        &self,
        command: CreateEmailTemplateCommand,
    ) -> Result<(EmailTemplateRecord, UpsertOutcome), AdminEmailTemplateError> {
        let key = command.key.trim().to_string();
        if self.templates.find_by_key(&key).await?.is_none() {
            return Ok((self.create(command).await?, UpsertOutcome::Created));
        }

        let update = UpdateEmailTemplateCommand {
            name: command.name,
            description: command.description,
            enabled: command.enabled,
            variants: command.variants,
        };
        Ok((self.update(&key, update).await?, UpsertOutcome::Updated))
    }

    pub async fn set_enabled(
        &self,
        key: &str,
        enabled: bool,
    ) -> Result<EmailTemplateRecord, AdminEmailTemplateError> {
        let record = self
            .templates
            .set_enabled(key, enabled)
            .await?
            .ok_or(RepoError::NotFound)?;
        self.invalidate(key);
        info!(template_key = key, enabled, "Toggled email template");
        Ok(record)
    }

    pub async fn delete(&self, key: &str) -> Result<(), AdminEmailTemplateError> {
        if !self.templates.delete_template(key).await? {
            return Err(RepoError::NotFound.into());
        }
        self.invalidate(key);
        info!(template_key = key, "Deleted email template");
        Ok(())
    }
}

fn ensure_non_empty(value: &str, field: &'static str) -> Result<String, AdminEmailTemplateError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AdminEmailTemplateError::ConstraintViolation(field));
    }
    Ok(trimmed.to_string())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn normalize_variants(variants: Vec<TemplateVariant>) -> Vec<TemplateVariant> {
    variants
        .into_iter()
        .map(|mut variant| {
            variant.name = variant.name.trim().to_string();
            variant
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_description_becomes_none() {
        assert_eq!(normalize_description(Some("   ".to_string())), None);
        assert_eq!(
            normalize_description(Some(" Sent on assignment ".to_string())),
            Some("Sent on assignment".to_string())
        );
    }

    #[test]
    fn import_entry_defaults() {
        let command: CreateEmailTemplateCommand =
            serde_json::from_str(r#"{"key":"welcome","name":"Welcome"}"#).expect("parse");
        assert!(command.enabled);
        assert!(command.description.is_none());
        assert!(command.variants.is_empty());
    }

    #[test]
    fn ensure_non_empty_reports_field() {
        let err = ensure_non_empty("  ", "name").unwrap_err();
        assert!(matches!(err, AdminEmailTemplateError::ConstraintViolation("name")));
    }
}
