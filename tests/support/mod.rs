//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use skprod::application::repos::{
    CreateEmailTemplateParams, EmailTemplatesRepo, RepoError, UpdateEmailTemplateParams,
};
use skprod::domain::email_templates::{
    EmailTemplateRecord, LocaleContent, LocaleMap, TemplateVariant,
};
use time::OffsetDateTime;
use uuid::Uuid;

/// `EmailTemplatesRepo` over a vector, with the unique-key rule of the table.
#[derive(Default)]
pub struct InMemoryTemplates {
    records: Mutex<Vec<EmailTemplateRecord>>,
    enabled_lookups: AtomicUsize,
}

impl InMemoryTemplates {
    pub fn with(records: Vec<EmailTemplateRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            enabled_lookups: AtomicUsize::new(0),
        }
    }

    /// How many times the renderer path hit the store.
    pub fn enabled_lookups(&self) -> usize {
        self.enabled_lookups.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> Vec<EmailTemplateRecord> {
        self.records.lock().expect("templates lock").clone()
    }
}

#[async_trait]
impl EmailTemplatesRepo for InMemoryTemplates {
    async fn find_enabled_by_key(
        &self,
        key: &str,
    ) -> Result<Option<EmailTemplateRecord>, RepoError> {
        self.enabled_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .snapshot()
            .into_iter()
            .find(|record| record.key == key && record.enabled))
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<EmailTemplateRecord>, RepoError> {
        Ok(self.snapshot().into_iter().find(|record| record.key == key))
    }

    async fn list_templates(&self) -> Result<Vec<EmailTemplateRecord>, RepoError> {
        let mut records = self.snapshot();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn create_template(
        &self,
        params: CreateEmailTemplateParams,
    ) -> Result<EmailTemplateRecord, RepoError> {
        let mut records = self.records.lock().expect("templates lock");
        if records.iter().any(|record| record.key == params.key) {
            return Err(RepoError::Duplicate {
                constraint: "email_templates_key_key".to_string(),
            });
        }
        let now = OffsetDateTime::now_utc();
        let record = EmailTemplateRecord {
            id: Uuid::new_v4(),
            key: params.key,
            name: params.name,
            description: params.description,
            enabled: params.enabled,
            variants: params.variants,
            created_at: now,
            updated_at: now,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn update_template(
        &self,
        params: UpdateEmailTemplateParams,
    ) -> Result<Option<EmailTemplateRecord>, RepoError> {
        let mut records = self.records.lock().expect("templates lock");
        let Some(record) = records.iter_mut().find(|record| record.key == params.key) else {
            return Ok(None);
        };
        record.name = params.name;
        record.description = params.description;
        record.enabled = params.enabled;
        record.variants = params.variants;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(Some(record.clone()))
    }

    async fn set_enabled(
        &self,
        key: &str,
        enabled: bool,
    ) -> Result<Option<EmailTemplateRecord>, RepoError> {
        let mut records = self.records.lock().expect("templates lock");
        Ok(records
            .iter_mut()
            .find(|record| record.key == key)
            .map(|record| {
                record.enabled = enabled;
                record.clone()
            }))
    }

    async fn delete_template(&self, key: &str) -> Result<bool, RepoError> {
        let mut records = self.records.lock().expect("templates lock");
        let before = records.len();
        records.retain(|record| record.key != key);
        Ok(records.len() != before)
    }
}

pub fn variant(name: &str, weight: Option<f64>, locales: &[(&str, &str, &str)]) -> TemplateVariant {
    TemplateVariant {
        name: name.to_string(),
        weight,
        locales: locales
            .iter()
            .map(|(code, subject, html)| (*code, LocaleContent::new(*subject, *html)))
            .collect::<LocaleMap>(),
    }
}

pub fn template(key: &str, variants: Vec<TemplateVariant>) -> EmailTemplateRecord {
    let now = OffsetDateTime::now_utc();
    EmailTemplateRecord {
        id: Uuid::new_v4(),
        key: key.to_string(),
        name: key.replace('_', " "),
        description: None,
        enabled: true,
        variants,
        created_at: now,
        updated_at: now,
    }
}
