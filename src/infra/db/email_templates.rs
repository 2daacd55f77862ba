use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreateEmailTemplateParams, EmailTemplatesRepo, RepoError, UpdateEmailTemplateParams,
};
use crate::domain::email_templates::{EmailTemplateRecord, TemplateVariant};

use super::{PostgresRepositories, map_sqlx_error};

const TEMPLATE_COLUMNS: &str =
    "id, key, name, description, enabled, variants, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct EmailTemplateRow {
    id: Uuid,
    key: String,
    name: String,
    description: Option<String>,
    enabled: bool,
    variants: Json<Vec<TemplateVariant>>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<EmailTemplateRow> for EmailTemplateRecord {
    fn from(row: EmailTemplateRow) -> Self {
        Self {
            id: row.id,
            key: row.key,
            name: row.name,
            description: row.description,
            enabled: row.enabled,
            variants: row.variants.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Variants are written as JSON text so locale order survives the round trip.
fn encode_variants(variants: &[TemplateVariant]) -> Result<String, RepoError> {
    serde_json::to_string(variants).map_err(|err| RepoError::InvalidInput {
        message: format!("variants could not be encoded: {err}"),
    })
}

#[async_trait]
impl EmailTemplatesRepo for PostgresRepositories {
    async fn find_enabled_by_key(
        &self,
        key: &str,
    ) -> Result<Option<EmailTemplateRecord>, RepoError> {
        let row = sqlx::query_as::<_, EmailTemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM email_templates WHERE key = $1 AND enabled"
        ))
        .bind(key)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(EmailTemplateRecord::from))
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<EmailTemplateRecord>, RepoError> {
        let row = sqlx::query_as::<_, EmailTemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM email_templates WHERE key = $1"
        ))
        .bind(key)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(EmailTemplateRecord::from))
    }

    async fn list_templates(&self) -> Result<Vec<EmailTemplateRecord>, RepoError> {
        let rows = sqlx::query_as::<_, EmailTemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM email_templates ORDER BY key"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(EmailTemplateRecord::from).collect())
    }

    async fn create_template(
        &self,
        params: CreateEmailTemplateParams,
    ) -> Result<EmailTemplateRecord, RepoError> {
        let variants = encode_variants(&params.variants)?;
        let row = sqlx::query_as::<_, EmailTemplateRow>(&format!(
            r#"
            INSERT INTO email_templates (id, key, name, description, enabled, variants)
            VALUES ($1, $2, $3, $4, $5, $6::json)
            RETURNING {TEMPLATE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&params.key)
        .bind(&params.name)
        .bind(params.description.as_deref())
        .bind(params.enabled)
        .bind(variants)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_template(
        &self,
        params: UpdateEmailTemplateParams,
    ) -> Result<Option<EmailTemplateRecord>, RepoError> {
        let variants = encode_variants(&params.variants)?;
        let row = sqlx::query_as::<_, EmailTemplateRow>(&format!(
            r#"
            UPDATE email_templates
            SET name = $2,
                description = $3,
                enabled = $4,
                variants = $5::json,
                updated_at = now()
            WHERE key = $1
            RETURNING {TEMPLATE_COLUMNS}
            "#
        ))
        .bind(&params.key)
        .bind(&params.name)
        .bind(params.description.as_deref())
        .bind(params.enabled)
        .bind(variants)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(EmailTemplateRecord::from))
    }

    async fn set_enabled(
        &self,
        key: &str,
        enabled: bool,
    ) -> Result<Option<EmailTemplateRecord>, RepoError> {
        let row = sqlx::query_as::<_, EmailTemplateRow>(&format!(
            r#"
            UPDATE email_templates
            SET enabled = $2, updated_at = now()
            WHERE key = $1
            RETURNING {TEMPLATE_COLUMNS}
            "#
        ))
        .bind(key)
        .bind(enabled)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(EmailTemplateRecord::from))
    }

    async fn delete_template(&self, key: &str) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM email_templates WHERE key = $1")
            .bind(key)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
