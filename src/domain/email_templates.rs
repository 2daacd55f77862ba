//! Email template entities and their invariants.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::error::DomainError;

/// Weight assumed for a variant stored without one.
pub const DEFAULT_VARIANT_WEIGHT: f64 = 100.0;

/// A persisted template family such as `task_assigned`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailTemplateRecord {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub variants: Vec<TemplateVariant>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// One A/B alternative of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateVariant {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub locales: LocaleMap,
}

impl TemplateVariant {
    /// Weight used for the draw: absent counts as 100, anything negative or
    /// non-finite counts as 0.
    pub fn effective_weight(&self) -> f64 {
        match self.weight {
            None => DEFAULT_VARIANT_WEIGHT,
            Some(weight) if weight.is_finite() && weight > 0.0 => weight,
            Some(_) => 0.0,
        }
    }
}

/// Translated subject and body for one locale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl LocaleContent {
    pub fn new(subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            html: Some(html.into()),
        }
    }

    /// Empty strings count as missing.
    pub fn has_content(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        present(&self.subject) || present(&self.html)
    }
}

/// Locale code → content, in the order the locales were stored.
///
/// Order matters: when neither the requested nor the fallback locale exists,
/// the first stored locale is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocaleMap(IndexMap<String, LocaleContent>);

impl LocaleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced locale keeps its original position.
    pub fn insert(&mut self, locale: impl Into<String>, content: LocaleContent) {
        self.0.insert(locale.into(), content);
    }

    /// Content for `locale`, together with the stored code.
    pub fn entry(&self, locale: &str) -> Option<(&str, &LocaleContent)> {
        self.0
            .get_key_value(locale)
            .map(|(code, content)| (code.as_str(), content))
    }

    pub fn first(&self) -> Option<(&str, &LocaleContent)> {
        self.0
            .first()
            .map(|(code, content)| (code.as_str(), content))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LocaleContent)> {
        self.0.iter().map(|(code, content)| (code.as_str(), content))
    }
}

impl<S: Into<String>> FromIterator<(S, LocaleContent)> for LocaleMap {
    fn from_iter<I: IntoIterator<Item = (S, LocaleContent)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(locale, content)| (locale.into(), content))
                .collect(),
        )
    }
}

/// Keys are lower-case identifiers: `[a-z0-9_.-]+`.
pub fn validate_key(key: &str) -> Result<(), DomainError> {
    if key.trim().is_empty() {
        return Err(DomainError::validation("key", "must not be empty"));
    }
    let valid = key
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '.' | '-'));
    if !valid {
        return Err(DomainError::validation(
            "key",
            format!("`{key}` may only contain a-z, 0-9, `_`, `.` and `-`"),
        ));
    }
    Ok(())
}

/// Checks what an admin may store. Rendering tolerates more than this (legacy
/// rows with negative weights are clamped rather than rejected).
pub fn validate_variants(variants: &[TemplateVariant]) -> Result<(), DomainError> {
    let mut seen = HashSet::new();
    for variant in variants {
        let name = variant.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation(
                "variants.name",
                "must not be empty",
            ));
        }
        if !seen.insert(name) {
            return Err(DomainError::validation(
                "variants.name",
                format!("duplicate variant `{name}`"),
            ));
        }
        if let Some(weight) = variant
            .weight
            .filter(|weight| !(weight.is_finite() && *weight >= 0.0))
        {
            return Err(DomainError::validation(
                "variants.weight",
                format!("variant `{name}` has weight {weight}; expected a finite value >= 0"),
            ));
        }
        for (locale, content) in variant.locales.iter() {
            if locale.trim().is_empty() {
                return Err(DomainError::validation(
                    "variants.locales",
                    format!("variant `{name}` has an empty locale code"),
                ));
            }
            if !content.has_content() {
                return Err(DomainError::validation(
                    "variants.locales",
                    format!("variant `{name}` locale `{locale}` has neither subject nor html"),
                ));
            }
        }
    }
    Ok(())
}
