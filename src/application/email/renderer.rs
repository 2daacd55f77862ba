use std::sync::Arc;

use metrics::counter;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::application::repos::{EmailTemplatesRepo, RepoError};
use crate::cache::{SetOptions, TagCache};
use crate::domain::email_templates::EmailTemplateRecord;

use super::placeholders::interpolate;
use super::variant::{resolve_locale, select_variant};

const SOURCE: &str = "application::email::EmailTemplateRenderer";

/// Locale tried when the requested one is missing from a variant.
pub const DEFAULT_FALLBACK_LOCALE: &str = "tr";

/// Enabled templates by key, shared between renderers and admin writes.
pub type TemplateCache = TagCache<EmailTemplateRecord>;

/// Cache key and tag of one template. Admin writes invalidate this tag.
pub fn template_cache_tag(key: &str) -> String {
    format!("email_template:{key}")
}

const METRIC_EMAIL_RENDERED: &str = "skprod_email_rendered_total";
const METRIC_EMAIL_UNAVAILABLE: &str = "skprod_email_unavailable_total";

/// What to render.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    pub key: String,
    pub locale: Option<String>,
    /// Forces a specific variant instead of the weighted draw.
    pub variant_name: Option<String>,
    pub data: Value,
}

impl RenderRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            data: Value::Null,
            ..Default::default()
        }
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn variant(mut self, name: impl Into<String>) -> Self {
        self.variant_name = Some(name.into());
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// A rendered email ready to hand to the mail sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub used: TemplateUsage,
}

/// Which template, variant and locale produced a [`RenderedEmail`], for A/B
/// attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateUsage {
    pub key: String,
    pub variant: String,
    pub locale: String,
}

/// Loads templates and renders them.
///
/// Every failure is logged and reported as `None`, so callers sending
/// notifications in the background simply skip the email.
#[derive(Clone)]
pub struct EmailTemplateRenderer {
    templates: Arc<dyn EmailTemplatesRepo>,
    cache: Option<Arc<TemplateCache>>,
    fallback_locale: String,
}

enum LookupMiss {
    NotFound,
    Failed(RepoError),
}

impl EmailTemplateRenderer {
    pub fn new(templates: Arc<dyn EmailTemplatesRepo>) -> Self {
        Self {
            templates,
            cache: None,
            fallback_locale: DEFAULT_FALLBACK_LOCALE.to_string(),
        }
    }

    /// Serve template lookups from `cache`. Misses and lookup failures are
    /// not cached.
    pub fn with_template_cache(mut self, cache: Arc<TemplateCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_fallback_locale(mut self, locale: impl Into<String>) -> Self {
        self.fallback_locale = locale.into();
        self
    }

    pub fn fallback_locale(&self) -> &str {
        &self.fallback_locale
    }

    pub async fn render(&self, request: &RenderRequest) -> Option<RenderedEmail> {
        let template = self.load(&request.key).await?;
        let mut rng = rand::rng();
        self.render_template(&template, request, &mut rng)
    }

    /// Render an already loaded template with an explicit random source.
    pub fn render_template<R>(
        &self,
        template: &EmailTemplateRecord,
        request: &RenderRequest,
        rng: &mut R,
    ) -> Option<RenderedEmail>
    where
        R: Rng + ?Sized,
    {
        if !template.enabled {
            return unavailable(&template.key, "disabled");
        }
        if template.variants.is_empty() {
            return unavailable(&template.key, "no_variants");
        }

        let variant =
            select_variant(&template.variants, request.variant_name.as_deref(), rng)?;

        let Some((locale, content)) =
            resolve_locale(variant, request.locale.as_deref(), &self.fallback_locale)
        else {
            return unavailable(&template.key, "no_locales");
        };
        if !content.has_content() {
            return unavailable(&template.key, "empty_content");
        }

        let subject = interpolate(content.subject.as_deref().unwrap_or_default(), &request.data);
        let html = interpolate(content.html.as_deref().unwrap_or_default(), &request.data);

        counter!(
            METRIC_EMAIL_RENDERED,
            "template" => template.key.clone(),
            "variant" => variant.name.clone()
        )
        .increment(1);
        debug!(
            template_key = %template.key,
            variant = %variant.name,
            locale,
            requested_locale = request.locale.as_deref(),
            "Rendered email template"
        );

        Some(RenderedEmail {
            subject,
            html,
            used: TemplateUsage {
                key: template.key.clone(),
                variant: variant.name.clone(),
                locale: locale.to_string(),
            },
        })
    }

    async fn load(&self, key: &str) -> Option<EmailTemplateRecord> {
        let loaded = match &self.cache {
            Some(cache) => {
                let tag = template_cache_tag(key);
                cache
                    .with_cache(&tag, || self.fetch(key), SetOptions::new().tag(tag.clone()))
                    .await
            }
            None => self.fetch(key).await,
        };

        match loaded {
            Ok(template) => Some(template),
            Err(LookupMiss::NotFound) => unavailable(key, "not_found"),
            Err(LookupMiss::Failed(err)) => {
                error!(
                    target_module = SOURCE,
                    template_key = key,
                    error = %err,
                    "Email template lookup failed"
                );
                counter!(METRIC_EMAIL_UNAVAILABLE, "reason" => "lookup_failed").increment(1);
                None
            }
        }
    }

    async fn fetch(&self, key: &str) -> Result<EmailTemplateRecord, LookupMiss> {
        self.templates
            .find_enabled_by_key(key)
            .await
            .map_err(LookupMiss::Failed)?
            .ok_or(LookupMiss::NotFound)
    }
}

fn unavailable<T>(key: &str, reason: &'static str) -> Option<T> {
    warn!(
        target_module = SOURCE,
        template_key = key,
        reason,
        "Email template unavailable; skipping send"
    );
    counter!(METRIC_EMAIL_UNAVAILABLE, "reason" => reason).increment(1);
    None
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::application::repos::{
        CreateEmailTemplateParams, RepoError, UpdateEmailTemplateParams,
    };
    use crate::domain::email_templates::{LocaleContent, LocaleMap, TemplateVariant};

    /// Read-only fake; writes are not exercised by the renderer.
    struct StaticTemplates {
        records: Vec<EmailTemplateRecord>,
        fail: bool,
    }

    #[async_trait]
    impl EmailTemplatesRepo for StaticTemplates {
        async fn find_enabled_by_key(
            &self,
            key: &str,
        ) -> Result<Option<EmailTemplateRecord>, RepoError> {
            if self.fail {
                return Err(RepoError::Timeout);
            }
            Ok(self
                .records
                .iter()
                .find(|record| record.key == key && record.enabled)
                .cloned())
        }

        async fn find_by_key(&self, key: &str) -> Result<Option<EmailTemplateRecord>, RepoError> {
            Ok(self.records.iter().find(|record| record.key == key).cloned())
        }

        async fn list_templates(&self) -> Result<Vec<EmailTemplateRecord>, RepoError> {
            Ok(self.records.clone())
        }

        async fn create_template(
            &self,
            _params: CreateEmailTemplateParams,
        ) -> Result<EmailTemplateRecord, RepoError> {
            Err(RepoError::from_persistence("read-only"))
        }

        async fn update_template(
            &self,
            _params: UpdateEmailTemplateParams,
        ) -> Result<Option<EmailTemplateRecord>, RepoError> {
            Err(RepoError::from_persistence("read-only"))
        }

        async fn set_enabled(
            &self,
            _key: &str,
            _enabled: bool,
        ) -> Result<Option<EmailTemplateRecord>, RepoError> {
            Err(RepoError::from_persistence("read-only"))
        }

        async fn delete_template(&self, _key: &str) -> Result<bool, RepoError> {
            Err(RepoError::from_persistence("read-only"))
        }
    }

    fn record(key: &str, variants: Vec<TemplateVariant>) -> EmailTemplateRecord {
        let now = OffsetDateTime::now_utc();
        EmailTemplateRecord {
            id: Uuid::new_v4(),
            key: key.to_string(),
            name: key.to_string(),
            description: None,
            enabled: true,
            variants,
            created_at: now,
            updated_at: now,
        }
    }

    fn variant(name: &str, weight: Option<f64>, locales: LocaleMap) -> TemplateVariant {
        TemplateVariant {
            name: name.to_string(),
            weight,
            locales,
        }
    }

    fn tr_only(subject: &str, html: &str) -> LocaleMap {
        [("tr", LocaleContent::new(subject, html))]
            .into_iter()
            .collect()
    }

    fn renderer(records: Vec<EmailTemplateRecord>) -> EmailTemplateRenderer {
        EmailTemplateRenderer::new(Arc::new(StaticTemplates {
            records,
            fail: false,
        }))
    }

    #[tokio::test]
    async fn missing_template_renders_nothing() {
        let renderer = renderer(Vec::new());
        let request = RenderRequest::new("missing").data(json!({}));
        assert!(renderer.render(&request).await.is_none());
    }

    #[tokio::test]
    async fn disabled_template_renders_nothing() {
        let mut disabled = record("task_assigned", vec![variant("default", None, tr_only("x", "y"))]);
        disabled.enabled = false;
        let renderer = renderer(vec![disabled.clone()]);

        assert!(renderer.render(&RenderRequest::new("task_assigned")).await.is_none());

        let mut rng = StdRng::seed_from_u64(0);
        assert!(
            renderer
                .render_template(&disabled, &RenderRequest::new("task_assigned"), &mut rng)
                .is_none()
        );
    }

    #[tokio::test]
    async fn template_without_variants_renders_nothing() {
        let renderer = renderer(vec![record("empty", Vec::new())]);
        assert!(renderer.render(&RenderRequest::new("empty")).await.is_none());
    }

    #[tokio::test]
    async fn lookup_errors_are_swallowed() {
        let renderer = EmailTemplateRenderer::new(Arc::new(StaticTemplates {
            records: Vec::new(),
            fail: true,
        }));
        assert!(renderer.render(&RenderRequest::new("any")).await.is_none());
    }

    #[tokio::test]
    async fn escapes_subject_and_keeps_raw_html() {
        let renderer = renderer(vec![record(
            "welcome",
            vec![variant(
                "default",
                Some(100.0),
                tr_only("Hi {{name}}", "<b>{{{name}}}</b>"),
            )],
        )]);

        let rendered = renderer
            .render(&RenderRequest::new("welcome").data(json!({"name": "<script>"})))
            .await
            .expect("rendered email");

        assert_eq!(rendered.subject, "Hi &lt;script&gt;");
        assert_eq!(rendered.html, "<b><script></b>");
        assert_eq!(
            rendered.used,
            TemplateUsage {
                key: "welcome".to_string(),
                variant: "default".to_string(),
                locale: "tr".to_string(),
            }
        );
    }

    #[test]
    fn forced_variant_and_locale_are_reported() {
        let locales: LocaleMap = [
            ("tr", LocaleContent::new("Görev: {{task}}", "<p>{{task}}</p>")),
            ("en", LocaleContent::new("Task: {{task}}", "<p>{{task}}</p>")),
        ]
        .into_iter()
        .collect();
        let template = record(
            "task_assigned",
            vec![
                variant("A", Some(100.0), tr_only("A", "A")),
                variant("B", Some(0.0), locales),
            ],
        );
        let renderer = renderer(Vec::new());
        let mut rng = StdRng::seed_from_u64(9);

        let request = RenderRequest::new("task_assigned")
            .variant("B")
            .locale("en")
            .data(json!({"task": "Lens check"}));
        let rendered = renderer
            .render_template(&template, &request, &mut rng)
            .expect("rendered email");

        assert_eq!(rendered.subject, "Task: Lens check");
        assert_eq!(rendered.used.variant, "B");
        assert_eq!(rendered.used.locale, "en");
    }

    #[test]
    fn unknown_locale_falls_back_to_configured_locale() {
        let locales: LocaleMap = [
            ("de", LocaleContent::new("Hallo", "")),
            ("en", LocaleContent::new("Hello", "")),
        ]
        .into_iter()
        .collect();
        let template = record("greeting", vec![variant("default", None, locales)]);
        let mut rng = StdRng::seed_from_u64(1);

        let default_fallback = renderer(Vec::new());
        let rendered = default_fallback
            .render_template(&template, &RenderRequest::new("greeting").locale("fr"), &mut rng)
            .expect("rendered email");
        assert_eq!(rendered.used.locale, "de");

        let en_fallback = renderer(Vec::new()).with_fallback_locale("en");
        let rendered = en_fallback
            .render_template(&template, &RenderRequest::new("greeting").locale("fr"), &mut rng)
            .expect("rendered email");
        assert_eq!(rendered.used.locale, "en");
        assert_eq!(rendered.subject, "Hello");
        assert_eq!(rendered.html, "");
    }

    #[test]
    fn content_without_subject_or_html_renders_nothing() {
        let locales: LocaleMap = [(
            "tr",
            LocaleContent {
                subject: Some(String::new()),
                html: None,
            },
        )]
        .into_iter()
        .collect();
        let template = record("blank", vec![variant("default", None, locales)]);
        let mut rng = StdRng::seed_from_u64(1);

        assert!(
            renderer(Vec::new())
                .render_template(&template, &RenderRequest::new("blank"), &mut rng)
                .is_none()
        );
    }

    #[test]
    fn zero_weight_variant_is_never_rendered() {
        let template = record(
            "ab",
            vec![
                variant("A", Some(0.0), tr_only("A", "A")),
                variant("B", Some(100.0), tr_only("B", "B")),
            ],
        );
        let renderer = renderer(Vec::new());
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..200 {
            let rendered = renderer
                .render_template(&template, &RenderRequest::new("ab"), &mut rng)
                .expect("rendered email");
            assert_eq!(rendered.used.variant, "B");
        }
    }
}
