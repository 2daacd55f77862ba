//! Email template rendering: A/B variant draw, locale fallback and
//! placeholder substitution.

mod placeholders;
mod renderer;
mod variant;

pub use placeholders::{escape_html, interpolate, lookup_path, stringify};
pub use renderer::{
    DEFAULT_FALLBACK_LOCALE, EmailTemplateRenderer, RenderRequest, RenderedEmail, TemplateCache,
    TemplateUsage, template_cache_tag,
};
pub use variant::{choose_variant, resolve_locale, select_variant};
