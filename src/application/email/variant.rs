//! A/B variant and locale selection.

use rand::Rng;

use crate::domain::email_templates::{LocaleContent, TemplateVariant};

/// Weighted random pick over `variants`.
///
/// Each variant contributes its effective weight to a cumulative sum and the
/// draw `rng.random::<f64>() * total` lands in exactly one bucket. Zero-weight
/// variants own an empty bucket and are never drawn. When every weight is
/// zero the first variant is returned. `None` only for an empty slice.
pub fn choose_variant<'a, R>(variants: &'a [TemplateVariant], rng: &mut R) -> Option<&'a TemplateVariant>
where
    R: Rng + ?Sized,
{
    let first = variants.first()?;
    let total: f64 = variants.iter().map(TemplateVariant::effective_weight).sum();
    if total <= 0.0 {
        return Some(first);
    }

    let draw = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    for variant in variants {
        let weight = variant.effective_weight();
        if weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        if draw < cumulative {
            return Some(variant);
        }
    }

    // Float rounding can leave the draw a hair past the final boundary.
    variants
        .iter()
        .rev()
        .find(|variant| variant.effective_weight() > 0.0)
        .or(Some(first))
}

/// Pick the variant named `requested` if it exists, otherwise draw one.
pub fn select_variant<'a, R>(
    variants: &'a [TemplateVariant],
    requested: Option<&str>,
    rng: &mut R,
) -> Option<&'a TemplateVariant>
where
    R: Rng + ?Sized,
{
    requested
        .and_then(|name| variants.iter().find(|variant| variant.name == name))
        .or_else(|| choose_variant(variants, rng))
}

/// Resolve which locale of `variant` to render.
///
/// Order: the requested locale, then `fallback`, then the first stored one.
pub fn resolve_locale<'a>(
    variant: &'a TemplateVariant,
    requested: Option<&str>,
    fallback: &str,
) -> Option<(&'a str, &'a LocaleContent)> {
    let locales = &variant.locales;
    requested
        .and_then(|code| locales.entry(code))
        .or_else(|| locales.entry(fallback))
        .or_else(|| locales.first())
}
