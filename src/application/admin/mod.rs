//! Application services for the administrative surface.

pub mod email_templates;

pub use email_templates::AdminEmailTemplateService;
