use std::{path::Path, process, sync::Arc};

use serde_json::Value;
use skprod::{
    application::{
        admin::email_templates::{
            AdminEmailTemplateService, CreateEmailTemplateCommand, UpsertOutcome,
        },
        email::{EmailTemplateRenderer, RenderRequest, RenderedEmail, TemplateCache},
        error::AppError,
        repos::EmailTemplatesRepo,
    },
    cache::spawn_configured_sweeper,
    config,
    infra::{db::PostgresRepositories, error::InfraError, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Render(args) => run_render(settings, args).await,
        config::Command::Templates(args) => match args.command {
            config::TemplatesCommand::List(_) => run_list_templates(settings).await,
            config::TemplatesCommand::Import(import) => {
                run_import_templates(settings, import).await
            }
        },
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let (payloads, batch) = load_render_data(&args).await?;
    let repositories = init_repositories(&settings).await?;
    let cache = Arc::new(TemplateCache::from_settings(&settings.cache));
    let sweeper = spawn_configured_sweeper(Arc::clone(&cache));

    let templates: Arc<dyn EmailTemplatesRepo> = repositories;
    let renderer = EmailTemplateRenderer::new(templates)
        .with_fallback_locale(settings.email.fallback_locale.clone())
        .with_template_cache(Arc::clone(&cache));

    let rendered = render_all(&renderer, &args, payloads).await;
    if let Some(handle) = sweeper {
        handle.abort();
    }
    let rendered = rendered?;

    let output = match (batch, rendered.as_slice()) {
        (false, [email]) => serde_json::to_string_pretty(email),
        _ => serde_json::to_string_pretty(&rendered),
    }
    .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{output}");
    Ok(())
}

async fn render_all(
    renderer: &EmailTemplateRenderer,
    args: &config::RenderArgs,
    payloads: Vec<Value>,
) -> Result<Vec<RenderedEmail>, AppError> {
    let mut rendered = Vec::with_capacity(payloads.len());
    for (index, data) in payloads.into_iter().enumerate() {
        let mut request = RenderRequest::new(args.key.clone()).data(data);
        if let Some(locale) = &args.locale {
            request = request.locale(locale.clone());
        }
        if let Some(variant) = &args.variant {
            request = request.variant(variant.clone());
        }

        let email = renderer.render(&request).await.ok_or_else(|| {
            error!(
                target = "skprod::render",
                template_key = %args.key,
                index,
                "template unavailable"
            );
            AppError::NotFound
        })?;
        rendered.push(email);
    }
    Ok(rendered)
}

/// Returns the payloads to render and whether the input was a batch.
async fn load_render_data(args: &config::RenderArgs) -> Result<(Vec<Value>, bool), AppError> {
    let raw = match (&args.data, &args.data_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => read_file(path).await?,
        (None, None) => return Ok((vec![Value::Object(Default::default())], false)),
    };

    let data: Value = serde_json::from_str(&raw)
        .map_err(|err| AppError::validation(format!("placeholder data is not valid JSON: {err}")))?;
    match data {
        Value::Object(_) => Ok((vec![data], false)),
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
            Ok((items, true))
        }
        _ => Err(AppError::validation(
            "placeholder data must be a JSON object or a non-empty array of objects",
        )),
    }
}

async fn run_list_templates(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let service = AdminEmailTemplateService::new(repositories);

    let templates = service.list().await?;
    println!("{:<40} {:<8} {:>8}", "KEY", "ENABLED", "VARIANTS");
    for template in &templates {
        println!(
            "{:<40} {:<8} {:>8}",
            template.key,
            template.enabled,
            template.variants.len()
        );
    }
    info!(
        target = "skprod::templates",
        count = templates.len(),
        "Listed email templates"
    );
    Ok(())
}

async fn run_import_templates(
    settings: config::Settings,
    args: config::ImportTemplatesArgs,
) -> Result<(), AppError> {
    let raw = read_file(&args.file).await?;
    let commands: Vec<CreateEmailTemplateCommand> = serde_json::from_str(&raw).map_err(|err| {
        AppError::validation(format!(
            "{} is not a JSON array of templates: {err}",
            args.file.display()
        ))
    })?;

    let repositories = init_repositories(&settings).await?;
    let service = AdminEmailTemplateService::new(repositories);

    info!(
        target = "skprod::import",
        path = %args.file.display(),
        templates = commands.len(),
        "Starting import"
    );

    let (mut created, mut updated) = (0usize, 0usize);
    for command in commands {
        let (record, outcome) = service.upsert(command).await?;
        match outcome {
            UpsertOutcome::Created => created += 1,
            UpsertOutcome::Updated => updated += 1,
        }
        println!("{:?} {}", outcome, record.key);
    }

    info!(target = "skprod::import", created, updated, "Import completed");
    Ok(())
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    repositories
        .run_migrations()
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "skprod::migrate", "Migrations applied");
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let repositories = PostgresRepositories::from_settings(&settings.database).await?;
    Ok(Arc::new(repositories))
}

async fn read_file(path: &Path) -> Result<String, AppError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|err| AppError::from(InfraError::io(path, err)))
}
