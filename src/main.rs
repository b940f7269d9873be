use std::{process, sync::Arc};

use notepress::{
    application::{error::AppError, render::RenderService},
    cache::{CacheConfig, PdfStore},
    config,
    domain::document::{Document, RenderOptions},
    infra::{
        engine::ChromiumEngine,
        error::InfraError,
        http::{self, AppState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Export(args) => run_export(settings, args).await,
    }
}

fn build_state(settings: &config::Settings) -> Result<AppState, AppError> {
    let store = Arc::new(
        PdfStore::new(&CacheConfig::from(&settings.cache))
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );
    let engine = Arc::new(ChromiumEngine::new(
        settings.render.chromium_path.clone(),
        settings.render.load_timeout,
    ));
    let render = Arc::new(RenderService::new(engine, store.clone()));

    Ok(AppState { render, store })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let state = build_state(&settings)?;
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "notepress::server",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(settings.server.graceful_shutdown))
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal(grace: std::time::Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install shutdown handler");
        return;
    }
    info!(target = "notepress::server", "shutdown requested");

    // In-flight renders get the grace period, then the process is forced out.
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        error!(
            target = "notepress::server",
            grace_secs = grace.as_secs(),
            "graceful shutdown timed out"
        );
        process::exit(0);
    });
}

async fn run_export(
    settings: config::Settings,
    args: config::ExportArgs,
) -> Result<(), AppError> {
    let state = build_state(&settings)?;

    let markdown = tokio::fs::read_to_string(&args.input)
        .await
        .map_err(|err| {
            AppError::unexpected(format!("failed to read `{}`: {err}", args.input.display()))
        })?;

    let title = args
        .input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("Research Document")
        .to_string();
    let document = Document::new(title, markdown);

    let rendered = state
        .render
        .render_document(&document, &RenderOptions::default())
        .await
        .map_err(AppError::from)?;

    tokio::fs::write(&args.output, &rendered.bytes)
        .await
        .map_err(|err| {
            AppError::unexpected(format!("failed to write `{}`: {err}", args.output.display()))
        })?;

    info!(
        target = "notepress::export",
        input = %args.input.display(),
        output = %args.output.display(),
        size_bytes = rendered.bytes.len(),
        from_cache = rendered.from_cache,
        "export completed"
    );
    Ok(())
}
