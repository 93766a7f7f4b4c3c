use std::{process, sync::Arc, time::Duration};

use foglio::{
    application::error::AppError,
    config,
    infra::{InfraError, http, telemetry},
    plugins::{BlogRuntime, PluginCatalog},
};
use tracing::{Dispatch, Level, debug, dispatcher, error, info};
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
    let (_cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    let runtime = Arc::new(BlogRuntime::with_http_sources(PluginCatalog::with_builtins()));
    for blog in &settings.blogs {
        runtime.initialize_blog(blog.clone()).await?;
    }
    info!(blogs = settings.blogs.len(), "runtime initialized");

    let maintenance = spawn_cache_maintenance(Arc::clone(&runtime), settings.maintenance.cadence);

    let result = serve_http(&settings, runtime).await;

    maintenance.abort();
    let _ = maintenance.await;

    result
}

fn spawn_cache_maintenance(
    runtime: Arc<BlogRuntime>,
    cadence: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cadence);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            let removed = runtime.cleanup_caches();
            if removed > 0 {
                debug!(removed, "cache maintenance sweep");
            }
        }
    })
}

async fn serve_http(
    settings: &config::Settings,
    runtime: Arc<BlogRuntime>,
) -> Result<(), AppError> {
    let router = http::build_router(http::HttpState { runtime });

    let listener = tokio::net::TcpListener::bind(settings.server.bind_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.bind_addr, "listening");

    let graceful = settings.server.graceful_shutdown;
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(graceful))
        .await
        .map_err(|err| AppError::server(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal(graceful: Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!(timeout_secs = graceful.as_secs(), "shutdown signal received");
}
