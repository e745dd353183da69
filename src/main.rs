//! Carelens dashboard backend
//!
//! Main entry point: load configuration, connect to the Record Store,
//! start the realtime refresh controller, and serve the API plus the
//! static dashboard shell.

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_files as fs;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;

use carelens::api::handlers::AppState;
use carelens::config::Settings;
use carelens::fetch::FetchLayer;
use carelens::realtime::RefreshController;
use carelens::api;
use carelens::store::PgRecordStore;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,carelens=debug")),
        )
        .init();

    let settings = Settings::load().context("failed to load configuration")?;

    let store = PgRecordStore::connect(&settings.record_store)
        .await
        .context("failed to connect to the record store")?;

    let fetch = Arc::new(FetchLayer::new(Duration::from_secs(
        settings.cache.staleness_secs,
    )));

    let controller = RefreshController::spawn(settings.realtime.clone(), Arc::clone(&fetch));

    let state = web::Data::new(AppState {
        store: Arc::new(store),
        fetch,
        realtime: controller.shared(),
    });

    let static_dir = settings.server.static_dir.clone();
    let bind = (settings.server.host.clone(), settings.server.port);
    tracing::info!(host = %bind.0, port = bind.1, "starting carelens");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .configure(api::configure)
            .service(fs::Files::new("/", &static_dir).index_file("index.html"))
    })
    .bind(bind)?
    .run()
    .await?;

    // Release the feed subscription before exiting.
    controller.shutdown().await;
    Ok(())
}
