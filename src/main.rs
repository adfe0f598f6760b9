use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use actix_web_prom::PrometheusMetricsBuilder;
use env_logger::Env;
use log::info;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use fittrack_backend::app::{self, spawn_blacklist_pruner, AppState};
use fittrack_backend::config::{Config, StorageBackend};
use fittrack_backend::db::{MemoryStore, PgStore, Store};
use fittrack_backend::utils::mailer::LogMailer;

fn startup_error<E: std::fmt::Display>(context: &str, err: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Reads .env, then fails fast on a missing or empty JWT_SECRET / DATABASE_URL
    let config = Config::from_env().map_err(|err| startup_error("Invalid configuration", err))?;

    let store: Arc<dyn Store> = match &config.storage {
        StorageBackend::Postgres(url) => Arc::new(
            PgStore::connect(url)
                .await
                .map_err(|err| startup_error("Failed to connect to the database", err))?,
        ),
        StorageBackend::Memory => {
            info!("Using the in-memory store; data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    let bind_address = config.bind_address.clone();
    let workers = config.workers;
    let state = web::Data::new(AppState::new(config, store, Arc::new(LogMailer)));
    spawn_blacklist_pruner(state.clone());

    // Set up Prometheus metrics
    let mut labels = HashMap::new();
    labels.insert("app".to_string(), "fittrack".to_string());
    let prometheus = PrometheusMetricsBuilder::new("api")
        .endpoint("/metrics")
        .const_labels(labels)
        .build()
        .map_err(|err| startup_error("Failed to create Prometheus metrics", err))?;

    info!("Starting server at {} with {} workers", bind_address, workers);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(prometheus.clone())
            .app_data(state.clone())
            .configure(app::configure)
    })
    .workers(workers)
    .bind(&bind_address)?
    .run()
    .await
}
