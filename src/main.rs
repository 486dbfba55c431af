mod app;
mod cache;
mod calculator;
mod clock;
mod config;
mod context;
mod ephemeris;
mod error;
mod phase;
mod reading;

use crate::{
    app::{AppState, Metrics},
    config::AppConfig,
    context::PhaseContext,
    error::Result,
};
use actix_web::{get, middleware, post, web, App, HttpServer};
use actix_web_prom::PrometheusMetricsBuilder;
use prometheus::Registry;
use tracing::info;

const METRICS_NAMESPACE: &str = "solar_phase";

#[get("/healthz")]
async fn healthz() -> &'static str {
    "ok"
}

#[get("/phase")]
async fn current_phase(state: web::Data<AppState>) -> Result<web::Json<PhaseContext>> {
    Ok(web::Json(state.phase_context(false).await?))
}

#[post("/phase/refresh")]
async fn refresh_phase(state: web::Data<AppState>) -> Result<web::Json<PhaseContext>> {
    info!("forcing day phase refresh");
    Ok(web::Json(state.phase_context(true).await?))
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(healthz)
        .service(current_phase)
        .service(refresh_phase);
}

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = AppConfig::load().await?;

    let registry = Registry::new();
    let metrics = Metrics::new(METRICS_NAMESPACE, &registry)?;
    let prometheus = PrometheusMetricsBuilder::new(METRICS_NAMESPACE)
        .endpoint("/metrics")
        .registry(registry)
        .build()?;

    let state = web::Data::new(AppState::new(config, metrics)?);
    let address = state.config.listen_address.clone();

    info!(%address, "starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(prometheus.clone())
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind(address.as_str())?
    .workers(2)
    .run()
    .await?;

    Ok(())
}
