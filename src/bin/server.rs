use std::collections::BTreeMap;

use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use bar_optimizer::providers::{MeasurementEntry, MeasurementTable};
use bar_optimizer::solver::{Optimizer, Report};
use bar_optimizer::types::{MaterialConfig, Piece};
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Deserialize, Serialize)]
struct OptimizeRequest {
    pieces: Vec<Piece>,
    #[serde(default)]
    materials: BTreeMap<String, MaterialConfig>,
    #[serde(default)]
    prices: BTreeMap<String, f64>,
    #[serde(default)]
    measurements: Vec<MeasurementEntry>,
}

fn validate_pieces(pieces: &[Piece]) -> Result<(), String> {
    for p in pieces {
        if p.material.trim().is_empty() {
            return Err(format!("piece {} has no material", p.id));
        }
        if p.length.is_nan() || p.length <= 0.0 {
            return Err(format!("piece {} length must be positive", p.id));
        }
    }
    Ok(())
}

async fn optimize(Json(req): Json<OptimizeRequest>) -> Result<Json<Report>, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /optimize"
    );

    validate_pieces(&req.pieces).map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let geometry: MeasurementTable = req.measurements.into_iter().collect();
    let report = Optimizer::new(&req.materials, &req.prices, &geometry).run(&req.pieces);

    Ok(Json(report))
}

fn main() -> std::io::Result<()> {
    let _guard = sentry::init((
        std::env::var("SENTRY_DSN").ok(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    ));

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve())
}

async fn serve() -> std::io::Result<()> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/optimize", post(optimize))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await
}
