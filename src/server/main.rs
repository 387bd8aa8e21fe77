//! Proximity map server.
//!
//! Serves facility layers, the heatmap, immediate proximity queries and
//! debounced probe sessions over WebSocket, backed by one catalog session.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use proxmap::cache::{CacheGate, DatasetCache};
use proxmap::config::{Config, HeatmapConfig};
use proxmap::geocode::{GeocodeHit, Geocoder};
use proxmap::models::{Coordinate, ProbeBatch};
use proxmap::scheduler::ProbeSettings;
use proxmap::source::HttpSource;
use proxmap::{Catalog, CatalogSnapshot, Session, SessionHandle};

mod layers;
mod probe_ws;
use layers::{features, heat_points, parse_bbox, FeatureCollection};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Facility proximity map server")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "proxmap.toml")]
    config: PathBuf,

    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// Override the cache directory from the config
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

/// Application state shared across handlers
pub struct AppState {
    session: SessionHandle,
    geocoder: Geocoder,
    probe: ProbeSettings,
    heatmap: Option<HeatmapConfig>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("Proxmap Server");
    info!("Loading config from {}", args.config.display());

    let mut config = Config::load_from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if let Some(dir) = args.cache_dir {
        config.cache.path = dir;
    }

    info!("Opening dataset cache at {}", config.cache.path.display());
    let cache = DatasetCache::open(&config.cache.path)
        .with_context(|| format!("Failed to open cache at {}", config.cache.path.display()))?;
    let source = HttpSource::new(&config.source)?;
    let gate = Arc::new(CacheGate::new(source, cache));

    let catalog = Catalog::new(&config)?;
    let (session, handle) = Session::init(catalog, gate);
    tokio::spawn(session.run());

    let state = Arc::new(AppState {
        session: handle.clone(),
        geocoder: Geocoder::new(&config.geocoder)?,
        probe: ProbeSettings::from_config(&config.probe),
        heatmap: config.heatmap.clone(),
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/proximity", get(proximity_handler))
        .route("/v1/probe", get(probe_ws::probe_handler))
        .route("/v1/layers/{dataset}", get(layer_handler))
        .route("/v1/heatmap", get(heatmap_handler))
        .route("/v1/categories", get(categories_handler))
        .route("/v1/datasets/{dataset}/refresh", post(refresh_handler))
        .route("/v1/search", get(search_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    handle.dispose();
    info!("Server stopped");

    Ok(())
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.session.snapshot();
    let datasets = snapshot
        .datasets
        .iter()
        .map(|(key, points)| (key.clone(), points.valid().count()))
        .collect();

    Json(HealthResponse {
        status: "ok",
        loading: snapshot.loading,
        datasets,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    loading: bool,
    /// Valid points per dataset
    datasets: BTreeMap<String, usize>,
}

#[derive(Deserialize)]
struct ProximityParams {
    lat: f64,
    lng: f64,
}

/// Immediate proximity batch, no debouncing
async fn proximity_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProximityParams>,
) -> Result<Json<ProbeBatch>, (StatusCode, String)> {
    let origin = Coordinate::new(params.lat, params.lng);
    let snapshot = state.session.snapshot();

    immediate_batch(&snapshot, origin, state.probe.ceiling)
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "datasets are still loading".to_string(),
            )
        })
}

/// One batch for `origin`, or `None` while datasets load. A non-finite
/// origin reports the ceiling for every category.
fn immediate_batch(
    snapshot: &CatalogSnapshot,
    origin: Coordinate,
    ceiling: f64,
) -> Option<ProbeBatch> {
    if snapshot.loading {
        return None;
    }
    Some(ProbeBatch {
        request_id: 0,
        origin,
        results: snapshot.probe(origin, ceiling),
        computed_at: Utc::now(),
    })
}

#[derive(Deserialize)]
struct LayerParams {
    /// Bounding box: "minLon,minLat,maxLon,maxLat"
    bbox: Option<String>,
}

/// Valid points of one dataset
async fn layer_handler(
    State(state): State<Arc<AppState>>,
    Path(dataset): Path<String>,
    Query(params): Query<LayerParams>,
) -> Result<Json<FeatureCollection>, (StatusCode, String)> {
    let snapshot = state.session.snapshot();
    let points = snapshot
        .dataset(&dataset)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("unknown dataset '{}'", dataset)))?;

    Ok(Json(features(points.valid(), parse_bbox(&params.bbox))))
}

/// Heatmap triples for the configured dataset
async fn heatmap_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<[f64; 3]>>, (StatusCode, String)> {
    let heatmap = state
        .heatmap
        .as_ref()
        .ok_or_else(|| (StatusCode::NOT_FOUND, "no heatmap configured".to_string()))?;

    let snapshot = state.session.snapshot();
    let heat = snapshot
        .dataset(&heatmap.dataset)
        .map(|d| heat_points(d.points.iter(), heatmap.weight))
        .unwrap_or_default();

    Ok(Json(heat))
}

#[derive(Serialize)]
struct CategoryInfo {
    name: String,
    label: String,
    points: usize,
}

async fn categories_handler(State(state): State<Arc<AppState>>) -> Json<Vec<CategoryInfo>> {
    let snapshot = state.session.snapshot();
    Json(
        snapshot
            .categories
            .iter()
            .map(|c| CategoryInfo {
                name: c.name.clone(),
                label: c.label.clone(),
                points: c.points.iter().filter(|p| p.is_valid()).count(),
            })
            .collect(),
    )
}

/// Refetch a dataset through the cache gate
async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Path(dataset): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.session.refresh(&dataset).await {
        info!("Refresh of '{}' accepted", dataset);
        Ok(StatusCode::ACCEPTED)
    } else {
        Err((StatusCode::NOT_FOUND, format!("unknown dataset '{}'", dataset)))
    }
}

#[derive(Deserialize)]
struct SearchParams {
    text: String,
}

/// Address lookup proxied to the geocoder
async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<GeocodeHit>, (StatusCode, String)> {
    state
        .geocoder
        .search(&params.text)
        .await
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "no match".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxmap::catalog::CategoryPoints;
    use proxmap::models::GeoPoint;

    fn snapshot(loading: bool) -> CatalogSnapshot {
        CatalogSnapshot {
            loading,
            categories: vec![CategoryPoints {
                name: "hospital".to_string(),
                label: "Hospital próximo".to_string(),
                points: Arc::new(vec![GeoPoint::at(-22.90, -43.20)]),
            }],
            datasets: Default::default(),
        }
    }

    #[test]
    fn test_non_finite_origin_reports_ceiling() {
        let origin = Coordinate::new(f64::NAN, -43.2);
        let batch = immediate_batch(&snapshot(false), origin, 5000.0).unwrap();
        let hospital = batch.result("hospital").unwrap();
        assert!(hospital.is_ceiling);
        assert_eq!(hospital.distance_meters, Some(5000.0));
    }

    #[test]
    fn test_measured_origin() {
        let origin = Coordinate::new(-22.91, -43.20);
        let batch = immediate_batch(&snapshot(false), origin, 5000.0).unwrap();
        let hospital = batch.result("hospital").unwrap();
        assert!(!hospital.is_ceiling);
        assert_eq!(batch.request_id, 0);
    }

    #[test]
    fn test_unavailable_while_loading() {
        let origin = Coordinate::new(-22.91, -43.20);
        assert!(immediate_batch(&snapshot(true), origin, 5000.0).is_none());
    }
}
