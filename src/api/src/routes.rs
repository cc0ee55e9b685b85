//! Read API route handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::DataError;
use crate::identifiers::{date_string_from_date, parse_date_string, race_key};
use crate::service::DataService;
use crate::types::{ErrorResponse, HealthResponse, Participant, Race};

/// Application state shared across handlers.
pub struct AppState {
    pub data: DataService,
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound(_) => Self::not_found(err.to_string()),
            DataError::Validation(_) | DataError::InvalidDate(_) => Self {
                status: StatusCode::BAD_REQUEST,
                message: err.to_string(),
            },
            _ => Self::internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/races/{date}/{meeting}/{race}", get(race))
        .route("/horses/{name}/participations", get(participations))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run a blocking store call off the async runtime.
async fn blocking<T, F>(state: Arc<AppState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&DataService) -> Result<T, DataError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&state.data))
        .await
        .map_err(|e| ApiError::internal(format!("Store task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Normalized race by business key.
pub async fn race(
    State(state): State<Arc<AppState>>,
    Path((date, meeting, race_number)): Path<(String, u32, u32)>,
) -> Result<Json<Race>, ApiError> {
    let date = date_string_from_date(parse_date_string(&date)?);
    let key = race_key(&date, meeting, race_number);
    let found = blocking(state, move |data| data.get_race(&date, meeting, race_number)).await?;
    found
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("race {}", key)))
}

/// Every run of a horse.
pub async fn participations(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Participant>>, ApiError> {
    let runs = blocking(state, move |data| data.get_participations_for_horse(&name)).await?;
    Ok(Json(runs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{RawMeeting, RawParticipant, RawRace};
    use crate::storage::RelationalStore;
    use axum::body::Body;
    use chrono::NaiveDate;
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn seeded_app(dir: &TempDir) -> Router {
        let data = DataService::new(RelationalStore::open(&dir.path().join("races.db")).unwrap());
        data.save_race(
            &RawRace {
                num_reunion: 1,
                num_ordre: 5,
                distance: 2700,
                distance_unit: "METRE".to_string(),
                ..Default::default()
            },
            &[RawParticipant {
                nom: "BOLD EAGLE".to_string(),
                age: 12,
                ordre_arrivee: Some(1),
                temps_obtenu: Some(190_000),
                ..Default::default()
            }],
            &[],
            &RawMeeting {
                disciplines_mere: vec!["TROT".to_string()],
                ..Default::default()
            },
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        )
        .unwrap();
        router(Arc::new(AppState { data }))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let (status, body) = get(seeded_app(&dir), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_get_race() {
        let dir = TempDir::new().unwrap();
        let (status, body) = get(seeded_app(&dir), "/races/01012023/1/5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pmu_id"], "01012023R1C5");

        let (status, body) = get(seeded_app(&dir), "/races/01012023/1/6").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().unwrap().contains("01012023R1C6"));
    }

    #[tokio::test]
    async fn test_get_race_rejects_malformed_date() {
        let dir = TempDir::new().unwrap();
        let (status, body) = get(seeded_app(&dir), "/races/2023-01-01/1/5").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("2023-01-01"));

        let (status, _) = get(seeded_app(&dir), "/races/32012023/1/5").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_participations() {
        let dir = TempDir::new().unwrap();
        let (status, body) = get(seeded_app(&dir), "/horses/BOLD%20EAGLE/participations").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["rank"], 1);

        let (status, _) = get(seeded_app(&dir), "/horses/NOBODY/participations").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
