//! Vault API stand-in
//!
//! Serves the corporation-number and profile-details endpoints the
//! onboarding form talks to, for local development and end-to-end tests.
//! Accepted profiles are kept in memory.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};
use uuid::Uuid;

/// Corporation numbers the hosted service is known to accept
pub const KNOWN_CORPORATION_NUMBERS: [&str; 10] = [
    "826417395",
    "158739264",
    "123456789",
    "591863427",
    "312574689",
    "287965143",
    "265398741",
    "762354918",
    "468721395",
    "624719583",
];

/// Request body limit
const MAX_BODY_SIZE: usize = 64 * 1024;

const MAX_NAME_LEN: usize = 50;

// ==================== Types ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetailsRequest {
    pub first_name: String,
    pub last_name: String,
    pub corporation_number: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProfile {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: ProfileDetailsRequest,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorporationNumberResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corporation_number: Option<String>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

// ==================== App State ====================

#[derive(Clone)]
pub struct AppState {
    valid_numbers: Arc<HashSet<String>>,
    profiles: Arc<Mutex<Vec<StoredProfile>>>,
}

impl AppState {
    pub fn new<I, S>(valid_numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            valid_numbers: Arc::new(valid_numbers.into_iter().map(Into::into).collect()),
            profiles: Arc::default(),
        }
    }

    /// State accepting [`KNOWN_CORPORATION_NUMBERS`]
    pub fn with_known_numbers() -> Self {
        Self::new(KNOWN_CORPORATION_NUMBERS)
    }

    pub fn is_known(&self, number: &str) -> bool {
        self.valid_numbers.contains(number)
    }

    /// Profiles accepted so far, oldest first
    pub fn profiles(&self) -> Vec<StoredProfile> {
        self.profiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, details: ProfileDetailsRequest) -> Uuid {
        let id = Uuid::new_v4();
        self.profiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoredProfile {
                id,
                details,
                received_at: Utc::now(),
            });
        id
    }
}

// ==================== Handlers ====================

type ApiError = (StatusCode, Json<MessageResponse>);

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(MessageResponse {
            message: message.to_string(),
        }),
    )
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /corporation-number/:number
async fn check_corporation_number(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> (StatusCode, Json<CorporationNumberResponse>) {
    if state.is_known(&number) {
        info!("Corporation number {} is valid", number);
        return (
            StatusCode::OK,
            Json(CorporationNumberResponse {
                corporation_number: Some(number),
                valid: true,
                message: None,
            }),
        );
    }

    warn!("Corporation number {} is not registered", number);
    (
        StatusCode::BAD_REQUEST,
        Json(CorporationNumberResponse {
            corporation_number: None,
            valid: false,
            message: Some("Invalid corporation number".to_string()),
        }),
    )
}

/// POST /profile-details
async fn create_profile(
    State(state): State<AppState>,
    Json(payload): Json<ProfileDetailsRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    if !is_valid_name(&payload.first_name) {
        return Err(bad_request("Invalid first name"));
    }
    if !is_valid_name(&payload.last_name) {
        return Err(bad_request("Invalid last name"));
    }
    if !is_valid_phone(&payload.phone) {
        return Err(bad_request("Invalid phone number"));
    }
    if !state.is_known(&payload.corporation_number) {
        return Err(bad_request("Invalid corporation number"));
    }

    let id = state.store(payload);
    info!("Stored profile {}", id);

    Ok(Json(CreatedResponse { id: id.to_string() }))
}

/// GET /profile-details - accepted profiles, for inspection during development
async fn list_profiles(State(state): State<AppState>) -> Json<Vec<StoredProfile>> {
    Json(state.profiles())
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().count() <= MAX_NAME_LEN
}

fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 12
        && phone
            .strip_prefix("+1")
            .is_some_and(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
}

// ==================== Router ====================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/corporation-number/:number", get(check_corporation_number))
        .route("/profile-details", get(list_profiles).post(create_profile))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve [`router`] on an already bound listener until the task is dropped
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}
