//! HTTP front end. Handlers validate, call the engine once, and map the outcome
//! to a status code; no business rules live here.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::{Admission, Engine, EngineError, UpdateOutcome};
use crate::model::{ReservationInfo, SlotAvailability, SlotInfo};
use crate::observability::{record_request, Operation};
use crate::validate::{
    parse_date, validate_inventory_request, validate_inventory_update,
    validate_reservation_request, InventoryCommand, InventoryRequest,
    InventoryUpdateRequest, ReservationRequest, ValidationError,
};

pub const BANNER: &str = "Reservation Service v1";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/reservations", post(create_reservation).get(list_reservations))
        .route("/inventory", post(create_inventory).get(list_inventory))
        .route("/inventory/update", put(update_inventory))
        .route("/availability", get(availability))
        .with_state(AppState { engine })
}

// ── Errors ───────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    Rejected(String),
    Conflict(&'static str),
    Engine(EngineError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Rejected(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Engine(EngineError::WalError(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Engine(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Validation(e) => e.to_string(),
            ApiError::Rejected(msg) => msg.clone(),
            ApiError::Conflict(msg) => (*msg).to_string(),
            ApiError::Engine(EngineError::WalError(_)) => "Internal error.".to_string(),
            ApiError::Engine(e) => e.to_string(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self:?}");
        }
        (status, Json(ErrorBody { error: self.message() })).into_response()
    }
}

/// Record the request metric from the final status, then hand the response back.
fn finish<T: IntoResponse>(op: Operation, started: Instant, result: Result<T, ApiError>) -> Response {
    let response = result.into_response();
    record_request(op, response.status().as_u16(), started);
    response
}

// ── Handlers ─────────────────────────────────────────────────────

async fn banner() -> &'static str {
    BANNER
}

#[derive(Debug, Serialize)]
pub struct CreatedReservation {
    pub id: Ulid,
}

async fn create_reservation(
    State(state): State<AppState>,
    Json(body): Json<ReservationRequest>,
) -> Response {
    let started = Instant::now();
    let result = admit(&state.engine, &body).await;
    finish(Operation::CreateReservation, started, result)
}

async fn admit(
    engine: &Engine,
    body: &ReservationRequest,
) -> Result<(StatusCode, Json<CreatedReservation>), ApiError> {
    let req = validate_reservation_request(body)?;
    let (party_size, date, time) = (req.party_size, req.date, req.time);
    let message = match engine.create_reservation(Ulid::new(), req).await? {
        Admission::Admitted(r) => {
            return Ok((StatusCode::CREATED, Json(CreatedReservation { id: r.id })));
        }
        Admission::NoInventoryForPartySize => {
            format!("No inventory is available for a party size of {party_size} at {time}.")
        }
        Admission::InventoryAtCapacity => {
            format!("All inventory is taken for {} at {time}.", date.format("%m-%d-%Y"))
        }
        Admission::ConstraintViolated => "A reservation already exists for that time.".to_string(),
    };
    Err(ApiError::Rejected(message))
}

async fn create_inventory(
    State(state): State<AppState>,
    Json(body): Json<InventoryRequest>,
) -> Response {
    let started = Instant::now();
    let result = async {
        let spec = validate_inventory_request(&body)?;
        apply_inventory(&state.engine, InventoryCommand::Create(spec)).await
    }
    .await;
    finish(Operation::CreateInventory, started, result.map(|()| StatusCode::CREATED))
}

async fn update_inventory(
    State(state): State<AppState>,
    Json(body): Json<InventoryUpdateRequest>,
) -> Response {
    let started = Instant::now();
    let result = async {
        let command = validate_inventory_update(&body)?;
        apply_inventory(&state.engine, command).await
    }
    .await;
    finish(Operation::UpdateInventory, started, result.map(|()| StatusCode::NO_CONTENT))
}

async fn apply_inventory(engine: &Engine, command: InventoryCommand) -> Result<(), ApiError> {
    let spec = *command.spec();
    match command {
        InventoryCommand::Create(_) => {
            engine
                .create_inventory(spec.times(), spec.max_party_size, spec.max_reservations)
                .await?;
            Ok(())
        }
        InventoryCommand::UpdateAfterDate { start_date, .. } => {
            let outcome = engine
                .update_inventory_after_date(
                    start_date,
                    spec.times(),
                    spec.max_party_size,
                    spec.max_reservations,
                )
                .await?;
            match outcome {
                UpdateOutcome::Updated => Ok(()),
                UpdateOutcome::ReservationsExist => Err(ApiError::Conflict(
                    "Reservations already exist on or after that date.",
                )),
            }
        }
    }
}

async fn list_inventory(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let slots: Vec<SlotInfo> = state.engine.list_slots().await;
    finish(Operation::ListInventory, started, Ok::<_, ApiError>(Json(slots)))
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    /// mm-dd-yyyy
    pub date: Option<String>,
}

async fn list_reservations(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Response {
    let started = Instant::now();
    let result = async {
        let date = query.date.as_deref().map(parse_date).transpose()?;
        let found: Vec<ReservationInfo> = state.engine.list_reservations(date).await;
        Ok::<_, ApiError>(Json(found))
    }
    .await;
    finish(Operation::ListReservations, started, result)
}

async fn availability(State(state): State<AppState>, Query(query): Query<DateQuery>) -> Response {
    let started = Instant::now();
    let result = async {
        let raw = query
            .date
            .as_deref()
            .ok_or(ApiError::Validation(ValidationError::InvalidDateFormat))?;
        let date = parse_date(raw)?;
        let slots: Vec<SlotAvailability> = state.engine.availability(date).await;
        Ok::<_, ApiError>(Json(slots))
    }
    .await;
    finish(Operation::Availability, started, result)
}
