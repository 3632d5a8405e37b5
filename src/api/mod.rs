//! HTTP API
//!
//! JSON surface over the store, planners and advisory analyses, plus the
//! `/health` and `/metrics` endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::advisory::{
    Advisor, AlertAnalysis, BackhaulFigures, BackhaulImpactReport, CarbonFootprintAnalysis,
    EcoRouteAnalysis, EcoRouteFigures, MonthlyEmissions, RiskAnalysis, RouteSuggestion,
};
use crate::audit::{AuditEventType, BlockchainEvent};
use crate::db::EntityStore;
use crate::error::OperationError;
use crate::evaluator::MatchEvaluator;
use crate::gateway::{GatewayError, TextGenerator};
use crate::metrics;
use crate::model::{Alert, AlertSeverity, CargoOffer, Shipment, ShipmentStatus, Vehicle};
use crate::operations::{self, CargoOfferDraft};
use crate::planner::{
    ConsolidationPlanner, ConsolidationSuggestion, ForwardHaulPlanner, ForwardHaulReport,
    ForwardHaulSession, ReviewDecision, ScanReport, SuggestionBoard,
};

/// Shared application state
pub struct AppState {
    pub store: Arc<EntityStore>,
    pub consolidation: ConsolidationPlanner,
    pub forward_haul: ForwardHaulPlanner,
    pub suggestions: SuggestionBoard,
    pub session: ForwardHaulSession,
    /// Absent when no text-generation service is configured
    pub advisor: Option<Advisor>,
}

impl AppState {
    pub fn new(
        store: Arc<EntityStore>,
        evaluator: Arc<dyn MatchEvaluator>,
        generator: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        AppState {
            store,
            consolidation: ConsolidationPlanner::new(evaluator.clone()),
            forward_haul: ForwardHaulPlanner::new(evaluator),
            suggestions: SuggestionBoard::new(),
            session: ForwardHaulSession::new(),
            advisor: generator.map(Advisor::new),
        }
    }

    fn advisor(&self) -> Result<&Advisor, ApiError> {
        self.advisor
            .as_ref()
            .ok_or(ApiError(OperationError::Gateway(GatewayError::NotConfigured)))
    }
}

/// Operation failure rendered as a JSON error body
pub struct ApiError(OperationError);

impl From<OperationError> for ApiError {
    fn from(err: OperationError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OperationError::Validation(_) => StatusCode::BAD_REQUEST,
            OperationError::NotFound { .. } => StatusCode::NOT_FOUND,
            OperationError::Conflict(_) | OperationError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            OperationError::Gateway(_) | OperationError::UnusableAnswer => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        (status, Json(json!({ "error": self.0.user_message() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(
            "/api/cargo-offers",
            get(list_cargo_offers)
                .post(create_cargo_offer)
                .put(replace_cargo_offers),
        )
        .route(
            "/api/cargo-offers/:id/compatible-vehicles",
            get(compatible_vehicles),
        )
        .route("/api/vehicles", get(list_vehicles).put(replace_vehicles))
        .route("/api/shipments", get(list_shipments).put(replace_shipments))
        .route("/api/shipments/:id/status", post(update_shipment_status))
        .route(
            "/api/alerts",
            get(list_alerts).post(create_alert).put(replace_alerts),
        )
        .route("/api/alerts/:id/analysis", post(analyze_alert))
        .route("/api/audit-log", get(audit_log))
        .route("/api/assignments", post(assign))
        .route("/api/consolidation/scan", post(consolidation_scan))
        .route("/api/consolidation/suggestions", get(list_suggestions))
        .route(
            "/api/consolidation/suggestions/:id/review",
            post(review_suggestion),
        )
        .route("/api/forward-haul/search", post(forward_haul_search))
        .route(
            "/api/forward-haul/session",
            get(forward_haul_session).delete(clear_forward_haul_session),
        )
        .route("/api/forward-haul/assign", post(forward_haul_assign))
        .route("/api/advisory/route", post(optimize_route))
        .route("/api/advisory/risk", post(analyze_risk))
        .route("/api/advisory/carbon-footprint", post(analyze_carbon_footprint))
        .route("/api/advisory/eco-routes", post(analyze_eco_routes))
        .route("/api/advisory/backhaul-impact", post(analyze_backhaul_impact))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn metrics_handler() -> Response {
    match metrics::render() {
        Ok(body) => body.into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// Collections

async fn list_cargo_offers(State(state): State<Arc<AppState>>) -> Json<Vec<CargoOffer>> {
    Json(state.store.cargo_offers().await)
}

async fn replace_cargo_offers(
    State(state): State<Arc<AppState>>,
    Json(offers): Json<Vec<CargoOffer>>,
) -> StatusCode {
    state.store.replace_cargo_offers(offers).await;
    StatusCode::NO_CONTENT
}

async fn create_cargo_offer(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<CargoOfferDraft>,
) -> Result<(StatusCode, Json<CargoOffer>), ApiError> {
    let offer = operations::create_cargo_offer(&state.store, draft).await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

async fn compatible_vehicles(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Vehicle>> {
    Ok(Json(operations::compatible_vehicles(&state.store, &id).await?))
}

async fn list_vehicles(State(state): State<Arc<AppState>>) -> Json<Vec<Vehicle>> {
    Json(state.store.vehicles().await)
}

async fn replace_vehicles(
    State(state): State<Arc<AppState>>,
    Json(vehicles): Json<Vec<Vehicle>>,
) -> StatusCode {
    state.store.replace_vehicles(vehicles).await;
    StatusCode::NO_CONTENT
}

async fn list_shipments(State(state): State<Arc<AppState>>) -> Json<Vec<Shipment>> {
    Json(state.store.shipments().await)
}

async fn replace_shipments(
    State(state): State<Arc<AppState>>,
    Json(shipments): Json<Vec<Shipment>>,
) -> StatusCode {
    state.store.replace_shipments(shipments).await;
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShipmentStatusUpdate {
    status: ShipmentStatus,
    location: Option<String>,
}

async fn update_shipment_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<ShipmentStatusUpdate>,
) -> ApiResult<Shipment> {
    let shipment =
        operations::update_shipment_status(&state.store, &id, update.status, update.location)
            .await?;
    Ok(Json(shipment))
}

async fn list_alerts(State(state): State<Arc<AppState>>) -> Json<Vec<Alert>> {
    Json(state.store.alerts().await)
}

async fn replace_alerts(
    State(state): State<Arc<AppState>>,
    Json(alerts): Json<Vec<Alert>>,
) -> StatusCode {
    state.store.replace_alerts(alerts).await;
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewAlert {
    message: String,
    severity: AlertSeverity,
    related_shipment_id: Option<String>,
}

async fn create_alert(
    State(state): State<Arc<AppState>>,
    Json(alert): Json<NewAlert>,
) -> Result<(StatusCode, Json<Alert>), ApiError> {
    let alert = operations::create_alert(
        &state.store,
        &alert.message,
        alert.severity,
        alert.related_shipment_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

async fn audit_log(State(state): State<Arc<AppState>>) -> Json<Vec<BlockchainEvent>> {
    Json(state.store.audit_log().await)
}

// Matching

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignmentRequest {
    cargo_offer_id: String,
    vehicle_id: String,
}

async fn assign(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AssignmentRequest>,
) -> ApiResult<Shipment> {
    let shipment =
        operations::assign_cargo(&state.store, &request.cargo_offer_id, &request.vehicle_id)
            .await?;
    Ok(Json(shipment))
}

async fn consolidation_scan(State(state): State<Arc<AppState>>) -> Json<ScanReport> {
    let report = state.consolidation.scan(&state.store).await;
    state.suggestions.publish(report.suggestions.clone()).await;
    Json(report)
}

async fn list_suggestions(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<ConsolidationSuggestion>> {
    Json(state.suggestions.list().await)
}

#[derive(Deserialize)]
struct ReviewRequest {
    decision: ReviewDecision,
}

async fn review_suggestion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> ApiResult<ConsolidationSuggestion> {
    let suggestion = state
        .suggestions
        .review(&state.store, &id, request.decision)
        .await?;
    Ok(Json(suggestion))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForwardHaulRequest {
    vehicle_id: String,
    intended_destination: String,
}

async fn forward_haul_search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForwardHaulRequest>,
) -> ApiResult<ForwardHaulReport> {
    let report = state
        .forward_haul
        .search(&state.store, &request.vehicle_id, &request.intended_destination)
        .await?;
    state.session.record(report.clone()).await;
    Ok(Json(report))
}

async fn forward_haul_session(
    State(state): State<Arc<AppState>>,
) -> Json<Option<ForwardHaulReport>> {
    Json(state.session.current().await)
}

async fn clear_forward_haul_session(State(state): State<Arc<AppState>>) -> StatusCode {
    state.session.clear().await;
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForwardHaulAssignRequest {
    cargo_offer_id: String,
}

async fn forward_haul_assign(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForwardHaulAssignRequest>,
) -> ApiResult<Shipment> {
    let shipment = state
        .session
        .assign(&state.store, &request.cargo_offer_id)
        .await?;
    Ok(Json(shipment))
}

// Advisory

#[derive(Deserialize)]
struct RouteRequest {
    origin: String,
    destination: String,
}

async fn optimize_route(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RouteRequest>,
) -> ApiResult<RouteSuggestion> {
    let route = state
        .advisor()?
        .optimize_route(&request.origin, &request.destination)
        .await?;
    Ok(Json(route))
}

#[derive(Deserialize)]
struct RiskRequest {
    scenario: String,
}

async fn analyze_risk(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RiskRequest>,
) -> ApiResult<RiskAnalysis> {
    Ok(Json(state.advisor()?.analyze_risk(&request.scenario).await?))
}

async fn analyze_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<AlertAnalysis> {
    let alert = state
        .store
        .read(|c| c.alerts.iter().find(|a| a.id == id).cloned())
        .await
        .ok_or_else(|| OperationError::not_found("alert", id.as_str()))?;
    Ok(Json(state.advisor()?.analyze_alert(&alert).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CarbonFootprintRequest {
    monthly_emissions: Vec<MonthlyEmissions>,
    total_trips: u32,
}

async fn analyze_carbon_footprint(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CarbonFootprintRequest>,
) -> ApiResult<CarbonFootprintAnalysis> {
    let analysis = state
        .advisor()?
        .analyze_carbon_footprint(&request.monthly_emissions, request.total_trips)
        .await?;
    Ok(Json(analysis))
}

async fn analyze_eco_routes(
    State(state): State<Arc<AppState>>,
    Json(figures): Json<EcoRouteFigures>,
) -> ApiResult<EcoRouteAnalysis> {
    Ok(Json(state.advisor()?.analyze_eco_routes(&figures).await?))
}

/// Backhauls are counted from the retained audit entries
async fn analyze_backhaul_impact(
    State(state): State<Arc<AppState>>,
) -> ApiResult<BackhaulImpactReport> {
    let advisor = state.advisor()?;
    let backhauls = state
        .store
        .read(|c| c.audit.count(AuditEventType::FtlBackhaulActioned, None))
        .await;
    let report = advisor
        .analyze_backhaul_impact(BackhaulFigures::from_count(backhauls))
        .await?;
    Ok(Json(report))
}
