//! Forward-Haul Planner
//!
//! For one available vehicle and a declared final destination, finds pending
//! offers that can ride on the outbound leg. The operator then commits one
//! of them through the regular assignment, which ends the session.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::constraints::fits_cargo;
use crate::db::EntityStore;
use crate::error::{OperationError, OperationResult};
use crate::evaluator::{ForwardHaulVerdict, MatchEvaluator};
use crate::metrics::{CANDIDATE_FAILURES, SCAN_DURATION, SUGGESTIONS_EMITTED};
use crate::model::{CargoOffer, CargoStatus, Shipment};
use crate::operations;

const SCAN_LABEL: &str = "forward_haul";

pub const NO_PENDING_OFFERS_NOTICE: &str = "There are no pending cargo offers to evaluate.";
pub const NO_COMPATIBLE_CARGO_NOTICE: &str =
    "No compatible cargo found for this vehicle and destination.";

/// An offer accepted as outbound cargo
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardHaulSuggestion {
    pub offer: CargoOffer,
    pub verdict: ForwardHaulVerdict,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardHaulReport {
    pub vehicle_id: String,
    pub intended_destination: String,
    pub suggestions: Vec<ForwardHaulSuggestion>,
    pub candidates: usize,
    pub failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

pub struct ForwardHaulPlanner {
    evaluator: Arc<dyn MatchEvaluator>,
}

impl ForwardHaulPlanner {
    pub fn new(evaluator: Arc<dyn MatchEvaluator>) -> Self {
        ForwardHaulPlanner { evaluator }
    }

    /// Search pending offers for `vehicle_id` heading to `intended_destination`.
    ///
    /// Input problems are validation errors and no evaluator call is made.
    /// Candidate failures are skipped and counted.
    pub async fn search(
        &self,
        store: &EntityStore,
        vehicle_id: &str,
        intended_destination: &str,
    ) -> OperationResult<ForwardHaulReport> {
        let vehicle_id = vehicle_id.trim();
        let destination = intended_destination.trim();
        if vehicle_id.is_empty() || destination.is_empty() {
            return Err(OperationError::Validation(
                "Select a vehicle and enter an intended destination.".to_string(),
            ));
        }

        let snapshot = store.planning_snapshot().await;
        let vehicle = snapshot
            .vehicles
            .iter()
            .find(|v| v.id == vehicle_id)
            .ok_or_else(|| {
                OperationError::Validation(format!("Vehicle {} was not found.", vehicle_id))
            })?;
        if !vehicle.is_available() {
            return Err(OperationError::Validation(format!(
                "Vehicle {} is not available ({}).",
                vehicle.id, vehicle.availability
            )));
        }

        let mut report = ForwardHaulReport {
            vehicle_id: vehicle.id.clone(),
            intended_destination: destination.to_string(),
            suggestions: Vec::new(),
            candidates: 0,
            failures: 0,
            notice: None,
        };

        let pending: Vec<&CargoOffer> = snapshot
            .cargo_offers
            .iter()
            .filter(|o| o.status == CargoStatus::Pending)
            .collect();
        if pending.is_empty() {
            report.notice = Some(NO_PENDING_OFFERS_NOTICE.to_string());
            return Ok(report);
        }

        let start = Instant::now();
        let survivors: Vec<&CargoOffer> = pending
            .into_iter()
            .filter(|o| fits_cargo(vehicle, o))
            .collect();
        report.candidates = survivors.len();

        for offer in survivors {
            match self
                .evaluator
                .evaluate_forward_haul(vehicle, offer, destination)
                .await
            {
                Ok(verdict) if verdict.is_compatible_for_forward_haul => {
                    SUGGESTIONS_EMITTED.with_label_values(&[SCAN_LABEL]).inc();
                    report.suggestions.push(ForwardHaulSuggestion {
                        offer: offer.clone(),
                        verdict,
                    });
                }
                Ok(verdict) => {
                    debug!(
                        offer_id = %offer.id,
                        reasoning = %verdict.reasoning,
                        "Forward-haul candidate rejected"
                    );
                }
                Err(e) => {
                    report.failures += 1;
                    CANDIDATE_FAILURES.with_label_values(&[SCAN_LABEL]).inc();
                    warn!(
                        vehicle_id = %vehicle.id,
                        offer_id = %offer.id,
                        error = %e,
                        "Skipping forward-haul candidate"
                    );
                }
            }
        }

        if report.suggestions.is_empty() {
            report.notice = Some(NO_COMPATIBLE_CARGO_NOTICE.to_string());
        }

        let elapsed = start.elapsed();
        SCAN_DURATION
            .with_label_values(&[SCAN_LABEL])
            .observe(elapsed.as_secs_f64());
        info!(
            vehicle_id = %report.vehicle_id,
            destination = %report.intended_destination,
            candidates = report.candidates,
            accepted = report.suggestions.len(),
            failures = report.failures,
            elapsed_ms = elapsed.as_millis() as u64,
            "Forward-haul search complete"
        );

        Ok(report)
    }
}

/// Operator working state between a search and its commit
#[derive(Default)]
pub struct ForwardHaulSession {
    current: Mutex<Option<ForwardHaulReport>>,
}

impl ForwardHaulSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, report: ForwardHaulReport) {
        *self.current.lock().await = Some(report);
    }

    pub async fn current(&self) -> Option<ForwardHaulReport> {
        self.current.lock().await.clone()
    }

    pub async fn clear(&self) {
        *self.current.lock().await = None;
    }

    /// Assign one of the current suggestions to the session's vehicle and
    /// clear the session
    pub async fn assign(&self, store: &EntityStore, offer_id: &str) -> OperationResult<Shipment> {
        let mut current = self.current.lock().await;
        let report = current.as_ref().ok_or_else(|| {
            OperationError::Validation("Run a forward-haul search first.".to_string())
        })?;

        if !report.suggestions.iter().any(|s| s.offer.id == offer_id) {
            return Err(OperationError::Validation(format!(
                "Cargo offer {} is not among the current forward-haul suggestions.",
                offer_id
            )));
        }

        let shipment = operations::assign_cargo(store, offer_id, &report.vehicle_id).await?;
        *current = None;
        Ok(shipment)
    }
}
