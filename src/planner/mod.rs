//! Load Planning
//!
//! Consolidation scans (LTL pairing and FTL backhaul), the review queue the
//! resulting suggestions live in, and the forward-haul search for a single
//! vehicle.

pub mod consolidation;
pub mod forward_haul;

pub use consolidation::{backhaul_candidates, ltl_candidate_pairs, ConsolidationPlanner};
pub use forward_haul::{
    ForwardHaulPlanner, ForwardHaulReport, ForwardHaulSession, ForwardHaulSuggestion,
};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::info;

use crate::audit::{AuditEvent, AuditEventType};
use crate::db::EntityStore;
use crate::error::{OperationError, OperationResult};
use crate::evaluator::ConsolidationVerdict;
use crate::model::CargoStatus;
use crate::operations;

/// Review state of a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuggestionStatus {
    Suggested,
    Actioned,
    Dismissed,
}

impl std::fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestionStatus::Suggested => write!(f, "Suggested"),
            SuggestionStatus::Actioned => write!(f, "Actioned"),
            SuggestionStatus::Dismissed => write!(f, "Dismissed"),
        }
    }
}

/// What a suggestion proposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SuggestionKind {
    /// Two LTL offers on the same lane sharing one truck
    #[serde(rename = "LTL_CONSOLIDATION", rename_all = "camelCase")]
    LtlConsolidation {
        involved_offer_ids: [String; 2],
        #[serde(default, skip_serializing_if = "Option::is_none")]
        combined_weight_kg: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        combined_volume_m3: Option<f64>,
    },
    /// An empty truck picking up an offer where it stands
    #[serde(rename = "FTL_BACKHAUL", rename_all = "camelCase")]
    FtlBackhaul { vehicle_id: String, offer_id: String },
}

impl SuggestionKind {
    pub fn label(&self) -> &'static str {
        match self {
            SuggestionKind::LtlConsolidation { .. } => "ltl",
            SuggestionKind::FtlBackhaul { .. } => "ftl_backhaul",
        }
    }
}

/// An accepted candidate awaiting operator review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationSuggestion {
    pub id: String,
    pub status: SuggestionStatus,
    pub ai_analysis: ConsolidationVerdict,
    #[serde(flatten)]
    pub kind: SuggestionKind,
}

/// Operator decision on a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Action,
    Dismiss,
}

impl ReviewDecision {
    fn target(&self) -> SuggestionStatus {
        match self {
            ReviewDecision::Action => SuggestionStatus::Actioned,
            ReviewDecision::Dismiss => SuggestionStatus::Dismissed,
        }
    }
}

/// Result of one consolidation scan. Per-candidate failures are counted,
/// never raised.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub suggestions: Vec<ConsolidationSuggestion>,
    pub candidates: usize,
    pub failures: usize,
    /// Informational message for the operator, not an error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

pub const NO_OPPORTUNITIES_NOTICE: &str = "No consolidation or backhaul opportunities found.";

/// Review queue holding the suggestions of the latest scan
#[derive(Default)]
pub struct SuggestionBoard {
    suggestions: Mutex<Vec<ConsolidationSuggestion>>,
}

impl SuggestionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue with a fresh scan's output
    pub async fn publish(&self, suggestions: Vec<ConsolidationSuggestion>) {
        *self.suggestions.lock().await = suggestions;
    }

    pub async fn list(&self) -> Vec<ConsolidationSuggestion> {
        self.suggestions.lock().await.clone()
    }

    /// Apply an operator decision.
    ///
    /// Only `Suggested` entries can move. Actioning an LTL suggestion flips
    /// both offers to Consolidating; actioning a backhaul commits the
    /// assignment. Either way the store write and its audit entry happen
    /// under one store lock.
    pub async fn review(
        &self,
        store: &EntityStore,
        suggestion_id: &str,
        decision: ReviewDecision,
    ) -> OperationResult<ConsolidationSuggestion> {
        let mut suggestions = self.suggestions.lock().await;
        let suggestion = suggestions
            .iter_mut()
            .find(|s| s.id == suggestion_id)
            .ok_or_else(|| OperationError::not_found("suggestion", suggestion_id))?;

        let target = decision.target();
        if suggestion.status != SuggestionStatus::Suggested {
            return Err(OperationError::InvalidTransition {
                from: suggestion.status.to_string(),
                to: target.to_string(),
            });
        }

        if decision == ReviewDecision::Action {
            match &suggestion.kind {
                SuggestionKind::LtlConsolidation {
                    involved_offer_ids, ..
                } => action_ltl(store, &suggestion.id, involved_offer_ids).await?,
                SuggestionKind::FtlBackhaul {
                    vehicle_id,
                    offer_id,
                } => action_backhaul(store, &suggestion.id, vehicle_id, offer_id).await?,
            }
        }

        suggestion.status = target;
        info!(suggestion_id = %suggestion.id, status = %target, "Suggestion reviewed");
        Ok(suggestion.clone())
    }
}

async fn action_ltl(
    store: &EntityStore,
    suggestion_id: &str,
    offer_ids: &[String; 2],
) -> OperationResult<()> {
    store
        .update(|c| -> OperationResult<()> {
            for id in offer_ids {
                let offer = c
                    .offer(id)
                    .ok_or_else(|| OperationError::not_found("cargo offer", id.as_str()))?;
                if !offer.status.is_open() {
                    return Err(OperationError::Conflict(format!(
                        "Cargo offer {} is {} and can no longer be consolidated",
                        offer.id, offer.status
                    )));
                }
            }

            for id in offer_ids {
                if let Some(offer) = c.offer_mut(id) {
                    offer.status = CargoStatus::Consolidating;
                }
            }

            c.audit.append(
                AuditEvent::new(
                    AuditEventType::LtlConsolidationActioned,
                    json!({ "suggestionId": suggestion_id, "offerIds": offer_ids }),
                )
                .related_to(suggestion_id)
                .by(operations::SYSTEM_ACTOR),
            );
            Ok(())
        })
        .await
}

async fn action_backhaul(
    store: &EntityStore,
    suggestion_id: &str,
    vehicle_id: &str,
    offer_id: &str,
) -> OperationResult<()> {
    store
        .update(|c| -> OperationResult<()> {
            operations::assign_in(c, offer_id, vehicle_id)?;
            c.audit.append(
                AuditEvent::new(
                    AuditEventType::FtlBackhaulActioned,
                    json!({
                        "suggestionId": suggestion_id,
                        "vehicleId": vehicle_id,
                        "cargoOfferId": offer_id,
                    }),
                )
                .related_to(suggestion_id)
                .by(operations::SYSTEM_ACTOR),
            );
            Ok(())
        })
        .await
}
