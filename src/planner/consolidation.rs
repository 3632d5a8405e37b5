//! Consolidation Planner
//!
//! Enumerates LTL pairing and FTL backhaul candidates over the open cargo
//! offers, asks the evaluator about each one in turn, and collects the
//! accepted ones as suggestions. A failing candidate is logged and skipped;
//! a scan always completes with whatever was accepted.

use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    ConsolidationSuggestion, ScanReport, SuggestionKind, SuggestionStatus, NO_OPPORTUNITIES_NOTICE,
};
use crate::db::EntityStore;
use crate::evaluator::{ConsolidationVerdict, MatchEvaluator};
use crate::metrics::{CANDIDATE_FAILURES, SCAN_DURATION, SUGGESTIONS_EMITTED};
use crate::model::{CargoOffer, Vehicle};

const SCAN_LABEL: &str = "consolidation";

/// Unordered pairs of distinct open offers sharing an exact
/// (origin, destination) lane, as indices into `offers`.
///
/// Offers whose ids coincide are never paired, and each unordered id pair
/// appears at most once.
pub fn ltl_candidate_pairs(offers: &[CargoOffer]) -> Vec<(usize, usize)> {
    let mut lanes: BTreeMap<(&str, &str), Vec<usize>> = BTreeMap::new();
    for (idx, offer) in offers.iter().enumerate() {
        if offer.status.is_open() {
            lanes.entry(offer.lane()).or_default().push(idx);
        }
    }

    let groups: Vec<Vec<usize>> = lanes.into_values().filter(|g| g.len() >= 2).collect();

    let pairs: Vec<(usize, usize)> = groups
        .par_iter()
        .flat_map_iter(|group| {
            group.iter().enumerate().flat_map(move |(pos, &i)| {
                group[pos + 1..]
                    .iter()
                    .filter(move |&&j| offers[i].id != offers[j].id)
                    .map(move |&j| (i, j))
            })
        })
        .collect();

    let mut seen = HashSet::new();
    pairs
        .into_iter()
        .filter(|&(i, j)| {
            let (a, b) = (offers[i].id.as_str(), offers[j].id.as_str());
            seen.insert(if a < b { (a, b) } else { (b, a) })
        })
        .collect()
}

/// (vehicle, offer) index pairs where an available truck stands at an open
/// offer's origin and has the capacity to carry it
pub fn backhaul_candidates(vehicles: &[Vehicle], offers: &[CargoOffer]) -> Vec<(usize, usize)> {
    vehicles
        .par_iter()
        .enumerate()
        .filter(|(_, v)| v.is_available() && v.vehicle_type.is_truck())
        .flat_map_iter(|(vi, vehicle)| {
            offers
                .iter()
                .enumerate()
                .filter(move |(_, o)| {
                    o.status.is_open()
                        && vehicle.current_location == o.origin
                        && vehicle.can_hold(o.weight_kg, o.volume_m3)
                })
                .map(move |(oi, _)| (vi, oi))
        })
        .collect()
}

fn suggestion(
    prefix: &str,
    verdict: ConsolidationVerdict,
    kind: SuggestionKind,
) -> ConsolidationSuggestion {
    SUGGESTIONS_EMITTED.with_label_values(&[kind.label()]).inc();
    ConsolidationSuggestion {
        id: format!("{}-{}", prefix, Uuid::new_v4().simple()),
        status: SuggestionStatus::Suggested,
        ai_analysis: verdict,
        kind,
    }
}

/// Runs consolidation scans against the entity store
pub struct ConsolidationPlanner {
    evaluator: Arc<dyn MatchEvaluator>,
}

impl ConsolidationPlanner {
    pub fn new(evaluator: Arc<dyn MatchEvaluator>) -> Self {
        ConsolidationPlanner { evaluator }
    }

    /// Scan every open offer and available truck.
    ///
    /// The store is only read, from one snapshot taken up front; evaluator
    /// calls run sequentially after the lock is released.
    pub async fn scan(&self, store: &EntityStore) -> ScanReport {
        let start = Instant::now();
        let snapshot = store.planning_snapshot().await;
        let offers = &snapshot.cargo_offers;

        let pairs = ltl_candidate_pairs(offers);
        let backhauls = backhaul_candidates(&snapshot.vehicles, offers);

        let mut report = ScanReport {
            candidates: pairs.len() + backhauls.len(),
            ..ScanReport::default()
        };

        info!(
            ltl_pairs = pairs.len(),
            backhauls = backhauls.len(),
            evaluator = self.evaluator.name(),
            "Starting consolidation scan"
        );

        for (i, j) in pairs {
            let (a, b) = (&offers[i], &offers[j]);
            match self.evaluator.evaluate_ltl_pair(a, b).await {
                Ok(verdict) if verdict.is_good_candidate => {
                    report.suggestions.push(suggestion(
                        "LTL",
                        verdict,
                        SuggestionKind::LtlConsolidation {
                            involved_offer_ids: [a.id.clone(), b.id.clone()],
                            combined_weight_kg: Some(a.weight_kg + b.weight_kg),
                            combined_volume_m3: Some(a.volume_m3 + b.volume_m3),
                        },
                    ));
                }
                Ok(verdict) => {
                    debug!(
                        offer_a = %a.id,
                        offer_b = %b.id,
                        reasoning = %verdict.reasoning,
                        "LTL pair rejected"
                    );
                }
                Err(e) => {
                    report.failures += 1;
                    CANDIDATE_FAILURES.with_label_values(&[SCAN_LABEL]).inc();
                    warn!(offer_a = %a.id, offer_b = %b.id, error = %e, "Skipping LTL candidate");
                }
            }
        }

        for (vi, oi) in backhauls {
            let (vehicle, offer) = (&snapshot.vehicles[vi], &offers[oi]);
            match self.evaluator.evaluate_backhaul(vehicle, offer).await {
                Ok(verdict) if verdict.is_good_candidate => {
                    report.suggestions.push(suggestion(
                        "FTL",
                        verdict,
                        SuggestionKind::FtlBackhaul {
                            vehicle_id: vehicle.id.clone(),
                            offer_id: offer.id.clone(),
                        },
                    ));
                }
                Ok(verdict) => {
                    debug!(
                        vehicle_id = %vehicle.id,
                        offer_id = %offer.id,
                        reasoning = %verdict.reasoning,
                        "Backhaul rejected"
                    );
                }
                Err(e) => {
                    report.failures += 1;
                    CANDIDATE_FAILURES.with_label_values(&[SCAN_LABEL]).inc();
                    warn!(
                        vehicle_id = %vehicle.id,
                        offer_id = %offer.id,
                        error = %e,
                        "Skipping backhaul candidate"
                    );
                }
            }
        }

        if report.suggestions.is_empty() {
            report.notice = Some(NO_OPPORTUNITIES_NOTICE.to_string());
        }

        let elapsed = start.elapsed();
        SCAN_DURATION
            .with_label_values(&[SCAN_LABEL])
            .observe(elapsed.as_secs_f64());
        info!(
            candidates = report.candidates,
            accepted = report.suggestions.len(),
            failures = report.failures,
            elapsed_ms = elapsed.as_millis() as u64,
            "Consolidation scan complete"
        );

        report
    }
}
