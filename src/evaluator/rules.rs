//! Deterministic match evaluation.
//!
//! Same questions as the prompts ask, answered with fixed rules over the
//! offer and vehicle fields. Used when no text-generation service is
//! configured.

use async_trait::async_trait;
use std::collections::HashMap;

use super::{ConsolidationVerdict, EvaluationError, ForwardHaulVerdict, MatchEvaluator};
use crate::constraints::{fits_cargo, requires_refrigeration};
use crate::model::{CargoOffer, Vehicle};

/// Thresholds and route knowledge for [`RuleBasedEvaluator`]
#[derive(Debug, Clone)]
pub struct RuleBasedEvaluatorConfig {
    /// Largest pickup-date gap, in days, for two offers to share a truck
    pub max_pickup_gap_days: i64,
    /// Reference full-truck capacity a consolidated pair must fit into
    pub ftl_capacity_kg: f64,
    pub ftl_capacity_m3: f64,
    /// Final destination -> places a vehicle passes on the way there
    pub corridors: HashMap<String, Vec<String>>,
}

impl Default for RuleBasedEvaluatorConfig {
    fn default() -> Self {
        let mut corridors = HashMap::new();
        corridors.insert(
            "arica".to_string(),
            ["la serena", "copiapó", "antofagasta", "calama", "iquique"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        corridors.insert(
            "puerto montt".to_string(),
            ["rancagua", "talca", "chillán", "concepción", "temuco", "valdivia", "osorno"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        corridors.insert(
            "punta arenas".to_string(),
            ["puerto montt", "coyhaique"].iter().map(|s| s.to_string()).collect(),
        );

        RuleBasedEvaluatorConfig {
            max_pickup_gap_days: 2,
            ftl_capacity_kg: 28000.0,
            ftl_capacity_m3: 35.0,
            corridors,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleBasedEvaluator {
    config: RuleBasedEvaluatorConfig,
}

impl RuleBasedEvaluator {
    pub fn new(config: RuleBasedEvaluatorConfig) -> Self {
        RuleBasedEvaluator { config }
    }

    fn on_the_way(&self, place: &str, intended_destination: &str) -> bool {
        let place = place.trim().to_lowercase();
        let target = intended_destination.trim().to_lowercase();
        place == target
            || self
                .config
                .corridors
                .get(&target)
                .map(|stops| stops.iter().any(|stop| *stop == place))
                .unwrap_or(false)
    }
}

fn rejected(reasoning: String) -> ConsolidationVerdict {
    ConsolidationVerdict {
        is_good_candidate: false,
        reasoning,
        suggestion_description: String::new(),
        potential_benefit: String::new(),
    }
}

#[async_trait]
impl MatchEvaluator for RuleBasedEvaluator {
    async fn evaluate_ltl_pair(
        &self,
        a: &CargoOffer,
        b: &CargoOffer,
    ) -> Result<ConsolidationVerdict, EvaluationError> {
        if a.lane() != b.lane() {
            return Ok(rejected(format!(
                "{} and {} travel different lanes",
                a.id, b.id
            )));
        }

        if requires_refrigeration(&a.cargo_type) != requires_refrigeration(&b.cargo_type) {
            return Ok(rejected(format!(
                "'{}' and '{}' need different temperature classes",
                a.cargo_type, b.cargo_type
            )));
        }

        let gap = (a.pickup_date - b.pickup_date).num_days().abs();
        if gap > self.config.max_pickup_gap_days {
            return Ok(rejected(format!(
                "Pickup dates are {} days apart (limit {})",
                gap, self.config.max_pickup_gap_days
            )));
        }

        let weight = a.weight_kg + b.weight_kg;
        let volume = a.volume_m3 + b.volume_m3;
        if weight > self.config.ftl_capacity_kg || volume > self.config.ftl_capacity_m3 {
            return Ok(rejected(format!(
                "Combined load {}kg / {}m³ exceeds a full truck",
                weight, volume
            )));
        }

        let utilisation = (weight / self.config.ftl_capacity_kg)
            .max(volume / self.config.ftl_capacity_m3)
            * 100.0;

        Ok(ConsolidationVerdict {
            is_good_candidate: true,
            reasoning: format!(
                "Same lane {} → {}, compatible cargo and pickups within {} days",
                a.origin, a.destination, gap
            ),
            suggestion_description: format!(
                "Consolidate {} and {} on one truck from {} to {}",
                a.id, b.id, a.origin, a.destination
            ),
            potential_benefit: format!(
                "One trip instead of two; combined load {}kg / {}m³ uses {:.0}% of a full truck",
                weight, volume, utilisation
            ),
        })
    }

    async fn evaluate_backhaul(
        &self,
        vehicle: &Vehicle,
        offer: &CargoOffer,
    ) -> Result<ConsolidationVerdict, EvaluationError> {
        if !vehicle
            .current_location
            .trim()
            .eq_ignore_ascii_case(offer.origin.trim())
        {
            return Ok(rejected(format!(
                "{} is at {}, offer starts at {}",
                vehicle.id, vehicle.current_location, offer.origin
            )));
        }

        if !fits_cargo(vehicle, offer) {
            return Ok(rejected(format!(
                "{} cannot carry '{}' ({}kg / {}m³)",
                vehicle.id, offer.cargo_type, offer.weight_kg, offer.volume_m3
            )));
        }

        Ok(ConsolidationVerdict {
            is_good_candidate: true,
            reasoning: format!(
                "{} is empty at {} and can carry {} to {}",
                vehicle.id, vehicle.current_location, offer.id, offer.destination
            ),
            suggestion_description: format!(
                "Use {} for {} on its next run from {} to {}",
                vehicle.id, offer.id, offer.origin, offer.destination
            ),
            potential_benefit: "Avoids an empty repositioning run".to_string(),
        })
    }

    async fn evaluate_forward_haul(
        &self,
        vehicle: &Vehicle,
        offer: &CargoOffer,
        intended_destination: &str,
    ) -> Result<ForwardHaulVerdict, EvaluationError> {
        let pickup_here = vehicle
            .current_location
            .trim()
            .eq_ignore_ascii_case(offer.origin.trim());
        let en_route = self.on_the_way(&offer.destination, intended_destination);
        let dates_ok = offer.delivery_date >= offer.pickup_date;

        let compatible = pickup_here && en_route && dates_ok;
        let reasoning = if compatible {
            format!(
                "{} → {} lies on the way from {} to {}",
                offer.origin, offer.destination, vehicle.current_location, intended_destination
            )
        } else if !pickup_here {
            format!(
                "Pickup at {} is not at the vehicle's location {}",
                offer.origin, vehicle.current_location
            )
        } else if !en_route {
            format!(
                "{} is not on the route to {}",
                offer.destination, intended_destination
            )
        } else {
            "Delivery date precedes pickup date".to_string()
        };

        Ok(ForwardHaulVerdict {
            is_compatible_for_forward_haul: compatible,
            reasoning,
            pickup_feasibility_notes: Some(if pickup_here {
                format!("Loads at {} before departure", offer.origin)
            } else {
                format!("Requires repositioning to {}", offer.origin)
            }),
            delivery_alignment_notes: en_route.then(|| {
                format!("Drop at {} on the way to {}", offer.destination, intended_destination)
            }),
        })
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::tests::{offer, vehicle};
    use crate::model::VehicleType;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_same_lane_pair_is_good_candidate() {
        let evaluator = RuleBasedEvaluator::default();
        let a = offer("CGO001", "Santiago", "Valparaíso", "Electrónicos", 500.0, 2.0);
        let b = offer("CGO004", "Santiago", "Valparaíso", "Textiles", 300.0, 1.5);

        let verdict = evaluator.evaluate_ltl_pair(&a, &b).await.unwrap();
        assert!(verdict.is_good_candidate);
        assert!(verdict.suggestion_description.contains("CGO001"));
        assert!(verdict.potential_benefit.contains("800kg"));
    }

    #[tokio::test]
    async fn test_mixed_temperature_classes_are_rejected() {
        let evaluator = RuleBasedEvaluator::default();
        let a = offer("CGO002", "Santiago", "Concepción", "Alimentos Perecederos", 1200.0, 5.0);
        let b = offer("CGO012", "Santiago", "Concepción", "Muebles", 800.0, 6.0);

        let verdict = evaluator.evaluate_ltl_pair(&a, &b).await.unwrap();
        assert!(!verdict.is_good_candidate);
    }

    #[tokio::test]
    async fn test_distant_pickups_are_rejected() {
        let evaluator = RuleBasedEvaluator::default();
        let a = offer("CGO001", "Santiago", "Valparaíso", "Electrónicos", 500.0, 2.0);
        let mut b = offer("CGO004", "Santiago", "Valparaíso", "Textiles", 300.0, 1.5);
        b.pickup_date = NaiveDate::from_ymd_opt(2024, 8, 25).unwrap();

        let verdict = evaluator.evaluate_ltl_pair(&a, &b).await.unwrap();
        assert!(!verdict.is_good_candidate);
        assert!(verdict.reasoning.contains("10 days"));
    }

    #[tokio::test]
    async fn test_configured_thresholds_apply() {
        let evaluator = RuleBasedEvaluator::new(RuleBasedEvaluatorConfig {
            max_pickup_gap_days: 0,
            ftl_capacity_kg: 700.0,
            ..RuleBasedEvaluatorConfig::default()
        });
        let a = offer("CGO001", "Santiago", "Valparaíso", "Electrónicos", 500.0, 2.0);
        let b = offer("CGO004", "Santiago", "Valparaíso", "Textiles", 300.0, 1.5);

        let verdict = evaluator.evaluate_ltl_pair(&a, &b).await.unwrap();
        assert!(!verdict.is_good_candidate);
        assert!(verdict.reasoning.contains("exceeds a full truck"));

        let mut later = b.clone();
        later.weight_kg = 100.0;
        later.pickup_date = NaiveDate::from_ymd_opt(2024, 8, 16).unwrap();
        let verdict = evaluator.evaluate_ltl_pair(&a, &later).await.unwrap();
        assert!(!verdict.is_good_candidate);
        assert!(verdict.reasoning.contains("limit 0"));
    }

    #[tokio::test]
    async fn test_backhaul_requires_fit() {
        let evaluator = RuleBasedEvaluator::default();
        let truck = vehicle("VEH002", VehicleType::FtlTruck, 25000.0, 30.0, "Valparaíso");
        let cargo = offer("CGO003", "Valparaíso", "Santiago", "Vino Embotellado", 2000.0, 8.0);
        let frozen = offer("CGO007", "Valparaíso", "Santiago", "Pescado Congelado", 2000.0, 8.0);

        assert!(evaluator.evaluate_backhaul(&truck, &cargo).await.unwrap().is_good_candidate);
        assert!(!evaluator.evaluate_backhaul(&truck, &frozen).await.unwrap().is_good_candidate);
    }

    #[tokio::test]
    async fn test_forward_haul_follows_corridor() {
        let evaluator = RuleBasedEvaluator::default();
        let truck = vehicle("VEH005", VehicleType::FtlTruck, 28000.0, 35.0, "Santiago");

        let north = offer("CGO009", "Santiago", "Antofagasta", "Repuestos Minería", 3000.0, 10.0);
        let coast = offer("CGO001", "Santiago", "Valparaíso", "Electrónicos", 500.0, 2.0);

        let verdict = evaluator.evaluate_forward_haul(&truck, &north, "Arica").await.unwrap();
        assert!(verdict.is_compatible_for_forward_haul);
        assert!(verdict.delivery_alignment_notes.is_some());

        let verdict = evaluator.evaluate_forward_haul(&truck, &coast, "Arica").await.unwrap();
        assert!(!verdict.is_compatible_for_forward_haul);
        assert!(verdict.reasoning.contains("not on the route"));
    }
}
