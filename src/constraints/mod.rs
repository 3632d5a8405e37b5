//! Compatibility Filter
//!
//! Decides whether a vehicle can legally and physically carry a cargo offer.
//! All rules are hard: a vehicle is compatible only if every check passes.
//!
//! 1. The vehicle is Available.
//! 2. Capacity covers the offer's weight and volume.
//! 3. Perishable or frozen cargo rides only on refrigerated trucks.

use crate::model::{CargoOffer, Vehicle, VehicleType};
use serde::{Deserialize, Serialize};

/// Cargo-type fragments (matched case-insensitively) that need a reefer
pub const REFRIGERATED_CARGO_KEYWORDS: [&str; 2] = ["perecedero", "congelado"];

/// Result of a single compatibility check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintResult {
    pub constraint_id: String,
    pub constraint_type: ConstraintType,
    pub passed: bool,
    pub message: String,
}

/// Types of compatibility checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConstraintType {
    Availability,
    Capacity,
    Refrigeration,
}

impl std::fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintType::Availability => write!(f, "AVAILABILITY"),
            ConstraintType::Capacity => write!(f, "CAPACITY"),
            ConstraintType::Refrigeration => write!(f, "REFRIGERATION"),
        }
    }
}

/// Whether a cargo type label denotes perishable or frozen goods
pub fn requires_refrigeration(cargo_type: &str) -> bool {
    let lowered = cargo_type.to_lowercase();
    REFRIGERATED_CARGO_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Full compatibility: availability, capacity and refrigeration
pub fn is_compatible(vehicle: &Vehicle, offer: &CargoOffer) -> bool {
    vehicle.is_available() && fits_cargo(vehicle, offer)
}

/// Capacity and refrigeration rules only, for callers that have already
/// established availability
pub fn fits_cargo(vehicle: &Vehicle, offer: &CargoOffer) -> bool {
    vehicle.can_hold(offer.weight_kg, offer.volume_m3) && refrigeration_ok(vehicle, offer)
}

fn refrigeration_ok(vehicle: &Vehicle, offer: &CargoOffer) -> bool {
    !requires_refrigeration(&offer.cargo_type)
        || vehicle.vehicle_type == VehicleType::RefrigeratedTruck
}

/// Evaluate every rule and report each outcome, in rule order
pub fn evaluate(vehicle: &Vehicle, offer: &CargoOffer) -> Vec<ConstraintResult> {
    vec![
        check_availability(vehicle),
        check_capacity(vehicle, offer),
        check_refrigeration(vehicle, offer),
    ]
}

fn check_availability(vehicle: &Vehicle) -> ConstraintResult {
    let passed = vehicle.is_available();
    ConstraintResult {
        constraint_id: "vehicle-available".to_string(),
        constraint_type: ConstraintType::Availability,
        passed,
        message: format!("Vehicle {} is {}", vehicle.id, vehicle.availability),
    }
}

fn check_capacity(vehicle: &Vehicle, offer: &CargoOffer) -> ConstraintResult {
    let passed = vehicle.can_hold(offer.weight_kg, offer.volume_m3);
    let message = if passed {
        format!(
            "Load {}kg / {}m³ fits capacity {}kg / {}m³",
            offer.weight_kg, offer.volume_m3, vehicle.capacity_kg, vehicle.capacity_m3
        )
    } else {
        format!(
            "Load {}kg / {}m³ exceeds capacity {}kg / {}m³",
            offer.weight_kg, offer.volume_m3, vehicle.capacity_kg, vehicle.capacity_m3
        )
    };

    ConstraintResult {
        constraint_id: "capacity".to_string(),
        constraint_type: ConstraintType::Capacity,
        passed,
        message,
    }
}

fn check_refrigeration(vehicle: &Vehicle, offer: &CargoOffer) -> ConstraintResult {
    let needs_reefer = requires_refrigeration(&offer.cargo_type);
    let passed = refrigeration_ok(vehicle, offer);
    let message = match (needs_reefer, passed) {
        (false, _) => format!("'{}' has no temperature requirement", offer.cargo_type),
        (true, true) => format!("'{}' rides on a refrigerated truck", offer.cargo_type),
        (true, false) => format!(
            "'{}' needs a refrigerated truck, vehicle is {}",
            offer.cargo_type, vehicle.vehicle_type
        ),
    };

    ConstraintResult {
        constraint_id: "temperature-class".to_string(),
        constraint_type: ConstraintType::Refrigeration,
        passed,
        message,
    }
}
