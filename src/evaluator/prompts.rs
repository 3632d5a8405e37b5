//! Prompt construction for match evaluation.
//!
//! The JSON shapes requested here are part of the gateway contract; their
//! field names round-trip through the verdict types and must not change.

use crate::model::{CargoOffer, Vehicle};

pub const CONSOLIDATION_VERDICT_SHAPE: &str = r#"{"is_good_candidate": boolean, "reasoning": "string", "suggestion_description": "string", "potential_benefit": "string"}"#;

pub const FORWARD_HAUL_VERDICT_SHAPE: &str = r#"{"is_compatible_for_forward_haul": boolean, "reasoning": "string explaining why it is or is not compatible", "pickup_feasibility_notes": "string about the pickup", "delivery_alignment_notes": "string about how the delivery aligns with the vehicle's route"}"#;

fn describe_offer(label: &str, offer: &CargoOffer) -> String {
    format!(
        "{}: ID={}, Origin={}, Destination={}, Type={}, Weight={}kg, Volume={}m³, Pickup date={}.",
        label,
        offer.id,
        offer.origin,
        offer.destination,
        offer.cargo_type,
        offer.weight_kg,
        offer.volume_m3,
        offer.pickup_date
    )
}

fn describe_vehicle(vehicle: &Vehicle) -> String {
    format!(
        "Vehicle ID={} (Type={}, Capacity={}kg / {}m³, Current location={})",
        vehicle.id,
        vehicle.vehicle_type,
        vehicle.capacity_kg,
        vehicle.capacity_m3,
        vehicle.current_location
    )
}

/// Ask whether two LTL offers on the same lane should share one truck
pub fn ltl_consolidation(a: &CargoOffer, b: &CargoOffer) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "Analyze whether the following LTL cargo offers are good candidates to consolidate into a single FTL shipment.\n",
    );
    prompt.push_str(&describe_offer("Offer A", a));
    prompt.push('\n');
    prompt.push_str(&describe_offer("Offer B", b));
    prompt.push('\n');
    prompt.push_str(
        "Consider route compatibility, dates, cargo type (perishables travel separately), and whether the combined weight and volume justify a full truck.\n",
    );
    prompt.push_str("Respond strictly in JSON with the following structure: ");
    prompt.push_str(CONSOLIDATION_VERDICT_SHAPE);
    prompt
}

/// Ask whether an offer starting at a vehicle's location is a good return load
pub fn ftl_backhaul(vehicle: &Vehicle, offer: &CargoOffer) -> String {
    format!(
        "Analyze whether cargo offer ID={} (Origin={}, Destination={}, Type={}, Weight={}kg, Volume={}m³, Pickup date={}) \
         is a good backhaul opportunity for {}. Consider whether the offer's destination is a logical return route \
         or leads towards a main hub from the vehicle's location.\n\
         Respond strictly in JSON with the following structure: {}",
        offer.id,
        offer.origin,
        offer.destination,
        offer.cargo_type,
        offer.weight_kg,
        offer.volume_m3,
        offer.pickup_date,
        describe_vehicle(vehicle),
        CONSOLIDATION_VERDICT_SHAPE
    )
}

/// Ask whether an offer is a suitable outbound leg towards a declared destination
pub fn forward_haul(vehicle: &Vehicle, offer: &CargoOffer, intended_destination: &str) -> String {
    let mut prompt = format!(
        "Analyze whether cargo offer ID={} (Origin={}, Destination={}, Cargo type={}, Weight={}kg, Volume={}m³, \
         Pickup={}, Delivery={}) is compatible as OUTBOUND cargo (forward haul) for {} whose intended final destination is {}.\n",
        offer.id,
        offer.origin,
        offer.destination,
        offer.cargo_type,
        offer.weight_kg,
        offer.volume_m3,
        offer.pickup_date,
        offer.delivery_date,
        describe_vehicle(vehicle),
        intended_destination
    );
    prompt.push_str("Consider the following:\n");
    prompt.push_str(&format!(
        "1. Is the cargo origin ({}) reasonably close to the vehicle's current location ({}) to be picked up as the first leg of a trip starting from {}?\n",
        offer.origin, vehicle.current_location, vehicle.current_location
    ));
    prompt.push_str(&format!(
        "2. Is the cargo destination ({}) on a logical route towards the vehicle's final destination ({}), an intermediate stop, or the destination itself?\n",
        offer.destination, intended_destination
    ));
    prompt.push_str(
        "3. This must NOT be a return load (backhaul). We are looking for cargo for the main outbound trip.\n",
    );
    prompt.push_str("4. Are the pickup and delivery dates reasonable in this context?\n");
    prompt.push_str("Respond strictly in JSON with the following structure: ");
    prompt.push_str(FORWARD_HAUL_VERDICT_SHAPE);
    prompt
}
