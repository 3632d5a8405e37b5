//! Entity Store
//!
//! In-memory owner of every collection (cargo offers, vehicles, shipments,
//! alerts) plus the audit log. All collections sit behind one lock so that
//! multi-collection writes are serialized and applied all-or-nothing.
//! Nothing is durable: the store lives for the process lifetime and can be
//! seeded from a JSON file at startup.

use crate::audit::{AuditEvent, AuditLog, BlockchainEvent};
use crate::model::{
    Alert, Availability, CargoOffer, CargoStatus, Shipment, Vehicle, VehicleType,
};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Every collection held by the store
#[derive(Debug, Clone, Default)]
pub struct Collections {
    pub cargo_offers: Vec<CargoOffer>,
    pub vehicles: Vec<Vehicle>,
    pub shipments: Vec<Shipment>,
    pub alerts: Vec<Alert>,
    pub audit: AuditLog,
}

impl Collections {
    pub fn offer(&self, id: &str) -> Option<&CargoOffer> {
        self.cargo_offers.iter().find(|o| o.id == id)
    }

    pub fn offer_mut(&mut self, id: &str) -> Option<&mut CargoOffer> {
        self.cargo_offers.iter_mut().find(|o| o.id == id)
    }

    pub fn vehicle(&self, id: &str) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    pub fn vehicle_mut(&mut self, id: &str) -> Option<&mut Vehicle> {
        self.vehicles.iter_mut().find(|v| v.id == id)
    }

    pub fn shipment_mut(&mut self, id: &str) -> Option<&mut Shipment> {
        self.shipments.iter_mut().find(|s| s.id == id)
    }
}

/// Read-only copy of the collections a planner scan works from
#[derive(Debug, Clone)]
pub struct PlanningSnapshot {
    pub cargo_offers: Vec<CargoOffer>,
    pub vehicles: Vec<Vehicle>,
}

/// The process-wide entity store
pub struct EntityStore {
    inner: RwLock<Collections>,
}

impl EntityStore {
    pub fn with_audit_capacity(capacity: usize) -> Self {
        Self::from_collections(Collections {
            audit: AuditLog::with_capacity(capacity),
            ..Collections::default()
        })
    }

    pub fn from_collections(collections: Collections) -> Self {
        EntityStore {
            inner: RwLock::new(collections),
        }
    }

    /// Build a store from seed data with an empty audit log
    pub fn seeded(seed: SeedData, audit_capacity: usize) -> Self {
        Self::from_collections(Collections {
            cargo_offers: seed.cargo_offers,
            vehicles: seed.vehicles,
            shipments: seed.shipments,
            alerts: seed.alerts,
            audit: AuditLog::with_capacity(audit_capacity),
        })
    }

    pub async fn cargo_offers(&self) -> Vec<CargoOffer> {
        self.inner.read().await.cargo_offers.clone()
    }

    pub async fn replace_cargo_offers(&self, offers: Vec<CargoOffer>) {
        self.inner.write().await.cargo_offers = offers;
    }

    pub async fn vehicles(&self) -> Vec<Vehicle> {
        self.inner.read().await.vehicles.clone()
    }

    pub async fn replace_vehicles(&self, vehicles: Vec<Vehicle>) {
        self.inner.write().await.vehicles = vehicles;
    }

    pub async fn shipments(&self) -> Vec<Shipment> {
        self.inner.read().await.shipments.clone()
    }

    pub async fn replace_shipments(&self, shipments: Vec<Shipment>) {
        self.inner.write().await.shipments = shipments;
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.inner.read().await.alerts.clone()
    }

    pub async fn replace_alerts(&self, alerts: Vec<Alert>) {
        self.inner.write().await.alerts = alerts;
    }

    /// Audit entries, newest first
    pub async fn audit_log(&self) -> Vec<BlockchainEvent> {
        self.inner.read().await.audit.newest_first()
    }

    pub async fn append_audit(&self, event: AuditEvent) -> BlockchainEvent {
        self.inner.write().await.audit.append(event)
    }

    pub async fn planning_snapshot(&self) -> PlanningSnapshot {
        let inner = self.inner.read().await;
        PlanningSnapshot {
            cargo_offers: inner.cargo_offers.clone(),
            vehicles: inner.vehicles.clone(),
        }
    }

    /// Read several collections consistently
    pub async fn read<R>(&self, f: impl FnOnce(&Collections) -> R) -> R {
        let inner = self.inner.read().await;
        f(&inner)
    }

    /// Apply a write under the store's single writer lock. The closure sees
    /// every collection, so validation and mutation happen atomically.
    pub async fn update<R>(&self, f: impl FnOnce(&mut Collections) -> R) -> R {
        let mut inner = self.inner.write().await;
        f(&mut inner)
    }
}

/// Parsed seed data
#[derive(Debug, Default)]
pub struct SeedData {
    pub cargo_offers: Vec<CargoOffer>,
    pub vehicles: Vec<Vehicle>,
    pub shipments: Vec<Shipment>,
    pub alerts: Vec<Alert>,
}

/// Raw seed file layout
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSeed {
    #[serde(default)]
    cargo_offers: Vec<RawCargoOffer>,
    #[serde(default)]
    vehicles: Vec<RawVehicle>,
    #[serde(default)]
    shipments: Vec<Shipment>,
    #[serde(default)]
    alerts: Vec<Alert>,
}

/// Offer as written by hand in seed files: status optional, free-text labels
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCargoOffer {
    id: String,
    origin: String,
    destination: String,
    cargo_type: String,
    weight_kg: f64,
    volume_m3: f64,
    pickup_date: NaiveDate,
    delivery_date: NaiveDate,
    status: Option<String>,
    shipper_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVehicle {
    id: String,
    #[serde(rename = "type")]
    vehicle_type: String,
    capacity_kg: f64,
    capacity_m3: f64,
    current_location: String,
    availability: Option<String>,
    driver_name: Option<String>,
    carrier_id: Option<String>,
}

/// Load seed data from a JSON file
pub fn load_seed_from_file(path: &Path) -> Result<SeedData> {
    let start = std::time::Instant::now();

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    let seed = parse_seed(&text)
        .with_context(|| format!("Failed to parse seed file {}", path.display()))?;

    info!(
        offers = seed.cargo_offers.len(),
        vehicles = seed.vehicles.len(),
        shipments = seed.shipments.len(),
        alerts = seed.alerts.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Seed data loaded"
    );

    Ok(seed)
}

/// Parse seed JSON, skipping records with unknown labels
pub fn parse_seed(text: &str) -> Result<SeedData> {
    let raw: RawSeed = serde_json::from_str(text)?;

    let mut cargo_offers = Vec::with_capacity(raw.cargo_offers.len());
    for raw_offer in raw.cargo_offers {
        let status = match raw_offer.status.as_deref() {
            None => CargoStatus::Pending,
            Some(s) => match parse_cargo_status(s) {
                Some(status) => status,
                None => {
                    warn!(id = %raw_offer.id, status = s, "Skipping offer with unknown status");
                    continue;
                }
            },
        };

        cargo_offers.push(CargoOffer {
            id: raw_offer.id,
            origin: raw_offer.origin,
            destination: raw_offer.destination,
            cargo_type: raw_offer.cargo_type,
            weight_kg: raw_offer.weight_kg,
            volume_m3: raw_offer.volume_m3,
            pickup_date: raw_offer.pickup_date,
            delivery_date: raw_offer.delivery_date,
            status,
            shipper_id: raw_offer.shipper_id.unwrap_or_else(|| "shipper".to_string()),
        });
    }

    let mut vehicles = Vec::with_capacity(raw.vehicles.len());
    for raw_vehicle in raw.vehicles {
        let Some(vehicle_type) = parse_vehicle_type(&raw_vehicle.vehicle_type) else {
            warn!(
                id = %raw_vehicle.id,
                vehicle_type = %raw_vehicle.vehicle_type,
                "Skipping vehicle with unknown type"
            );
            continue;
        };
        let availability = match raw_vehicle.availability.as_deref() {
            None => Availability::Available,
            Some(s) => match parse_availability(s) {
                Some(a) => a,
                None => {
                    warn!(
                        id = %raw_vehicle.id,
                        availability = s,
                        "Skipping vehicle with unknown availability"
                    );
                    continue;
                }
            },
        };

        vehicles.push(Vehicle {
            id: raw_vehicle.id,
            vehicle_type,
            capacity_kg: raw_vehicle.capacity_kg,
            capacity_m3: raw_vehicle.capacity_m3,
            current_location: raw_vehicle.current_location,
            availability,
            driver_name: raw_vehicle.driver_name,
            carrier_id: raw_vehicle.carrier_id,
        });
    }

    Ok(SeedData {
        cargo_offers,
        vehicles,
        shipments: raw.shipments,
        alerts: raw.alerts,
    })
}

fn parse_cargo_status(s: &str) -> Option<CargoStatus> {
    match normalize_label(s).as_str() {
        "PENDING" => Some(CargoStatus::Pending),
        "MATCHED" => Some(CargoStatus::Matched),
        "INTRANSIT" => Some(CargoStatus::InTransit),
        "DELIVERED" => Some(CargoStatus::Delivered),
        "CONSOLIDATING" => Some(CargoStatus::Consolidating),
        _ => None,
    }
}

fn parse_vehicle_type(s: &str) -> Option<VehicleType> {
    match normalize_label(s).as_str() {
        "TRUCKLTL" | "LTL" | "CAMIONLTL" | "CAMIÓNLTL" => Some(VehicleType::LtlTruck),
        "TRUCKFTL" | "FTL" | "CAMIONFTL" | "CAMIÓNFTL" => Some(VehicleType::FtlTruck),
        "VAN" | "FURGONETA" => Some(VehicleType::Van),
        "REFRIGERATEDTRUCK" | "REEFER" | "CAMIONREFRIGERADO" | "CAMIÓNREFRIGERADO" => {
            Some(VehicleType::RefrigeratedTruck)
        }
        _ => None,
    }
}

fn parse_availability(s: &str) -> Option<Availability> {
    match normalize_label(s).as_str() {
        "AVAILABLE" => Some(Availability::Available),
        "ONTRIP" => Some(Availability::OnTrip),
        "MAINTENANCE" => Some(Availability::Maintenance),
        _ => None,
    }
}

/// Uppercase and drop spaces, underscores and parentheses
fn normalize_label(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-' | '(' | ')'))
        .collect::<String>()
        .to_uppercase()
}
