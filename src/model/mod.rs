//! Freight Domain Model
//!
//! Cargo offers, vehicles, shipments and alerts as held by the entity store.
//! Wire labels follow the platform's JSON (camelCase fields, human-readable
//! status strings such as "On Trip" or "Truck (FTL)").

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a cargo offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CargoStatus {
    Pending,
    Matched,
    #[serde(rename = "In Transit")]
    InTransit,
    Delivered,
    Consolidating,
}

impl std::fmt::Display for CargoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CargoStatus::Pending => write!(f, "Pending"),
            CargoStatus::Matched => write!(f, "Matched"),
            CargoStatus::InTransit => write!(f, "In Transit"),
            CargoStatus::Delivered => write!(f, "Delivered"),
            CargoStatus::Consolidating => write!(f, "Consolidating"),
        }
    }
}

impl CargoStatus {
    /// Offers still open for matching or consolidation
    pub fn is_open(&self) -> bool {
        matches!(self, CargoStatus::Pending | CargoStatus::Consolidating)
    }
}

/// Vehicle body type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    #[serde(rename = "Truck (LTL)")]
    LtlTruck,
    #[serde(rename = "Truck (FTL)")]
    FtlTruck,
    Van,
    #[serde(rename = "Refrigerated Truck")]
    RefrigeratedTruck,
}

impl VehicleType {
    pub fn label(&self) -> &'static str {
        match self {
            VehicleType::LtlTruck => "Truck (LTL)",
            VehicleType::FtlTruck => "Truck (FTL)",
            VehicleType::Van => "Van",
            VehicleType::RefrigeratedTruck => "Refrigerated Truck",
        }
    }

    /// Trucks of any kind are eligible for backhaul runs; vans are not
    pub fn is_truck(&self) -> bool {
        self.label().contains("Truck")
    }
}

impl std::fmt::Display for VehicleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Vehicle availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    Available,
    #[serde(rename = "On Trip")]
    OnTrip,
    Maintenance,
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Availability::Available => write!(f, "Available"),
            Availability::OnTrip => write!(f, "On Trip"),
            Availability::Maintenance => write!(f, "Maintenance"),
        }
    }
}

/// A shipper's request to move cargo between two places
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CargoOffer {
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub cargo_type: String,
    pub weight_kg: f64,
    pub volume_m3: f64,
    pub pickup_date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub status: CargoStatus,
    pub shipper_id: String,
}

impl CargoOffer {
    /// Origin/destination pair used to group consolidation candidates
    pub fn lane(&self) -> (&str, &str) {
        (&self.origin, &self.destination)
    }
}

/// A carrier vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    pub capacity_kg: f64,
    pub capacity_m3: f64,
    /// Free-text place name, compared by string equality only
    pub current_location: String,
    pub availability: Availability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier_id: Option<String>,
}

impl Vehicle {
    pub fn can_hold(&self, weight_kg: f64, volume_m3: f64) -> bool {
        self.capacity_kg >= weight_kg && self.capacity_m3 >= volume_m3
    }

    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }
}

/// Tracking status of a shipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipmentStatus {
    #[serde(rename = "In Transit")]
    InTransit,
    Delayed,
    Delivered,
    #[serde(rename = "Issue Reported")]
    IssueReported,
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShipmentStatus::InTransit => write!(f, "In Transit"),
            ShipmentStatus::Delayed => write!(f, "Delayed"),
            ShipmentStatus::Delivered => write!(f, "Delivered"),
            ShipmentStatus::IssueReported => write!(f, "Issue Reported"),
        }
    }
}

/// A cargo offer travelling on a vehicle. Both ids are weak references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub id: String,
    pub cargo_id: String,
    pub vehicle_id: String,
    pub current_location: String,
    pub status: ShipmentStatus,
    pub estimated_delivery: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "Info"),
            AlertSeverity::Warning => write!(f, "Warning"),
            AlertSeverity::Critical => write!(f, "Critical"),
        }
    }
}

/// Operational alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub severity: AlertSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_shipment_id: Option<String>,
    #[serde(default)]
    pub is_read: bool,
}
