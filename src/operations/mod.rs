//! Store Operations
//!
//! Operator-initiated writes: assigning cargo to a vehicle, publishing new
//! cargo offers, shipment status updates and alerts. Every write validates
//! first and then mutates under the store's writer lock together with its
//! audit entry, so a failed operation leaves no trace.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditEventType};
use crate::constraints::{self, is_compatible};
use crate::db::{Collections, EntityStore};
use crate::error::{OperationError, OperationResult};
use crate::metrics::ASSIGNMENTS;
use crate::model::{
    Alert, AlertSeverity, Availability, CargoOffer, CargoStatus, Shipment, ShipmentStatus, Vehicle,
};

/// Actor recorded for automated operations
pub const SYSTEM_ACTOR: &str = "system";
pub const TRACKING_ACTOR: &str = "iot_simulator";
pub const MONITOR_ACTOR: &str = "system_monitor";

/// Commit a match inside an open store write.
///
/// Both entities are checked before either is touched: the offer must be
/// Pending or Consolidating, the vehicle Available and able to carry the
/// load. On success the offer is Matched, the vehicle On Trip, a shipment
/// is opened and `CARGO_ASSIGNED` is logged.
pub fn assign_in(
    c: &mut Collections,
    offer_id: &str,
    vehicle_id: &str,
) -> OperationResult<Shipment> {
    let offer = c
        .offer(offer_id)
        .ok_or_else(|| OperationError::not_found("cargo offer", offer_id))?;
    let vehicle = c
        .vehicle(vehicle_id)
        .ok_or_else(|| OperationError::not_found("vehicle", vehicle_id))?;

    if !offer.status.is_open() {
        return Err(OperationError::Conflict(format!(
            "Cargo offer {} is already {}",
            offer.id, offer.status
        )));
    }
    if !vehicle.is_available() {
        return Err(OperationError::Conflict(format!(
            "Vehicle {} is {}",
            vehicle.id, vehicle.availability
        )));
    }
    if let Some(failed) = constraints::evaluate(vehicle, offer).into_iter().find(|r| !r.passed) {
        return Err(OperationError::Conflict(failed.message));
    }

    let shipment = Shipment {
        id: format!("SMRT{}-{}", offer.id, c.shipments.len() + 1),
        cargo_id: offer.id.clone(),
        vehicle_id: vehicle.id.clone(),
        current_location: offer.origin.clone(),
        status: ShipmentStatus::InTransit,
        estimated_delivery: offer.delivery_date,
    };

    if let Some(offer) = c.offer_mut(offer_id) {
        offer.status = CargoStatus::Matched;
    }
    if let Some(vehicle) = c.vehicle_mut(vehicle_id) {
        vehicle.availability = Availability::OnTrip;
    }
    c.shipments.insert(0, shipment.clone());
    c.audit.append(
        AuditEvent::new(
            AuditEventType::CargoAssigned,
            json!({
                "cargoOfferId": offer_id,
                "vehicleId": vehicle_id,
                "status": CargoStatus::Matched,
            }),
        )
        .related_to(offer_id)
        .by(SYSTEM_ACTOR),
    );
    ASSIGNMENTS.inc();

    Ok(shipment)
}

/// Assign a cargo offer to a vehicle
pub async fn assign_cargo(
    store: &EntityStore,
    offer_id: &str,
    vehicle_id: &str,
) -> OperationResult<Shipment> {
    let shipment = store.update(|c| assign_in(c, offer_id, vehicle_id)).await?;
    info!(offer_id, vehicle_id, shipment_id = %shipment.id, "Cargo assigned");
    Ok(shipment)
}

/// A shipper's new offer before it gets an id
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CargoOfferDraft {
    pub origin: String,
    pub destination: String,
    pub cargo_type: String,
    pub weight_kg: f64,
    pub volume_m3: f64,
    pub pickup_date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub shipper_id: String,
}

impl CargoOfferDraft {
    fn validate(&self) -> OperationResult<()> {
        let required = [
            ("origin", &self.origin),
            ("destination", &self.destination),
            ("cargo type", &self.cargo_type),
            ("shipper", &self.shipper_id),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(OperationError::Validation(format!("The {} is required.", field)));
        }
        if !(self.weight_kg > 0.0 && self.volume_m3 > 0.0) {
            return Err(OperationError::Validation(
                "Weight and volume must be positive.".to_string(),
            ));
        }
        if self.delivery_date < self.pickup_date {
            return Err(OperationError::Validation(
                "The delivery date cannot precede the pickup date.".to_string(),
            ));
        }
        Ok(())
    }
}

/// `CGO` followed by five digits taken from `clock_millis`, bumped past
/// ids already in use
fn next_offer_id(existing: &[CargoOffer], clock_millis: i64) -> String {
    let mut n = clock_millis.rem_euclid(100_000);
    loop {
        let id = format!("CGO{:05}", n);
        if !existing.iter().any(|o| o.id == id) {
            return id;
        }
        n = (n + 1) % 100_000;
    }
}

/// Publish a new Pending cargo offer at the top of the list
pub async fn create_cargo_offer(
    store: &EntityStore,
    draft: CargoOfferDraft,
) -> OperationResult<CargoOffer> {
    draft.validate()?;

    let offer = store
        .update(|c| {
            let offer = CargoOffer {
                id: next_offer_id(&c.cargo_offers, Utc::now().timestamp_millis()),
                origin: draft.origin.trim().to_string(),
                destination: draft.destination.trim().to_string(),
                cargo_type: draft.cargo_type.trim().to_string(),
                weight_kg: draft.weight_kg,
                volume_m3: draft.volume_m3,
                pickup_date: draft.pickup_date,
                delivery_date: draft.delivery_date,
                status: CargoStatus::Pending,
                shipper_id: draft.shipper_id.trim().to_string(),
            };
            c.cargo_offers.insert(0, offer.clone());
            c.audit.append(
                AuditEvent::new(
                    AuditEventType::CargoOfferCreated,
                    json!({
                        "cargoId": offer.id,
                        "origin": offer.origin,
                        "destination": offer.destination,
                    }),
                )
                .related_to(offer.id.as_str())
                .by(offer.shipper_id.as_str()),
            );
            offer
        })
        .await;

    info!(
        offer_id = %offer.id,
        origin = %offer.origin,
        destination = %offer.destination,
        "Cargo offer created"
    );
    Ok(offer)
}

/// Available vehicles able to carry a Pending offer
pub async fn compatible_vehicles(
    store: &EntityStore,
    offer_id: &str,
) -> OperationResult<Vec<Vehicle>> {
    store
        .read(|c| -> OperationResult<Vec<Vehicle>> {
            let offer = c
                .offer(offer_id)
                .ok_or_else(|| OperationError::not_found("cargo offer", offer_id))?;
            if offer.status != CargoStatus::Pending {
                return Err(OperationError::Conflict(format!(
                    "Cargo offer {} is {}, only pending offers can be matched",
                    offer.id, offer.status
                )));
            }
            Ok(c.vehicles
                .iter()
                .filter(|v| is_compatible(v, offer))
                .cloned()
                .collect())
        })
        .await
}

/// Update a shipment's tracking status.
///
/// Delivery closes the loop: the offer becomes Delivered and the vehicle is
/// Available again at the delivery location. A delivered shipment is closed
/// and any further update is a conflict. Deliveries and reported issues are
/// audited.
pub async fn update_shipment_status(
    store: &EntityStore,
    shipment_id: &str,
    status: ShipmentStatus,
    location: Option<String>,
) -> OperationResult<Shipment> {
    let location = location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());

    let shipment = store
        .update(|c| -> OperationResult<Shipment> {
            let shipment = c
                .shipment_mut(shipment_id)
                .ok_or_else(|| OperationError::not_found("shipment", shipment_id))?;
            if shipment.status == ShipmentStatus::Delivered {
                return Err(OperationError::Conflict(format!(
                    "Shipment {} was already delivered",
                    shipment.id
                )));
            }

            shipment.status = status;
            if let Some(location) = &location {
                shipment.current_location = location.clone();
            }
            let shipment = shipment.clone();

            let event_type = match status {
                ShipmentStatus::Delivered => Some(AuditEventType::ShipmentDelivered),
                ShipmentStatus::IssueReported => Some(AuditEventType::ShipmentIssueReported),
                ShipmentStatus::InTransit | ShipmentStatus::Delayed => None,
            };

            if status == ShipmentStatus::Delivered {
                if let Some(offer) = c.offer_mut(&shipment.cargo_id) {
                    offer.status = CargoStatus::Delivered;
                }
                if let Some(vehicle) = c.vehicle_mut(&shipment.vehicle_id) {
                    vehicle.availability = Availability::Available;
                    vehicle.current_location = shipment.current_location.clone();
                }
            }

            if let Some(event_type) = event_type {
                c.audit.append(
                    AuditEvent::new(
                        event_type,
                        json!({
                            "shipmentId": shipment.id,
                            "status": status,
                            "location": shipment.current_location,
                        }),
                    )
                    .related_to(shipment.id.as_str())
                    .by(TRACKING_ACTOR),
                );
            }
            Ok(shipment)
        })
        .await?;

    info!(
        shipment_id,
        status = %status,
        location = %shipment.current_location,
        "Shipment status updated"
    );
    Ok(shipment)
}

/// Raise an alert; critical ones are also audited
pub async fn create_alert(
    store: &EntityStore,
    message: &str,
    severity: AlertSeverity,
    related_shipment_id: Option<String>,
) -> OperationResult<Alert> {
    let message = message.trim();
    if message.is_empty() {
        return Err(OperationError::Validation("The alert message is required.".to_string()));
    }

    let alert = Alert {
        id: format!("ALERT-{}", Uuid::new_v4().simple()),
        timestamp: Utc::now(),
        message: message.to_string(),
        severity,
        related_shipment_id,
        is_read: false,
    };

    store
        .update(|c| {
            c.alerts.insert(0, alert.clone());
            if severity == AlertSeverity::Critical {
                c.audit.append(
                    AuditEvent::new(
                        AuditEventType::CriticalAlertTriggered,
                        json!({
                            "alertId": alert.id,
                            "message": alert.message,
                            "severity": alert.severity,
                            "relatedShipmentId": alert.related_shipment_id,
                        }),
                    )
                    .related_to(alert.id.as_str())
                    .by(MONITOR_ACTOR),
                );
            }
        })
        .await;

    info!(alert_id = %alert.id, severity = %severity, "Alert created");
    Ok(alert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::tests::{offer, vehicle};
    use crate::model::VehicleType;

    fn store() -> EntityStore {
        EntityStore::from_collections(Collections {
            cargo_offers: vec![
                offer("CGO001", "Santiago", "Valparaíso", "Electrónicos", 500.0, 2.0),
                offer("CGO002", "Santiago", "Concepción", "Alimentos Perecederos", 900.0, 4.0),
            ],
            vehicles: vec![
                vehicle("VEH001", VehicleType::LtlTruck, 1000.0, 5.0, "Santiago"),
                vehicle("VEH004", VehicleType::RefrigeratedTruck, 5000.0, 20.0, "Santiago"),
            ],
            ..Collections::default()
        })
    }

    fn draft() -> CargoOfferDraft {
        CargoOfferDraft {
            origin: "Temuco".to_string(),
            destination: "Puerto Montt".to_string(),
            cargo_type: "Madera".to_string(),
            weight_kg: 4000.0,
            volume_m3: 12.0,
            pickup_date: NaiveDate::from_ymd_opt(2024, 8, 20).unwrap(),
            delivery_date: NaiveDate::from_ymd_opt(2024, 8, 21).unwrap(),
            shipper_id: "shipper_01".to_string(),
        }
    }

    #[tokio::test]
    async fn test_assign_commits_offer_vehicle_and_audit() {
        let store = store();

        let shipment = assign_cargo(&store, "CGO001", "VEH001").await.unwrap();
        assert_eq!(shipment.cargo_id, "CGO001");
        assert_eq!(shipment.status, ShipmentStatus::InTransit);

        let (offer_status, availability, audited, shipments) = store
            .read(|c| {
                (
                    c.offer("CGO001").unwrap().status,
                    c.vehicle("VEH001").unwrap().availability,
                    c.audit.count(AuditEventType::CargoAssigned, Some("CGO001")),
                    c.shipments.len(),
                )
            })
            .await;
        assert_eq!(offer_status, CargoStatus::Matched);
        assert_eq!(availability, Availability::OnTrip);
        assert_eq!(audited, 1);
        assert_eq!(shipments, 1);

        let entry = &store.audit_log().await[0];
        assert_eq!(entry.details["vehicleId"], "VEH001");
        assert_eq!(entry.details["status"], "Matched");
        assert_eq!(entry.actor_id.as_deref(), Some(SYSTEM_ACTOR));
    }

    #[tokio::test]
    async fn test_failed_assign_changes_nothing() {
        let store = store();

        let err = assign_cargo(&store, "CGO001", "VEH999").await.unwrap_err();
        assert!(matches!(err, OperationError::NotFound { kind: "vehicle", .. }));

        // Perishables on a dry truck
        let err = assign_cargo(&store, "CGO002", "VEH001").await.unwrap_err();
        assert!(matches!(err, OperationError::Conflict(_)));

        assign_cargo(&store, "CGO001", "VEH004").await.unwrap();
        let err = assign_cargo(&store, "CGO002", "VEH004").await.unwrap_err();
        assert!(matches!(err, OperationError::Conflict(_)));

        let (offer_status, dry_truck, entries) = store
            .read(|c| {
                (
                    c.offer("CGO002").unwrap().status,
                    c.vehicle("VEH001").unwrap().availability,
                    c.audit.len(),
                )
            })
            .await;
        assert_eq!(offer_status, CargoStatus::Pending);
        assert_eq!(dry_truck, Availability::Available);
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_create_offer_inserts_at_front() {
        let store = store();

        let created = create_cargo_offer(&store, draft()).await.unwrap();
        assert!(created.id.starts_with("CGO"));
        assert_eq!(created.id.len(), 8);
        assert_eq!(created.status, CargoStatus::Pending);

        let offers = store.cargo_offers().await;
        assert_eq!(offers[0].id, created.id);
        assert_eq!(offers.len(), 3);

        let entry = &store.audit_log().await[0];
        assert_eq!(entry.event_type, AuditEventType::CargoOfferCreated);
        assert_eq!(entry.actor_id.as_deref(), Some("shipper_01"));
        assert_eq!(entry.details["origin"], "Temuco");
    }

    #[tokio::test]
    async fn test_create_offer_validation() {
        let store = store();

        let mut blank = draft();
        blank.origin = "   ".to_string();
        let mut weightless = draft();
        weightless.weight_kg = 0.0;
        let mut backwards = draft();
        backwards.delivery_date = NaiveDate::from_ymd_opt(2024, 8, 19).unwrap();

        for bad in [blank, weightless, backwards] {
            let err = create_cargo_offer(&store, bad).await.unwrap_err();
            assert!(matches!(err, OperationError::Validation(_)));
        }
        assert_eq!(store.cargo_offers().await.len(), 2);
        assert!(store.audit_log().await.is_empty());
    }

    #[test]
    fn test_offer_ids_skip_taken_numbers() {
        assert_eq!(next_offer_id(&[], 1_722_345_012_345), "CGO12345");
        assert_eq!(next_offer_id(&[], 7), "CGO00007");

        let existing = vec![
            offer("CGO12345", "A", "B", "Textiles", 1.0, 1.0),
            offer("CGO99999", "A", "B", "Textiles", 1.0, 1.0),
        ];
        assert_eq!(next_offer_id(&existing, 12345), "CGO12346");
        assert_eq!(next_offer_id(&existing, 99999), "CGO00000");
    }

    #[tokio::test]
    async fn test_compatible_vehicles_for_perishables() {
        let store = store();

        let vehicles = compatible_vehicles(&store, "CGO002").await.unwrap();
        let ids: Vec<&str> = vehicles.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["VEH004"]);

        let err = compatible_vehicles(&store, "CGO404").await.unwrap_err();
        assert!(matches!(err, OperationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delivery_frees_vehicle_at_destination() {
        let store = store();
        let shipment = assign_cargo(&store, "CGO001", "VEH001").await.unwrap();

        let delivered = update_shipment_status(
            &store,
            &shipment.id,
            ShipmentStatus::Delivered,
            Some("Valparaíso".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(delivered.current_location, "Valparaíso");

        let (offer_status, vehicle, delivered_events) = store
            .read(|c| {
                (
                    c.offer("CGO001").unwrap().status,
                    c.vehicle("VEH001").unwrap().clone(),
                    c.audit.count(AuditEventType::ShipmentDelivered, Some(shipment.id.as_str())),
                )
            })
            .await;
        assert_eq!(offer_status, CargoStatus::Delivered);
        assert_eq!(vehicle.availability, Availability::Available);
        assert_eq!(vehicle.current_location, "Valparaíso");
        assert_eq!(delivered_events, 1);

        let err = update_shipment_status(&store, &shipment.id, ShipmentStatus::Delayed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_redelivery_cannot_free_a_rebooked_vehicle() {
        let store = store();
        let first = assign_cargo(&store, "CGO001", "VEH004").await.unwrap();
        update_shipment_status(
            &store,
            &first.id,
            ShipmentStatus::Delivered,
            Some("Valparaíso".to_string()),
        )
        .await
        .unwrap();
        assign_cargo(&store, "CGO002", "VEH004").await.unwrap();

        let err = update_shipment_status(
            &store,
            &first.id,
            ShipmentStatus::Delivered,
            Some("Arica".to_string()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OperationError::Conflict(_)));

        let (vehicle, delivered_events) = store
            .read(|c| {
                (
                    c.vehicle("VEH004").unwrap().clone(),
                    c.audit.count(AuditEventType::ShipmentDelivered, None),
                )
            })
            .await;
        assert_eq!(vehicle.availability, Availability::OnTrip);
        assert_eq!(vehicle.current_location, "Valparaíso");
        assert_eq!(delivered_events, 1);
    }

    #[tokio::test]
    async fn test_delay_is_not_audited() {
        let store = store();
        let shipment = assign_cargo(&store, "CGO001", "VEH001").await.unwrap();

        let blank = Some("  ".to_string());
        update_shipment_status(&store, &shipment.id, ShipmentStatus::Delayed, blank)
            .await
            .unwrap();
        let port = Some("Casablanca".to_string());
        update_shipment_status(&store, &shipment.id, ShipmentStatus::IssueReported, port)
            .await
            .unwrap();

        let log = store.audit_log().await;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].event_type, AuditEventType::ShipmentIssueReported);
        assert_eq!(log[0].details["location"], "Casablanca");
    }

    #[tokio::test]
    async fn test_only_critical_alerts_are_audited() {
        let store = store();

        create_alert(&store, "Lluvias en ruta", AlertSeverity::Warning, None).await.unwrap();
        let critical = create_alert(
            &store,
            "Apertura de puerta no autorizada",
            AlertSeverity::Critical,
            Some("SMRTCGO-003".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(store.alerts().await.len(), 2);
        let log = store.audit_log().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].related_entity_id.as_deref(), Some(critical.id.as_str()));

        let err = create_alert(&store, " ", AlertSeverity::Info, None).await.unwrap_err();
        assert!(matches!(err, OperationError::Validation(_)));
    }
}
