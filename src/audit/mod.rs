//! Audit Log
//!
//! Append-only record of state-changing operations, shown to operators as
//! the platform's "blockchain" ledger. Ordering is insertion order only; there
//! is no hashing or chaining. The log keeps the most recent `capacity`
//! entries and silently evicts the oldest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use uuid::Uuid;

/// Default number of retained entries
pub const DEFAULT_AUDIT_CAPACITY: usize = 100;

/// Kinds of audited events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    CargoOfferCreated,
    CargoAssigned,
    LtlConsolidationActioned,
    FtlBackhaulActioned,
    ShipmentDelivered,
    ShipmentIssueReported,
    CriticalAlertTriggered,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            AuditEventType::CargoOfferCreated => "CARGO_OFFER_CREATED",
            AuditEventType::CargoAssigned => "CARGO_ASSIGNED",
            AuditEventType::LtlConsolidationActioned => "LTL_CONSOLIDATION_ACTIONED",
            AuditEventType::FtlBackhaulActioned => "FTL_BACKHAUL_ACTIONED",
            AuditEventType::ShipmentDelivered => "SHIPMENT_DELIVERED",
            AuditEventType::ShipmentIssueReported => "SHIPMENT_ISSUE_REPORTED",
            AuditEventType::CriticalAlertTriggered => "CRITICAL_ALERT_TRIGGERED",
        };
        f.write_str(tag)
    }
}

/// A recorded audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub details: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
}

/// An event about to be appended; id and timestamp are assigned by the log
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub details: Value,
    pub related_entity_id: Option<String>,
    pub actor_id: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, details: Value) -> Self {
        AuditEvent {
            event_type,
            details,
            related_entity_id: None,
            actor_id: None,
        }
    }

    pub fn related_to(mut self, entity_id: impl Into<String>) -> Self {
        self.related_entity_id = Some(entity_id.into());
        self
    }

    pub fn by(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}

/// Capped ring of audit entries, oldest at the front
#[derive(Debug, Clone)]
pub struct AuditLog {
    entries: VecDeque<BlockchainEvent>,
    capacity: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        AuditLog {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an event, evicting the oldest entry when full
    pub fn append(&mut self, event: AuditEvent) -> BlockchainEvent {
        let recorded = BlockchainEvent {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event.event_type,
            details: event.details,
            related_entity_id: event.related_entity_id,
            actor_id: event.actor_id,
        };

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(recorded.clone());
        crate::metrics::AUDIT_EVENTS
            .with_label_values(&[&recorded.event_type.to_string()])
            .inc();

        recorded
    }

    /// Entries newest first, the order the log viewer shows them
    pub fn newest_first(&self) -> Vec<BlockchainEvent> {
        self.entries.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Count entries of one type, optionally restricted to a related entity
    pub fn count(&self, event_type: AuditEventType, related_entity_id: Option<&str>) -> usize {
        self.entries
            .iter()
            .filter(|e| e.event_type == event_type)
            .filter(|e| match related_entity_id {
                Some(id) => e.related_entity_id.as_deref() == Some(id),
                None => true,
            })
            .count()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}
