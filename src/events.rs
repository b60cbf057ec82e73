// Domain events
//
// Each lifecycle status change emits one event for an external notifier.
// Drafting edits (create, update, delete), view counts and finding edits
// short of resolution emit nothing. Delivery is best effort: sinks cannot
// fail a transition.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::contracts::ContractStatus;
use crate::types::{ContractId, MarketRequestId, PrincipalId, ProposalId, RfpRequestId, Severity};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum DomainEvent {
    RfpSubmitted {
        rfp_request_id: RfpRequestId,
    },
    RfpReviewed {
        rfp_request_id: RfpRequestId,
        approved: bool,
    },
    RfpConverted {
        rfp_request_id: RfpRequestId,
        market_request_id: MarketRequestId,
    },
    MarketRequestPublished {
        market_request_id: MarketRequestId,
    },
    MarketRequestActivated {
        market_request_id: MarketRequestId,
    },
    MarketRequestClosed {
        market_request_id: MarketRequestId,
        reason: String,
    },
    MarketRequestCancelled {
        market_request_id: MarketRequestId,
        reason: String,
    },
    ProposalSubmitted {
        proposal_id: ProposalId,
        market_request_id: MarketRequestId,
        vendor_id: PrincipalId,
    },
    ProposalWithdrawn {
        proposal_id: ProposalId,
        market_request_id: MarketRequestId,
    },
    ProposalEvaluated {
        proposal_id: ProposalId,
        overall_score: f64,
    },
    ProposalRejected {
        proposal_id: ProposalId,
        reason: String,
    },
    ProposalAwarded {
        market_request_id: MarketRequestId,
        proposal_id: ProposalId,
        vendor_id: PrincipalId,
        contract_id: ContractId,
        rejected_proposals: Vec<ProposalId>,
    },
    ContractStatusChanged {
        contract_id: ContractId,
        status: ContractStatus,
    },
    ContractRenewed {
        contract_id: ContractId,
        new_end_date: DateTime<Utc>,
    },
    AuditCompleted {
        contract_id: ContractId,
        audit_index: usize,
        compliance_score: f64,
        risk_level: Severity,
    },
    AuditFindingResolved {
        contract_id: ContractId,
        audit_index: usize,
        finding_index: usize,
        severity: Severity,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::RfpSubmitted { .. } => "RfpSubmitted",
            DomainEvent::RfpReviewed { .. } => "RfpReviewed",
            DomainEvent::RfpConverted { .. } => "RfpConverted",
            DomainEvent::MarketRequestPublished { .. } => "MarketRequestPublished",
            DomainEvent::MarketRequestActivated { .. } => "MarketRequestActivated",
            DomainEvent::MarketRequestClosed { .. } => "MarketRequestClosed",
            DomainEvent::MarketRequestCancelled { .. } => "MarketRequestCancelled",
            DomainEvent::ProposalSubmitted { .. } => "ProposalSubmitted",
            DomainEvent::ProposalWithdrawn { .. } => "ProposalWithdrawn",
            DomainEvent::ProposalEvaluated { .. } => "ProposalEvaluated",
            DomainEvent::ProposalRejected { .. } => "ProposalRejected",
            DomainEvent::ProposalAwarded { .. } => "ProposalAwarded",
            DomainEvent::ContractStatusChanged { .. } => "ContractStatusChanged",
            DomainEvent::ContractRenewed { .. } => "ContractRenewed",
            DomainEvent::AuditCompleted { .. } => "AuditCompleted",
            DomainEvent::AuditFindingResolved { .. } => "AuditFindingResolved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub correlation_id: String,
    pub actor: Option<PrincipalId>,
    pub event: DomainEvent,
}

impl EventEnvelope {
    pub fn new(event: DomainEvent, actor: Option<PrincipalId>, correlation_id: &str, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at,
            correlation_id: correlation_id.to_string(),
            actor,
            event,
        }
    }
}

/// Consumer of domain events
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait EventSink: Send + Sync {
    fn publish(&self, envelope: &EventEnvelope);
}

/// Writes every event to the log
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, envelope: &EventEnvelope) {
        let payload = serde_json::to_string(&envelope.event).unwrap_or_default();
        info!(
            event = envelope.event.name(),
            event_id = %envelope.id,
            correlation_id = %envelope.correlation_id,
            payload = %payload,
            "Domain event"
        );
    }
}

/// Keeps events in memory so callers can inspect or drain them
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<EventEnvelope>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|e| e.event.name())
            .collect()
    }

    pub fn drain(&self) -> Vec<EventEnvelope> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, envelope: &EventEnvelope) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(envelope.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn envelope(event: DomainEvent) -> EventEnvelope {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        EventEnvelope::new(event, Some("u1".into()), "corr-1", at)
    }

    #[test]
    fn test_recording_sink_keeps_order_and_drains() {
        let sink = RecordingEventSink::new();
        sink.publish(&envelope(DomainEvent::MarketRequestPublished {
            market_request_id: "m1".into(),
        }));
        sink.publish(&envelope(DomainEvent::ProposalWithdrawn {
            proposal_id: "p1".into(),
            market_request_id: "m1".into(),
        }));
        assert_eq!(sink.names(), vec!["MarketRequestPublished", "ProposalWithdrawn"]);
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(DomainEvent::AuditFindingResolved {
            contract_id: "c1".into(),
            audit_index: 0,
            finding_index: 2,
            severity: Severity::High,
        })
        .unwrap();
        assert_eq!(json["type"], "AuditFindingResolved");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["findingIndex"], 2);
    }
}
