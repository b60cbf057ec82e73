//! Shared builders for integration tests: principals, drafts and an engine
//! pinned to a fixed clock with a recording event sink.
#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use procurement_workflow::contracts::ContractType;
use procurement_workflow::market::MarketRequestDraft;
use procurement_workflow::proposals::ProposalDraft;
use procurement_workflow::rfp::Urgency;
use procurement_workflow::{
    AuthorizationContext, ContractDraft, EngineConfig, FixedClock, InMemoryStore, MarketRequest,
    ProcurementEngine, Proposal, RecordingEventSink, RfpDraft, Role,
};

pub const ORG: &str = "acme";

pub type Engine = ProcurementEngine<InMemoryStore>;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

pub fn officer() -> AuthorizationContext {
    AuthorizationContext::new("officer-1", Role::ProcurementOfficer, ORG)
}

pub fn manager() -> AuthorizationContext {
    AuthorizationContext::new("manager-1", Role::Manager, ORG)
}

pub fn admin() -> AuthorizationContext {
    AuthorizationContext::new("admin-1", Role::Admin, "platform")
}

pub fn vendor(id: &str) -> AuthorizationContext {
    AuthorizationContext::new(id, Role::Vendor, format!("{id}-org"))
}

pub fn engine() -> (Engine, Arc<RecordingEventSink>) {
    engine_at(now())
}

pub fn engine_at(at: DateTime<Utc>) -> (Engine, Arc<RecordingEventSink>) {
    let sink = Arc::new(RecordingEventSink::new());
    let engine = ProcurementEngine::new(InMemoryStore::new(), EngineConfig::default())
        .with_event_sink(sink.clone())
        .with_clock(Arc::new(FixedClock(at)));
    (engine, sink)
}

pub fn market_draft() -> MarketRequestDraft {
    MarketRequestDraft {
        title: "Office chairs".to_string(),
        description: "Ergonomic chairs for the new floor".to_string(),
        category: "furniture".to_string(),
        budget: Some(20_000.0),
        currency: "EUR".to_string(),
        deadline: Some(now() + Duration::days(14)),
        quantity: Some(120),
        specifications: None,
        evaluation_criteria: None,
        requirements: vec!["EN 1335".to_string()],
    }
}

pub fn proposal_draft(price: f64) -> ProposalDraft {
    ProposalDraft {
        proposed_item: "ErgoSeat 300".to_string(),
        description: "120 chairs, delivered and assembled".to_string(),
        total_price: price,
        currency: "EUR".to_string(),
        delivery_time_days: Some(21),
        technical_proposal: None,
        commercial_proposal: None,
        compliance_matrix: Vec::new(),
    }
}

pub fn rfp_draft() -> RfpDraft {
    RfpDraft {
        title: "Chairs for the third floor".to_string(),
        description: "Team moves in April".to_string(),
        category: "furniture".to_string(),
        urgency: Urgency::Medium,
        budget_estimate: Some(5000.0),
        currency: "EUR".to_string(),
        quantity: Some(120),
        justification: None,
        expected_delivery_date: Some(now() + Duration::days(45)),
        requirements: Vec::new(),
        specifications: None,
    }
}

pub fn contract_draft(vendor_id: &str) -> ContractDraft {
    ContractDraft {
        title: "Chair supply".to_string(),
        vendor_id: vendor_id.into(),
        market_request_id: None,
        value: 18_000.0,
        currency: "EUR".to_string(),
        start_date: Some(now()),
        end_date: Some(now() + Duration::days(365)),
        contract_type: ContractType::FixedPrice,
        category: "furniture".to_string(),
        auto_renewal: false,
    }
}

pub async fn published_market(engine: &Engine) -> MarketRequest {
    let market = engine.create_market(&officer(), market_draft()).await.unwrap();
    engine.publish_market(&officer(), &market.id).await.unwrap()
}

pub async fn submitted_proposal(engine: &Engine, market: &MarketRequest, vendor_id: &str, price: f64) -> Proposal {
    let ctx = vendor(vendor_id);
    let draft = engine.create_proposal(&ctx, &market.id, proposal_draft(price)).await.unwrap();
    engine.submit_proposal(&ctx, &draft.id).await.unwrap()
}
