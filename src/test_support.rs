// Shared builders for unit tests

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::auth::{AuthorizationContext, Role};
use crate::contracts::{Contract, ContractDraft, ContractType};
use crate::market::{MarketRequest, MarketRequestDraft};
use crate::proposals::ProposalDraft;
use crate::rfp::{RfpDraft, Urgency};

pub const ORG: &str = "acme";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
}

pub fn officer() -> AuthorizationContext {
    AuthorizationContext::new("officer-1", Role::ProcurementOfficer, ORG)
}

pub fn manager() -> AuthorizationContext {
    AuthorizationContext::new("manager-1", Role::Manager, ORG)
}

pub fn admin() -> AuthorizationContext {
    AuthorizationContext::new("admin-1", Role::Admin, ORG)
}

pub fn vendor(id: &str) -> AuthorizationContext {
    AuthorizationContext::new(id, Role::Vendor, format!("{id}-org"))
}

pub fn market_draft(deadline: Option<DateTime<Utc>>) -> MarketRequestDraft {
    MarketRequestDraft {
        title: "Laptops for field staff".to_string(),
        description: "Rugged laptops with 3 year warranty".to_string(),
        category: "it_hardware".to_string(),
        budget: Some(50_000.0),
        currency: "USD".to_string(),
        deadline,
        quantity: Some(40),
        specifications: Some("16GB RAM, 512GB SSD".to_string()),
        evaluation_criteria: None,
        requirements: vec!["MIL-STD-810H".to_string()],
    }
}

pub fn published_market(ctx: &AuthorizationContext) -> MarketRequest {
    let mut market = MarketRequest::create(ctx, market_draft(Some(now() + Duration::days(7))), now()).unwrap();
    market.publish(ctx, now()).unwrap();
    market
}

pub fn proposal_draft(price: f64) -> ProposalDraft {
    ProposalDraft {
        proposed_item: "FieldBook X2".to_string(),
        description: "40 rugged laptops delivered in two batches".to_string(),
        total_price: price,
        currency: "USD".to_string(),
        delivery_time_days: Some(30),
        technical_proposal: Some("Spec sheet attached".to_string()),
        commercial_proposal: None,
        compliance_matrix: Vec::new(),
    }
}

pub fn rfp_draft() -> RfpDraft {
    RfpDraft {
        title: "Replace field laptops".to_string(),
        description: "Current fleet is out of warranty".to_string(),
        category: "it_hardware".to_string(),
        urgency: Urgency::High,
        budget_estimate: Some(5000.0),
        currency: "USD".to_string(),
        quantity: Some(40),
        justification: Some("Warranty expired".to_string()),
        expected_delivery_date: Some(now() + Duration::days(60)),
        requirements: vec!["MIL-STD-810H".to_string()],
        specifications: Some("16GB RAM".to_string()),
    }
}

pub fn contract_draft() -> ContractDraft {
    ContractDraft {
        title: "Laptop supply".to_string(),
        vendor_id: "v1".into(),
        market_request_id: None,
        value: 1000.0,
        currency: "USD".to_string(),
        start_date: Some(now()),
        end_date: Some(now() + Duration::days(365)),
        contract_type: ContractType::FixedPrice,
        category: "it_hardware".to_string(),
        auto_renewal: false,
    }
}

pub fn active_contract() -> Contract {
    let officer = officer();
    let mut contract = Contract::create(&officer, contract_draft(), now()).unwrap();
    contract.submit(&officer, now()).unwrap();
    contract.activate(&officer, None, None, now()).unwrap();
    contract
}
