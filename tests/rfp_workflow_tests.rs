// RFP request lifecycle: submission checks, review, conversion, deletion

mod fixtures;

use fixtures::*;
use procurement_workflow::rfp::RfpUpdate;
use procurement_workflow::store::RfpFilter;
use procurement_workflow::{MarketRequestStatus, RfpStatus, WorkflowError};

#[tokio::test]
async fn test_rfp_review_requires_budget_estimate() {
    let (engine, sink) = engine();
    let mut draft = rfp_draft();
    draft.budget_estimate = None;
    let rfp = engine.create_rfp(&officer(), draft).await.unwrap();
    assert_eq!(rfp.status, RfpStatus::Draft);

    let err = engine.submit_rfp(&officer(), &rfp.id).await.unwrap_err();
    match err {
        WorkflowError::Validation { fields, .. } => assert_eq!(fields, vec!["budgetEstimate".to_string()]),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(engine.get_rfp(&rfp.id).await.unwrap().status, RfpStatus::Draft);

    engine
        .update_rfp(
            &officer(),
            &rfp.id,
            RfpUpdate {
                budget_estimate: Some(5000.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let submitted = engine.submit_rfp(&officer(), &rfp.id).await.unwrap();
    assert_eq!(submitted.status, RfpStatus::Review);
    assert_eq!(submitted.submitted_at, Some(now()));
    assert_eq!(sink.names(), vec!["RfpSubmitted"]);
}

#[tokio::test]
async fn test_only_approvers_review() {
    let (engine, _) = engine();
    let rfp = engine.create_rfp(&officer(), rfp_draft()).await.unwrap();
    engine.submit_rfp(&officer(), &rfp.id).await.unwrap();

    let err = engine.approve_rfp(&officer(), &rfp.id, None).await.unwrap_err();
    assert_eq!(err.kind(), "authorization_error");

    let approved = engine
        .approve_rfp(&manager(), &rfp.id, Some("Within budget".to_string()))
        .await
        .unwrap();
    assert_eq!(approved.status, RfpStatus::Approved);
    let decision = approved.manager_approval.unwrap();
    assert!(decision.approved);
    assert_eq!(decision.decided_by.as_str(), "manager-1");

    // A decision is final
    let err = engine.reject_rfp(&manager(), &rfp.id, "Too late").await.unwrap_err();
    assert_eq!(err.kind(), "invalid_state_error");
}

#[tokio::test]
async fn test_rejection_needs_notes_and_reopens_on_edit() {
    let (engine, _) = engine();
    let rfp = engine.create_rfp(&officer(), rfp_draft()).await.unwrap();
    engine.submit_rfp(&officer(), &rfp.id).await.unwrap();

    let err = engine.reject_rfp(&manager(), &rfp.id, "   ").await.unwrap_err();
    assert_eq!(err.kind(), "validation_error");
    assert_eq!(engine.get_rfp(&rfp.id).await.unwrap().status, RfpStatus::Review);

    let rejected = engine
        .reject_rfp(&manager(), &rfp.id, "Split into two lots")
        .await
        .unwrap();
    assert_eq!(rejected.status, RfpStatus::Rejected);
    assert_eq!(rejected.review_notes.as_deref(), Some("Split into two lots"));

    let edited = engine
        .update_rfp(
            &officer(),
            &rfp.id,
            RfpUpdate {
                quantity: Some(60),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.status, RfpStatus::Draft);
    assert_eq!(edited.quantity, Some(60));

    let resubmitted = engine.submit_rfp(&officer(), &rfp.id).await.unwrap();
    assert_eq!(resubmitted.status, RfpStatus::Review);
}

#[tokio::test]
async fn test_review_state_is_frozen_for_edits() {
    let (engine, _) = engine();
    let rfp = engine.create_rfp(&officer(), rfp_draft()).await.unwrap();
    engine.submit_rfp(&officer(), &rfp.id).await.unwrap();

    let err = engine
        .update_rfp(&officer(), &rfp.id, RfpUpdate::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_state_error");
}

#[tokio::test]
async fn test_conversion_creates_linked_draft_market() {
    let (engine, sink) = engine();
    let rfp = engine.create_rfp(&officer(), rfp_draft()).await.unwrap();
    engine.submit_rfp(&officer(), &rfp.id).await.unwrap();

    // Not approved yet
    let err = engine.convert_rfp(&officer(), &rfp.id).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_state_error");

    engine.approve_rfp(&manager(), &rfp.id, None).await.unwrap();
    let (rfp, market) = engine.convert_rfp(&officer(), &rfp.id).await.unwrap();

    assert_eq!(rfp.converted_to.as_ref(), Some(&market.id));
    assert_eq!(market.status, MarketRequestStatus::Draft);
    assert_eq!(market.source_rfp_request_id.as_ref(), Some(&rfp.id));
    assert_eq!(market.title, rfp.title);
    assert_eq!(market.budget, Some(5000.0));
    assert_eq!(market.organization_id, rfp.organization_id);
    assert_eq!(engine.get_market(&market.id).await.unwrap(), market);
    assert_eq!(sink.names().last(), Some(&"RfpConverted"));

    let err = engine.convert_rfp(&officer(), &rfp.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState { ref current, .. } if current == "converted"));
}

#[tokio::test]
async fn test_vendors_cannot_convert() {
    let (engine, _) = engine();
    let rfp = engine.create_rfp(&officer(), rfp_draft()).await.unwrap();
    engine.submit_rfp(&officer(), &rfp.id).await.unwrap();
    engine.approve_rfp(&manager(), &rfp.id, None).await.unwrap();

    let err = engine.convert_rfp(&vendor("v1"), &rfp.id).await.unwrap_err();
    assert_eq!(err.kind(), "authorization_error");
}

#[tokio::test]
async fn test_delete_only_unreviewed_drafts() {
    let (engine, _) = engine();
    let fresh = engine.create_rfp(&officer(), rfp_draft()).await.unwrap();
    let reviewed = engine.create_rfp(&officer(), rfp_draft()).await.unwrap();
    engine.submit_rfp(&officer(), &reviewed.id).await.unwrap();
    engine.reject_rfp(&manager(), &reviewed.id, "Needs quotes").await.unwrap();
    engine
        .update_rfp(&officer(), &reviewed.id, RfpUpdate::default())
        .await
        .unwrap();

    let err = engine.delete_rfp(&vendor("v1"), &fresh.id).await.unwrap_err();
    assert_eq!(err.kind(), "authorization_error");

    let err = engine.delete_rfp(&officer(), &reviewed.id).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_state_error");

    engine.delete_rfp(&officer(), &fresh.id).await.unwrap();
    let err = engine.get_rfp(&fresh.id).await.unwrap_err();
    assert_eq!(err.kind(), "not_found_error");

    let remaining = engine.list_rfps(&RfpFilter::default()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, reviewed.id);
}
