//! Analysis orchestrator integration tests
//!
//! Concurrent predict/review fan-out against a scripted backend: result
//! mapping, per-operation failure isolation, the combined summary, and
//! discarding of superseded generations.

mod helpers;

use cxr_common::events::{
    AnalysisOperation, ConditionKind, LabelerEvent, OperationOutcome,
};
use cxr_labeler::models::{OperationState, Prediction, ReviewStatus};
use cxr_labeler::Labeler;
use helpers::*;

fn is_condition(event: &LabelerEvent, kind: ConditionKind) -> bool {
    matches!(event, LabelerEvent::ConditionRaised { condition, .. } if *condition == kind)
}

fn is_settled(event: &LabelerEvent, op: AnalysisOperation) -> bool {
    matches!(event, LabelerEvent::OperationSettled { operation, .. } if *operation == op)
}

#[tokio::test]
async fn test_toggle_then_payload_excludes_disabled() {
    let backend = ScriptedBackend::new();
    backend.predict_for("chest.png", Ok(scores(&[("Pneumonia", 0.92), ("Effusion", 0.4)])));
    backend.review_for(
        "chest.png",
        Ok(vec![finding("Cardiac", ReviewStatus::Normal, &["Normal heart size"])]),
    );
    let labeler = Labeler::new(backend.clone(), test_bus());

    let summary = labeler.orchestrator.analyze(png("chest.png")).await;

    assert_eq!(summary.prediction_count, 2);
    assert_eq!(summary.finding_count, 1);
    assert!(summary.is_announced());
    assert_eq!(
        labeler.session.predictions().await.predictions(),
        &[
            Prediction { pathology: "Pneumonia".to_string(), confidence: 0.92, enabled: true },
            Prediction { pathology: "Effusion".to_string(), confidence: 0.4, enabled: true },
        ]
    );

    let toggled = labeler.session.toggle_prediction(1).await.unwrap();
    assert_eq!(
        toggled,
        vec![
            Prediction { pathology: "Pneumonia".to_string(), confidence: 0.92, enabled: true },
            Prediction { pathology: "Effusion".to_string(), confidence: 0.4, enabled: false },
        ]
    );

    let (_, overlay) = labeler.session.correction_input().await.unwrap();
    let labels = overlay.correction_labels();
    assert_eq!(labels.to_json().unwrap(), r#"{"Pneumonia":0.92}"#);
}

#[tokio::test]
async fn test_prediction_failure_does_not_affect_review() {
    let backend = ScriptedBackend::new();
    backend.predict_for("chest.png", Err(transport_error()));
    backend.review_for(
        "chest.png",
        Ok(vec![
            finding("Airway", ReviewStatus::Normal, &["Trachea midline"]),
            finding("Cardiac", ReviewStatus::Attention, &["Borderline cardiomegaly"]),
        ]),
    );
    let bus = test_bus();
    let mut rx = bus.subscribe();
    let labeler = Labeler::new(backend.clone(), bus);

    let summary = labeler.orchestrator.analyze(png("chest.png")).await;

    assert!(!labeler.session.predictions_loading().await);
    assert!(labeler.session.predictions().await.is_empty());
    assert!(!labeler.session.review_loading().await);
    assert_eq!(labeler.session.review().await.len(), 2);

    let snapshot = labeler.session.snapshot().await;
    assert_eq!(
        snapshot.predictions_state,
        OperationState::Settled(OperationOutcome::Failure)
    );
    assert_eq!(
        snapshot.review_state,
        OperationState::Settled(OperationOutcome::Success)
    );

    let events = drain(&mut rx);
    let prediction_failures = events
        .iter()
        .filter(|e| is_condition(e, ConditionKind::PredictionFailed))
        .count();
    assert_eq!(prediction_failures, 1);
    assert!(!events.iter().any(|e| is_condition(e, ConditionKind::ReviewFailed)));

    assert_eq!(summary.prediction_count, 0);
    assert_eq!(summary.finding_count, 2);
    assert!(summary.is_announced());
    assert_eq!(summary.message(), "Generated 0 predictions and 2 PACEMAN findings");
    assert!(events.iter().any(|e| matches!(
        e,
        LabelerEvent::AnalysisComplete { prediction_count: 0, finding_count: 2, .. }
    )));
}

#[tokio::test]
async fn test_both_failures_suppress_summary() {
    let backend = ScriptedBackend::new();
    backend.predict_for("chest.png", Err(transport_error()));
    backend.review_for(
        "chest.png",
        Err(cxr_labeler::services::BackendError::Status(500, "boom".to_string())),
    );
    let bus = test_bus();
    let mut rx = bus.subscribe();
    let labeler = Labeler::new(backend.clone(), bus);

    let summary = labeler.orchestrator.analyze(png("chest.png")).await;

    assert!(!summary.is_announced());
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| is_condition(e, ConditionKind::PredictionFailed)));
    assert!(events.iter().any(|e| is_condition(e, ConditionKind::ReviewFailed)));
    assert!(!events
        .iter()
        .any(|e| matches!(e, LabelerEvent::AnalysisComplete { .. })));
}

#[tokio::test]
async fn test_empty_results_are_not_failures() {
    let backend = ScriptedBackend::new();
    let bus = test_bus();
    let mut rx = bus.subscribe();
    let labeler = Labeler::new(backend.clone(), bus);

    // No replies scripted: both calls succeed with nothing
    let summary = labeler.orchestrator.analyze(png("clear.png")).await;

    assert_eq!(summary.prediction_count + summary.finding_count, 0);
    assert!(!summary.is_announced());
    let events = drain(&mut rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, LabelerEvent::ConditionRaised { .. })));
    assert_eq!(
        labeler.session.snapshot().await.predictions_state,
        OperationState::Settled(OperationOutcome::Success)
    );
}

#[tokio::test]
async fn test_operations_settle_independently() {
    let backend = ScriptedBackend::new();
    let release_predict = backend.gate_predict("chest.png");
    backend.review_for(
        "chest.png",
        Ok(vec![finding("Neck", ReviewStatus::Normal, &[])]),
    );
    let bus = test_bus();
    let mut rx = bus.subscribe();
    let labeler = std::sync::Arc::new(Labeler::new(backend.clone(), bus));

    let ticket = labeler.orchestrator.begin(png("chest.png")).await;
    assert!(labeler.session.predictions_loading().await);
    assert!(labeler.session.review_loading().await);

    let run = tokio::spawn({
        let labeler = labeler.clone();
        async move { labeler.orchestrator.run(ticket).await }
    });

    // Review settles while prediction is still in flight
    wait_for(&mut rx, |e| is_settled(e, AnalysisOperation::Review)).await;
    assert!(!labeler.session.review_loading().await);
    assert_eq!(labeler.session.review().await.len(), 1);
    assert!(labeler.session.predictions_loading().await);
    assert!(!run.is_finished());

    release_predict
        .send(Ok(scores(&[("Nodule", 0.55)])))
        .unwrap();
    let summary = run.await.unwrap();

    assert!(!labeler.session.predictions_loading().await);
    assert_eq!(summary.prediction_count, 1);
    assert_eq!(summary.finding_count, 1);
}

#[tokio::test]
async fn test_prediction_may_settle_before_review() {
    let backend = ScriptedBackend::new();
    backend.predict_for("chest.png", Ok(scores(&[("Edema", 0.81)])));
    let release_review = backend.gate_review("chest.png");
    let bus = test_bus();
    let mut rx = bus.subscribe();
    let labeler = std::sync::Arc::new(Labeler::new(backend.clone(), bus));

    let ticket = labeler.orchestrator.begin(png("chest.png")).await;
    let run = tokio::spawn({
        let labeler = labeler.clone();
        async move { labeler.orchestrator.run(ticket).await }
    });

    wait_for(&mut rx, |e| is_settled(e, AnalysisOperation::Predict)).await;
    assert_eq!(labeler.session.predictions().await.len(), 1);
    assert!(labeler.session.review_loading().await);

    release_review.send(Err(transport_error())).unwrap();
    let summary = run.await.unwrap();

    assert_eq!(summary.prediction_count, 1);
    assert_eq!(summary.finding_count, 0);
    assert!(summary.is_announced());
}

#[tokio::test]
async fn test_superseded_results_are_discarded() {
    let backend = ScriptedBackend::new();
    let release_old = backend.gate_predict("old.png");
    backend.predict_for("new.png", Ok(scores(&[("Nodule", 0.7)])));
    let bus = test_bus();
    let mut rx = bus.subscribe();
    let labeler = std::sync::Arc::new(Labeler::new(backend.clone(), bus));

    let old_ticket = labeler.orchestrator.begin(png("old.png")).await;
    let old_generation = old_ticket.generation();
    let old_run = tokio::spawn({
        let labeler = labeler.clone();
        async move { labeler.orchestrator.run(old_ticket).await }
    });

    let new_summary = labeler.orchestrator.analyze(png("new.png")).await;
    assert!(new_summary.is_announced());
    assert!(new_summary.generation > old_generation);

    // The old classifier answers late
    release_old
        .send(Ok(scores(&[("Pneumonia", 0.9), ("Effusion", 0.3)])))
        .unwrap();
    let old_summary = old_run.await.unwrap();

    assert!(old_summary.superseded);
    assert!(!old_summary.is_announced());
    let current = labeler.session.predictions().await;
    assert_eq!(current.len(), 1);
    assert_eq!(current.predictions()[0].pathology, "Nodule");
    assert_eq!(
        labeler.session.current_file().await.unwrap().file_name(),
        "new.png"
    );

    let events = drain(&mut rx);
    assert!(!events.iter().any(|e| matches!(
        e,
        LabelerEvent::AnalysisComplete { generation, .. } if *generation == old_generation
    )));
}

#[tokio::test]
async fn test_superseded_failure_raises_no_condition() {
    let backend = ScriptedBackend::new();
    let release_old = backend.gate_predict("old.png");
    let bus = test_bus();
    let mut rx = bus.subscribe();
    let labeler = std::sync::Arc::new(Labeler::new(backend.clone(), bus));

    let old_ticket = labeler.orchestrator.begin(png("old.png")).await;
    let old_run = tokio::spawn({
        let labeler = labeler.clone();
        async move { labeler.orchestrator.run(old_ticket).await }
    });
    labeler.orchestrator.analyze(png("new.png")).await;
    drain(&mut rx);

    release_old.send(Err(transport_error())).unwrap();
    old_run.await.unwrap();

    let events = drain(&mut rx);
    assert!(!events
        .iter()
        .any(|e| is_condition(e, ConditionKind::PredictionFailed)));
    assert!(!labeler.session.predictions_loading().await);
}

#[tokio::test]
async fn test_both_calls_carry_the_same_file() {
    let backend = ScriptedBackend::new();
    let labeler = Labeler::new(backend.clone(), test_bus());

    labeler.orchestrator.analyze(png("scan.png")).await;

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.contains(&helpers::Call::Predict("scan.png".to_string())));
    assert!(calls.contains(&helpers::Call::Review("scan.png".to_string())));
}

#[tokio::test]
async fn test_rejected_file_makes_no_calls() {
    let backend = ScriptedBackend::new();
    let bus = test_bus();
    let mut rx = bus.subscribe();
    let labeler = Labeler::new(backend.clone(), bus);

    let upload = cxr_labeler::models::ImageUpload::new(
        "report.pdf",
        Some("application/pdf".to_string()),
        b"%PDF".to_vec(),
    );
    let result = labeler.select_file(upload).await;

    assert!(result.is_err());
    assert!(backend.calls().is_empty());
    assert_eq!(labeler.session.current_generation(), 0);
    assert!(labeler.session.current_file().await.is_none());
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(is_condition(&events[0], ConditionKind::InvalidFileType));
}
