//! Aggregation service integration tests
//!
//! Covers find-or-create idempotence, the averaging contract, natural-key
//! races, and store failure propagation.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::faulty_store::FaultyStore;
use helpers::fixtures::{at, capture, capture_between};
use lidar_db::capture::{Capture, CapturePack, ChannelProfile};
use lidar_db::config::ServiceConfig;
use lidar_db::events::{MemorySink, ServiceEvent};
use lidar_db::experiment::{AveragingMode, Experiment, Measurement, ProcessingResult};
use lidar_db::service::AggregationService;
use lidar_db::store::{CaptureStore, MemoryStore};
use lidar_db::{Error, StoreError};

fn memory_service() -> AggregationService<MemoryStore, MemorySink> {
    AggregationService::with_events(MemoryStore::new(), MemorySink::new())
}

fn faulty_service() -> AggregationService<FaultyStore, MemorySink> {
    AggregationService::with_events(FaultyStore::new(), MemorySink::new())
}

// =============================================================================
// Experiment registration
// =============================================================================

#[tokio::test]
async fn test_register_experiment_twice_stores_one() {
    let service = memory_service();

    let first = service.register_experiment(at(0), "site-A", "").await.unwrap();
    let second = service.register_experiment(at(0), "site-A", "").await.unwrap();

    assert_eq!(first.id(), second.id());
    assert_eq!(service.store().experiment_count(), 1);
}

#[tokio::test]
async fn test_register_experiment_ignores_resubmitted_comments() {
    let service = memory_service();

    service
        .register_experiment(at(0), "site-A", "original")
        .await
        .unwrap();
    let again = service
        .register_experiment(at(0), "site-A", "edited")
        .await
        .unwrap();

    assert_eq!(again.comments(), "original");
}

#[tokio::test]
async fn test_same_start_different_title_is_distinct() {
    let service = memory_service();

    let a = service.register_experiment(at(0), "site-A", "").await.unwrap();
    let b = service.register_experiment(at(0), "site-B", "").await.unwrap();

    assert_ne!(a.id(), b.id());
    assert_eq!(service.store().experiment_count(), 2);

    let same_start = service.experiments_started_at(at(0)).await.unwrap();
    let titles: Vec<&str> = same_start.iter().map(Experiment::title).collect();
    assert_eq!(titles, vec!["site-A", "site-B"]);
}

// =============================================================================
// Measurement registration
// =============================================================================

#[tokio::test]
async fn test_register_measurement_twice_stores_one() {
    let service = memory_service();
    let exp = service.register_experiment(at(0), "site-A", "").await.unwrap();

    let first = service
        .register_measurement(exp.id(), capture(0, 100, vec![1.0, 2.0]))
        .await
        .unwrap();
    let second = service
        .register_measurement(exp.id(), capture(0, 100, vec![1.0, 2.0]))
        .await
        .unwrap();

    assert_eq!(first.id(), second.id());
    assert_eq!(first.experiment_id(), exp.id());
    assert_eq!(service.store().measurement_count(), 1);
}

#[tokio::test]
async fn test_same_window_under_other_experiment_is_distinct() {
    let service = memory_service();
    let a = service.register_experiment(at(0), "site-A", "").await.unwrap();
    let b = service.register_experiment(at(0), "site-B", "").await.unwrap();

    let ma = service
        .register_measurement(a.id(), capture(0, 1, vec![1.0]))
        .await
        .unwrap();
    let mb = service
        .register_measurement(b.id(), capture(0, 1, vec![1.0]))
        .await
        .unwrap();

    assert_ne!(ma.id(), mb.id());
    assert_eq!(service.store().measurement_count(), 2);
}

// =============================================================================
// Processing results
// =============================================================================

#[tokio::test]
async fn test_end_to_end_accumulate() {
    let service = memory_service();
    let exp = service
        .register_experiment(
            "2024-01-01T00:00:00Z".parse().unwrap(),
            "site-A",
            "",
        )
        .await
        .unwrap();

    service
        .register_measurement(exp.id(), capture(0, 100, vec![1.0, 2.0, 3.0]))
        .await
        .unwrap();
    service
        .register_measurement(exp.id(), capture(5, 150, vec![4.0, 5.0, 6.0]))
        .await
        .unwrap();

    let result = service.create_processing_result(exp.id()).await.unwrap();
    let aggregated = result.aggregated();

    assert_eq!(result.experiment_id(), exp.id());
    assert_eq!(result.mode(), AveragingMode::Accumulate);
    assert_eq!(result.measurement_ids().len(), 2);
    assert_eq!(aggregated.profiles()[0].samples(), &[5.0, 7.0, 9.0]);
    assert_eq!(aggregated.profiles()[0].shots(), 250);
    assert_eq!(aggregated.lasers()[0].shots, 250);
    assert_eq!(service.store().result_count(), 1);
}

#[tokio::test]
async fn test_end_to_end_mean() {
    let config = ServiceConfig::default().with_averaging(AveragingMode::Mean);
    let service = AggregationService::with_config(MemoryStore::new(), MemorySink::new(), config);
    let exp = service.register_experiment(at(0), "site-A", "").await.unwrap();

    service
        .register_measurement(exp.id(), capture(0, 100, vec![1.0, 2.0, 3.0]))
        .await
        .unwrap();
    service
        .register_measurement(exp.id(), capture(5, 150, vec![4.0, 5.0, 6.0]))
        .await
        .unwrap();

    let result = service.create_processing_result(exp.id()).await.unwrap();

    assert_eq!(result.mode(), AveragingMode::Mean);
    assert_eq!(result.aggregated().profiles()[0].samples(), &[2.5, 3.5, 4.5]);
    assert_eq!(result.aggregated().profiles()[0].shots(), 250);
}

#[tokio::test]
async fn test_session_bounds_are_min_start_max_stop() {
    let service = memory_service();
    let exp = service.register_experiment(at(0), "site-A", "").await.unwrap();

    // (t1, t2) holds both the earliest start and the latest stop
    service
        .register_measurement(exp.id(), capture_between(10, 20, 1, vec![0.0]))
        .await
        .unwrap();
    service
        .register_measurement(exp.id(), capture_between(12, 14, 1, vec![0.0]))
        .await
        .unwrap();
    service
        .register_measurement(exp.id(), capture_between(15, 18, 1, vec![0.0]))
        .await
        .unwrap();

    let result = service.create_processing_result(exp.id()).await.unwrap();

    assert_eq!(result.aggregated().start_time(), at(10));
    assert_eq!(result.aggregated().stop_time(), at(20));
}

#[tokio::test]
async fn test_processing_result_is_not_recomputed() {
    let service = memory_service();
    let exp = service.register_experiment(at(0), "site-A", "").await.unwrap();
    service
        .register_measurement(exp.id(), capture(0, 100, vec![1.0]))
        .await
        .unwrap();

    let first = service.create_processing_result(exp.id()).await.unwrap();

    // A late measurement does not reach the stored result
    service
        .register_measurement(exp.id(), capture(1, 100, vec![1.0]))
        .await
        .unwrap();
    let second = service.create_processing_result(exp.id()).await.unwrap();

    assert_eq!(first.id(), second.id());
    assert_eq!(second.measurement_ids().len(), 1);
    assert_eq!(second.aggregated().profiles()[0].samples(), &[1.0]);
}

#[tokio::test]
async fn test_empty_experiment_fails_aggregation() {
    let service = memory_service();
    let exp = service.register_experiment(at(0), "site-A", "").await.unwrap();

    let err = service.create_processing_result(exp.id()).await.unwrap_err();

    assert!(matches!(err, Error::Aggregation(_)));
    assert_eq!(service.store().result_count(), 0);
}

#[tokio::test]
async fn test_shape_mismatch_fails_aggregation() {
    let service = memory_service();
    let exp = service.register_experiment(at(0), "site-A", "").await.unwrap();
    service
        .register_measurement(exp.id(), capture(0, 1, vec![1.0, 2.0, 3.0]))
        .await
        .unwrap();
    service
        .register_measurement(exp.id(), capture(1, 1, vec![1.0, 2.0]))
        .await
        .unwrap();

    let err = service.create_processing_result(exp.id()).await.unwrap_err();

    assert!(matches!(err, Error::Aggregation(_)));
    assert_eq!(service.store().result_count(), 0);
}

// =============================================================================
// Capture packs
// =============================================================================

#[tokio::test]
async fn test_ingest_pack_then_aggregate() {
    let service = memory_service();
    let pack: CapturePack = (0..4)
        .map(|minute| capture(minute * 2, 600, vec![f64::from(minute); 16]))
        .collect();

    let report = service.ingest_pack("site-A", "night run", &pack).await.unwrap();
    assert_eq!(report.experiment.start_time(), at(0));
    assert_eq!(report.experiment.comments(), "night run");
    assert_eq!(report.created, 4);

    let result = service
        .create_processing_result(report.experiment.id())
        .await
        .unwrap();
    assert_eq!(result.aggregated().profiles()[0].shots(), 2400);
    assert_eq!(result.aggregated().profiles()[0].samples(), &[6.0; 16]);
}

#[tokio::test]
async fn test_ingest_pack_resumes_after_partial_run() {
    let service = memory_service();
    let captures: Vec<Capture> = (0..3).map(|m| capture(m, 10, vec![1.0])).collect();

    // First run only got through one capture
    let partial: CapturePack = captures[..1].iter().cloned().collect();
    service.ingest_pack("site-A", "", &partial).await.unwrap();

    let full: CapturePack = captures.into_iter().collect();
    let report = service.ingest_pack("site-A", "", &full).await.unwrap();

    assert_eq!((report.created, report.existing), (2, 1));
    assert_eq!(service.store().experiment_count(), 1);
    assert_eq!(service.store().measurement_count(), 3);
}

// =============================================================================
// Natural-key races
// =============================================================================

#[tokio::test]
async fn test_experiment_race_resolves_to_winner() {
    let service = faulty_service();
    let winner = service
        .store()
        .inner
        .insert_experiment(Experiment::new(at(0), "site-A", "winner"))
        .await
        .unwrap();
    service.store().hide_next_lookups(1);

    let resolved = service
        .register_experiment(at(0), "site-A", "loser")
        .await
        .unwrap();

    assert_eq!(resolved.id(), winner.id());
    assert_eq!(resolved.comments(), "winner");
    assert_eq!(service.store().inner.experiment_count(), 1);
    assert!(service
        .events()
        .events()
        .iter()
        .any(|e| matches!(e, ServiceEvent::InsertConflict { record: "experiment", .. })));
}

#[tokio::test]
async fn test_experiment_race_without_visible_winner_is_duplicate() {
    let service = faulty_service();
    service
        .store()
        .inner
        .insert_experiment(Experiment::new(at(0), "site-A", ""))
        .await
        .unwrap();
    service.store().hide_all_lookups();

    let err = service
        .register_experiment(at(0), "site-A", "")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Duplicate { record: "experiment", .. }));
}

#[tokio::test]
async fn test_measurement_race_resolves_to_winner() {
    let service = faulty_service();
    let exp = service.register_experiment(at(0), "site-A", "").await.unwrap();
    let winner = service
        .store()
        .inner
        .insert_measurement(Measurement::new(exp.id(), capture(0, 1, vec![1.0])))
        .await
        .unwrap();
    service.store().hide_next_lookups(1);

    let resolved = service
        .register_measurement(exp.id(), capture(0, 1, vec![1.0]))
        .await
        .unwrap();

    assert_eq!(resolved.id(), winner.id());
    assert_eq!(service.store().inner.measurement_count(), 1);
}

#[tokio::test]
async fn test_measurement_race_without_visible_winner_is_duplicate() {
    let service = faulty_service();
    let exp = service.register_experiment(at(0), "site-A", "").await.unwrap();
    service
        .store()
        .inner
        .insert_measurement(Measurement::new(exp.id(), capture(0, 1, vec![1.0])))
        .await
        .unwrap();
    service.store().hide_all_lookups();

    let err = service
        .register_measurement(exp.id(), capture(0, 1, vec![1.0]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Duplicate { record: "measurement", .. }));
    assert_eq!(service.store().inner.measurement_count(), 1);
}

#[tokio::test]
async fn test_processing_result_race_resolves_to_winner() {
    let service = faulty_service();
    let exp = service.register_experiment(at(0), "site-A", "").await.unwrap();
    let measurement = service
        .register_measurement(exp.id(), capture(0, 100, vec![1.0, 2.0]))
        .await
        .unwrap();
    let winner = service
        .store()
        .inner
        .insert_processing_result(ProcessingResult::new(
            exp.id(),
            vec![measurement.id()],
            AveragingMode::Mean,
            measurement.capture().clone(),
        ))
        .await
        .unwrap();
    service.store().hide_next_lookups(1);

    let resolved = service.create_processing_result(exp.id()).await.unwrap();

    assert_eq!(resolved.id(), winner.id());
    assert_eq!(resolved.mode(), AveragingMode::Mean);
    assert_eq!(service.store().inner.result_count(), 1);
    assert!(service.events().events().iter().any(|e| matches!(
        e,
        ServiceEvent::InsertConflict { record: "processing result", .. }
    )));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_converges() {
    const WRITERS: usize = 32;
    let service = Arc::new(faulty_service());
    // Every writer misses on lookup before any of them inserts
    service.store().gate_lookups(WRITERS);

    let mut handles = vec![];
    for i in 0..WRITERS {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .register_experiment(at(0), "site-A", &format!("writer {i}"))
                .await
                .unwrap()
                .id()
        }));
    }

    let mut ids = vec![];
    for handle in handles {
        ids.push(handle.await.unwrap());
    }

    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(service.store().inner.experiment_count(), 1);
    assert_eq!(service.store().insert_calls(), WRITERS);

    let events = service.events().events();
    let conflicts = events
        .iter()
        .filter(|e| matches!(e, ServiceEvent::InsertConflict { record: "experiment", .. }))
        .count();
    let created = events
        .iter()
        .filter(|e| matches!(e, ServiceEvent::ExperimentCreated { .. }))
        .count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, WRITERS - 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_measurement_registration_converges() {
    const WRITERS: usize = 8;
    let service = Arc::new(faulty_service());
    let exp_id = service
        .register_experiment(at(0), "site-A", "")
        .await
        .unwrap()
        .id();
    service.store().gate_lookups(WRITERS);

    let mut handles = vec![];
    for _ in 0..WRITERS {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .register_measurement(exp_id, capture(0, 1, vec![1.0]))
                .await
                .unwrap()
                .id()
        }));
    }

    let mut ids = vec![];
    for handle in handles {
        ids.push(handle.await.unwrap());
    }

    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(service.store().inner.measurement_count(), 1);
    let conflicts = service
        .events()
        .events()
        .iter()
        .filter(|e| matches!(e, ServiceEvent::InsertConflict { record: "measurement", .. }))
        .count();
    assert_eq!(conflicts, WRITERS - 1);
}

// =============================================================================
// Store failures
// =============================================================================

#[tokio::test]
async fn test_lookup_failure_is_reported_with_context() {
    let service = faulty_service();
    service
        .store()
        .fail_finds_with(StoreError::Unavailable("connection refused".to_string()));

    let err = service
        .register_experiment(at(0), "site-A", "")
        .await
        .unwrap_err();

    match err {
        Error::Lookup {
            operation,
            key,
            source,
        } => {
            assert_eq!(operation, "register_experiment");
            assert!(key.contains("site-A"));
            assert_eq!(source, StoreError::Unavailable("connection refused".to_string()));
        }
        other => panic!("expected lookup error, got {other:?}"),
    }
    assert_eq!(service.store().insert_calls(), 0);
    assert!(service
        .events()
        .events()
        .iter()
        .any(|e| matches!(e, ServiceEvent::StoreFailure { operation: "register_experiment", .. })));
}

#[tokio::test]
async fn test_insert_failure_is_persist_error() {
    let service = faulty_service();
    service
        .store()
        .fail_inserts_with(StoreError::Backend("disk full".to_string()));

    let err = service
        .register_experiment(at(0), "site-A", "")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Persist {
            operation: "register_experiment",
            source: StoreError::Backend(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_measurement_retrieval_failure_is_lookup_error() {
    let service = faulty_service();
    let exp = service.register_experiment(at(0), "site-A", "").await.unwrap();
    service
        .register_measurement(exp.id(), capture(0, 1, vec![1.0]))
        .await
        .unwrap();
    service
        .store()
        .fail_finds_with(StoreError::Backend("cursor closed".to_string()));

    let err = service.create_processing_result(exp.id()).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Lookup {
            operation: "create_processing_result",
            ..
        }
    ));
}

#[tokio::test]
async fn test_stalled_store_times_out() {
    let config = ServiceConfig::default().with_store_timeout(Duration::from_millis(50));
    let service = AggregationService::with_config(FaultyStore::new(), MemorySink::new(), config);
    service.store().stall_for(Duration::from_secs(10));

    let err = service
        .register_experiment(at(0), "site-A", "")
        .await
        .unwrap_err();

    assert!(matches!(
        err.store_error(),
        Some(StoreError::Timeout(limit)) if *limit == Duration::from_millis(50)
    ));
    assert!(matches!(err, Error::Lookup { .. }));
}

#[tokio::test]
async fn test_shared_store_across_services() {
    let store = Arc::new(MemoryStore::new());
    let a = AggregationService::with_events(Arc::clone(&store), MemorySink::new());
    let b = AggregationService::with_events(Arc::clone(&store), MemorySink::new());

    let from_a = a.register_experiment(at(0), "site-A", "").await.unwrap();
    let from_b = b.register_experiment(at(0), "site-A", "").await.unwrap();

    assert_eq!(from_a.id(), from_b.id());
    assert_eq!(store.experiment_count(), 1);

    let capture = Capture::builder(at(0), at(1))
        .profile(ChannelProfile::new("BT0", 1, vec![1.0]))
        .build();
    a.register_measurement(from_a.id(), capture).await.unwrap();
    let result = b.create_processing_result(from_b.id()).await.unwrap();
    assert_eq!(result.measurement_ids().len(), 1);
}
