//! Readiness waits and health snapshots against scripted probes.

mod common;

use common::ScriptedProbe;
use proptest::prelude::*;
use stagehand_core::health::{HealthVerifier, PollPolicy, Probe, ProbeStatus};
use stagehand_core::{CancellationHandle, HealthStatus, StagehandError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn verifier() -> HealthVerifier {
    HealthVerifier::new(PollPolicy::constant(Duration::from_millis(100)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_ready_after_n_polls_calls_probe_n_plus_one_times(not_ready in 0usize..8) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let probe = ScriptedProbe::ready_after("rasa-status", not_ready);

        let readiness = runtime
            .block_on(verifier().wait_until_ready(&probe, Duration::from_secs(60), &CancellationHandle::new()))
            .unwrap();

        prop_assert_eq!(probe.calls() as usize, not_ready + 1);
        prop_assert_eq!(readiness.polls as usize, not_ready + 1);
        prop_assert!(readiness.waited >= Duration::from_millis(100) * not_ready as u32);
    }
}

#[tokio::test(start_paused = true)]
async fn test_never_ready_probe_times_out_at_deadline() {
    let probe = ScriptedProbe::never_ready("qdrant-http");
    let started = Instant::now();

    let error = verifier()
        .wait_until_ready(&probe, Duration::from_secs(1), &CancellationHandle::new())
        .await
        .unwrap_err();

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1100), "elapsed {elapsed:?}");
    match error {
        StagehandError::Timeout {
            probe_id,
            timeout,
            last_status,
        } => {
            assert_eq!(probe_id, "qdrant-http");
            assert_eq!(timeout, Duration::from_secs(1));
            assert_eq!(last_status, "not_ready: still starting");
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_hanging_probe_call_is_cut_off_at_deadline() {
    let probe = ScriptedProbe::never_ready("nginx").with_delay(Duration::from_secs(30));
    let started = Instant::now();

    let error = verifier()
        .wait_until_ready(&probe, Duration::from_secs(2), &CancellationHandle::new())
        .await
        .unwrap_err();

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
    match error {
        StagehandError::Timeout { last_status, .. } => {
            assert_eq!(last_status, "probe call did not return before the deadline");
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(probe.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_probe_error_ends_wait_unless_retryable() {
    let probe = ScriptedProbe::erroring("postgres-port", "connection refused");
    let error = verifier()
        .wait_until_ready(&probe, Duration::from_secs(5), &CancellationHandle::new())
        .await
        .unwrap_err();
    assert_eq!(
        error,
        StagehandError::ProbeError {
            probe_id: "postgres-port".to_string(),
            detail: "connection refused".to_string(),
        }
    );
    assert_eq!(probe.calls(), 1);

    let flapping = ScriptedProbe::new(
        "postgres-port",
        vec![
            ProbeStatus::Error("connection refused".to_string()),
            ProbeStatus::Error("connection reset".to_string()),
        ],
        ProbeStatus::Ready,
    );
    let tolerant = HealthVerifier::new(
        PollPolicy::constant(Duration::from_millis(100)).with_errors_retryable(true),
    );
    let readiness = tolerant
        .wait_until_ready(&flapping, Duration::from_secs(5), &CancellationHandle::new())
        .await
        .unwrap();
    assert_eq!(readiness.polls, 3);
}

#[tokio::test(start_paused = true)]
async fn test_poll_interval_grows_to_cap() {
    let verifier = HealthVerifier::new(PollPolicy {
        interval: Duration::from_millis(100),
        max_interval: Duration::from_millis(400),
        multiplier: 2.0,
        errors_retryable: false,
    });
    let probe = ScriptedProbe::ready_after("redis", 4);

    let readiness = verifier
        .wait_until_ready(&probe, Duration::from_secs(10), &CancellationHandle::new())
        .await
        .unwrap();

    // 100 + 200 + 400 + 400
    assert!(readiness.waited >= Duration::from_millis(1100));
    assert!(readiness.waited < Duration::from_millis(1200));
    assert_eq!(readiness.polls, 5);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_wait_between_polls() {
    let probe = ScriptedProbe::never_ready("minio");
    let cancellation = CancellationHandle::new();
    let trigger = cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(350)).await;
        trigger.cancel();
    });

    let error = verifier()
        .wait_until_ready(&probe, Duration::from_secs(60), &cancellation)
        .await
        .unwrap_err();

    assert!(matches!(error, StagehandError::Cancelled(_)));
    assert_eq!(probe.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_maps_each_probe_status() {
    let probes: Vec<Arc<dyn Probe>> = vec![
        Arc::new(ScriptedProbe::ready_after("postgres", 0)),
        Arc::new(ScriptedProbe::never_ready("rasa")),
        Arc::new(ScriptedProbe::erroring("qdrant", "bad json")),
        Arc::new(ScriptedProbe::ready_after("nginx", 0).with_delay(Duration::from_secs(30))),
    ];
    let started = Instant::now();

    let report = verifier().snapshot(&probes, Duration::from_secs(5)).await;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
    let statuses: Vec<_> = report
        .snapshots
        .iter()
        .map(|s| (s.probe_id.as_str(), s.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("postgres", HealthStatus::Healthy),
            ("rasa", HealthStatus::Degraded),
            ("qdrant", HealthStatus::Unhealthy),
            ("nginx", HealthStatus::Unknown),
        ]
    );
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert_eq!(report.exit_code(), 2);
    assert_eq!(report.problems().count(), 3);
    assert!(report.snapshots[3].detail.contains("no answer"));
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_of_healthy_probes_is_healthy() {
    let probes: Vec<Arc<dyn Probe>> = vec![
        Arc::new(ScriptedProbe::ready_after("postgres", 0)),
        Arc::new(ScriptedProbe::ready_after("redis", 0).with_delay(Duration::from_millis(200))),
    ];

    let report = verifier().snapshot(&probes, Duration::from_secs(5)).await;

    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.exit_code(), 0);
    assert!(report.snapshots[1].latency_ms >= 200);
}

#[tokio::test]
async fn test_snapshot_of_no_probes_is_unknown() {
    let report = verifier().snapshot(&[], Duration::from_secs(1)).await;
    assert!(report.snapshots.is_empty());
    assert_eq!(report.status, HealthStatus::Unknown);
    assert_eq!(report.exit_code(), 3);
}
