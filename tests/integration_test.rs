//! Integration Tests - Scrape Cycle End-to-End
//!
//! Drives the orchestrator through connection failures, collector
//! failures and concurrent pulls. Uses mockall for the `Connector`
//! port and small hand-written sessions/collectors.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use mockall::mock;

use greenplum_exporter::adapters::metrics::render;
use greenplum_exporter::adapters::postgres::rows::forward_rows;
use greenplum_exporter::domain::{MetricDesc, MetricSample, SampleSink, ServerVersion};
use greenplum_exporter::error::{CollectorError, DatabaseError};
use greenplum_exporter::ports::{Collector, CollectorRegistry, Connector, DatabaseSession};
use greenplum_exporter::usecases::{ConnectionPolicy, CycleMetrics, ScrapeOrchestrator};

const GP6: &str = "PostgreSQL 9.4.24 (Greenplum Database 6.20.0 build commit:abc)";

static ROWS: MetricDesc = MetricDesc::gauge("test_collector_rows", "Rows emitted by test collectors", &["collector", "row"]);

// ---- Fakes ----

/// Session whose probe answers come from a script; an exhausted script answers GP6.
pub struct FakeSession {
    banners: Mutex<VecDeque<Result<String, String>>>,
    closed: Arc<AtomicBool>,
}

impl FakeSession {
    fn healthy() -> Self {
        Self::scripted(Vec::new(), Arc::new(AtomicBool::new(false)))
    }

    fn scripted(banners: Vec<Result<String, String>>, closed: Arc<AtomicBool>) -> Self {
        Self {
            banners: Mutex::new(banners.into()),
            closed,
        }
    }
}

#[async_trait]
impl DatabaseSession for FakeSession {
    async fn version_banner(&self) -> Result<String, DatabaseError> {
        let next = self.banners.lock().unwrap().pop_front();
        match next {
            Some(Ok(banner)) => Ok(banner),
            Some(Err(message)) => Err(DatabaseError::other(message)),
            None => Ok(GP6.to_string()),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

mock! {
    pub Conn {}

    #[async_trait::async_trait]
    impl Connector for Conn {
        type Session = FakeSession;

        async fn open(&self) -> Result<FakeSession, DatabaseError>;
    }
}

fn row(collector: &str, n: usize) -> MetricSample {
    MetricSample::new(&ROWS, n as f64, vec![collector.to_string(), format!("r{n}")])
}

/// Emits a fixed number of samples and counts its invocations.
struct StaticCollector {
    name: &'static str,
    samples: usize,
    calls: Arc<AtomicUsize>,
}

impl StaticCollector {
    fn new(name: &'static str, samples: usize) -> Self {
        Self {
            name,
            samples,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Collector<FakeSession> for StaticCollector {
    fn identity(&self) -> &str {
        self.name
    }

    async fn collect(
        &self,
        _session: &FakeSession,
        _version: ServerVersion,
        sink: &mut dyn SampleSink,
    ) -> Result<(), CollectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for n in 1..=self.samples {
            sink.push(row(self.name, n));
        }
        Ok(())
    }
}

/// Fails without emitting anything.
struct FailingCollector;

#[async_trait]
impl Collector<FakeSession> for FailingCollector {
    fn identity(&self) -> &str {
        "failing"
    }

    async fn collect(
        &self,
        _session: &FakeSession,
        _version: ServerVersion,
        _sink: &mut dyn SampleSink,
    ) -> Result<(), CollectorError> {
        Err(CollectorError::Query(DatabaseError::other("relation does not exist")))
    }
}

/// Emits r1 and r2, then fails to scan r3; records every row it mapped.
struct BrokenRowCollector {
    mapped: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl Collector<FakeSession> for BrokenRowCollector {
    fn identity(&self) -> &str {
        "broken_row"
    }

    async fn collect(
        &self,
        _session: &FakeSession,
        _version: ServerVersion,
        sink: &mut dyn SampleSink,
    ) -> Result<(), CollectorError> {
        let rows = stream::iter((1..=5).map(Ok::<usize, sqlx::Error>));
        forward_rows(rows, sink, |n| {
            self.mapped.lock().unwrap().push(*n);
            if *n == 3 {
                Err(sqlx::Error::ColumnNotFound("sess_id".into()))
            } else {
                Ok(row("broken_row", *n))
            }
        })
        .await?;
        Ok(())
    }
}

/// Tracks how many cycles are inside a collector at once.
struct InFlightCollector {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl Collector<FakeSession> for InFlightCollector {
    fn identity(&self) -> &str {
        "in_flight"
    }

    async fn collect(
        &self,
        _session: &FakeSession,
        _version: ServerVersion,
        _sink: &mut dyn SampleSink,
    ) -> Result<(), CollectorError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

fn orchestrator(
    connector: MockConn,
    collectors: Vec<Box<dyn Collector<FakeSession>>>,
    policy: ConnectionPolicy,
) -> ScrapeOrchestrator<MockConn> {
    let metrics = Arc::new(CycleMetrics::new().unwrap());
    ScrapeOrchestrator::new(connector, CollectorRegistry::new(collectors), metrics, policy)
}

fn healthy_connector() -> MockConn {
    let mut connector = MockConn::new();
    connector.expect_open().returning(|| Ok(FakeSession::healthy()));
    connector
}

// ---- Integration Tests ----

#[tokio::test]
async fn test_unreachable_database_reports_only_cycle_metrics() {
    let mut connector = MockConn::new();
    connector
        .expect_open()
        .times(1)
        .returning(|| Err(DatabaseError::other("connection refused")));

    let collector = StaticCollector::new("a", 2);
    let calls = Arc::clone(&collector.calls);
    let orch = orchestrator(connector, vec![Box::new(collector)], ConnectionPolicy::CloseAfterCycle);

    let mut sink: Vec<MetricSample> = Vec::new();
    orch.run_cycle(&mut sink).await;

    assert!(sink.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0, "no collector may run without a connection");

    let snap = orch.metrics().snapshot();
    assert_eq!(snap.attempted, 1);
    assert_eq!(snap.failed, 1);
    assert!(!snap.up);

    let body = render(&sink, orch.metrics(), false).unwrap();
    let samples: Vec<_> = body.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(samples.len(), 4, "unexpected exposition:\n{body}");
    assert!(body.contains("greenplum_up 0"));
}

#[tokio::test]
async fn test_failing_collector_is_isolated() {
    let orch = orchestrator(
        healthy_connector(),
        vec![Box::new(StaticCollector::new("a", 2)), Box::new(FailingCollector)],
        ConnectionPolicy::CloseAfterCycle,
    );

    let mut sink: Vec<MetricSample> = Vec::new();
    orch.run_cycle(&mut sink).await;

    assert_eq!(sink.len(), 2);
    assert!(sink.iter().all(|s| s.label_values()[0] == "a"));

    let snap = orch.metrics().snapshot();
    assert!(snap.up);
    assert_eq!(snap.attempted, 1);
    assert_eq!(snap.failed, 0, "collector failures must not count as failed cycles");
}

#[tokio::test]
async fn test_health_is_up_even_when_every_collector_fails() {
    let orch = orchestrator(
        healthy_connector(),
        vec![Box::new(FailingCollector), Box::new(FailingCollector)],
        ConnectionPolicy::CloseAfterCycle,
    );

    let mut sink: Vec<MetricSample> = Vec::new();
    orch.run_cycle(&mut sink).await;

    assert!(sink.is_empty());
    assert!(orch.metrics().is_up());
}

#[tokio::test]
async fn test_row_scan_error_keeps_earlier_rows_and_next_collector_runs() {
    let mapped = Arc::new(Mutex::new(Vec::new()));
    let after = StaticCollector::new("after", 1);
    let after_calls = Arc::clone(&after.calls);

    let orch = orchestrator(
        healthy_connector(),
        vec![
            Box::new(BrokenRowCollector { mapped: Arc::clone(&mapped) }),
            Box::new(after),
        ],
        ConnectionPolicy::CloseAfterCycle,
    );

    let mut sink: Vec<MetricSample> = Vec::new();
    orch.run_cycle(&mut sink).await;

    let broken: Vec<_> = sink
        .iter()
        .filter(|s| s.label_values()[0] == "broken_row")
        .map(|s| s.label_values()[1].clone())
        .collect();
    assert_eq!(broken, vec!["r1", "r2"]);
    assert_eq!(*mapped.lock().unwrap(), vec![1, 2, 3], "r4 and later must never be touched");
    assert_eq!(after_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_collectors_run_in_registration_order() {
    let orch = orchestrator(
        healthy_connector(),
        vec![
            Box::new(StaticCollector::new("first", 1)),
            Box::new(StaticCollector::new("second", 1)),
            Box::new(StaticCollector::new("third", 1)),
        ],
        ConnectionPolicy::CloseAfterCycle,
    );

    let mut sink: Vec<MetricSample> = Vec::new();
    orch.run_cycle(&mut sink).await;

    let order: Vec<_> = sink.iter().map(|s| s.label_values()[0].as_str()).collect();
    assert_eq!(order, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_failed_liveness_reconnects_exactly_once() {
    let mut connector = MockConn::new();
    let mut opens = 0;
    connector.expect_open().times(2).returning(move || {
        opens += 1;
        if opens == 1 {
            // Verified on open, then fails the next cycle's liveness probe.
            Ok(FakeSession::scripted(
                vec![Ok(GP6.to_string()), Err("server closed the connection".to_string())],
                Arc::new(AtomicBool::new(false)),
            ))
        } else {
            Err(DatabaseError::other("connection refused"))
        }
    });

    let orch = orchestrator(connector, Vec::new(), ConnectionPolicy::KeepWarm);

    let mut sink: Vec<MetricSample> = Vec::new();
    orch.run_cycle(&mut sink).await;
    assert!(orch.metrics().is_up());

    orch.run_cycle(&mut sink).await;
    let snap = orch.metrics().snapshot();
    assert_eq!(snap.attempted, 2);
    assert_eq!(snap.failed, 1);
    assert!(!snap.up);
}

#[tokio::test]
async fn test_keep_warm_reuses_verified_session() {
    let mut connector = MockConn::new();
    connector
        .expect_open()
        .times(1)
        .returning(|| Ok(FakeSession::healthy()));

    let orch = orchestrator(connector, vec![Box::new(StaticCollector::new("a", 1))], ConnectionPolicy::KeepWarm);

    let mut sink: Vec<MetricSample> = Vec::new();
    for _ in 0..3 {
        orch.run_cycle(&mut sink).await;
    }

    assert_eq!(sink.len(), 3);
    assert_eq!(orch.metrics().snapshot().attempted, 3);
}

#[tokio::test]
async fn test_close_after_cycle_reconnects_every_cycle() {
    let closed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&closed);

    let mut connector = MockConn::new();
    connector
        .expect_open()
        .times(2)
        .returning(move || Ok(FakeSession::scripted(Vec::new(), Arc::clone(&flag))));

    let orch = orchestrator(connector, Vec::new(), ConnectionPolicy::CloseAfterCycle);

    let mut sink: Vec<MetricSample> = Vec::new();
    orch.run_cycle(&mut sink).await;
    assert!(closed.load(Ordering::SeqCst), "session must be closed after the cycle");

    orch.run_cycle(&mut sink).await;
    assert_eq!(orch.metrics().snapshot().failed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cycles_never_overlap() {
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let orch = Arc::new(orchestrator(
        healthy_connector(),
        vec![Box::new(InFlightCollector {
            current: Arc::clone(&current),
            peak: Arc::clone(&peak),
        })],
        ConnectionPolicy::CloseAfterCycle,
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move {
                let mut sink: Vec<MetricSample> = Vec::new();
                orch.run_cycle(&mut sink).await;
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(orch.metrics().snapshot().attempted, 8);
}
