//! The periodic collector exporter.

use crate::batch::{BatchBuilder, BatchPolicy};
use crate::error::ExportError;
use crate::fields::append_metric_fields;
use crate::record::ExportRecord;
use crate::transport::{Dialer, TcpDialer, Transport};
use optron_config::{OptronConfig, ValidatedOptronConfig};
use optron_metrics::Registry;
use optron_shared::{CancellationToken, ErrorEnvelope};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// `hostName` when neither the config nor the connection supplies one.
const UNKNOWN_HOST: &str = "unknown";

/// Outcome of one export cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Records built from the registry.
    pub records: usize,
    /// Payloads produced by the batch builder.
    pub payloads: usize,
    /// Payloads written successfully.
    pub sent: usize,
    /// Payloads dropped after an encode or write failure.
    pub dropped: usize,
    /// Whether a connection is open at the end of the cycle.
    pub connected: bool,
}

/// Pushes a registry to a collector on a fixed interval.
///
/// The connection is dialled lazily before a cycle and dropped on the first
/// failed write, after which one reconnect is attempted. A cycle that cannot
/// connect is skipped without reading the registry, so instant counters keep
/// their values until a cycle can deliver them.
pub struct Optron {
    id: Box<str>,
    game: Option<Box<str>>,
    address: Box<str>,
    host_name: Option<Box<str>>,
    interval: Duration,
    dial_timeout: Duration,
    write_timeout: Duration,
    registry: Arc<dyn Registry>,
    dialer: Arc<dyn Dialer>,
    connection: Option<Box<dyn Transport>>,
    builder: BatchBuilder,
}

impl Optron {
    /// Exporter for `registry` identified as `id`, dialling over TCP.
    pub fn new(
        id: impl Into<Box<str>>,
        config: &ValidatedOptronConfig,
        registry: Arc<dyn Registry>,
    ) -> Self {
        Self {
            id: id.into(),
            game: None,
            address: config.address.clone(),
            host_name: config.host_name.clone(),
            interval: config.interval(),
            dial_timeout: config.dial_timeout(),
            write_timeout: config.write_timeout(),
            registry,
            dialer: Arc::new(TcpDialer),
            connection: None,
            builder: BatchBuilder::new(BatchPolicy::from_config(config)),
        }
    }

    /// Validate `config` and build an exporter; invalid configs are fatal here.
    pub fn from_config(
        id: impl Into<Box<str>>,
        config: OptronConfig,
        registry: Arc<dyn Registry>,
    ) -> Result<Self, ErrorEnvelope> {
        let validated = config.validate_and_normalize()?;
        Ok(Self::new(id, &validated, registry))
    }

    /// Tag every record with a `game` field.
    #[must_use]
    pub fn with_game(mut self, game: impl Into<Box<str>>) -> Self {
        self.game = Some(game.into());
        self
    }

    /// Replace the TCP dialer.
    #[must_use]
    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = dialer;
        self
    }

    /// Exporter identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tick period.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Batch grouping in use.
    #[must_use]
    pub const fn policy(&self) -> BatchPolicy {
        self.builder.policy()
    }

    /// Whether a collector connection is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Export on every tick until `cancel` fires.
    ///
    /// The first cycle runs one interval after start. Overrunning cycles are
    /// followed immediately by the ticks they missed; cycles never overlap.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        ticker.tick().await;

        tracing::info!(
            id = %self.id,
            address = %self.address,
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "exporter.started"
        );
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {},
            }
            let report = self.export_cycle().await;
            tracing::debug!(
                records = report.records,
                payloads = report.payloads,
                sent = report.sent,
                dropped = report.dropped,
                connected = report.connected,
                "exporter.cycle"
            );
        }
        self.connection = None;
        tracing::info!(id = %self.id, "exporter.stopped");
    }

    /// Run on the current tokio runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Run one export cycle now.
    pub async fn export_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        if self.connection.is_none() && !self.connect().await {
            return report;
        }

        let base = self.base_record();
        let builder = &mut self.builder;
        self.registry.each(&mut |name, metric| {
            let mut record = base.clone();
            append_metric_fields(&mut record, name, metric);
            builder.append(record);
            report.records += 1;
        });

        let payloads = self.builder.flush();
        report.payloads = payloads.len();
        for payload in payloads {
            let bytes = match payload.encode() {
                Ok(bytes) => bytes,
                Err(error) => {
                    tracing::error!(error = %error, records = payload.len(), "exporter.encode_failed");
                    report.dropped += 1;
                    continue;
                },
            };
            let written = match self.connection.as_mut() {
                Some(connection) => connection.write_payload(&bytes, self.write_timeout).await,
                None => Err(ExportError::NotConnected),
            };
            match written {
                Ok(()) => report.sent += 1,
                Err(error) => {
                    let error = ErrorEnvelope::from(error);
                    tracing::warn!(
                        address = %self.address,
                        code = %error.code,
                        class = %error.class,
                        error = %error.message,
                        records = payload.len(),
                        "exporter.send_failed"
                    );
                    report.dropped += 1;
                    if self.connection.take().is_some() {
                        self.connect().await;
                    }
                },
            }
        }

        report.connected = self.is_connected();
        report
    }

    async fn connect(&mut self) -> bool {
        tracing::info!(address = %self.address, "exporter.connect");
        let dialed = self.dialer.dial(&self.address, self.dial_timeout).await;
        match dialed {
            Ok(connection) => {
                self.connection = Some(connection);
                true
            },
            Err(error) => {
                let error = ErrorEnvelope::from(error);
                tracing::warn!(
                    address = %self.address,
                    code = %error.code,
                    class = %error.class,
                    error = %error.message,
                    "exporter.connect_failed"
                );
                self.connection = None;
                false
            },
        }
    }

    fn base_record(&self) -> ExportRecord {
        let host_name = self.host_name.as_deref().map_or_else(
            || {
                self.connection
                    .as_ref()
                    .and_then(|connection| connection.local_ip())
                    .map_or_else(|| UNKNOWN_HOST.to_owned(), |ip| ip.to_string())
            },
            str::to_owned,
        );

        let mut record = ExportRecord::new();
        record.insert("hostName", host_name);
        record.insert("id", &*self.id);
        if let Some(game) = &self.game {
            record.insert("game", &**game);
        }
        record
    }
}

impl std::fmt::Debug for Optron {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Optron")
            .field("id", &self.id)
            .field("game", &self.game)
            .field("address", &self.address)
            .field("interval", &self.interval)
            .field("policy", &self.builder.policy())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryCollector;
    use optron_metrics::{RegistryExt, StandardRegistry, TagBoard, tagged_metric_name};
    use serde_json::{Value, json};

    fn config(bulk: Option<u32>) -> ValidatedOptronConfig {
        OptronConfig {
            address: Box::from("collector:7000"),
            has_bulk_support: bulk.is_some(),
            batch_size: bulk.unwrap_or(1),
            ..OptronConfig::default()
        }
        .validate_and_normalize()
        .expect("valid config")
    }

    fn exporter(
        bulk: Option<u32>,
        registry: &Arc<StandardRegistry>,
        collector: &MemoryCollector,
    ) -> Optron {
        Optron::new("api", &config(bulk), registry.clone())
            .with_dialer(Arc::new(collector.clone()))
    }

    #[tokio::test]
    async fn base_fields_and_tags_are_merged() {
        let registry = Arc::new(StandardRegistry::new());
        let name = tagged_metric_name("calls", &TagBoard::new(["svc", "db"]));
        registry.counter(&name).expect("counter").inc(3);
        let collector = MemoryCollector::new();
        let mut optron = exporter(None, &registry, &collector).with_game("poker");

        let report = optron.export_cycle().await;
        assert_eq!(report.records, 1);
        assert_eq!(report.sent, 1);
        assert_eq!(
            collector.payloads(),
            vec![json!({
                "hostName": "127.0.0.1",
                "id": "api",
                "game": "poker",
                "ns": "svc",
                "grp": "db",
                "calls": 3,
            })]
        );
    }

    #[tokio::test]
    async fn configured_host_name_wins() {
        let registry = Arc::new(StandardRegistry::new());
        registry.update("requests", 1);
        let collector = MemoryCollector::new();
        let mut validated = config(None).into_inner();
        validated.host_name = Some(Box::from("web-1"));
        let mut optron = Optron::from_config("api", validated, registry)
            .expect("valid")
            .with_dialer(Arc::new(collector.clone()));

        optron.export_cycle().await;
        let payloads = collector.payloads();
        assert_eq!(
            payloads.first().and_then(|payload| payload.get("hostName")),
            Some(&json!("web-1"))
        );
        assert_eq!(payloads.first().and_then(|payload| payload.get("game")), None);
    }

    #[tokio::test]
    async fn empty_registry_sends_nothing() {
        let registry = Arc::new(StandardRegistry::new());
        let collector = MemoryCollector::new();
        let mut optron = exporter(None, &registry, &collector);

        let report = optron.export_cycle().await;
        assert_eq!(report.payloads, 0);
        assert!(report.connected);
        assert!(collector.lines().is_empty());
    }

    #[tokio::test]
    async fn unreachable_collector_skips_cycle_and_keeps_instant_counts() {
        let registry = Arc::new(StandardRegistry::new());
        let logins = registry.instant_counter("logins").expect("instant");
        logins.inc(4);
        let collector = MemoryCollector::new();
        collector.refuse_dials(true);
        let mut optron = exporter(None, &registry, &collector);

        let report = optron.export_cycle().await;
        assert_eq!(report, CycleReport::default());
        assert_eq!(logins.peek(), 4);

        collector.refuse_dials(false);
        let report = optron.export_cycle().await;
        assert_eq!(report.sent, 1);
        assert_eq!(collector.dials(), 2);
        assert_eq!(
            collector.payloads().first().and_then(|payload| payload.get("logins")),
            Some(&json!(4))
        );
        assert_eq!(logins.peek(), 0);
    }

    #[tokio::test]
    async fn write_failure_drops_payload_and_reconnects_once() {
        let registry = Arc::new(StandardRegistry::new());
        for name in ["a", "b", "c"] {
            registry.update(name, 1);
        }
        let collector = MemoryCollector::new();
        let mut optron = exporter(Some(2), &registry, &collector);

        optron.export_cycle().await;
        assert_eq!(collector.dials(), 1);
        collector.clear();

        collector.fail_next_writes(1);
        let report = optron.export_cycle().await;
        assert_eq!(report.payloads, 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.sent, 1);
        assert!(report.connected);
        assert_eq!(collector.dials(), 2);

        let sent = collector.payloads();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent.first().and_then(Value::as_array).map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn failed_reconnect_drops_the_rest_of_the_cycle() {
        let registry = Arc::new(StandardRegistry::new());
        for name in ["a", "b", "c"] {
            registry.update(name, 1);
        }
        let collector = MemoryCollector::new();
        let mut optron = exporter(Some(1), &registry, &collector);

        optron.export_cycle().await;
        assert_eq!(collector.dials(), 1);
        collector.clear();

        collector.fail_next_writes(1);
        collector.refuse_dials(true);
        let report = optron.export_cycle().await;
        assert_eq!(report.payloads, 3);
        assert_eq!(report.sent, 0);
        assert_eq!(report.dropped, 3);
        assert!(!report.connected);
        assert_eq!(collector.dials(), 2, "one reconnect per failed write");
        assert!(collector.lines().is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let registry = Arc::new(StandardRegistry::new());
        let collector = MemoryCollector::new();
        let optron = exporter(None, &registry, &collector);
        let cancel = CancellationToken::new();

        let handle = optron.spawn(cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("stops")
            .expect("join");
    }
}
