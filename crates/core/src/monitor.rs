//! Monitor loop: scan, evaluate, dispatch, wait.
//!
//! One cycle per tick, never overlapping. Cancellation is checked between
//! accounts; a step already in flight is allowed to finish.

use crate::evaluator::{evaluate, HealthPolicy};
use crate::executor::{ExecutionError, LiquidationExecutor};
use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use liqbot_api::{AccountSource, SubgraphError};
use liqbot_chain::{ChainClient, ChainError, ComptrollerField};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Scanning,
    Evaluating,
    Dispatching,
    Stopped,
}

/// Counters for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub scanned: usize,
    pub evaluation_failures: usize,
    pub eligible: usize,
    pub liquidated: usize,
    pub execution_failures: usize,
    pub scan_failed: bool,
    pub cancelled: bool,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            scanned: 0,
            evaluation_failures: 0,
            eligible: 0,
            liquidated: 0,
            execution_failures: 0,
            scan_failed: false,
            cancelled: false,
        }
    }

    fn log(&self) {
        info!(
            cycle = %self.started_at,
            scanned = self.scanned,
            evaluation_failures = self.evaluation_failures,
            eligible = self.eligible,
            liquidated = self.liquidated,
            execution_failures = self.execution_failures,
            scan_failed = self.scan_failed,
            cancelled = self.cancelled,
            "Cycle complete"
        );
    }
}

pub struct Monitor {
    source: Arc<dyn AccountSource>,
    executor: Arc<dyn LiquidationExecutor>,
    policy: HealthPolicy,
    interval: Duration,
    state: watch::Sender<MonitorState>,
}

impl Monitor {
    pub fn new(
        source: Arc<dyn AccountSource>,
        executor: Arc<dyn LiquidationExecutor>,
        policy: HealthPolicy,
        interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(MonitorState::Idle);
        Self {
            source,
            executor,
            policy,
            interval,
            state,
        }
    }

    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.state.subscribe()
    }

    fn transition(&self, next: MonitorState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = ?prev, to = ?next, "Monitor state");
        }
    }

    fn stop(&self, report: &mut CycleReport) {
        report.cancelled = true;
        self.transition(MonitorState::Stopped);
        report.log();
    }

    /// Run one scan/evaluate/dispatch cycle.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let mut report = CycleReport::new(Utc::now());
        if cancel.is_cancelled() {
            self.stop(&mut report);
            return report;
        }

        self.transition(MonitorState::Scanning);
        let accounts = match self.source.fetch_accounts(cancel).await {
            Ok(accounts) => accounts,
            Err(SubgraphError::Cancelled) => {
                self.stop(&mut report);
                return report;
            }
            Err(e) => {
                warn!(cycle = %report.started_at, error = %e, "Account scan failed, skipping cycle");
                report.scan_failed = true;
                self.transition(MonitorState::Idle);
                report.log();
                return report;
            }
        };
        report.scanned = accounts.len();

        self.transition(MonitorState::Evaluating);
        let mut eligible = Vec::new();
        for account in &accounts {
            if cancel.is_cancelled() {
                self.stop(&mut report);
                return report;
            }
            match evaluate(account, &self.policy) {
                Ok(decision) if decision.eligible => {
                    debug!(account = %decision.account_id, "Account eligible");
                    eligible.push(decision.account_id);
                }
                Ok(_) => {}
                Err(e) => {
                    report.evaluation_failures += 1;
                    warn!(cycle = %report.started_at, account = %account.id, error = %e, "Skipping account");
                }
            }
        }
        report.eligible = eligible.len();

        self.transition(MonitorState::Dispatching);
        for account_id in &eligible {
            if cancel.is_cancelled() {
                self.stop(&mut report);
                return report;
            }
            match self.executor.liquidate(account_id, cancel).await {
                Ok(_) => report.liquidated += 1,
                Err(ExecutionError::Cancelled) => {
                    self.stop(&mut report);
                    return report;
                }
                Err(e) => {
                    report.execution_failures += 1;
                    warn!(cycle = %report.started_at, account = %account_id, error = %e, "Liquidation failed");
                }
            }
        }

        self.transition(MonitorState::Idle);
        report.log();
        report
    }

    /// Run cycles on a fixed cadence until cancelled. The first cycle starts
    /// one interval after the call.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Monitor started");

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            self.transition(MonitorState::Idle);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.run_cycle(&cancel).await.cancelled {
                break;
            }
        }

        self.transition(MonitorState::Stopped);
        info!("Monitor stopped");
    }
}

/// Startup check: the node is reachable and the comptroller answers `admin()`.
pub async fn verify_connectivity(
    chain: &dyn ChainClient,
    comptroller: Address,
    cancel: &CancellationToken,
) -> Result<Address, ChainError> {
    let admin = chain
        .read_field(comptroller, ComptrollerField::Admin, cancel)
        .await?;
    info!(comptroller = %comptroller, admin = %admin, "Connected to comptroller");
    Ok(admin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::tests::FakeChain;
    use async_trait::async_trait;
    use liqbot_api::Account;
    use liqbot_chain::TxReceipt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeSource {
        /// `None` simulates an HTTP 500 from the indexer.
        accounts: Option<Vec<Account>>,
        /// Cancel this token while answering the scan.
        cancel_on_fetch: Option<CancellationToken>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(accounts: Option<Vec<Account>>) -> Arc<Self> {
            Arc::new(Self {
                accounts,
                cancel_on_fetch: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AccountSource for FakeSource {
        async fn fetch_accounts(
            &self,
            _cancel: &CancellationToken,
        ) -> Result<Vec<Account>, SubgraphError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(token) = &self.cancel_on_fetch {
                token.cancel();
            }
            self.accounts.clone().ok_or(SubgraphError::Status(500))
        }
    }

    #[derive(Default)]
    struct FakeExecutor {
        failing: Vec<String>,
        /// Cancel this token from inside the first call.
        cancel_on_call: Option<CancellationToken>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeExecutor {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LiquidationExecutor for FakeExecutor {
        async fn liquidate(
            &self,
            borrower_id: &str,
            _cancel: &CancellationToken,
        ) -> Result<TxReceipt, ExecutionError> {
            self.calls.lock().unwrap().push(borrower_id.to_string());
            if let Some(token) = &self.cancel_on_call {
                token.cancel();
            }
            if self.failing.iter().any(|id| id == borrower_id) {
                return Err(ExecutionError::GasPricing("simulated".to_string()));
            }
            Ok(TxReceipt {
                tx_hash: Default::default(),
                block_number: Some(1),
                gas_used: 21_000,
            })
        }
    }

    /// Collects formatted log lines for assertions.
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
            tracing_subscriber::fmt()
                .with_writer(self.clone())
                .with_ansi(false)
                .with_max_level(tracing::Level::DEBUG)
                .finish()
        }

        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
        type Writer = LogCapture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn account(id: &str, borrow: &str, health: &str) -> Account {
        Account {
            id: id.to_string(),
            total_borrow_value_in_eth: Some(borrow.to_string()),
            health: Some(health.to_string()),
        }
    }

    fn monitor(source: Arc<FakeSource>, executor: Arc<FakeExecutor>) -> Monitor {
        Monitor::new(
            source,
            executor,
            HealthPolicy::reference(),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_cycle_dispatches_only_eligible() {
        let source = FakeSource::new(Some(vec![
            account("0xabc", "2.5", "0.8"),
            account("0xdef", "0", "1.2"),
        ]));
        let executor = Arc::new(FakeExecutor::default());
        let monitor = monitor(source.clone(), executor.clone());

        let report = monitor.run_cycle(&CancellationToken::new()).await;

        assert_eq!(executor.calls(), vec!["0xabc".to_string()]);
        assert_eq!(report.scanned, 2);
        assert_eq!(report.eligible, 1);
        assert_eq!(report.liquidated, 1);
        assert!(!report.cancelled);
        assert_eq!(monitor.state(), MonitorState::Idle);
    }

    #[tokio::test]
    async fn test_scan_failure_skips_cycle() {
        let source = FakeSource::new(None);
        let executor = Arc::new(FakeExecutor::default());
        let monitor = monitor(source.clone(), executor.clone());

        let report = monitor.run_cycle(&CancellationToken::new()).await;

        assert!(report.scan_failed);
        assert_eq!(report.scanned, 0);
        assert_eq!(report.evaluation_failures, 0);
        assert!(executor.calls().is_empty());
        assert_eq!(monitor.state(), MonitorState::Idle);
    }

    #[tokio::test]
    async fn test_execution_failure_does_not_stop_dispatch() {
        let source = FakeSource::new(Some(vec![
            account("0x1", "1.0", "0.5"),
            account("0x2", "1.0", "0.5"),
            account("0x3", "1.0", "0.5"),
        ]));
        let executor = Arc::new(FakeExecutor {
            failing: vec!["0x1".to_string()],
            ..Default::default()
        });
        let monitor = monitor(source, executor.clone());

        let report = monitor.run_cycle(&CancellationToken::new()).await;

        assert_eq!(executor.calls(), vec!["0x1", "0x2", "0x3"]);
        assert_eq!(report.execution_failures, 1);
        assert_eq!(report.liquidated, 2);
    }

    #[tokio::test]
    async fn test_malformed_account_skipped() {
        let mut broken = account("0xbad", "1.0", "0.5");
        broken.health = None;
        let source = FakeSource::new(Some(vec![
            broken,
            account("0xbeef", "oops", "0.5"),
            account("0xabc", "2.5", "0.8"),
        ]));
        let executor = Arc::new(FakeExecutor::default());
        let monitor = monitor(source, executor.clone());

        let report = monitor.run_cycle(&CancellationToken::new()).await;

        assert_eq!(report.evaluation_failures, 2);
        assert_eq!(executor.calls(), vec!["0xabc"]);
    }

    #[tokio::test]
    async fn test_cancel_during_dispatch_stops_before_next_account() {
        let cancel = CancellationToken::new();
        let source = FakeSource::new(Some(vec![
            account("0x1", "1.0", "0.5"),
            account("0x2", "1.0", "0.5"),
        ]));
        let executor = Arc::new(FakeExecutor {
            cancel_on_call: Some(cancel.clone()),
            ..Default::default()
        });
        let monitor = monitor(source, executor.clone());

        let report = monitor.run_cycle(&cancel).await;

        // The in-flight liquidation completes; the next one never starts.
        assert_eq!(executor.calls(), vec!["0x1"]);
        assert_eq!(report.liquidated, 1);
        assert!(report.cancelled);
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[tokio::test]
    async fn test_cancel_before_evaluation_skips_accounts() {
        let cancel = CancellationToken::new();
        let mut broken = account("0xbad", "1.0", "0.5");
        broken.health = None;
        let source = Arc::new(FakeSource {
            accounts: Some(vec![broken, account("0xabc", "2.5", "0.8")]),
            cancel_on_fetch: Some(cancel.clone()),
            calls: AtomicUsize::new(0),
        });
        let executor = Arc::new(FakeExecutor::default());
        let monitor = monitor(source.clone(), executor.clone());

        let report = monitor.run_cycle(&cancel).await;

        assert_eq!(source.calls(), 1);
        assert_eq!(report.scanned, 2);
        assert_eq!(report.evaluation_failures, 0);
        assert_eq!(report.eligible, 0);
        assert!(report.cancelled);
        assert!(executor.calls().is_empty());
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[tokio::test]
    async fn test_cancelled_cycle_still_reports_summary() {
        let logs = LogCapture::default();
        let _guard = tracing::subscriber::set_default(logs.subscriber());

        let cancel = CancellationToken::new();
        let source = FakeSource::new(Some(vec![
            account("0x1", "1.0", "0.5"),
            account("0x2", "1.0", "0.5"),
        ]));
        let executor = Arc::new(FakeExecutor {
            cancel_on_call: Some(cancel.clone()),
            ..Default::default()
        });
        let monitor = monitor(source, executor);

        let report = monitor.run_cycle(&cancel).await;
        assert!(report.cancelled);

        let output = logs.contents();
        assert!(output.contains("Cycle complete"), "{output}");
        assert!(output.contains("liquidated=1"), "{output}");
        assert!(output.contains("cancelled=true"), "{output}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_idle_makes_no_calls() {
        let source = FakeSource::new(Some(vec![account("0xabc", "2.5", "0.8")]));
        let executor = Arc::new(FakeExecutor::default());
        let monitor = Arc::new(monitor(source.clone(), executor.clone()));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let monitor = monitor.clone();
            let cancel = cancel.clone();
            async move { monitor.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_secs(30)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(source.calls(), 0);
        assert!(executor.calls().is_empty());
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cadence() {
        let source = FakeSource::new(Some(vec![account("0xdef", "0", "1.2")]));
        let executor = Arc::new(FakeExecutor::default());
        let monitor = Arc::new(monitor(source.clone(), executor.clone()));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let monitor = monitor.clone();
            let cancel = cancel.clone();
            async move { monitor.run(cancel).await }
        });

        // First cycle runs one interval after start, not immediately.
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(source.calls(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(source.calls(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 2);

        cancel.cancel();
        handle.await.unwrap();
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_verify_connectivity_reads_admin() {
        let chain = FakeChain::new(1);
        let comptroller = Address::repeat_byte(0x3d);
        let admin = verify_connectivity(&chain, comptroller, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(admin, alloy::primitives::address!("00000000000000000000000000000000000000ad"));
    }
}
