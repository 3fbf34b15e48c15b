//! Round execution: fan targets out to concurrent probes, reduce the
//! results through the display filters, and drive the formatter/sink
//! pipeline in header/record/footer order.
//!
//! One executor runs one round at a time; `execute` takes `&mut self`,
//! so overlapping rounds on the same instance are unrepresentable.
//! Sequential reuse (dashboard ticks, server cache refreshes) keeps the
//! state-change cache alive across rounds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::output::{CheckResult, ResultFormatter};
use crate::probe::Prober;
use crate::sink::Sink;
use crate::target::Target;

/// Identifies a logical monitored target across rounds. Two targets
/// with the same URL but different labels are tracked independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StateKey {
    url: String,
    label: String,
}

/// Snapshot of the most recently observed outcome for a state key.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StateValue {
    success: bool,
    expected: String,
    actual: Option<String>,
}

fn state_entry(result: &CheckResult) -> (StateKey, StateValue) {
    (
        StateKey {
            url: result.url.clone(),
            label: result.label.clone(),
        },
        StateValue {
            success: result.success,
            expected: result.expected.clone(),
            actual: result.actual.clone(),
        },
    )
}

pub struct Executor {
    workers: usize,
    aggregate: bool,
    only_failures: bool,
    only_state_changes: bool,
    autoclose: bool,
    prober: Prober,
    formatter: Box<dyn ResultFormatter>,
    sink: Box<dyn Sink>,
    /// Last observed outcome per (url, label). Grows with the number of
    /// distinct keys ever seen; target sets are operator-configured and
    /// small, so there is no eviction.
    latest_state: HashMap<StateKey, StateValue>,
}

impl Executor {
    pub fn new(
        formatter: Box<dyn ResultFormatter>,
        sink: Box<dyn Sink>,
        workers: usize,
    ) -> anyhow::Result<Executor> {
        Ok(Executor {
            workers: workers.max(1),
            aggregate: false,
            only_failures: false,
            only_state_changes: false,
            autoclose: true,
            prober: Prober::new()?,
            formatter,
            sink,
            latest_state: HashMap::new(),
        })
    }

    /// Collapse each round into a single aggregate record.
    pub fn aggregate(mut self, yes: bool) -> Executor {
        self.aggregate = yes;
        self
    }

    /// Drop successful results from the output (never from the exit
    /// code or the state cache).
    pub fn only_failures(mut self, yes: bool) -> Executor {
        self.only_failures = yes;
        self
    }

    /// Emit only results whose outcome differs from the last round.
    pub fn only_state_changes(mut self, yes: bool) -> Executor {
        self.only_state_changes = yes;
        self
    }

    /// Leave the sink open across rounds; used when the sink's lifetime
    /// spans the whole process rather than one round.
    pub fn no_autoclose(mut self) -> Executor {
        self.autoclose = false;
        self
    }

    /// Runs one round over the targets and returns the process exit
    /// status: 0 when every probe succeeded, 1 otherwise.
    ///
    /// The exit status is computed over every result received in the
    /// round, before display filtering; failures-only and changes-only
    /// affect what is printed, never the exit code. Sink delivery
    /// failures are logged and never affect the exit code either.
    pub async fn execute(&mut self, targets: &[Target]) -> anyhow::Result<i32> {
        let started = Utc::now();
        let total = targets.len();

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut probes = FuturesUnordered::new();

        for target in targets {
            let semaphore = Arc::clone(&semaphore);
            let prober = self.prober.clone();
            let target = target.clone();

            probes.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let probe = prober.probe(&target).await;
                let mut result = CheckResult::from_probe(&probe, &target.label, Utc::now());
                result.extra = target.extra.clone();
                result
            }));
        }

        let exit_status = if self.aggregate {
            self.reduce_aggregated(&mut probes).await
        } else {
            self.reduce_each(&mut probes).await
        };

        if self.autoclose {
            if let Err(err) = self.sink.close().await {
                warn!(%err, "output sink close failed");
            }
        }

        let elapsed = Utc::now() - started;
        info!(
            checks = total,
            exit_status,
            "round completed in {:.2}s",
            elapsed.num_milliseconds() as f64 / 1000.0
        );

        Ok(exit_status)
    }

    /// Re-runs rounds until one exits 0 or the deadline elapses,
    /// sleeping `interval` between rounds. The first round always runs;
    /// the last round's exit status is returned.
    pub async fn execute_until(
        &mut self,
        targets: &[Target],
        deadline: Duration,
        interval: Duration,
    ) -> anyhow::Result<i32> {
        let cutoff = Instant::now() + deadline;

        let mut exit_status = self.execute(targets).await?;
        while exit_status != 0 && Instant::now() + interval <= cutoff {
            debug!(exit_status, "round failed, retrying");
            tokio::time::sleep(interval).await;
            exit_status = self.execute(targets).await?;
        }
        Ok(exit_status)
    }

    async fn reduce_each(
        &mut self,
        probes: &mut FuturesUnordered<tokio::task::JoinHandle<CheckResult>>,
    ) -> i32 {
        let mut exit_status = 0;
        let mut emitted = 0usize;

        while let Some(joined) = probes.next().await {
            let result = match joined {
                Ok(result) => result,
                Err(err) => {
                    warn!(%err, "probe task failed");
                    exit_status = 1;
                    continue;
                }
            };

            if !result.success {
                exit_status = 1;
            }
            if !self.retain_for_output(&result) {
                continue;
            }

            let prefix = if emitted == 0 {
                self.formatter.header()
            } else {
                self.formatter.record_separator()
            };
            let record = self.formatter.record(&result);
            self.emit(&prefix).await;
            self.emit(&record).await;
            emitted += 1;
        }

        if emitted > 0 {
            let footer = self.formatter.footer();
            self.emit(&footer).await;
        }

        exit_status
    }

    async fn reduce_aggregated(
        &mut self,
        probes: &mut FuturesUnordered<tokio::task::JoinHandle<CheckResult>>,
    ) -> i32 {
        let mut exit_status = 0;
        let mut seen = 0usize;
        let mut retained = Vec::new();

        while let Some(joined) = probes.next().await {
            let result = match joined {
                Ok(result) => result,
                Err(err) => {
                    warn!(%err, "probe task failed");
                    exit_status = 1;
                    continue;
                }
            };

            seen += 1;
            if !result.success {
                exit_status = 1;
            }
            if self.retain_for_output(&result) {
                retained.push(result);
            }
        }

        // With failures-only set, an all-success round stays silent;
        // with changes-only set, a round where nothing changed does too.
        let suppress = (self.only_failures && exit_status == 0)
            || (self.only_state_changes && retained.is_empty() && seen > 0);

        if !suppress {
            let header = self.formatter.header();
            let record = self.formatter.aggregate_record(&retained);
            let footer = self.formatter.footer();
            self.emit(&header).await;
            self.emit(&record).await;
            self.emit(&footer).await;
        }

        exit_status
    }

    /// Applies the display filters in order (failures-only, then
    /// changes-only) and updates the state cache unconditionally, so a
    /// hidden success still arms change detection for a later failure.
    fn retain_for_output(&mut self, result: &CheckResult) -> bool {
        let mut retain = true;

        if self.only_failures && result.success {
            retain = false;
        }

        if retain && self.only_state_changes {
            retain = self.state_changed(result);
        }

        let (key, value) = state_entry(result);
        self.latest_state.insert(key, value);

        retain
    }

    fn state_changed(&self, result: &CheckResult) -> bool {
        let (key, value) = state_entry(result);

        match self.latest_state.get(&key) {
            // A key never seen before is always a change.
            None => {
                debug!(url = %key.url, label = %key.label, "first state capture");
                true
            }
            Some(previous) if *previous != value => {
                info!(
                    url = %key.url,
                    label = %key.label,
                    was = previous.success,
                    now = value.success,
                    "target state changed"
                );
                true
            }
            Some(_) => {
                debug!(url = %key.url, label = %key.label, "no state change");
                false
            }
        }
    }

    async fn emit(&mut self, rendered: &str) {
        if rendered.is_empty() {
            return;
        }
        if let Err(err) = self.sink.write(rendered.as_bytes()).await {
            warn!(%err, "output sink write failed");
        }
    }
}
