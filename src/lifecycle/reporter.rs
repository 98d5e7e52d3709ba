//! # Status Reporting Pipeline
//!
//! Entities push [`StatusReport`]s into one bounded queue; a single [`StatusReporter`]
//! task renders them and keeps running totals.
//!
//! ## Drain-before-stop
//!
//! The reporter has its own stop gate, closed by the orchestrator only after every entity
//! has acknowledged completion. When it closes, the reporter closes its receiver and keeps
//! reading until the queue is empty. The join handle therefore resolves only once every
//! report that made it into the queue has been rendered exactly once.
//!
//! ## Producers never block shutdown
//!
//! [`StatusSender::report`] races the send against the entity stop signal. A full queue
//! can delay a report, but it can never keep an entity from noticing that it should stop.

use crate::framework::{LoadTestError, StopSignal};
use crate::lifecycle::output::OutputSink;
use crate::model::{EntityStatus, StatusReport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

// =============================================================================
// 1. PRODUCER SIDE
// =============================================================================

/// Cloneable handle entities use to submit status reports.
#[derive(Clone, Debug)]
pub struct StatusSender {
    sender: mpsc::Sender<StatusReport>,
    accepted: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
}

impl StatusSender {
    /// Best-effort send. Gives up (and counts the report as dropped) if `stop` closes
    /// while waiting for queue space.
    pub async fn report(&self, report: StatusReport, stop: &StopSignal) -> bool {
        tokio::select! {
            biased;
            sent = self.sender.send(report) => self.record(sent.is_ok()),
            _ = stop.closed() => {
                debug!("Status report dropped: queue full at shutdown");
                self.record(false)
            }
        }
    }

    /// Waits for queue space. Used for the last reports of an entity, after it left its
    /// execution loop; the reporter is still draining at that point.
    pub async fn report_final(&self, report: StatusReport) -> bool {
        let sent = self.sender.send(report).await;
        self.record(sent.is_ok())
    }

    fn record(&self, sent: bool) -> bool {
        if sent {
            self.accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        sent
    }

    /// Reports that entered the queue.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Reports given up on.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

// =============================================================================
// 2. AGGREGATES
// =============================================================================

/// Running totals over every rendered report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTotals {
    pub reports: usize,
    pub launched: usize,
    pub active: usize,
    pub stopped: usize,
    pub errors: usize,
    pub failed_launches: usize,
    pub failed_actions: usize,
    pub actions_sent: usize,
    pub actions_received: usize,
}

impl StatusTotals {
    pub fn record(&mut self, report: &StatusReport) {
        self.reports += 1;
        match report.status {
            EntityStatus::Launching => self.launched += 1,
            EntityStatus::Active => self.active += 1,
            EntityStatus::Stopped => self.stopped += 1,
            EntityStatus::Error => self.errors += 1,
            EntityStatus::FailedLaunch => self.failed_launches += 1,
            EntityStatus::FailedActive => self.failed_actions += 1,
            EntityStatus::ActionSent => self.actions_sent += 1,
            EntityStatus::ActionReceived => self.actions_received += 1,
        }
    }

    /// Entity variants launched and not yet stopped.
    pub fn running(&self) -> usize {
        self.launched.saturating_sub(self.stopped)
    }

    pub fn summary(&self) -> String {
        format!(
            "reports={} launched={} stopped={} errors={} failed_launches={} failed_actions={} sent={} received={}",
            self.reports,
            self.launched,
            self.stopped,
            self.errors,
            self.failed_launches,
            self.failed_actions,
            self.actions_sent,
            self.actions_received,
        )
    }
}

// =============================================================================
// 3. THE REPORTER TASK
// =============================================================================

/// Consumer half of the status pipeline.
pub struct StatusReporter {
    receiver: mpsc::Receiver<StatusReport>,
    sink: Arc<dyn OutputSink>,
    stop: StopSignal,
    totals: StatusTotals,
}

/// Lifecycle handle of a spawned [`StatusReporter`].
pub struct ReporterHandle {
    stop: StopSignal,
    handle: JoinHandle<StatusTotals>,
}

impl StatusReporter {
    /// Creates the reporter and the sender entities share.
    ///
    /// `capacity` bounds the queue; producers wait (or give up at shutdown) when full.
    pub fn new(capacity: usize, sink: Arc<dyn OutputSink>) -> (Self, StatusSender) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let reporter = Self {
            receiver,
            sink,
            stop: StopSignal::new(),
            totals: StatusTotals::default(),
        };
        let sender = StatusSender {
            sender,
            accepted: Arc::new(AtomicUsize::new(0)),
            dropped: Arc::new(AtomicUsize::new(0)),
        };
        (reporter, sender)
    }

    pub fn spawn(self) -> ReporterHandle {
        let stop = self.stop.clone();
        let handle = tokio::spawn(self.run());
        ReporterHandle { stop, handle }
    }

    async fn run(mut self) -> StatusTotals {
        info!("Status reporter started");

        loop {
            tokio::select! {
                biased;
                report = self.receiver.recv() => match report {
                    Some(report) => self.render(report),
                    // Every sender is gone; nothing more can arrive, but the stop gate
                    // still decides when we are done.
                    None => {
                        self.stop.closed().await;
                        break;
                    }
                },
                _ = self.stop.closed() => break,
            }
        }

        // Drain: after `close` no new sends are accepted and `recv` yields whatever is
        // still buffered, then `None`.
        self.receiver.close();
        while let Some(report) = self.receiver.recv().await {
            self.render(report);
        }

        self.sink
            .println(&format!("Status reporter stopped: {}", self.totals.summary()));
        info!(reports = self.totals.reports, "Status reporter drained");
        self.totals
    }

    fn render(&mut self, report: StatusReport) {
        self.totals.record(&report);
        debug!(
            entity_id = report.entity_id,
            status = %report.status,
            "Status report"
        );
        let kind = report.kind.map(|k| k.as_str()).unwrap_or("entity");
        self.sink.println(&format!(
            "#{} {} {} [{}]: {} | running={} sent={} received={} errors={}",
            report.entity_id,
            kind,
            report.username,
            report.status,
            report.details,
            self.totals.running(),
            self.totals.actions_sent,
            self.totals.actions_received,
            self.totals.errors + self.totals.failed_actions + self.totals.failed_launches,
        ));
    }
}

impl ReporterHandle {
    /// Closes the reporter's stop gate and waits until every queued report is rendered.
    pub async fn finish(self) -> Result<StatusTotals, LoadTestError> {
        self.stop.close();
        self.handle
            .await
            .map_err(|e| LoadTestError::ReporterFailed(e.to_string()))
    }
}
