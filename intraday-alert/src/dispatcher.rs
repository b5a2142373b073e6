use crate::{
    alert::{Alert, AlertId, AlertRequest, AlertSeverity, AlertState},
    config::AlertConfig,
    error::AlertDeliveryError,
    sink::AlertSink,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Result of a successful [`AlertDispatcher::submit`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum SubmitOutcome {
    /// New alert queued for delivery.
    Queued(AlertId),
    /// Request folded into the open suppression window of an existing alert.
    Folded { alert: AlertId, folded: u32 },
    /// Alert already tracked or delivered by this dispatcher; nothing changed.
    Duplicate(AlertId),
}

/// What to do with pending alerts at session close.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Force-dispatch pending alerts. Alerts the sink rejects are discarded.
    #[default]
    Dispatch,
    /// Discard pending alerts without delivery.
    Discard,
}

/// Outcome of a [`AlertDispatcher::dispatch`] or [`AlertDispatcher::flush`].
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct DispatchReport {
    /// Alerts delivered, in priority order.
    pub dispatched: Vec<Alert>,
    pub failures: Vec<AlertDeliveryError>,
    pub discarded: Vec<AlertId>,
}

/// Pending queue entry. Ascending order is ascending priority: severity, then recency.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
struct Priority {
    severity: AlertSeverity,
    created_at: DateTime<Utc>,
    id: AlertId,
}

impl From<&Alert> for Priority {
    fn from(alert: &Alert) -> Self {
        Self {
            severity: alert.severity,
            created_at: alert.created_at,
            id: alert.id,
        }
    }
}

/// Deduplicating, bounded-priority alert dispatcher.
///
/// Holds the latest [`Alert`] of every `(instrument, source)` key. A request arriving before
/// that alert's `suppressed_until` is folded into it, so suppression windows of one key never
/// overlap. New alerts wait in a bounded priority queue until [`dispatch`](Self::dispatch).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AlertDispatcher {
    suppression_window_secs: u64,
    queue_capacity: usize,
    next_id: u64,
    windows: Vec<Alert>,
    pending: BTreeSet<Priority>,
}

impl AlertDispatcher {
    /// Construct a new dispatcher. `config` is expected to have been validated.
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            suppression_window_secs: config.suppression_window_secs,
            queue_capacity: config.queue_capacity.max(1),
            next_id: 0,
            windows: Vec::new(),
            pending: BTreeSet::new(),
        }
    }

    fn suppression_window(&self) -> TimeDelta {
        i64::try_from(self.suppression_window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    /// Submit a qualifying request.
    ///
    /// Returns [`AlertDeliveryError::QueueFull`] when queueing the new alert overflowed the
    /// pending queue and the lowest-priority pending alert (possibly the new one) was dropped.
    pub fn submit(&mut self, request: AlertRequest) -> Result<SubmitOutcome, AlertDeliveryError> {
        let open_window = self.windows.iter_mut().rev().find(|alert| {
            alert.instrument == request.instrument && alert.source == request.source
        });

        if let Some(alert) = open_window {
            if request.time < alert.suppressed_until {
                alert.folded += 1;
                if alert.state == AlertState::Dispatched {
                    alert.state = AlertState::Suppressed;
                }
                debug!(
                    instrument = %alert.instrument,
                    source = %alert.source,
                    alert = %alert.id,
                    folded = alert.folded,
                    "AlertDispatcher folded request into suppression window"
                );
                return Ok(SubmitOutcome::Folded {
                    alert: alert.id,
                    folded: alert.folded,
                });
            }
        }

        let alert = Alert {
            id: AlertId(self.next_id),
            suppressed_until: request
                .time
                .checked_add_signed(self.suppression_window())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            instrument: request.instrument,
            severity: request.severity,
            source: request.source,
            message: request.message,
            created_at: request.time,
            state: AlertState::Pending,
            folded: 0,
        };
        self.next_id += 1;

        let id = alert.id;
        debug!(
            instrument = %alert.instrument,
            source = %alert.source,
            severity = %alert.severity,
            alert = %id,
            "AlertDispatcher queued alert"
        );

        // Expired windows of the same key are dropped unless still awaiting delivery
        self.windows.retain(|open| {
            !(open.instrument == alert.instrument && open.source == alert.source)
                || self.pending.contains(&Priority::from(open))
        });
        self.pending.insert(Priority::from(&alert));
        self.windows.push(alert);

        if self.pending.len() > self.queue_capacity {
            if let Some(lowest) = self.pending.pop_first() {
                let dropped = self.remove_window(lowest.id);
                warn!(
                    alert = %lowest.id,
                    severity = %lowest.severity,
                    capacity = self.queue_capacity,
                    "AlertDispatcher queue full, dropped lowest priority alert"
                );
                return Err(AlertDeliveryError::QueueFull {
                    dropped: lowest.id,
                    instrument: dropped.map(|alert| alert.instrument).unwrap_or_default(),
                    severity: lowest.severity,
                    capacity: self.queue_capacity,
                });
            }
        }

        Ok(SubmitOutcome::Queued(id))
    }

    /// Re-submit a previously issued alert.
    ///
    /// Alerts still tracked by this dispatcher, or already delivered by it, are a no-op. Alerts
    /// dropped or discarded before delivery are queued again under a new [`AlertId`].
    pub fn resubmit(&mut self, alert: &Alert) -> Result<SubmitOutcome, AlertDeliveryError> {
        let delivered = alert.id.0 < self.next_id
            && matches!(alert.state, AlertState::Dispatched | AlertState::Suppressed);

        if delivered || self.get(alert.id).is_some() {
            debug!(alert = %alert.id, "AlertDispatcher ignored re-submitted alert");
            return Ok(SubmitOutcome::Duplicate(alert.id));
        }
        self.submit(AlertRequest::from(alert))
    }

    /// Deliver every pending alert in priority order. Alerts the sink rejects stay pending.
    pub fn dispatch<Sink>(&mut self, sink: &Sink) -> DispatchReport
    where
        Sink: AlertSink + ?Sized,
    {
        let mut report = DispatchReport::default();
        let mut rejected = Vec::new();

        while let Some(priority) = self.pending.pop_last() {
            let Some(alert) = self.windows.iter_mut().find(|alert| alert.id == priority.id) else {
                continue;
            };

            let mut delivered = alert.clone();
            delivered.state = AlertState::Dispatched;

            match sink.deliver(&delivered) {
                Ok(()) => {
                    alert.state = AlertState::Dispatched;
                    report.dispatched.push(delivered);
                }
                Err(error) => {
                    warn!(alert = %alert.id, %error, "AlertDispatcher failed to deliver alert");
                    rejected.push(priority);
                    report.failures.push(error);
                }
            }
        }

        self.pending.extend(rejected);
        report
    }

    /// Session close: force-dispatch or discard every pending alert per `policy`. The pending
    /// queue is empty afterwards.
    pub fn flush<Sink>(&mut self, policy: FlushPolicy, sink: &Sink) -> DispatchReport
    where
        Sink: AlertSink + ?Sized,
    {
        let mut report = match policy {
            FlushPolicy::Dispatch => self.dispatch(sink),
            FlushPolicy::Discard => DispatchReport::default(),
        };

        for priority in std::mem::take(&mut self.pending) {
            self.remove_window(priority.id);
            report.discarded.push(priority.id);
        }

        info!(
            ?policy,
            dispatched = report.dispatched.len(),
            discarded = report.discarded.len(),
            "AlertDispatcher flushed"
        );
        report
    }

    fn remove_window(&mut self, id: AlertId) -> Option<Alert> {
        let position = self.windows.iter().position(|alert| alert.id == id)?;
        Some(self.windows.swap_remove(position))
    }

    /// Number of alerts awaiting delivery.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pending alerts, highest priority first.
    pub fn pending(&self) -> impl Iterator<Item = &Alert> + '_ {
        self.pending
            .iter()
            .rev()
            .filter_map(|priority| self.get(priority.id))
    }

    /// Latest alert of every `(instrument, source)` key, plus older alerts still pending.
    pub fn alerts(&self) -> &[Alert] {
        &self.windows
    }

    pub fn get(&self, id: AlertId) -> Option<&Alert> {
        self.windows.iter().find(|alert| alert.id == id)
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}
