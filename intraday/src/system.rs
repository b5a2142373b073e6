use crate::{
    config::{BackpressurePolicy, PipelineConfigs, QueueConfig, SystemConfig},
    decision::DecisionState,
    error::{ConfigError, DataGapError, PipelineError, PipelineWarning, SnapshotError, SystemError},
    pipeline::{Pipeline, PipelineOutput},
    snapshot::SystemSnapshot,
};
use fnv::FnvHashMap;
use intraday_alert::{AlertSink, DispatchReport};
use intraday_instrument::{InstrumentId, PriceBar};
use intraday_ta::{IndicatorVector, PatternSignal};
use parking_lot::{Mutex, RwLock};
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::{
    sync::{Notify, mpsc},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, warn};

/// [`AlertSink`] shared by every pipeline task.
pub type SharedAlertSink = Arc<dyn AlertSink + Send + Sync>;

/// Item consumed by an instrument pipeline task.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueItem {
    Bar(PriceBar),
    /// Market close marker: flush pending alerts and reset pattern automata.
    SessionClose,
}

/// [`QueueItem`] popped from a [`BarQueue`].
#[derive(Debug, Clone, PartialEq)]
pub struct Dequeued {
    pub item: QueueItem,
    /// Bars dropped under [`BackpressurePolicy::DropOldest`] since the previous popped bar.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<QueueItem>,
    bars: usize,
    dropped: u64,
    closed: bool,
}

impl QueueState {
    fn drop_oldest_bar(&mut self) {
        let oldest = self
            .items
            .iter()
            .position(|item| matches!(item, QueueItem::Bar(_)));

        if let Some(position) = oldest {
            self.items.remove(position);
            self.bars -= 1;
            self.dropped += 1;
        }
    }
}

/// Bounded single-consumer bar queue of one instrument.
///
/// Capacity bounds queued bars only; [`QueueItem::SessionClose`] markers are always accepted.
#[derive(Debug)]
pub struct BarQueue {
    instrument: InstrumentId,
    config: QueueConfig,
    state: Mutex<QueueState>,
    not_empty: Notify,
    not_full: Notify,
}

impl BarQueue {
    pub fn new(instrument: InstrumentId, config: QueueConfig) -> Self {
        Self {
            instrument,
            config,
            state: Mutex::new(QueueState::default()),
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Number of queued bars.
    pub fn len(&self) -> usize {
        self.state.lock().bars
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue a bar, applying the configured [`BackpressurePolicy`] when full.
    ///
    /// Under [`BackpressurePolicy::Block`] the producer waits for space, at most
    /// `send_timeout_ms`.
    pub async fn push(&self, bar: PriceBar) -> Result<(), SystemError> {
        let deadline = Instant::now() + Duration::from_millis(self.config.send_timeout_ms);

        loop {
            let notified = self.not_full.notified();
            {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(SystemError::QueueClosed(self.instrument.clone()));
                }

                let full = state.bars >= self.config.capacity;
                if full && self.config.policy == BackpressurePolicy::DropOldest {
                    state.drop_oldest_bar();
                    warn!(
                        instrument = %self.instrument,
                        dropped = state.dropped,
                        "BarQueue full, dropped oldest bar"
                    );
                }

                if !full || self.config.policy == BackpressurePolicy::DropOldest {
                    state.items.push_back(QueueItem::Bar(bar));
                    state.bars += 1;
                    drop(state);
                    self.not_empty.notify_one();
                    return Ok(());
                }
            }

            debug!(instrument = %self.instrument, "BarQueue full, producer waiting");
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(SystemError::SendTimeout(self.instrument.clone()));
            }
        }
    }

    /// Enqueue a [`QueueItem::SessionClose`] marker.
    pub fn push_session_close(&self) -> Result<(), SystemError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SystemError::QueueClosed(self.instrument.clone()));
        }
        state.items.push_back(QueueItem::SessionClose);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Wait for the next item. Returns `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<Dequeued> {
        loop {
            let notified = self.not_empty.notified();
            {
                let mut state = self.state.lock();
                if let Some(item) = state.items.pop_front() {
                    let dropped = match item {
                        QueueItem::Bar(_) => {
                            state.bars -= 1;
                            std::mem::take(&mut state.dropped)
                        }
                        QueueItem::SessionClose => 0,
                    };
                    drop(state);
                    self.not_full.notify_one();
                    return Some(Dequeued { item, dropped });
                }

                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Stop accepting items. Queued items are still delivered by [`pop`](Self::pop).
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_one();
        self.not_full.notify_waiters();
    }
}

/// Output of the pipeline tasks of a running system.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemEvent {
    Processed(Box<PipelineOutput>),
    Rejected {
        instrument: InstrumentId,
        error: PipelineError,
    },
    SessionClosed {
        instrument: InstrumentId,
        report: DispatchReport,
    },
}

/// Read-only query interface over the pipelines of a running system.
#[derive(Debug, Clone, Default)]
pub struct SystemView {
    pipelines: Arc<RwLock<FnvHashMap<InstrumentId, Arc<RwLock<Pipeline>>>>>,
}

impl SystemView {
    fn get(&self, instrument: &InstrumentId) -> Option<Arc<RwLock<Pipeline>>> {
        self.pipelines.read().get(instrument).cloned()
    }

    fn insert(&self, pipeline: Pipeline) -> Arc<RwLock<Pipeline>> {
        let instrument = pipeline.instrument().clone();
        let pipeline = Arc::new(RwLock::new(pipeline));
        self.pipelines.write().insert(instrument, Arc::clone(&pipeline));
        pipeline
    }

    fn entries(&self) -> Vec<(InstrumentId, Arc<RwLock<Pipeline>>)> {
        self.pipelines
            .read()
            .iter()
            .map(|(instrument, pipeline)| (instrument.clone(), Arc::clone(pipeline)))
            .collect()
    }

    /// Instruments with a pipeline, ordered by [`InstrumentId`].
    pub fn instruments(&self) -> Vec<InstrumentId> {
        let mut instruments = self.pipelines.read().keys().cloned().collect::<Vec<_>>();
        instruments.sort();
        instruments
    }

    /// Run `f` against the current state of an instrument [`Pipeline`].
    pub fn with_pipeline<F, T>(&self, instrument: &InstrumentId, f: F) -> Option<T>
    where
        F: FnOnce(&Pipeline) -> T,
    {
        let pipeline = self.get(instrument)?;
        let pipeline = pipeline.read();
        Some(f(&pipeline))
    }

    pub fn latest(&self, instrument: &InstrumentId) -> Option<IndicatorVector> {
        self.with_pipeline(instrument, |pipeline| pipeline.latest().cloned())
            .flatten()
    }

    pub fn history(&self, instrument: &InstrumentId) -> Vec<IndicatorVector> {
        self.with_pipeline(instrument, |pipeline| pipeline.history().cloned().collect())
            .unwrap_or_default()
    }

    pub fn decision(&self, instrument: &InstrumentId) -> Option<DecisionState> {
        self.with_pipeline(instrument, |pipeline| pipeline.decision().clone())
    }

    pub fn active_signals(&self, instrument: &InstrumentId) -> Vec<PatternSignal> {
        self.with_pipeline(instrument, |pipeline| pipeline.active_signals().to_vec())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::new(
            self.pipelines
                .read()
                .values()
                .map(|pipeline| pipeline.read().snapshot()),
        )
    }
}

/// Handle to a running sharded system: one [`BarQueue`] and one consumer task per instrument,
/// created on the first bar of that instrument.
#[allow(missing_debug_implementations)]
pub struct SystemHandle {
    configs: PipelineConfigs,
    queue_config: QueueConfig,
    sink: SharedAlertSink,
    view: SystemView,
    queues: FnvHashMap<InstrumentId, Arc<BarQueue>>,
    tasks: Vec<(InstrumentId, JoinHandle<()>)>,
    events: mpsc::UnboundedSender<SystemEvent>,
}

impl SystemHandle {
    /// Start an empty system. The returned receiver streams every [`SystemEvent`]; dropping it
    /// does not affect processing.
    pub fn start(
        config: &SystemConfig,
        sink: SharedAlertSink,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SystemEvent>), ConfigError> {
        config.validate()?;
        let (events, events_rx) = mpsc::unbounded_channel();

        let handle = Self {
            configs: PipelineConfigs::from(config),
            queue_config: config.queue,
            sink,
            view: SystemView::default(),
            queues: FnvHashMap::default(),
            tasks: Vec::new(),
            events,
        };

        info!(queue = ?handle.queue_config, "System started");
        Ok((handle, events_rx))
    }

    /// Start a system warm-restarted from a [`SystemSnapshot`].
    pub fn restore(
        config: &SystemConfig,
        snapshot: SystemSnapshot,
        sink: SharedAlertSink,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SystemEvent>), SnapshotError> {
        let (handle, events_rx) = Self::start(config, sink)?;
        for snapshot in snapshot.pipelines {
            let config = handle.configs.get(&snapshot.instrument);
            handle.view.insert(Pipeline::restore(config, snapshot)?);
        }
        Ok((handle, events_rx))
    }

    pub fn view(&self) -> &SystemView {
        &self.view
    }

    /// Enqueue a bar for its instrument pipeline, applying backpressure when the queue is full.
    pub async fn send(&mut self, bar: PriceBar) -> Result<(), SystemError> {
        let queue = self.queue(&bar.instrument)?;
        queue.push(bar).await
    }

    /// Close the session of every instrument pipeline.
    ///
    /// Running pipelines receive a session close marker behind their queued bars. Pipelines
    /// restored from a snapshot that have not received a bar yet have no task, so they are closed
    /// in place.
    pub fn session_close(&self) -> Result<(), SystemError> {
        info!(instruments = self.queues.len(), "System closing session");
        self.queues
            .values()
            .try_for_each(|queue| queue.push_session_close())?;

        for (instrument, pipeline) in self.view.entries() {
            if self.queues.contains_key(&instrument) {
                continue;
            }

            let report = pipeline.write().session_close(self.sink.as_ref());
            debug!(%instrument, "System closed session of idle restored pipeline");
            let _ = self.events.send(SystemEvent::SessionClosed { instrument, report });
        }
        Ok(())
    }

    /// Drain every queue, stop the pipeline tasks and return the final [`SystemSnapshot`].
    pub async fn shutdown(self) -> Result<SystemSnapshot, SystemError> {
        for queue in self.queues.values() {
            queue.close();
        }

        for (instrument, task) in self.tasks {
            task.await?;
            debug!(%instrument, "System pipeline task stopped");
        }

        let snapshot = self.view.snapshot();
        info!(instruments = snapshot.pipelines.len(), "System shutdown");
        Ok(snapshot)
    }

    fn queue(&mut self, instrument: &InstrumentId) -> Result<Arc<BarQueue>, SystemError> {
        if let Some(queue) = self.queues.get(instrument) {
            return Ok(Arc::clone(queue));
        }

        let pipeline = match self.view.get(instrument) {
            Some(pipeline) => pipeline,
            None => self.view.insert(Pipeline::new(
                instrument.clone(),
                self.configs.get(instrument),
            )?),
        };

        let queue = Arc::new(BarQueue::new(instrument.clone(), self.queue_config));
        let task = tokio::spawn(run_pipeline(
            Arc::clone(&queue),
            pipeline,
            Arc::clone(&self.sink),
            self.events.clone(),
        ));

        info!(%instrument, "System spawned pipeline task");
        self.queues.insert(instrument.clone(), Arc::clone(&queue));
        self.tasks.push((instrument.clone(), task));
        Ok(queue)
    }
}

/// Single-consumer processing loop of one instrument.
async fn run_pipeline(
    queue: Arc<BarQueue>,
    pipeline: Arc<RwLock<Pipeline>>,
    sink: SharedAlertSink,
    events: mpsc::UnboundedSender<SystemEvent>,
) {
    let instrument = queue.instrument().clone();

    while let Some(Dequeued { item, dropped }) = queue.pop().await {
        let event = match item {
            QueueItem::Bar(bar) => {
                let mut state = pipeline.write();
                let previous = state.engine().last_time();

                match state.process(&bar, sink.as_ref()) {
                    Ok(mut output) => {
                        if dropped > 0 {
                            output.warnings.push(PipelineWarning::DataGap(DataGapError {
                                instrument: instrument.clone(),
                                previous: previous.unwrap_or(bar.time),
                                received: bar.time,
                                missing_bars: dropped,
                            }));
                        }
                        SystemEvent::Processed(Box::new(output))
                    }
                    Err(error) => {
                        warn!(%instrument, %error, "System pipeline rejected bar");
                        SystemEvent::Rejected {
                            instrument: instrument.clone(),
                            error,
                        }
                    }
                }
            }
            QueueItem::SessionClose => {
                let report = pipeline.write().session_close(sink.as_ref());
                SystemEvent::SessionClosed {
                    instrument: instrument.clone(),
                    report,
                }
            }
        };

        // Event consumers are optional
        let _ = events.send(event);
    }
}
