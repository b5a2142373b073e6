use crate::{alert::Alert, error::AlertDeliveryError};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Delivery collaborator receiving dispatched [`Alert`]s.
///
/// Delivery is at-least-once from the consumer's perspective: consumers deduplicate by
/// `(instrument, AlertId)`. Retry and timeout policy belongs to the implementation.
pub trait AlertSink {
    fn deliver(&self, alert: &Alert) -> Result<(), AlertDeliveryError>;
}

impl<Sink> AlertSink for Arc<Sink>
where
    Sink: AlertSink + ?Sized,
{
    fn deliver(&self, alert: &Alert) -> Result<(), AlertDeliveryError> {
        self.as_ref().deliver(alert)
    }
}

/// Simple alert sink that stores alerts in a vector.
#[derive(Debug, Default)]
pub struct VecAlertSink {
    pub alerts: Mutex<Vec<Alert>>,
}

impl VecAlertSink {
    /// Clone of every alert delivered so far, in delivery order.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.lock().is_empty()
    }
}

impl AlertSink for VecAlertSink {
    fn deliver(&self, alert: &Alert) -> Result<(), AlertDeliveryError> {
        self.alerts.lock().push(alert.clone());
        Ok(())
    }
}

/// Push stream of dispatched alerts to a notification collaborator over a tokio unbounded
/// channel.
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    pub tx: mpsc::UnboundedSender<Alert>,
}

impl ChannelAlertSink {
    pub fn new(tx: mpsc::UnboundedSender<Alert>) -> Self {
        Self { tx }
    }

    /// Construct a sink and the receiving half of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl AlertSink for ChannelAlertSink {
    fn deliver(&self, alert: &Alert) -> Result<(), AlertDeliveryError> {
        self.tx
            .send(alert.clone())
            .map_err(|_| AlertDeliveryError::Delivery {
                alert: alert.id,
                reason: "alert channel receiver dropped".to_string(),
            })
    }
}
