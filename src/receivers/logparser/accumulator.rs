// SPDX-License-Identifier: Apache-2.0

use crate::bounded_channel::{self, BoundedReceiver, BoundedSender, SendError};
use crate::receivers::logparser::measurement::Measurement;

/// Fan-in sink for parsed measurements.
///
/// Every dispatcher holds a clone; the single [`MeasurementReceiver`] is owned
/// by whatever drains measurements downstream.
#[derive(Clone)]
pub struct Accumulator {
    tx: BoundedSender<Measurement>,
}

impl Accumulator {
    pub fn new(tx: BoundedSender<Measurement>) -> Self {
        Self { tx }
    }

    /// Queue one measurement, waiting while the queue is full.
    pub async fn add_measurement(&self, measurement: Measurement) -> Result<(), SendError> {
        self.tx.send(measurement).await
    }

    /// True once the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_disconnected()
    }
}

pub struct MeasurementReceiver {
    rx: BoundedReceiver<Measurement>,
}

impl MeasurementReceiver {
    /// Next measurement, or `None` when every accumulator clone is dropped.
    pub async fn next(&mut self) -> Option<Measurement> {
        self.rx.next().await
    }

    pub fn try_recv(&self) -> Option<Measurement> {
        self.rx.try_recv()
    }

    /// Everything currently queued, without waiting.
    pub fn drain(&self) -> Vec<Measurement> {
        std::iter::from_fn(|| self.rx.try_recv()).collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Create an accumulator whose queue holds at most `size` measurements.
pub fn bounded(size: usize) -> (Accumulator, MeasurementReceiver) {
    let (tx, rx) = bounded_channel::bounded(size);
    (Accumulator::new(tx), MeasurementReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_fan_in_from_clones() {
        let (acc, mut rx) = bounded(10);
        let other = acc.clone();

        acc.add_measurement(Measurement::new("a", Utc::now()))
            .await
            .unwrap();
        other
            .add_measurement(Measurement::new("b", Utc::now()))
            .await
            .unwrap();
        drop(acc);
        drop(other);

        let names: Vec<String> = std::iter::from_fn(|| rx.try_recv()).map(|m| m.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(rx.next().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_receiver() {
        let (acc, rx) = bounded(1);
        drop(rx);

        assert!(acc.is_closed());
        assert_eq!(
            acc.add_measurement(Measurement::new("a", Utc::now())).await,
            Err(SendError::Disconnected)
        );
    }

    #[tokio::test]
    async fn test_drain() {
        let (acc, rx) = bounded(10);
        for _ in 0..3 {
            acc.add_measurement(Measurement::new("m", Utc::now()))
                .await
                .unwrap();
        }
        assert_eq!(rx.len(), 3);
        assert_eq!(rx.drain().len(), 3);
        assert!(rx.is_empty());
    }
}
