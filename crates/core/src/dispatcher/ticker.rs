//! Tick sources for the dispatcher loop.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Drives the dispatcher loop.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick. `false` ends the loop.
    async fn tick(&mut self) -> bool;

    /// Called after the dispatcher finished the tick's claim phase.
    fn tick_processed(&mut self) {}
}

/// Wall-clock ticker with a fixed period. The first tick fires immediately;
/// ticks missed while a tick was running are delayed, not burst.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Ticker driven explicitly through a [`ManualTickerHandle`].
pub struct ManualTicker {
    rx: mpsc::Receiver<oneshot::Sender<()>>,
    pending_ack: Option<oneshot::Sender<()>>,
}

/// Sends ticks to a [`ManualTicker`].
#[derive(Clone)]
pub struct ManualTickerHandle {
    tx: mpsc::Sender<oneshot::Sender<()>>,
}

impl ManualTicker {
    pub fn new() -> (Self, ManualTickerHandle) {
        let (tx, rx) = mpsc::channel(16);
        (
            Self {
                rx,
                pending_ack: None,
            },
            ManualTickerHandle { tx },
        )
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        match self.rx.recv().await {
            Some(ack) => {
                self.pending_ack = Some(ack);
                true
            }
            None => false,
        }
    }

    fn tick_processed(&mut self) {
        if let Some(ack) = self.pending_ack.take() {
            let _ = ack.send(());
        }
    }
}

impl ManualTickerHandle {
    /// Fire one tick and wait until the dispatcher has claimed and
    /// dispatched its jobs. Returns `false` if the loop is gone.
    pub async fn tick(&self) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(ack_tx).await.is_err() {
            return false;
        }
        ack_rx.await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_ticker_round_trip() {
        let (mut ticker, handle) = ManualTicker::new();

        let driver = tokio::spawn(async move {
            assert!(ticker.tick().await);
            ticker.tick_processed();
            ticker
        });

        assert!(handle.tick().await);
        let ticker = driver.await.unwrap();

        // Dropping the ticker ends the handle's ticks.
        drop(ticker);
        assert!(!handle.tick().await);
    }

    #[tokio::test]
    async fn test_manual_ticker_ends_when_handles_dropped() {
        let (mut ticker, handle) = ManualTicker::new();
        drop(handle);
        assert!(!ticker.tick().await);
    }

    #[tokio::test]
    async fn test_interval_ticker_first_tick_is_immediate() {
        let mut ticker = IntervalTicker::new(Duration::from_millis(100));
        let start = tokio::time::Instant::now();
        assert!(ticker.tick().await);
        assert!(start.elapsed() < Duration::from_millis(50));

        assert!(ticker.tick().await);
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
