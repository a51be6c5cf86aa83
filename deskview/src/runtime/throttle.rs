use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::framework::logging::*;

pub const DEFAULT_RESIZE_THROTTLE_MS: u64 = 15;

type Sink<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Coalesces bursts of values. The first value after an idle period arms a
/// timer; values arriving before it fires replace each other, and only the
/// latest one reaches the sink.
pub struct Throttle<T> {
    delay: Duration,
    pending: Arc<Mutex<Option<T>>>,
    sink: Sink<T>,
}

impl<T: Send + 'static> Throttle<T> {
    pub fn new(delay: Duration, sink: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(None)),
            sink: Arc::new(sink),
        }
    }

    pub fn from_millis(
        millis: u64,
        sink: impl Fn(T) + Send + Sync + 'static,
    ) -> Self {
        Self::new(Duration::from_millis(millis), sink)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn trigger(&self, value: T) {
        if self.delay.is_zero() {
            (self.sink)(value);
            return;
        }

        let arm = {
            let mut pending = self.pending.lock();
            let idle = pending.is_none();
            *pending = Some(value);
            idle
        };

        if !arm {
            return;
        }

        let delay = self.delay;
        let pending = self.pending.clone();
        let sink = self.sink.clone();

        let spawned = thread::Builder::new()
            .name("deskview-throttle".into())
            .spawn(move || {
                thread::sleep(delay);
                let latest = pending.lock().take();
                if let Some(value) = latest {
                    sink(value);
                }
            });

        if let Err(e) = spawned {
            error!("Unable to spawn throttle timer: {}", e);
            if let Some(value) = self.pending.lock().take() {
                (self.sink)(value);
            }
        }
    }

    /// Returns true while a value is waiting for the timer.
    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use std::sync::mpsc;
    use std::time::Instant;

    use super::*;

    #[test]
    #[serial]
    fn burst_is_coalesced_to_latest_value() {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let throttle = Throttle::from_millis(40, move |value: u32| {
            let _ = tx.lock().send(value);
        });

        for value in 1..=5 {
            throttle.trigger(value);
        }
        assert!(throttle.is_pending());

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(5));
        assert!(rx.recv_timeout(Duration::from_millis(120)).is_err());
        assert!(!throttle.is_pending());
    }

    #[test]
    #[serial]
    fn each_window_delivers_once() {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let throttle = Throttle::from_millis(20, move |value: u32| {
            let _ = tx.lock().send(value);
        });

        throttle.trigger(1);
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(1));

        throttle.trigger(2);
        throttle.trigger(3);
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(3));
    }

    #[test]
    #[serial]
    fn delivery_waits_for_the_delay() {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let throttle = Throttle::from_millis(30, move |value: u32| {
            let _ = tx.lock().send(value);
        });

        let start = Instant::now();
        throttle.trigger(9);
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(9));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn zero_delay_delivers_inline() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let throttle = Throttle::new(Duration::ZERO, move |value: u32| {
            sink.lock().push(value);
        });

        throttle.trigger(1);
        throttle.trigger(2);
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert!(!throttle.is_pending());
    }
}
