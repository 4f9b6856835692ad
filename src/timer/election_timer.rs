use crate::timer::{Clock, RealClock};
use rand::Rng;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimerEvent {
    Started,
    Stopped,
    Reset,
    Timeout,
}

/// ElectionTimer is a single-shot timer with a randomized duration. A new duration is drawn from
/// `[min, max]` on construction and on every start. When it elapses the timer stops itself and
/// emits `Timeout`; it does not restart on its own.
pub struct ElectionTimer<C: Clock = RealClock> {
    timeout_range: RangeInclusive<Duration>,
    timeout: Duration,
    clock: C,
    shared: Arc<Mutex<Shared>>,
    pending: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Shared {
    running: bool,
    // Bumped on every start and stop, so a timeout can tell whether it is still current.
    epoch: u64,
    listeners: HashMap<u64, mpsc::UnboundedSender<(u64, TimerEvent)>>,
    next_listener_id: u64,
}

impl Shared {
    fn emit(&mut self, event: TimerEvent) {
        let epoch = self.epoch;
        self.listeners.retain(|_, tx| tx.send((epoch, event)).is_ok());
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, thiserror::Error)]
#[error("Election timeout minimum {min:?} is greater than its maximum {max:?}")]
pub struct InvalidTimeoutRange {
    pub min: Duration,
    pub max: Duration,
}

impl ElectionTimer<RealClock> {
    pub fn new(min_timeout: Duration, max_timeout: Duration) -> Result<Self, InvalidTimeoutRange> {
        Self::with_clock(min_timeout, max_timeout, RealClock)
    }
}

impl<C: Clock> ElectionTimer<C> {
    pub(crate) fn with_clock(
        min_timeout: Duration,
        max_timeout: Duration,
        clock: C,
    ) -> Result<Self, InvalidTimeoutRange> {
        if min_timeout > max_timeout {
            return Err(InvalidTimeoutRange {
                min: min_timeout,
                max: max_timeout,
            });
        }

        let timeout_range = RangeInclusive::new(min_timeout, max_timeout);
        let timeout = random_timeout(&timeout_range);

        Ok(ElectionTimer {
            timeout_range,
            timeout,
            clock,
            shared: Default::default(),
            pending: None,
        })
    }

    /// Starts the timer with a freshly drawn timeout. No-op while running.
    pub fn start(&mut self) {
        let epoch = {
            let mut shared = lock(&self.shared);
            if shared.running {
                return;
            }
            shared.running = true;
            shared.epoch += 1;
            shared.emit(TimerEvent::Started);
            shared.epoch
        };

        self.timeout = random_timeout(&self.timeout_range);
        let deadline = self.clock.now() + self.timeout;
        let mut clock = self.clock.clone();
        let shared = self.shared.clone();

        self.pending = Some(tokio::spawn(async move {
            clock.sleep_until(deadline).await;

            let mut shared = lock(&shared);
            if shared.running && shared.epoch == epoch {
                shared.running = false;
                shared.emit(TimerEvent::Timeout);
            }
        }));
    }

    /// Stops the timer. Only emits `Stopped` if it was running. A timeout that already fired but
    /// has not been received yet will never be delivered.
    pub fn stop(&mut self) {
        {
            let mut shared = lock(&self.shared);
            shared.epoch += 1;
            if !shared.running {
                return;
            }
            shared.running = false;
            shared.emit(TimerEvent::Stopped);
        }

        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    pub fn reset(&mut self) {
        self.stop();
        self.start();
        lock(&self.shared).emit(TimerEvent::Reset);
    }

    /// The duration drawn by the most recent start (or construction).
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn timeout_range(&self) -> &RangeInclusive<Duration> {
        &self.timeout_range
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared).running
    }

    /// Registers a new listener. Dropping the subscription removes it.
    pub fn subscribe(&self) -> TimerSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut shared = lock(&self.shared);
        let id = shared.next_listener_id;
        shared.next_listener_id += 1;
        shared.listeners.insert(id, tx);

        TimerSubscription {
            id,
            receiver: rx,
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl<C: Clock> Drop for ElectionTimer<C> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

fn random_timeout(range: &RangeInclusive<Duration>) -> Duration {
    rand::thread_rng().gen_range(range.clone())
}

pub struct TimerSubscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<(u64, TimerEvent)>,
    shared: Weak<Mutex<Shared>>,
}

impl TimerSubscription {
    /// Next event, or `None` once the timer is gone. Cancel safe.
    pub async fn recv(&mut self) -> Option<TimerEvent> {
        loop {
            let (epoch, event) = self.receiver.recv().await?;
            if self.is_current(epoch, event) {
                return Some(event);
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<TimerEvent> {
        while let Ok((epoch, event)) = self.receiver.try_recv() {
            if self.is_current(epoch, event) {
                return Some(event);
            }
        }

        None
    }

    // A timeout raced by a later stop or start is stale.
    fn is_current(&self, epoch: u64, event: TimerEvent) -> bool {
        if event != TimerEvent::Timeout {
            return true;
        }

        match self.shared.upgrade() {
            Some(shared) => lock(&shared).epoch == epoch,
            None => false,
        }
    }
}

impl Drop for TimerSubscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared).listeners.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{mocked_clock, MockClock, MockClockController};

    const TIMEOUT: Duration = Duration::from_millis(100);

    // Jitter is not under test, so min and max are the same.
    fn fixed_timer() -> (ElectionTimer<MockClock>, MockClockController) {
        let (clock, controller) = mocked_clock();
        (ElectionTimer::with_clock(TIMEOUT, TIMEOUT, clock).unwrap(), controller)
    }

    async fn recv(subscription: &mut TimerSubscription) -> TimerEvent {
        tokio::time::timeout(Duration::from_secs(5), subscription.recv())
            .await
            .expect("Unexpected timeout")
            .expect("Timer dropped")
    }

    async fn assert_no_event(subscription: &mut TimerSubscription) {
        tokio::time::timeout(Duration::from_millis(10), subscription.recv())
            .await
            .expect_err("Expected timeout");
    }

    #[test]
    fn timeout_is_drawn_from_range() {
        let (min, max) = (Duration::from_millis(150), Duration::from_millis(300));
        for _ in 0..100 {
            let timer = ElectionTimer::new(min, max).unwrap();
            assert!(timer.timeout() >= min && timer.timeout() <= max);
            assert!(!timer.is_running());
        }
    }

    #[test]
    fn inverted_range_is_rejected() {
        let (min, max) = (Duration::from_millis(300), Duration::from_millis(150));
        let err = ElectionTimer::new(min, max).err().expect("Expected an error");
        assert_eq!((err.min, err.max), (min, max));

        let fixed = ElectionTimer::new(min, min).unwrap();
        assert_eq!(fixed.timeout(), min);
    }

    #[tokio::test]
    async fn start_then_timeout() {
        let (mut timer, mut controller) = fixed_timer();
        let mut events = timer.subscribe();

        timer.start();
        timer.start();
        assert_eq!(recv(&mut events).await, TimerEvent::Started);
        assert!(timer.is_running());

        controller.advance(TIMEOUT - Duration::from_nanos(1));
        assert_no_event(&mut events).await;

        controller.advance(Duration::from_nanos(1));
        assert_eq!(recv(&mut events).await, TimerEvent::Timeout);
        assert!(!timer.is_running());

        // Single shot.
        controller.advance(TIMEOUT * 2);
        assert_no_event(&mut events).await;
    }

    #[tokio::test]
    async fn reset_pushes_out_the_deadline() {
        let (mut timer, mut controller) = fixed_timer();
        timer.start();
        let mut events = timer.subscribe();

        for _ in 0..5 {
            controller.advance(TIMEOUT / 2);
            timer.reset();
            assert_eq!(recv(&mut events).await, TimerEvent::Stopped);
            assert_eq!(recv(&mut events).await, TimerEvent::Started);
            assert_eq!(recv(&mut events).await, TimerEvent::Reset);
        }

        controller.advance(TIMEOUT - Duration::from_nanos(1));
        assert_no_event(&mut events).await;
        controller.advance(Duration::from_nanos(1));
        assert_eq!(recv(&mut events).await, TimerEvent::Timeout);
    }

    #[tokio::test]
    async fn stop_cancels_timeout() {
        let (mut timer, mut controller) = fixed_timer();
        let mut events = timer.subscribe();
        timer.start();
        timer.stop();
        timer.stop();

        assert_eq!(recv(&mut events).await, TimerEvent::Started);
        assert_eq!(recv(&mut events).await, TimerEvent::Stopped);
        controller.advance(TIMEOUT * 2);
        assert_no_event(&mut events).await;
    }

    #[tokio::test]
    async fn fired_timeout_is_dropped_after_restart() {
        let (mut timer, mut controller) = fixed_timer();
        let mut events = timer.subscribe();
        timer.start();
        assert_eq!(recv(&mut events).await, TimerEvent::Started);

        // Let the timeout fire, but restart before anyone reads it.
        controller.advance(TIMEOUT);
        while timer.is_running() {
            tokio::task::yield_now().await;
        }
        timer.start();

        assert_eq!(recv(&mut events).await, TimerEvent::Started);
        assert_no_event(&mut events).await;
    }

    #[tokio::test]
    async fn fired_timeout_is_dropped_after_stop() {
        let (mut timer, mut controller) = fixed_timer();
        let mut events = timer.subscribe();
        timer.start();
        assert_eq!(recv(&mut events).await, TimerEvent::Started);

        controller.advance(TIMEOUT);
        while timer.is_running() {
            tokio::task::yield_now().await;
        }
        timer.stop();

        // Already stopped by the timeout itself, so no Stopped either.
        assert_no_event(&mut events).await;
        assert!(!timer.is_running());
    }

    #[tokio::test]
    async fn reset_from_stopped() {
        let (mut timer, _controller) = fixed_timer();
        let mut events = timer.subscribe();
        timer.reset();

        assert_eq!(recv(&mut events).await, TimerEvent::Started);
        assert_eq!(recv(&mut events).await, TimerEvent::Reset);
        assert!(timer.is_running());
    }

    #[tokio::test]
    async fn dropped_subscription_is_removed() {
        let (mut timer, _controller) = fixed_timer();
        let mut kept = timer.subscribe();
        drop(timer.subscribe());

        timer.start();
        assert_eq!(lock(&timer.shared).listeners.len(), 1);
        assert_eq!(recv(&mut kept).await, TimerEvent::Started);
    }
}
