mod election_timer;
mod time;

pub use election_timer::ElectionTimer;
pub use election_timer::InvalidTimeoutRange;
pub use election_timer::TimerEvent;
pub use election_timer::TimerSubscription;
pub use time::RealClock;

pub(crate) use time::Clock;
#[cfg(test)]
pub(crate) use time::{mocked_clock, MockClock, MockClockController};
