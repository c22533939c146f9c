use std::time::Duration;

use rand::Rng;

/// Delay before the first reconnect attempt.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Once the delay grows beyond this the publisher gives up.
pub const MAXIMUM_BACKOFF: Duration = Duration::from_secs(32);

/// Jitter added to every wait is drawn uniformly from `[0, JITTER)`.
const JITTER: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffState {
    Connected,
    BackingOff,
    GivenUp,
}

/// What the loop should do before its next publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStep {
    Proceed,
    Wait(Duration),
    GiveUp,
}

/// Jittered exponential backoff driven by connection events.
///
/// A disconnect arms the backoff. Each following [`Backoff::step`] waits for
/// the current delay plus jitter and doubles it, until the delay exceeds the
/// ceiling. A successful connection resets the delay. Giving up is final.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    ceiling: Duration,
    delay: Duration,
    should_backoff: bool,
    given_up: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_BACKOFF, MAXIMUM_BACKOFF)
    }
}

impl Backoff {
    pub const fn new(initial: Duration, ceiling: Duration) -> Self {
        Self {
            initial,
            ceiling,
            delay: initial,
            should_backoff: false,
            given_up: false,
        }
    }

    pub const fn state(&self) -> BackoffState {
        if self.given_up {
            BackoffState::GivenUp
        } else if self.should_backoff {
            BackoffState::BackingOff
        } else {
            BackoffState::Connected
        }
    }

    /// The delay the next wait is based on.
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    pub fn on_connected(&mut self) {
        if self.given_up {
            return;
        }
        self.should_backoff = false;
        self.delay = self.initial;
    }

    pub fn on_disconnected(&mut self) {
        if self.given_up {
            return;
        }
        self.should_backoff = true;
    }

    /// Decides the step before the next publish, drawing the jitter from `rng`.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> BackoffStep {
        if self.given_up {
            return BackoffStep::GiveUp;
        }
        if !self.should_backoff {
            return BackoffStep::Proceed;
        }
        if self.delay > self.ceiling {
            self.given_up = true;
            return BackoffStep::GiveUp;
        }

        let jitter = rng.gen_range(Duration::ZERO..JITTER);
        let wait = self.delay + jitter;
        self.delay *= 2;
        BackoffStep::Wait(wait)
    }
}
