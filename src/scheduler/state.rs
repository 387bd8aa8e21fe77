//! Idle/Pending debounce state machine.
//!
//! Pure bookkeeping: callers supply the clock, so transitions can be tested
//! without a runtime.

use std::time::Duration;
use tokio::time::Instant;

use crate::models::{Coordinate, ProbeRequest};

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeState {
    Idle,
    /// A request waits for the pointer to settle
    Pending {
        request: ProbeRequest,
        deadline: Instant,
    },
}

#[derive(Debug)]
pub struct Debouncer {
    settle: Duration,
    state: ProbeState,
    latest_request: u64,
}

impl Debouncer {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            state: ProbeState::Idle,
            latest_request: 0,
        }
    }

    /// Accept a pointer position. Any pending request is superseded and the
    /// settle timer restarts from `now`.
    pub fn on_move(&mut self, at: Coordinate, now: Instant) -> ProbeRequest {
        self.latest_request += 1;
        let request = ProbeRequest::new(self.latest_request, at);
        self.state = ProbeState::Pending {
            request,
            deadline: now + self.settle,
        };
        request
    }

    /// Cancel the pending request, if any
    pub fn cancel(&mut self) {
        self.state = ProbeState::Idle;
    }

    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            ProbeState::Idle => None,
            ProbeState::Pending { deadline, .. } => Some(*deadline),
        }
    }

    /// Take the pending request once its deadline has passed
    pub fn fire(&mut self, now: Instant) -> Option<ProbeRequest> {
        match self.state {
            ProbeState::Pending { request, deadline } if now >= deadline => {
                self.state = ProbeState::Idle;
                Some(request)
            }
            _ => None,
        }
    }

    /// Whether `request_id` is still the latest accepted request
    pub fn is_current(&self, request_id: u64) -> bool {
        request_id == self.latest_request
    }

    pub fn state(&self) -> &ProbeState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_last_coordinate_wins() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(ms(200));

        let moves = [
            (0, Coordinate::new(-22.90, -43.20)),
            (50, Coordinate::new(-22.91, -43.21)),
            (100, Coordinate::new(-22.92, -43.22)),
            (140, Coordinate::new(-22.93, -43.23)),
        ];
        for (t, at) in moves {
            // Nothing fires between moves
            assert!(debouncer.fire(t0 + ms(t)).is_none());
            debouncer.on_move(at, t0 + ms(t));
        }

        assert_eq!(debouncer.deadline(), Some(t0 + ms(340)));
        assert!(debouncer.fire(t0 + ms(339)).is_none());

        let request = debouncer.fire(t0 + ms(340)).unwrap();
        assert_eq!(request.request_id, 4);
        assert_eq!(request.coordinate(), Coordinate::new(-22.93, -43.23));
        assert_eq!(debouncer.state(), &ProbeState::Idle);

        // Consumed exactly once
        assert!(debouncer.fire(t0 + ms(1000)).is_none());
    }

    #[test]
    fn test_cancel_returns_to_idle() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(ms(200));
        debouncer.on_move(Coordinate::new(0.0, 0.0), t0);
        debouncer.cancel();
        assert_eq!(debouncer.deadline(), None);
        assert!(debouncer.fire(t0 + ms(500)).is_none());
    }

    #[test]
    fn test_newer_move_makes_earlier_request_stale() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(ms(200));
        debouncer.on_move(Coordinate::new(0.0, 0.0), t0);
        let dispatched = debouncer.fire(t0 + ms(200)).unwrap();
        assert!(debouncer.is_current(dispatched.request_id));

        debouncer.on_move(Coordinate::new(1.0, 1.0), t0 + ms(210));
        assert!(!debouncer.is_current(dispatched.request_id));
    }
}
