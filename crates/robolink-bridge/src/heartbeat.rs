use std::time::{Duration, Instant};

/// Unacknowledged heartbeats tolerated before the link is declared dead.
pub const DEFAULT_HEARTBEAT_THRESHOLD: u32 = 3;

/// Result of sending one heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatStatus {
    Alive { missed: u32 },
    Expired { missed: u32 },
}

/// Missed-heartbeat bookkeeping for one connection.
///
/// The counter goes up by one per heartbeat sent and drops to zero on every
/// acknowledgement. Once it exceeds the threshold the link is expired, so with
/// the default threshold of 3 the fourth silent cycle closes the connection.
#[derive(Debug, Clone)]
pub struct HeartbeatState {
    missed: u32,
    threshold: u32,
    interval: Duration,
    last_beat: Instant,
}

impl HeartbeatState {
    pub fn new(threshold: u32, interval: Duration, now: Instant) -> Self {
        Self {
            missed: 0,
            threshold,
            interval,
            last_beat: now,
        }
    }

    /// Whether a full interval has passed since the previous heartbeat.
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_beat) >= self.interval
    }

    /// Account for a heartbeat just sent.
    pub fn on_beat_sent(&mut self, now: Instant) -> HeartbeatStatus {
        self.missed = self.missed.saturating_add(1);
        self.last_beat = now;
        if self.missed > self.threshold {
            HeartbeatStatus::Expired {
                missed: self.missed,
            }
        } else {
            HeartbeatStatus::Alive {
                missed: self.missed,
            }
        }
    }

    /// The client answered.
    pub fn ack(&mut self) {
        self.missed = 0;
    }

    pub fn missed(&self) -> u32 {
        self.missed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn fourth_silent_cycle_expires() {
        let t0 = Instant::now();
        let mut hb = HeartbeatState::new(DEFAULT_HEARTBEAT_THRESHOLD, SECOND, t0);

        for expected in 1..=3 {
            assert_eq!(
                hb.on_beat_sent(t0 + SECOND * expected),
                HeartbeatStatus::Alive { missed: expected }
            );
        }
        assert_eq!(
            hb.on_beat_sent(t0 + SECOND * 4),
            HeartbeatStatus::Expired { missed: 4 }
        );
    }

    #[test]
    fn ack_resets_counter() {
        let t0 = Instant::now();
        let mut hb = HeartbeatState::new(3, SECOND, t0);
        hb.on_beat_sent(t0 + SECOND);
        hb.on_beat_sent(t0 + SECOND * 2);
        hb.on_beat_sent(t0 + SECOND * 3);
        hb.ack();
        assert_eq!(hb.missed(), 0);

        // A link that answers every cycle never expires.
        for i in 4..20 {
            assert!(matches!(
                hb.on_beat_sent(t0 + SECOND * i),
                HeartbeatStatus::Alive { missed: 1 }
            ));
            hb.ack();
        }
    }

    #[test]
    fn due_tracks_interval() {
        let t0 = Instant::now();
        let mut hb = HeartbeatState::new(3, SECOND, t0);
        assert!(!hb.is_due(t0));
        assert!(!hb.is_due(t0 + Duration::from_millis(999)));
        assert!(hb.is_due(t0 + SECOND));

        hb.on_beat_sent(t0 + SECOND);
        assert!(!hb.is_due(t0 + Duration::from_millis(1500)));
        assert!(hb.is_due(t0 + SECOND * 2));
    }

    #[test]
    fn zero_threshold_expires_on_first_miss() {
        let t0 = Instant::now();
        let mut hb = HeartbeatState::new(0, SECOND, t0);
        assert_eq!(
            hb.on_beat_sent(t0 + SECOND),
            HeartbeatStatus::Expired { missed: 1 }
        );
    }
}
